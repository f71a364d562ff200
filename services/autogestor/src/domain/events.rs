//! 实体变更事件
//!
//! 服务在写入成功后发布 [`EntityChanged`]，由事件总线上的处理方负责缓存失效、审计日志与默认角色分配

use ag_event_core::DomainEvent;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::domain::value_objects::UserId;

/// 实体类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    Product,
    Category,
    Brand,
    User,
    Role,
}

impl EntityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Product => "product",
            Self::Category => "category",
            Self::Brand => "brand",
            Self::User => "user",
            Self::Role => "role",
        }
    }

    /// 缓存键前缀
    pub fn cache_namespace(&self) -> &'static str {
        match self {
            Self::Product => "products",
            Self::Category => "categories",
            Self::Brand => "brands",
            Self::User => "users",
            Self::Role => "roles",
        }
    }
}

/// 变更类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeKind {
    Created,
    Updated,
    Deleted,
    Restored,
    ForceDeleted,
}

impl ChangeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::Updated => "updated",
            Self::Deleted => "deleted",
            Self::Restored => "restored",
            Self::ForceDeleted => "force_deleted",
        }
    }
}

/// 单个字段的变化
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldChange {
    pub field: String,
    pub old: Value,
    pub new: Value,
}

/// 不参与差异比较的字段
const IGNORED_FIELDS: &[&str] = &["audit_info", "password_hash"];

/// 比较两个快照的顶层字段
pub fn diff<T: Serialize>(before: &T, after: &T) -> Vec<FieldChange> {
    let (Ok(Value::Object(old)), Ok(Value::Object(new))) =
        (serde_json::to_value(before), serde_json::to_value(after))
    else {
        return Vec::new();
    };

    new.iter()
        .filter(|(field, _)| !IGNORED_FIELDS.contains(&field.as_str()))
        .filter_map(|(field, value)| {
            let previous = old.get(field).cloned().unwrap_or(Value::Null);
            (previous != *value).then(|| FieldChange {
                field: field.clone(),
                old: previous,
                new: value.clone(),
            })
        })
        .collect()
}

/// 实体变更事件
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityChanged {
    pub entity: EntityKind,
    pub kind: ChangeKind,
    pub entity_id: Uuid,
    /// 便于识别的字段（名称、SKU、邮箱等）
    pub label: String,
    /// 仅更新事件携带
    pub changes: Vec<FieldChange>,
    pub actor: Option<UserId>,
}

impl EntityChanged {
    pub fn new(
        entity: EntityKind,
        kind: ChangeKind,
        entity_id: Uuid,
        label: impl Into<String>,
        actor: Option<UserId>,
    ) -> Self {
        Self {
            entity,
            kind,
            entity_id,
            label: label.into(),
            changes: Vec::new(),
            actor,
        }
    }

    pub fn with_changes(mut self, changes: Vec<FieldChange>) -> Self {
        self.changes = changes;
        self
    }

    pub fn changed_fields(&self) -> Vec<&str> {
        self.changes.iter().map(|c| c.field.as_str()).collect()
    }
}

impl DomainEvent for EntityChanged {
    fn subject_type(&self) -> &'static str {
        self.entity.as_str()
    }

    fn action(&self) -> &'static str {
        self.kind.as_str()
    }

    fn subject_id(&self) -> Uuid {
        self.entity_id
    }

    fn actor(&self) -> Option<Uuid> {
        self.actor.map(|id| id.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entities::{Category, CategoryData};

    #[test]
    fn test_diff_reports_changed_fields_only() {
        let before = Category::new(
            CategoryData {
                name: "Tools".to_string(),
                ..Default::default()
            },
            None,
        );
        let mut after = before.clone();
        after.toggle_status(None);

        let changes = diff(&before, &after);
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].field, "is_active");
        assert_eq!(changes[0].old, Value::Bool(true));
        assert_eq!(changes[0].new, Value::Bool(false));
    }

    #[test]
    fn test_event_identity() {
        let actor = UserId::new();
        let event = EntityChanged::new(
            EntityKind::Brand,
            ChangeKind::ForceDeleted,
            Uuid::now_v7(),
            "Acme",
            Some(actor),
        );
        assert_eq!(event.name(), "brand.force_deleted");
        assert_eq!(event.actor(), Some(actor.0));
        assert_eq!(EntityKind::Category.cache_namespace(), "categories");
    }
}
