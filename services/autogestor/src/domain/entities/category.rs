//! 分类实体

use ag_common::AuditInfo;
use ag_domain_core::{AggregateRoot, Entity};
use serde::{Deserialize, Serialize};

use super::product::normalize_optional;
use crate::domain::value_objects::{CategoryId, UserId};

/// 分类写入数据
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CategoryData {
    pub name: String,
    pub description: Option<String>,
    pub is_active: Option<bool>,
}

/// 分类
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Category {
    pub id: CategoryId,
    pub name: String,
    pub description: Option<String>,
    pub is_active: bool,
    pub audit_info: AuditInfo,
}

/// 分类及其商品数
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryWithCount {
    #[serde(flatten)]
    pub category: Category,
    pub products_count: u64,
}

impl Category {
    pub fn new(data: CategoryData, actor: Option<UserId>) -> Self {
        Self {
            id: CategoryId::new(),
            name: data.name.trim().to_string(),
            description: normalize_optional(data.description),
            is_active: data.is_active.unwrap_or(true),
            audit_info: AuditInfo::new(actor),
        }
    }

    pub fn apply(&mut self, data: CategoryData, actor: Option<UserId>) {
        self.name = data.name.trim().to_string();
        self.description = normalize_optional(data.description);
        if let Some(is_active) = data.is_active {
            self.is_active = is_active;
        }
        self.audit_info.update(actor);
    }

    pub fn toggle_status(&mut self, actor: Option<UserId>) {
        self.is_active = !self.is_active;
        self.audit_info.update(actor);
    }
}

impl Entity for Category {
    type Id = CategoryId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

impl AggregateRoot for Category {
    fn audit_info(&self) -> &AuditInfo {
        &self.audit_info
    }

    fn audit_info_mut(&mut self) -> &mut AuditInfo {
        &mut self.audit_info
    }
}
