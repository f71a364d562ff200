//! 实体变更事件的处理方
//!
//! 注册顺序：默认角色 → 缓存失效 → 审计日志

use std::sync::Arc;

use ag_errors::{AppError, AppResult};
use ag_event_core::{EventBus, EventEnvelope, EventHandler};
use ag_telemetry::record_entity_event;
use async_trait::async_trait;
use tracing::{debug, info};

use crate::application::cache::{ListingCachePolicy, ServiceCache, entity_keys, keys};
use crate::application::{PermissionCache, PermissionCacheScope};
use crate::domain::events::{ChangeKind, EntityChanged, EntityKind};
use crate::domain::rbac::{Role, USER_ROLE, default_role_for_email};
use crate::domain::repositories::{RoleRepository, UserRepository};
use crate::domain::value_objects::UserId;

pub type EntityEventBus = EventBus<EntityChanged>;

/// 组装事件总线
pub fn build_event_bus(
    cache: ServiceCache,
    policy: ListingCachePolicy,
    users: Arc<dyn UserRepository>,
    roles: Arc<dyn RoleRepository>,
    permissions: PermissionCache,
) -> EntityEventBus {
    EventBus::new()
        .with_handler(Arc::new(DefaultRoleHandler::new(users, roles, permissions)))
        .with_handler(Arc::new(CacheInvalidationHandler::new(cache, policy)))
        .with_handler(Arc::new(AuditLogHandler))
}

// ============================================================================
// 审计日志
// ============================================================================

/// 以 `audit` 为 target 输出结构化日志
pub struct AuditLogHandler;

#[async_trait]
impl EventHandler<EntityChanged> for AuditLogHandler {
    fn name(&self) -> &'static str {
        "audit_log"
    }

    async fn handle(&self, envelope: &EventEnvelope<EntityChanged>) -> AppResult<()> {
        let event = &envelope.data;
        let changes = serde_json::to_string(&event.changes).unwrap_or_default();

        info!(
            target: "audit",
            event_id = %envelope.id,
            entity = event.entity.as_str(),
            action = event.kind.as_str(),
            id = %event.entity_id,
            label = %event.label,
            changed_fields = ?event.changed_fields(),
            changes = %changes,
            actor = ?envelope.actor,
            "Entity {}",
            event.kind.as_str()
        );
        record_entity_event(event.entity.as_str(), event.kind.as_str());
        Ok(())
    }
}

// ============================================================================
// 缓存失效
// ============================================================================

pub struct CacheInvalidationHandler {
    cache: ServiceCache,
    policy: ListingCachePolicy,
}

impl CacheInvalidationHandler {
    pub fn new(cache: ServiceCache, policy: ListingCachePolicy) -> Self {
        Self { cache, policy }
    }

    /// 事件影响到的缓存键
    pub fn keys_for(&self, event: &EntityChanged) -> Vec<String> {
        let mut forget = entity_keys(event.entity, &self.policy);
        match event.entity {
            // 分类、品牌统计中的有/无商品计数依赖商品
            EntityKind::Product => {
                forget.push(keys::CATEGORIES_STATS.to_string());
                forget.push(keys::BRANDS_STATS.to_string());
            }
            // 删除分类会连带删除回收站中的商品
            EntityKind::Category if event.kind == ChangeKind::Deleted => {
                forget.push(keys::PRODUCTS_STATS.to_string());
            }
            // 删除品牌会清空商品的品牌
            EntityKind::Brand if event.kind == ChangeKind::Deleted => {
                forget.extend(entity_keys(EntityKind::Product, &self.policy));
            }
            // 用户列表与统计包含角色信息
            EntityKind::Role => forget.extend(entity_keys(EntityKind::User, &self.policy)),
            _ => {}
        }
        forget
    }
}

#[async_trait]
impl EventHandler<EntityChanged> for CacheInvalidationHandler {
    fn name(&self) -> &'static str {
        "cache_invalidation"
    }

    async fn handle(&self, envelope: &EventEnvelope<EntityChanged>) -> AppResult<()> {
        let keys = self.keys_for(&envelope.data);
        let total = keys.len();
        let failures = self.cache.forget_many(keys).await;
        if failures > 0 {
            return Err(AppError::external_service(format!(
                "{} of {} cache keys could not be forgotten",
                failures, total
            )));
        }
        debug!(entity = envelope.data.entity.as_str(), keys = total, "Cache invalidated");
        Ok(())
    }
}

// ============================================================================
// 默认角色
// ============================================================================

/// 新用户没有角色时按邮箱分配默认角色，角色不存在时创建
pub struct DefaultRoleHandler {
    users: Arc<dyn UserRepository>,
    roles: Arc<dyn RoleRepository>,
    permissions: PermissionCache,
}

impl DefaultRoleHandler {
    pub fn new(
        users: Arc<dyn UserRepository>,
        roles: Arc<dyn RoleRepository>,
        permissions: PermissionCache,
    ) -> Self {
        Self {
            users,
            roles,
            permissions,
        }
    }

    async fn ensure_role(&self, name: &str) -> AppResult<Role> {
        if let Some(role) = self.roles.find_by_name(name).await? {
            return Ok(role);
        }
        let role = Role::bare(name);
        self.roles.insert(&role).await?;
        info!(role = %role.name, "Default role created");
        Ok(role)
    }
}

#[async_trait]
impl EventHandler<EntityChanged> for DefaultRoleHandler {
    fn name(&self) -> &'static str {
        "default_role"
    }

    async fn handle(&self, envelope: &EventEnvelope<EntityChanged>) -> AppResult<()> {
        let event = &envelope.data;
        if event.entity != EntityKind::User || event.kind != ChangeKind::Created {
            return Ok(());
        }

        let user_id = UserId::from_uuid(event.entity_id);
        if !self.roles.roles_for_user(user_id).await?.is_empty() {
            return Ok(());
        }
        let Some(user) = self.users.find_by_id(user_id).await? else {
            return Ok(());
        };

        let role = self
            .ensure_role(default_role_for_email(&user.email, USER_ROLE))
            .await?;
        self.roles.assign_role(user_id, role.id).await?;
        self.permissions
            .invalidate_quietly(PermissionCacheScope::User(user_id))
            .await;

        info!(user_id = %user_id, role = %role.name, "Default role assigned");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::cache::MemoryCache;
    use uuid::Uuid;

    fn handler() -> CacheInvalidationHandler {
        CacheInvalidationHandler::new(
            ServiceCache::new(Arc::new(MemoryCache::new())),
            ListingCachePolicy::new(15, 10),
        )
    }

    #[test]
    fn test_product_change_forgets_related_stats() {
        let event = EntityChanged::new(
            EntityKind::Product,
            ChangeKind::Updated,
            Uuid::now_v7(),
            "Mouse",
            None,
        );
        let keys = handler().keys_for(&event);
        assert!(keys.contains(&"products.stats".to_string()));
        assert!(keys.contains(&"categories.stats".to_string()));
        assert!(keys.contains(&"brands.stats".to_string()));
        assert!(keys.contains(&"products.all.15.10".to_string()));
        assert!(!keys.contains(&"products.all.15.11".to_string()));
    }

    #[test]
    fn test_brand_delete_forgets_product_pages() {
        let event = EntityChanged::new(
            EntityKind::Brand,
            ChangeKind::Deleted,
            Uuid::now_v7(),
            "Acme",
            None,
        );
        let keys = handler().keys_for(&event);
        assert!(keys.contains(&"brands.select".to_string()));
        assert!(keys.contains(&"products.all.15.1".to_string()));
    }
}
