//! 授权解析
//!
//! 有效权限 = 直接权限 ∪ 角色权限。解析结果按用户缓存，缓存键带代数，
//! 清空全部缓存只需递增代数，不需要扫描键空间

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use ag_errors::{AppError, AppResult};
use ag_ports::CachePort;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::domain::rbac::PermissionKind;
use crate::domain::repositories::RoleRepository;
use crate::domain::value_objects::UserId;

const GENERATION_KEY: &str = "permissions.generation";

/// 默认缓存时长
pub const DEFAULT_PERMISSION_TTL: Duration = Duration::from_secs(24 * 60 * 60);

/// 用户的角色与有效权限
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserAccess {
    pub roles: BTreeSet<String>,
    pub permissions: BTreeSet<PermissionKind>,
}

impl UserAccess {
    pub fn has_role(&self, role: &str) -> bool {
        self.roles.contains(role)
    }

    pub fn can(&self, permission: PermissionKind) -> bool {
        self.permissions.contains(&permission)
    }
}

/// 失效范围
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PermissionCacheScope {
    All,
    User(UserId),
}

/// 权限缓存
#[derive(Clone)]
pub struct PermissionCache {
    cache: Arc<dyn CachePort>,
    ttl: Duration,
}

impl PermissionCache {
    pub fn new(cache: Arc<dyn CachePort>) -> Self {
        Self {
            cache,
            ttl: DEFAULT_PERMISSION_TTL,
        }
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    async fn generation(&self) -> AppResult<i64> {
        Ok(self
            .cache
            .get(GENERATION_KEY)
            .await?
            .and_then(|raw| raw.parse().ok())
            .unwrap_or(0))
    }

    fn user_key(generation: i64, user_id: UserId) -> String {
        format!("permissions.{}.user.{}", generation, user_id)
    }

    pub async fn get(&self, user_id: UserId) -> AppResult<Option<UserAccess>> {
        let key = Self::user_key(self.generation().await?, user_id);
        let Some(raw) = self.cache.get(&key).await? else {
            return Ok(None);
        };
        Ok(serde_json::from_str(&raw).ok())
    }

    pub async fn put(&self, user_id: UserId, access: &UserAccess) -> AppResult<()> {
        let key = Self::user_key(self.generation().await?, user_id);
        let raw = serde_json::to_string(access)
            .map_err(|e| AppError::internal(format!("Failed to encode access: {}", e)))?;
        self.cache.set(&key, &raw, Some(self.ttl)).await
    }

    /// 使缓存失效
    pub async fn invalidate(&self, scope: PermissionCacheScope) -> AppResult<()> {
        match scope {
            PermissionCacheScope::All => {
                let generation = self.cache.incr(GENERATION_KEY).await?;
                debug!(generation, "Permission cache generation bumped");
            }
            PermissionCacheScope::User(user_id) => {
                let key = Self::user_key(self.generation().await?, user_id);
                self.cache.delete(&key).await?;
                debug!(user_id = %user_id, "Permission cache entry forgotten");
            }
        }
        Ok(())
    }

    /// 失效失败只记录日志（写操作后调用）
    pub async fn invalidate_quietly(&self, scope: PermissionCacheScope) {
        if let Err(e) = self.invalidate(scope).await {
            warn!(?scope, error = %e, "Permission cache invalidation failed");
        }
    }
}

/// 授权服务
#[derive(Clone)]
pub struct AuthorizationService {
    roles: Arc<dyn RoleRepository>,
    cache: PermissionCache,
}

impl AuthorizationService {
    pub fn new(roles: Arc<dyn RoleRepository>, cache: PermissionCache) -> Self {
        Self { roles, cache }
    }

    pub fn cache(&self) -> &PermissionCache {
        &self.cache
    }

    /// 读取用户的角色与有效权限
    pub async fn access_for(&self, user_id: UserId) -> AppResult<UserAccess> {
        match self.cache.get(user_id).await {
            Ok(Some(access)) => return Ok(access),
            Ok(None) => {}
            Err(e) => warn!(user_id = %user_id, error = %e, "Permission cache read failed"),
        }

        let roles = self.roles.roles_for_user(user_id).await?;
        let mut permissions = self.roles.direct_permissions(user_id).await?;
        for role in &roles {
            permissions.extend(role.permissions.iter().copied());
        }
        let access = UserAccess {
            roles: roles.into_iter().map(|r| r.name).collect(),
            permissions,
        };

        if let Err(e) = self.cache.put(user_id, &access).await {
            warn!(user_id = %user_id, error = %e, "Permission cache write failed");
        }
        Ok(access)
    }

    pub async fn has_role(&self, user_id: UserId, role: &str) -> AppResult<bool> {
        Ok(self.access_for(user_id).await?.has_role(role))
    }

    pub async fn has_any_role(&self, user_id: UserId, roles: &[&str]) -> AppResult<bool> {
        let access = self.access_for(user_id).await?;
        Ok(roles.iter().any(|role| access.has_role(role)))
    }

    pub async fn can(&self, user_id: UserId, permission: PermissionKind) -> AppResult<bool> {
        Ok(self.access_for(user_id).await?.can(permission))
    }

    /// 拥有其中任意一个权限即可
    pub async fn can_any(&self, user_id: UserId, permissions: &[PermissionKind]) -> AppResult<bool> {
        let access = self.access_for(user_id).await?;
        Ok(permissions.iter().any(|p| access.can(*p)))
    }

    pub async fn effective_permissions(&self, user_id: UserId) -> AppResult<BTreeSet<PermissionKind>> {
        Ok(self.access_for(user_id).await?.permissions)
    }
}
