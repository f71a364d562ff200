//! 运维操作（供命令行使用）

use std::sync::Arc;

use ag_common::UserId;
use ag_errors::{AppError, AppResult};
use serde::Serialize;
use tracing::{info, warn};

use super::cache::{ListingCachePolicy, ServiceCache, catalog_keys};
use super::role_service::{RoleService, SeedReport};
use super::user_service::UserService;
use super::authorization::PermissionCacheScope;
use crate::domain::rbac::{ADMIN_ROLE, default_role_for_email, normalize_role_name};

/// 单个用户的角色分配结果
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RoleAssignment {
    pub name: String,
    pub email: String,
    pub role: String,
}

/// 未能分配角色的用户
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RoleAssignmentFailure {
    pub name: String,
    pub email: String,
    pub reason: String,
}

/// 批量分配结果；单个用户失败不影响其余用户
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RoleAssignmentReport {
    pub assigned: Vec<RoleAssignment>,
    pub failures: Vec<RoleAssignmentFailure>,
}

impl RoleAssignmentReport {
    pub fn is_empty(&self) -> bool {
        self.assigned.is_empty() && self.failures.is_empty()
    }
}

pub struct Maintenance {
    users: Arc<UserService>,
    roles: Arc<RoleService>,
    cache: ServiceCache,
    policy: ListingCachePolicy,
}

impl Maintenance {
    pub fn new(
        users: Arc<UserService>,
        roles: Arc<RoleService>,
        cache: ServiceCache,
        policy: ListingCachePolicy,
    ) -> Self {
        Self {
            users,
            roles,
            cache,
            policy,
        }
    }

    /// 给所有没有角色的用户分配角色
    ///
    /// 邮箱包含 admin 的分配管理员角色（不存在时创建），其余分配 `fallback_role`，
    /// 该角色必须已存在。逐个用户处理，失败记入报告
    pub async fn assign_missing_roles(&self, fallback_role: &str) -> AppResult<RoleAssignmentReport> {
        let fallback = normalize_role_name(fallback_role);
        if self.roles.find_by_name(&fallback).await?.is_none() {
            return Err(AppError::not_found(format!(
                "Role '{}' does not exist",
                fallback
            )));
        }

        let mut report = RoleAssignmentReport::default();
        for user in self.users.without_roles().await? {
            let role = default_role_for_email(&user.email, &fallback).to_string();
            match self.assign(user.id, &role).await {
                Ok(()) => report.assigned.push(RoleAssignment {
                    name: user.name,
                    email: user.email,
                    role,
                }),
                Err(e) => {
                    warn!(user_id = %user.id, role = %role, error = %e, "Role assignment failed");
                    report.failures.push(RoleAssignmentFailure {
                        name: user.name,
                        email: user.email,
                        reason: e.to_string(),
                    });
                }
            }
        }

        info!(
            assigned = report.assigned.len(),
            failed = report.failures.len(),
            "Missing roles assigned"
        );
        Ok(report)
    }

    async fn assign(&self, user_id: UserId, role: &str) -> AppResult<()> {
        if role == ADMIN_ROLE {
            self.roles.ensure_role(ADMIN_ROLE).await?;
        }
        self.users.assign_role(user_id, role, None).await
    }

    /// 清空权限缓存，错误原样返回
    pub async fn clear_permission_cache(&self) -> AppResult<()> {
        self.roles
            .permission_cache()
            .invalidate(PermissionCacheScope::All)
            .await?;
        info!("Permission cache cleared");
        Ok(())
    }

    /// 清空目录缓存，返回删除失败的键数量
    pub async fn clear_catalog_cache(&self) -> usize {
        let keys = catalog_keys(&self.policy);
        let total = keys.len();
        let failures = self.cache.forget_many(keys).await;
        info!(keys = total, failures, "Catalog cache cleared");
        failures
    }

    pub async fn seed_roles(&self) -> AppResult<SeedReport> {
        self.roles.seed_defaults(None).await
    }
}
