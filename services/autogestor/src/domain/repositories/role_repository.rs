//! 角色仓储接口
//!
//! 同时负责用户-角色与用户-直接权限两张关联表

use std::collections::BTreeSet;

use ag_errors::AppResult;
use async_trait::async_trait;

use crate::domain::rbac::{PermissionKind, Role};
use crate::domain::value_objects::{RoleId, UserId};

/// 角色仓储接口
#[async_trait]
pub trait RoleRepository: Send + Sync {
    /// 全部角色（按名称）
    async fn list(&self) -> AppResult<Vec<Role>>;

    async fn find_by_id(&self, id: RoleId) -> AppResult<Option<Role>>;

    async fn find_by_name(&self, name: &str) -> AppResult<Option<Role>>;

    async fn insert(&self, role: &Role) -> AppResult<()>;

    /// 更新名称并同步权限集合
    async fn update(&self, role: &Role) -> AppResult<()>;

    async fn delete(&self, id: RoleId) -> AppResult<bool>;

    async fn roles_for_user(&self, user_id: UserId) -> AppResult<Vec<Role>>;

    /// 幂等
    async fn assign_role(&self, user_id: UserId, role_id: RoleId) -> AppResult<()>;

    /// 返回是否存在该关联
    async fn remove_role(&self, user_id: UserId, role_id: RoleId) -> AppResult<bool>;

    async fn count_users_with_role(&self, role_id: RoleId) -> AppResult<u64>;

    async fn direct_permissions(&self, user_id: UserId) -> AppResult<BTreeSet<PermissionKind>>;

    /// 幂等
    async fn give_permission(&self, user_id: UserId, permission: PermissionKind) -> AppResult<()>;

    async fn revoke_permission(&self, user_id: UserId, permission: PermissionKind) -> AppResult<bool>;
}
