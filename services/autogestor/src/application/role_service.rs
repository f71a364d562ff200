//! 角色与权限管理

use std::collections::BTreeSet;
use std::sync::Arc;

use ag_errors::{AppError, AppResult, FieldErrors};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::info;

use super::EventSink;
use super::authorization::{PermissionCache, PermissionCacheScope};
use super::validation;
use crate::domain::events::{ChangeKind, EntityChanged, EntityKind, FieldChange, diff};
use crate::domain::rbac::{
    ADMIN_ROLE, PROTECTED_ROLES, PermissionKind, Role, USER_ROLE, default_permissions,
    normalize_role_name,
};
use crate::domain::repositories::{RoleRepository, UserRepository};
use crate::domain::value_objects::{RoleId, UserId};

const ROLE_NAME_MAX_LEN: usize = 125;

/// 角色写入数据
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RoleData {
    pub name: String,
    pub permissions: BTreeSet<PermissionKind>,
}

/// 角色及其用户数
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoleSummary {
    #[serde(flatten)]
    pub role: Role,
    pub users_count: u64,
}

/// 默认角色初始化结果
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SeedReport {
    pub created: Vec<String>,
    pub updated: Vec<String>,
}

pub struct RoleService {
    roles: Arc<dyn RoleRepository>,
    users: Arc<dyn UserRepository>,
    permissions: PermissionCache,
    events: EventSink,
}

impl RoleService {
    pub fn new(
        roles: Arc<dyn RoleRepository>,
        users: Arc<dyn UserRepository>,
        permissions: PermissionCache,
        events: EventSink,
    ) -> Self {
        Self {
            roles,
            users,
            permissions,
            events,
        }
    }

    pub fn permission_cache(&self) -> &PermissionCache {
        &self.permissions
    }

    pub async fn list(&self) -> AppResult<Vec<RoleSummary>> {
        let roles = self.roles.list().await?;
        let mut summaries = Vec::with_capacity(roles.len());
        for role in roles {
            let users_count = self.roles.count_users_with_role(role.id).await?;
            summaries.push(RoleSummary { role, users_count });
        }
        Ok(summaries)
    }

    pub async fn get(&self, id: RoleId) -> AppResult<Role> {
        self.roles
            .find_by_id(id)
            .await?
            .ok_or_else(|| AppError::not_found(format!("Role {} not found", id)))
    }

    pub async fn find_by_name(&self, name: &str) -> AppResult<Option<Role>> {
        self.roles.find_by_name(&normalize_role_name(name)).await
    }

    /// 全部可用权限
    pub fn permissions(&self) -> &'static [PermissionKind] {
        PermissionKind::ALL
    }

    pub async fn validate_role_data(&self, data: &RoleData, ignore: Option<RoleId>) -> AppResult<FieldErrors> {
        let mut errors = FieldErrors::new();
        if validation::required(&mut errors, "name", &data.name) {
            validation::max_len(&mut errors, "name", &data.name, ROLE_NAME_MAX_LEN);
            let existing = self.roles.find_by_name(&normalize_role_name(&data.name)).await?;
            if existing.is_some_and(|r| Some(r.id) != ignore) {
                validation::taken(&mut errors, "name");
            }
        }
        Ok(errors)
    }

    pub async fn create(&self, data: RoleData, actor: Option<UserId>) -> AppResult<Role> {
        self.validate_role_data(&data, None).await?.into_result()?;

        let role = Role::new(&data.name, data.permissions, actor);
        self.roles.insert(&role).await?;

        info!(role = %role.name, permissions = role.permissions.len(), "Role created");
        self.publish(&role, ChangeKind::Created, Vec::new(), actor).await;
        Ok(role)
    }

    /// 更新名称并同步权限；受保护角色不能改名
    pub async fn update(&self, id: RoleId, data: RoleData, actor: Option<UserId>) -> AppResult<Role> {
        let mut role = self.get(id).await?;
        self.validate_role_data(&data, Some(id)).await?.into_result()?;

        let name = normalize_role_name(&data.name);
        if role.is_protected() && name != role.name {
            return Err(AppError::business_rule(format!(
                "The '{}' role cannot be renamed.",
                role.name
            )));
        }

        let before = role.clone();
        role.name = name;
        role.sync_permissions(data.permissions, actor);
        role.audit_info.update(actor);
        self.roles.update(&role).await?;
        self.permissions
            .invalidate_quietly(PermissionCacheScope::All)
            .await;

        info!(role = %role.name, "Role updated");
        self.publish(&role, ChangeKind::Updated, diff(&before, &role), actor)
            .await;
        Ok(role)
    }

    /// 删除角色；默认角色受保护
    pub async fn delete(&self, id: RoleId, actor: Option<UserId>) -> AppResult<()> {
        let role = self.get(id).await?;
        if role.is_protected() {
            return Err(AppError::business_rule(format!(
                "The '{}' role is protected and cannot be deleted.",
                role.name
            )));
        }

        self.roles.delete(id).await?;
        self.permissions
            .invalidate_quietly(PermissionCacheScope::All)
            .await;

        info!(role = %role.name, "Role deleted");
        self.publish(&role, ChangeKind::Deleted, Vec::new(), actor).await;
        Ok(())
    }

    /// 授予用户直接权限
    pub async fn give_permission_to(
        &self,
        user_id: UserId,
        permission: PermissionKind,
        actor: Option<UserId>,
    ) -> AppResult<()> {
        let before = self.direct_permissions(user_id).await?;
        self.roles.give_permission(user_id, permission).await?;
        self.permissions
            .invalidate_quietly(PermissionCacheScope::User(user_id))
            .await;

        info!(user_id = %user_id, permission = %permission, "Permission granted");
        self.publish_user_permissions(user_id, before, actor).await
    }

    pub async fn revoke_permission_from(
        &self,
        user_id: UserId,
        permission: PermissionKind,
        actor: Option<UserId>,
    ) -> AppResult<()> {
        let before = self.direct_permissions(user_id).await?;
        self.roles.revoke_permission(user_id, permission).await?;
        self.permissions
            .invalidate_quietly(PermissionCacheScope::User(user_id))
            .await;

        info!(user_id = %user_id, permission = %permission, "Permission revoked");
        self.publish_user_permissions(user_id, before, actor).await
    }

    pub async fn direct_permissions(&self, user_id: UserId) -> AppResult<BTreeSet<PermissionKind>> {
        if self.users.find_by_id(user_id).await?.is_none() {
            return Err(AppError::not_found(format!("User {} not found", user_id)));
        }
        self.roles.direct_permissions(user_id).await
    }

    /// 按名称分配角色，角色必须存在
    pub async fn assign_role_to(&self, user_id: UserId, role_name: &str) -> AppResult<Role> {
        let name = normalize_role_name(role_name);
        let role = self
            .roles
            .find_by_name(&name)
            .await?
            .ok_or_else(|| AppError::not_found(format!("Role '{}' does not exist", name)))?;

        self.roles.assign_role(user_id, role.id).await?;
        self.permissions
            .invalidate_quietly(PermissionCacheScope::User(user_id))
            .await;
        Ok(role)
    }

    /// 查找角色，不存在时创建一个不带权限的角色
    pub async fn ensure_role(&self, name: &str) -> AppResult<Role> {
        let name = normalize_role_name(name);
        if let Some(role) = self.roles.find_by_name(&name).await? {
            return Ok(role);
        }

        let role = Role::bare(&name);
        self.roles.insert(&role).await?;
        info!(role = %role.name, "Role created on demand");
        self.publish(&role, ChangeKind::Created, Vec::new(), None).await;
        Ok(role)
    }

    /// 创建默认角色；已存在的角色补齐缺失的默认权限
    pub async fn seed_defaults(&self, actor: Option<UserId>) -> AppResult<SeedReport> {
        let mut report = SeedReport::default();

        for name in PROTECTED_ROLES {
            let defaults = default_permissions(name);
            match self.roles.find_by_name(name).await? {
                None => {
                    let role = Role::new(name, defaults, actor);
                    self.roles.insert(&role).await?;
                    self.publish(&role, ChangeKind::Created, Vec::new(), actor).await;
                    report.created.push(role.name);
                }
                Some(mut role) => {
                    let before = role.clone();
                    let merged = role.permissions.union(&defaults).copied().collect();
                    if role.sync_permissions(merged, actor) {
                        self.roles.update(&role).await?;
                        self.publish(&role, ChangeKind::Updated, diff(&before, &role), actor)
                            .await;
                        report.updated.push(role.name);
                    }
                }
            }
        }

        self.permissions
            .invalidate_quietly(PermissionCacheScope::All)
            .await;
        info!(created = ?report.created, updated = ?report.updated, "Default roles seeded");
        Ok(report)
    }

    async fn publish_user_permissions(
        &self,
        user_id: UserId,
        before: BTreeSet<PermissionKind>,
        actor: Option<UserId>,
    ) -> AppResult<()> {
        let after = self.roles.direct_permissions(user_id).await?;
        if before == after {
            return Ok(());
        }

        let names = |set: &BTreeSet<PermissionKind>| -> Value {
            set.iter().map(|p| Value::from(p.as_str())).collect()
        };
        let change = FieldChange {
            field: "permissions".to_string(),
            old: names(&before),
            new: names(&after),
        };
        let label = match self.users.find_by_id(user_id).await? {
            Some(user) => user.email,
            None => user_id.to_string(),
        };
        let event = EntityChanged::new(EntityKind::User, ChangeKind::Updated, user_id.0, label, actor)
            .with_changes(vec![change]);
        self.events.publish(event).await;
        Ok(())
    }

    async fn publish(&self, role: &Role, kind: ChangeKind, changes: Vec<FieldChange>, actor: Option<UserId>) {
        let event = EntityChanged::new(EntityKind::Role, kind, role.id.0, role.name.clone(), actor)
            .with_changes(changes);
        self.events.publish(event).await;
    }
}

/// 用户的默认角色名（包含 admin 的邮箱为管理员）
pub fn default_role_name(email: &str) -> &'static str {
    crate::domain::rbac::default_role_for_email(email, USER_ROLE)
}
