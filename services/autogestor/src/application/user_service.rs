//! 用户服务

use std::sync::Arc;

use ag_common::{PagedResult, Pagination};
use ag_errors::{AppError, AppResult, FieldErrors};
use email_address::EmailAddress;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::info;

use super::EventSink;
use super::authorization::{PermissionCache, PermissionCacheScope};
use super::cache::{ListingCachePolicy, ServiceCache, keys};
use super::reports::BulkReport;
use super::validation::{self, MAX_NAME_LEN};
use crate::domain::entities::{User, UserData, UserView, normalize_email};
use crate::domain::events::{ChangeKind, EntityChanged, EntityKind, FieldChange, diff};
use crate::domain::rbac::{Role, normalize_role_name};
use crate::domain::repositories::{RoleRepository, UserFilter, UserRepository, UserStats};
use crate::domain::value_objects::password::{MIN_PASSWORD_LEN, generate_password};
use crate::domain::value_objects::{HashedPassword, UserId};

/// 批量更新的字段
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct UserBulkUpdate {
    /// 标记或取消邮箱验证
    pub verified: Option<bool>,
    /// 追加的角色
    pub role: Option<String>,
}

impl UserBulkUpdate {
    pub fn is_empty(&self) -> bool {
        self.verified.is_none() && self.role.as_deref().is_none_or(|r| r.trim().is_empty())
    }
}

pub struct UserService {
    users: Arc<dyn UserRepository>,
    roles: Arc<dyn RoleRepository>,
    permissions: PermissionCache,
    cache: ServiceCache,
    policy: ListingCachePolicy,
    events: EventSink,
}

impl UserService {
    pub fn new(
        users: Arc<dyn UserRepository>,
        roles: Arc<dyn RoleRepository>,
        permissions: PermissionCache,
        cache: ServiceCache,
        policy: ListingCachePolicy,
        events: EventSink,
    ) -> Self {
        Self {
            users,
            roles,
            permissions,
            cache,
            policy,
            events,
        }
    }

    // ========== 查询 ==========

    pub async fn list(&self, filter: &UserFilter, pagination: Pagination) -> AppResult<PagedResult<UserView>> {
        if filter.is_default() && self.policy.is_cacheable(&pagination) {
            let key = self.policy.listing_key(EntityKind::User, &pagination);
            return self
                .cache
                .remember(&key, || self.load_page(filter, pagination))
                .await;
        }
        self.load_page(filter, pagination).await
    }

    async fn load_page(&self, filter: &UserFilter, pagination: Pagination) -> AppResult<PagedResult<UserView>> {
        let page = self.users.list(filter, pagination).await?;
        let mut views = Vec::with_capacity(page.items.len());
        for user in &page.items {
            views.push(UserView::new(user, self.role_names(user.id).await?));
        }
        Ok(PagedResult::new(views, page.total, &pagination))
    }

    pub async fn find(&self, id: UserId) -> AppResult<Option<User>> {
        self.users.find_by_id(id).await
    }

    pub async fn get(&self, id: UserId) -> AppResult<User> {
        self.users
            .find_by_id(id)
            .await?
            .ok_or_else(|| AppError::not_found(format!("User {} not found", id)))
    }

    pub async fn view(&self, id: UserId) -> AppResult<UserView> {
        let user = self.get(id).await?;
        Ok(UserView::new(&user, self.role_names(id).await?))
    }

    pub async fn find_by_email(&self, email: &str) -> AppResult<Option<User>> {
        self.users.find_by_email(&normalize_email(email)).await
    }

    pub async fn role_names(&self, id: UserId) -> AppResult<Vec<String>> {
        Ok(self
            .roles
            .roles_for_user(id)
            .await?
            .into_iter()
            .map(|r| r.name)
            .collect())
    }

    pub async fn stats(&self) -> AppResult<UserStats> {
        self.cache
            .remember(keys::USERS_STATS, || self.users.stats())
            .await
    }

    pub async fn recent(&self, limit: usize) -> AppResult<Vec<User>> {
        self.users.recent(limit).await
    }

    pub async fn without_roles(&self) -> AppResult<Vec<User>> {
        self.users.without_roles().await
    }

    // ========== 校验 ==========

    /// `ignore` 为更新时的自身 id；创建时密码必填
    pub async fn validate_user_data(&self, data: &UserData, ignore: Option<UserId>) -> AppResult<FieldErrors> {
        let mut errors = FieldErrors::new();

        if validation::required(&mut errors, "name", &data.name) {
            validation::max_len(&mut errors, "name", &data.name, MAX_NAME_LEN);
        }

        if validation::required(&mut errors, "email", &data.email) {
            let email = normalize_email(&data.email);
            if !EmailAddress::is_valid(&email) {
                errors.add("email", "The email must be a valid email address.");
            } else {
                validation::max_len(&mut errors, "email", &email, MAX_NAME_LEN);
                let existing = self.users.find_by_email(&email).await?;
                if existing.is_some_and(|u| Some(u.id) != ignore) {
                    validation::taken(&mut errors, "email");
                }
            }
        }

        match data.password.as_deref() {
            None | Some("") if ignore.is_none() => {
                errors.add("password", "The password field is required.");
            }
            Some(password) if !password.is_empty() && password.chars().count() < MIN_PASSWORD_LEN => {
                errors.add(
                    "password",
                    format!("The password must be at least {} characters.", MIN_PASSWORD_LEN),
                );
            }
            _ => {}
        }

        for role in &data.roles {
            if self.roles.find_by_name(&normalize_role_name(role)).await?.is_none() {
                errors.add("roles", format!("The role '{}' does not exist.", role.trim()));
            }
        }

        Ok(errors)
    }

    // ========== 写操作 ==========

    /// 创建用户；未指定角色时由默认角色处理方分配
    pub async fn create(&self, data: UserData, actor: Option<UserId>) -> AppResult<User> {
        info!(email = %normalize_email(&data.email), "Creating user");
        self.validate_user_data(&data, None).await?.into_result()?;

        let password_hash = HashedPassword::from_plain(data.password.as_deref().unwrap_or_default())?;
        let user = User::new(&data.name, &data.email, password_hash, actor);
        self.users.insert(&user).await?;

        for role_name in &data.roles {
            let role = self.require_role(role_name).await?;
            self.roles.assign_role(user.id, role.id).await?;
        }

        info!(user_id = %user.id, roles = ?data.roles, "User created");
        self.publish(&user, ChangeKind::Created, Vec::new(), actor).await;
        Ok(user)
    }

    /// 更新用户；密码为空时不修改，角色非空时同步为给定集合
    pub async fn update(&self, id: UserId, data: UserData, actor: Option<UserId>) -> AppResult<User> {
        let mut user = self.get(id).await?;
        self.validate_user_data(&data, Some(id)).await?.into_result()?;

        let before = user.clone();
        user.rename(&data.name, &data.email, actor);
        let mut changes = diff(&before, &user);

        if let Some(password) = data.password.as_deref().filter(|p| !p.is_empty()) {
            user.set_password(HashedPassword::from_plain(password)?, actor);
            changes.push(redacted_change("password"));
        }
        self.users.update(&user).await?;

        if !data.roles.is_empty() {
            let old_roles = self.role_names(id).await?;
            let new_roles = self.sync_roles(id, &data.roles).await?;
            if old_roles != new_roles {
                changes.push(FieldChange {
                    field: "roles".to_string(),
                    old: Value::from(old_roles),
                    new: Value::from(new_roles),
                });
            }
        }

        info!(user_id = %id, "User updated");
        self.publish(&user, ChangeKind::Updated, changes, actor).await;
        Ok(user)
    }

    /// 删除用户，不能删除自己
    pub async fn delete(&self, id: UserId, actor: Option<UserId>) -> AppResult<()> {
        if actor == Some(id) {
            return Err(AppError::business_rule("You cannot delete your own account."));
        }
        let user = self.get(id).await?;

        self.users.delete(id).await?;
        self.permissions
            .invalidate_quietly(PermissionCacheScope::User(id))
            .await;

        info!(user_id = %id, "User deleted");
        self.publish(&user, ChangeKind::Deleted, Vec::new(), actor).await;
        Ok(())
    }

    /// 按名称分配角色，角色必须存在
    pub async fn assign_role(&self, id: UserId, role_name: &str, actor: Option<UserId>) -> AppResult<()> {
        let user = self.get(id).await?;
        let role = self.require_role(role_name).await?;

        let before = self.role_names(id).await?;
        self.roles.assign_role(id, role.id).await?;
        self.permissions
            .invalidate_quietly(PermissionCacheScope::User(id))
            .await;

        info!(user_id = %id, role = %role.name, "Role assigned");
        self.publish_roles_changed(&user, before, actor).await
    }

    pub async fn remove_role(&self, id: UserId, role_name: &str, actor: Option<UserId>) -> AppResult<()> {
        let user = self.get(id).await?;
        let role = self.require_role(role_name).await?;

        let before = self.role_names(id).await?;
        self.roles.remove_role(id, role.id).await?;
        self.permissions
            .invalidate_quietly(PermissionCacheScope::User(id))
            .await;

        info!(user_id = %id, role = %role.name, "Role removed");
        self.publish_roles_changed(&user, before, actor).await
    }

    /// 校验当前密码后修改
    pub async fn change_password(
        &self,
        id: UserId,
        current_password: &str,
        new_password: &str,
    ) -> AppResult<()> {
        let mut user = self.get(id).await?;

        let mut errors = FieldErrors::new();
        if !user.password_hash.verify(current_password)? {
            errors.add(
                "current_password",
                "The provided password does not match your current password.",
            );
        }
        if new_password.chars().count() < MIN_PASSWORD_LEN {
            errors.add(
                "password",
                format!("The password must be at least {} characters.", MIN_PASSWORD_LEN),
            );
        }
        errors.into_result()?;

        user.set_password(HashedPassword::from_plain(new_password)?, Some(id));
        self.users.update(&user).await?;

        info!(user_id = %id, "Password changed");
        self.publish(&user, ChangeKind::Updated, vec![redacted_change("password")], Some(id))
            .await;
        Ok(())
    }

    /// 重置为随机密码，明文只通过返回值交出一次
    pub async fn reset_password(&self, id: UserId, actor: Option<UserId>) -> AppResult<SecretString> {
        let mut user = self.get(id).await?;

        let password = generate_password();
        user.set_password(HashedPassword::from_plain(password.expose_secret())?, actor);
        self.users.update(&user).await?;

        info!(user_id = %id, "Password reset");
        self.publish(&user, ChangeKind::Updated, vec![redacted_change("password")], actor)
            .await;
        Ok(password)
    }

    /// 批量更新，逐个处理
    pub async fn bulk_update(
        &self,
        ids: &[UserId],
        changes: &UserBulkUpdate,
        actor: Option<UserId>,
    ) -> AppResult<BulkReport> {
        if changes.is_empty() {
            return Err(AppError::validation("No fields to update"));
        }
        let role = match changes.role.as_deref().filter(|r| !r.trim().is_empty()) {
            Some(name) => Some(self.require_role(name).await?),
            None => None,
        };

        let mut report = BulkReport::default();
        for &id in ids {
            match self.apply_bulk(id, changes.verified, role.as_ref(), actor).await {
                Ok(()) => report.succeeded(),
                Err(e) => report.failed(id.0, e.to_string()),
            }
        }

        info!(
            requested = ids.len(),
            affected = report.affected,
            failed = report.failures.len(),
            "Bulk user update finished"
        );
        Ok(report)
    }

    async fn apply_bulk(
        &self,
        id: UserId,
        verified: Option<bool>,
        role: Option<&Role>,
        actor: Option<UserId>,
    ) -> AppResult<()> {
        let mut user = self.get(id).await?;
        let before = user.clone();

        if let Some(verified) = verified {
            user.set_verified(verified, actor);
            self.users.update(&user).await?;
        }
        let mut changes = diff(&before, &user);

        if let Some(role) = role {
            let old_roles = self.role_names(id).await?;
            self.roles.assign_role(id, role.id).await?;
            self.permissions
                .invalidate_quietly(PermissionCacheScope::User(id))
                .await;
            let new_roles = self.role_names(id).await?;
            if old_roles != new_roles {
                changes.push(FieldChange {
                    field: "roles".to_string(),
                    old: Value::from(old_roles),
                    new: Value::from(new_roles),
                });
            }
        }

        self.publish(&user, ChangeKind::Updated, changes, actor).await;
        Ok(())
    }

    async fn require_role(&self, name: &str) -> AppResult<Role> {
        let name = normalize_role_name(name);
        self.roles
            .find_by_name(&name)
            .await?
            .ok_or_else(|| AppError::not_found(format!("Role '{}' does not exist", name)))
    }

    /// 把用户的角色同步为给定集合，返回同步后的角色名
    async fn sync_roles(&self, id: UserId, names: &[String]) -> AppResult<Vec<String>> {
        let mut wanted = Vec::with_capacity(names.len());
        for name in names {
            wanted.push(self.require_role(name).await?);
        }

        for current in self.roles.roles_for_user(id).await? {
            if !wanted.iter().any(|r| r.id == current.id) {
                self.roles.remove_role(id, current.id).await?;
            }
        }
        for role in &wanted {
            self.roles.assign_role(id, role.id).await?;
        }
        self.permissions
            .invalidate_quietly(PermissionCacheScope::User(id))
            .await;

        self.role_names(id).await
    }

    async fn publish_roles_changed(&self, user: &User, before: Vec<String>, actor: Option<UserId>) -> AppResult<()> {
        let after = self.role_names(user.id).await?;
        if before != after {
            let change = FieldChange {
                field: "roles".to_string(),
                old: Value::from(before),
                new: Value::from(after),
            };
            self.publish(user, ChangeKind::Updated, vec![change], actor).await;
        }
        Ok(())
    }

    async fn publish(&self, user: &User, kind: ChangeKind, changes: Vec<FieldChange>, actor: Option<UserId>) {
        let event = EntityChanged::new(EntityKind::User, kind, user.id.0, user.email.clone(), actor)
            .with_changes(changes);
        self.events.publish(event).await;
    }
}

/// 密码变更只记录字段名
fn redacted_change(field: &str) -> FieldChange {
    FieldChange {
        field: field.to_string(),
        old: Value::String("[REDACTED]".to_string()),
        new: Value::String("[REDACTED]".to_string()),
    }
}
