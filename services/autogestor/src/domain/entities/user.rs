//! 用户实体

use ag_common::AuditInfo;
use ag_domain_core::{AggregateRoot, Entity};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::value_objects::{HashedPassword, UserId};

/// 用户创建/更新数据
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct UserData {
    pub name: String,
    pub email: String,
    /// 更新时为空表示不修改
    pub password: Option<String>,
    /// 创建时直接分配的角色；为空时由默认角色策略决定
    pub roles: Vec<String>,
}

/// 用户
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct User {
    pub id: UserId,
    pub name: String,
    /// 统一小写存储
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: HashedPassword,
    pub email_verified_at: Option<DateTime<Utc>>,
    pub audit_info: AuditInfo,
}

/// 用户展示视图（不含密码哈希，可缓存）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserView {
    pub id: UserId,
    pub name: String,
    pub email: String,
    pub email_verified_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub roles: Vec<String>,
}

impl UserView {
    pub fn new(user: &User, roles: Vec<String>) -> Self {
        Self {
            id: user.id,
            name: user.name.clone(),
            email: user.email.clone(),
            email_verified_at: user.email_verified_at,
            created_at: user.audit_info.created_at,
            updated_at: user.audit_info.updated_at,
            roles,
        }
    }
}

impl User {
    pub fn new(
        name: &str,
        email: &str,
        password_hash: HashedPassword,
        actor: Option<UserId>,
    ) -> Self {
        Self {
            id: UserId::new(),
            name: name.trim().to_string(),
            email: normalize_email(email),
            password_hash,
            email_verified_at: None,
            audit_info: AuditInfo::new(actor),
        }
    }

    pub fn rename(&mut self, name: &str, email: &str, actor: Option<UserId>) {
        self.name = name.trim().to_string();
        self.email = normalize_email(email);
        self.audit_info.update(actor);
    }

    pub fn set_password(&mut self, password_hash: HashedPassword, actor: Option<UserId>) {
        self.password_hash = password_hash;
        self.audit_info.update(actor);
    }

    pub fn set_verified(&mut self, verified: bool, actor: Option<UserId>) {
        self.email_verified_at = match (verified, self.email_verified_at) {
            (true, Some(at)) => Some(at),
            (true, None) => Some(Utc::now()),
            (false, _) => None,
        };
        self.audit_info.update(actor);
    }

    pub fn is_verified(&self) -> bool {
        self.email_verified_at.is_some()
    }
}

pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

impl Entity for User {
    type Id = UserId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

impl AggregateRoot for User {
    fn audit_info(&self) -> &AuditInfo {
        &self.audit_info
    }

    fn audit_info_mut(&mut self) -> &mut AuditInfo {
        &mut self.audit_info
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_email_is_lowercased() {
        let user = User::new(" Ana ", " Ana.Admin@Example.COM ", HashedPassword::from_hash("x"), None);
        assert_eq!(user.name, "Ana");
        assert_eq!(user.email, "ana.admin@example.com");
    }

    #[test]
    fn test_password_hash_not_serialized() {
        let user = User::new("Ana", "ana@example.com", HashedPassword::from_hash("$argon2id$secret"), None);
        let json = serde_json::to_string(&user).unwrap();
        assert!(!json.contains("argon2"));
    }

    #[test]
    fn test_verification_keeps_original_timestamp() {
        let mut user = User::new("Ana", "ana@example.com", HashedPassword::from_hash("x"), None);
        user.set_verified(true, None);
        let first = user.email_verified_at;
        user.set_verified(true, None);
        assert_eq!(user.email_verified_at, first);
        user.set_verified(false, None);
        assert!(!user.is_verified());
    }
}
