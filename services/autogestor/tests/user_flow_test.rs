//! 用户、角色与运维命令流程测试

mod common;

use std::sync::Arc;
use std::time::Duration;

use ag_common::{PagedResult, Pagination};
use ag_config::CatalogConfig;
use ag_errors::{AppError, AppResult};
use ag_ports::CachePort;
use async_trait::async_trait;
use autogestor::application::RoleData;
use autogestor::cli::{self, Command};
use autogestor::container::{Container, Repositories};
use autogestor::domain::entities::User;
use autogestor::domain::rbac::{ADMIN_ROLE, PermissionKind, USER_ROLE};
use autogestor::domain::repositories::{UserFilter, UserRepository, UserStats};
use autogestor::domain::value_objects::UserId;
use autogestor::infrastructure::cache::MemoryCache;
use autogestor::infrastructure::persistence::InMemoryStore;
use common::{PASSWORD, container, create_user};
use mockall::mock;
use secrecy::ExposeSecret;

#[tokio::test]
async fn test_default_role_follows_email() {
    let c = container().await;
    let admin = create_user(&c, "Boss", "Boss.Admin@Example.com").await;
    let staff = create_user(&c, "Ana", "ana@example.com").await;

    assert_eq!(admin.email, "boss.admin@example.com");
    assert_eq!(c.users.role_names(admin.id).await.unwrap(), vec![ADMIN_ROLE]);
    assert_eq!(c.users.role_names(staff.id).await.unwrap(), vec![USER_ROLE]);

    assert!(c.authorization.has_role(admin.id, ADMIN_ROLE).await.unwrap());
    assert!(c.authorization.can(admin.id, PermissionKind::UsersView).await.unwrap());
    assert!(!c.authorization.can(admin.id, PermissionKind::ProductsView).await.unwrap());
    assert!(c.authorization.can(staff.id, PermissionKind::ProductsView).await.unwrap());
    assert!(!c.authorization.can(staff.id, PermissionKind::UsersView).await.unwrap());
}

#[tokio::test]
async fn test_duplicate_email_is_rejected() {
    let c = container().await;
    create_user(&c, "Ana", "ana@example.com").await;

    let err = c
        .users
        .create(
            autogestor::domain::entities::UserData {
                name: "Other Ana".to_string(),
                email: "ANA@example.com".to_string(),
                password: Some(PASSWORD.to_string()),
                roles: Vec::new(),
            },
            None,
        )
        .await
        .unwrap_err();
    assert!(err.field_errors().is_some_and(|errors| errors.has("email")));
}

#[tokio::test]
async fn test_direct_permission_takes_effect_immediately() {
    let c = container().await;
    let staff = create_user(&c, "Ana", "ana@example.com").await;
    assert!(!c.authorization.can(staff.id, PermissionKind::UsersView).await.unwrap());

    c.roles
        .give_permission_to(staff.id, PermissionKind::UsersView, None)
        .await
        .unwrap();
    assert!(c.authorization.can(staff.id, PermissionKind::UsersView).await.unwrap());

    c.roles
        .revoke_permission_from(staff.id, PermissionKind::UsersView, None)
        .await
        .unwrap();
    assert!(!c.authorization.can(staff.id, PermissionKind::UsersView).await.unwrap());
}

#[tokio::test]
async fn test_users_cannot_delete_themselves() {
    let c = container().await;
    let admin = create_user(&c, "Boss", "boss.admin@example.com").await;
    let staff = create_user(&c, "Ana", "ana@example.com").await;

    let err = c.users.delete(admin.id, Some(admin.id)).await.unwrap_err();
    assert!(matches!(err, AppError::BusinessRule(_)));

    c.users.delete(staff.id, Some(admin.id)).await.unwrap();
    assert!(c.users.find(staff.id).await.unwrap().is_none());
}

#[tokio::test]
async fn test_change_password_checks_current_password() {
    let c = container().await;
    let user = create_user(&c, "Ana", "ana@example.com").await;

    let err = c
        .users
        .change_password(user.id, "wrong-password", "another-secret")
        .await
        .unwrap_err();
    assert!(err.field_errors().is_some_and(|errors| errors.has("current_password")));

    let err = c
        .users
        .change_password(user.id, PASSWORD, "short")
        .await
        .unwrap_err();
    assert!(err.field_errors().is_some_and(|errors| errors.has("password")));

    c.users
        .change_password(user.id, PASSWORD, "another-secret")
        .await
        .unwrap();
    let user = c.users.get(user.id).await.unwrap();
    assert!(user.password_hash.verify("another-secret").unwrap());
    assert!(!user.password_hash.verify(PASSWORD).unwrap());
}

#[tokio::test]
async fn test_reset_password_returns_new_secret_once() {
    let c = container().await;
    let user = create_user(&c, "Ana", "ana@example.com").await;

    let password = c.users.reset_password(user.id, None).await.unwrap();
    let user = c.users.get(user.id).await.unwrap();
    assert!(user.password_hash.verify(password.expose_secret()).unwrap());
    assert!(!user.password_hash.verify(PASSWORD).unwrap());
}

#[tokio::test]
async fn test_protected_roles_cannot_be_deleted() {
    let c = container().await;
    let admin = c.roles.find_by_name(ADMIN_ROLE).await.unwrap().unwrap();
    let err = c.roles.delete(admin.id, None).await.unwrap_err();
    assert!(matches!(err, AppError::BusinessRule(_)));

    let auditor = c
        .roles
        .create(
            RoleData {
                name: "auditor".to_string(),
                permissions: [PermissionKind::ProductsView].into_iter().collect(),
            },
            None,
        )
        .await
        .unwrap();
    c.roles.delete(auditor.id, None).await.unwrap();
    assert!(c.roles.find_by_name("auditor").await.unwrap().is_none());
}

#[tokio::test]
async fn test_seeding_twice_changes_nothing() {
    let c = container().await;
    let report = c.maintenance.seed_roles().await.unwrap();
    assert!(report.created.is_empty());
    assert!(report.updated.is_empty());
}

// ========== 运维命令 ==========

async fn run(c: &autogestor::container::Container, command: Command) -> (u8, String) {
    let mut out = Vec::new();
    let code = cli::run(&command, &c.maintenance, &mut out).await.unwrap();
    (code, String::from_utf8(out).unwrap())
}

#[tokio::test]
async fn test_assign_roles_command() {
    let c = container().await;
    let staff = create_user(&c, "Ana", "ana@example.com").await;
    let admin = create_user(&c, "Boss", "boss.admin@example.com").await;
    create_user(&c, "Kept", "kept@example.com").await;
    c.users.remove_role(staff.id, USER_ROLE, None).await.unwrap();
    c.users.remove_role(admin.id, ADMIN_ROLE, None).await.unwrap();
    assert_eq!(c.users.without_roles().await.unwrap().len(), 2);

    let (code, output) = run(
        &c,
        Command::AssignRoles {
            role: USER_ROLE.to_string(),
        },
    )
    .await;
    assert_eq!(code, 0);
    let lines: Vec<&str> = output.lines().collect();
    assert_eq!(
        lines,
        vec![
            "Assigned role 'user' to Ana <ana@example.com>",
            "Assigned role 'admin' to Boss <boss.admin@example.com>",
            "2 user(s) updated.",
        ]
    );
    assert_eq!(c.users.role_names(admin.id).await.unwrap(), vec![ADMIN_ROLE]);
    assert!(c.users.without_roles().await.unwrap().is_empty());

    let (code, output) = run(
        &c,
        Command::AssignRoles {
            role: USER_ROLE.to_string(),
        },
    )
    .await;
    assert_eq!(code, 0);
    assert_eq!(output.trim(), "All users already have a role.");
}

#[tokio::test]
async fn test_assign_roles_with_unknown_role_fails() {
    let c = container().await;
    let staff = create_user(&c, "Ana", "ana@example.com").await;
    c.users.remove_role(staff.id, USER_ROLE, None).await.unwrap();

    let (code, output) = run(
        &c,
        Command::AssignRoles {
            role: "ghost".to_string(),
        },
    )
    .await;
    assert_eq!(code, 1);
    assert!(output.contains("Role 'ghost' does not exist"));
    assert_eq!(c.users.without_roles().await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_cache_commands() {
    let c = container().await;

    let (code, output) = run(&c, Command::ClearPermissionCache).await;
    assert_eq!(code, 0);
    assert_eq!(output.trim(), "Permission cache cleared.");

    let (code, output) = run(&c, Command::ClearCatalogCache).await;
    assert_eq!(code, 0);
    assert_eq!(output.trim(), "Catalog cache cleared.");

    let (code, output) = run(&c, Command::SeedRoles).await;
    assert_eq!(code, 0);
    assert_eq!(output.trim(), "Default roles are up to date.");
}

mock! {
    Cache {}

    #[async_trait]
    impl CachePort for Cache {
        async fn get(&self, key: &str) -> AppResult<Option<String>>;
        async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> AppResult<()>;
        async fn delete(&self, key: &str) -> AppResult<()>;
        async fn exists(&self, key: &str) -> AppResult<bool>;
        async fn expire(&self, key: &str, ttl: Duration) -> AppResult<()>;
        async fn incr(&self, key: &str) -> AppResult<i64>;
    }
}

#[tokio::test]
async fn test_clear_permission_cache_reports_cache_failure() {
    let mut cache = MockCache::new();
    cache
        .expect_incr()
        .times(1)
        .returning(|_| Err(AppError::external_service("redis unreachable")));
    let c = Container::assemble(
        Repositories::in_memory(InMemoryStore::new()),
        Arc::new(cache),
        &CatalogConfig::default(),
    );

    let (code, output) = run(&c, Command::ClearPermissionCache).await;
    assert_eq!(code, 1);
    assert!(output.starts_with("Failed to clear permission cache:"));
    assert!(output.contains("redis unreachable"));
}

/// 指定用户的读取总是失败，其余委托给内存仓储
struct UnreadableUser {
    inner: Arc<dyn UserRepository>,
    broken: UserId,
}

#[async_trait]
impl UserRepository for UnreadableUser {
    async fn list(&self, filter: &UserFilter, pagination: Pagination) -> AppResult<PagedResult<User>> {
        self.inner.list(filter, pagination).await
    }

    async fn find_by_id(&self, id: UserId) -> AppResult<Option<User>> {
        if id == self.broken {
            return Err(AppError::database("connection reset"));
        }
        self.inner.find_by_id(id).await
    }

    async fn find_by_email(&self, email: &str) -> AppResult<Option<User>> {
        self.inner.find_by_email(email).await
    }

    async fn insert(&self, user: &User) -> AppResult<()> {
        self.inner.insert(user).await
    }

    async fn update(&self, user: &User) -> AppResult<()> {
        self.inner.update(user).await
    }

    async fn delete(&self, id: UserId) -> AppResult<bool> {
        self.inner.delete(id).await
    }

    async fn without_roles(&self) -> AppResult<Vec<User>> {
        self.inner.without_roles().await
    }

    async fn stats(&self) -> AppResult<UserStats> {
        self.inner.stats().await
    }

    async fn recent(&self, limit: usize) -> AppResult<Vec<User>> {
        self.inner.recent(limit).await
    }
}

#[tokio::test]
async fn test_assign_roles_continues_past_failing_user() {
    let repositories = Repositories::in_memory(InMemoryStore::new());
    let catalog = CatalogConfig::default();
    let c = Container::assemble(repositories.clone(), Arc::new(MemoryCache::new()), &catalog);
    c.maintenance.seed_roles().await.unwrap();
    let staff = create_user(&c, "Ana", "ana@example.com").await;
    let admin = create_user(&c, "Boss", "boss.admin@example.com").await;
    c.users.remove_role(staff.id, USER_ROLE, None).await.unwrap();
    c.users.remove_role(admin.id, ADMIN_ROLE, None).await.unwrap();

    let flaky = Repositories {
        users: Arc::new(UnreadableUser {
            inner: repositories.users.clone(),
            broken: staff.id,
        }),
        ..repositories
    };
    let c = Container::assemble(flaky, Arc::new(MemoryCache::new()), &catalog);

    let (code, output) = run(
        &c,
        Command::AssignRoles {
            role: USER_ROLE.to_string(),
        },
    )
    .await;
    assert_eq!(code, 1);
    let lines: Vec<&str> = output.lines().collect();
    assert_eq!(
        lines,
        vec![
            "Assigned role 'admin' to Boss <boss.admin@example.com>",
            "Failed to assign a role to Ana <ana@example.com>: Database error: connection reset",
            "1 user(s) updated.",
        ]
    );
    assert_eq!(c.users.role_names(admin.id).await.unwrap(), vec![ADMIN_ROLE]);
    assert_eq!(c.users.without_roles().await.unwrap().len(), 1);
}
