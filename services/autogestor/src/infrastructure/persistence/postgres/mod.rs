//! PostgreSQL 仓储实现

mod brand;
mod category;
mod product;
mod role;
mod rows;
mod user;

use ag_adapter_postgres::Migration;
use ag_errors::AppError;

pub use brand::PostgresBrandRepository;
pub use category::PostgresCategoryRepository;
pub use product::PostgresProductRepository;
pub use role::PostgresRoleRepository;
pub use user::PostgresUserRepository;

/// 内嵌的迁移脚本，按版本号执行
pub fn migrations() -> Vec<Migration> {
    vec![
        Migration::new(
            1,
            "create_users",
            include_str!("../../../../migrations/0001_create_users.sql"),
        ),
        Migration::new(
            2,
            "create_catalog",
            include_str!("../../../../migrations/0002_create_catalog.sql"),
        ),
        Migration::new(
            3,
            "create_permissions",
            include_str!("../../../../migrations/0003_create_permissions.sql"),
        ),
    ]
}

/// 唯一约束与外键冲突映射为 Conflict，其余为 Database
fn db_error(context: &str, err: sqlx::Error) -> AppError {
    if let sqlx::Error::Database(db) = &err {
        if db.is_unique_violation() || db.is_foreign_key_violation() {
            return AppError::conflict(format!("{}: {}", context, db.message()));
        }
    }
    AppError::database(format!("{}: {}", context, err))
}

/// LIKE 子串模式
fn like_pattern(term: &str) -> String {
    format!("%{}%", ag_common::escape_like(term))
}
