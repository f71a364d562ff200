use std::collections::{BTreeSet, HashMap};

use ag_errors::{AppError, AppResult};
use async_trait::async_trait;
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

use super::db_error;
use super::rows::{ROLE_COLUMNS, RoleRow, parse_permission};
use crate::domain::rbac::{PermissionKind, Role};
use crate::domain::repositories::RoleRepository;
use crate::domain::value_objects::{RoleId, UserId};

pub struct PostgresRoleRepository {
    pool: PgPool,
}

impl PostgresRoleRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// 为角色行批量加载权限
    async fn with_permissions(&self, rows: Vec<RoleRow>) -> AppResult<Vec<Role>> {
        if rows.is_empty() {
            return Ok(Vec::new());
        }

        let ids: Vec<Uuid> = rows.iter().map(|r| r.id).collect();
        let links: Vec<(Uuid, String)> = sqlx::query_as(
            "SELECT role_id, permission FROM role_permissions WHERE role_id = ANY($1)",
        )
        .bind(&ids)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| db_error("Failed to load role permissions", e))?;

        let mut by_role: HashMap<Uuid, BTreeSet<PermissionKind>> = HashMap::new();
        for (role_id, name) in links {
            if let Some(kind) = parse_permission(&name) {
                by_role.entry(role_id).or_default().insert(kind);
            }
        }

        Ok(rows
            .into_iter()
            .map(|row| {
                let permissions = by_role.remove(&row.id).unwrap_or_default();
                row.into_role(permissions)
            })
            .collect())
    }

    async fn hydrate(&self, row: Option<RoleRow>) -> AppResult<Option<Role>> {
        match row {
            Some(row) => Ok(self.with_permissions(vec![row]).await?.pop()),
            None => Ok(None),
        }
    }
}

async fn replace_permissions(
    tx: &mut Transaction<'_, Postgres>,
    role: &Role,
) -> AppResult<()> {
    sqlx::query("DELETE FROM role_permissions WHERE role_id = $1")
        .bind(role.id.0)
        .execute(&mut **tx)
        .await
        .map_err(|e| db_error("Failed to clear role permissions", e))?;

    let names: Vec<String> = role
        .permissions
        .iter()
        .map(|p| p.as_str().to_string())
        .collect();
    if names.is_empty() {
        return Ok(());
    }
    sqlx::query(
        "INSERT INTO role_permissions (role_id, permission) SELECT $1, UNNEST($2::varchar[])",
    )
    .bind(role.id.0)
    .bind(&names)
    .execute(&mut **tx)
    .await
    .map_err(|e| db_error("Failed to store role permissions", e))?;

    Ok(())
}

#[async_trait]
impl RoleRepository for PostgresRoleRepository {
    async fn list(&self) -> AppResult<Vec<Role>> {
        let sql = format!("SELECT {} FROM roles ORDER BY LOWER(name), id", ROLE_COLUMNS);
        let rows = sqlx::query_as::<_, RoleRow>(&sql)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| db_error("Failed to list roles", e))?;
        self.with_permissions(rows).await
    }

    async fn find_by_id(&self, id: RoleId) -> AppResult<Option<Role>> {
        let sql = format!("SELECT {} FROM roles WHERE id = $1", ROLE_COLUMNS);
        let row = sqlx::query_as::<_, RoleRow>(&sql)
            .bind(id.0)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| db_error("Failed to load role", e))?;
        self.hydrate(row).await
    }

    async fn find_by_name(&self, name: &str) -> AppResult<Option<Role>> {
        let sql = format!("SELECT {} FROM roles WHERE name = $1", ROLE_COLUMNS);
        let row = sqlx::query_as::<_, RoleRow>(&sql)
            .bind(name)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| db_error("Failed to load role", e))?;
        self.hydrate(row).await
    }

    async fn insert(&self, role: &Role) -> AppResult<()> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| db_error("Failed to begin transaction", e))?;

        sqlx::query(
            r#"
            INSERT INTO roles (id, name, created_at, created_by, updated_at, updated_by)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(role.id.0)
        .bind(&role.name)
        .bind(role.audit_info.created_at)
        .bind(role.audit_info.created_by.map(|u| u.0))
        .bind(role.audit_info.updated_at)
        .bind(role.audit_info.updated_by.map(|u| u.0))
        .execute(&mut *tx)
        .await
        .map_err(|e| db_error("Failed to insert role", e))?;

        replace_permissions(&mut tx, role).await?;

        tx.commit()
            .await
            .map_err(|e| db_error("Failed to commit role", e))
    }

    async fn update(&self, role: &Role) -> AppResult<()> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| db_error("Failed to begin transaction", e))?;

        let result = sqlx::query(
            "UPDATE roles SET name = $1, updated_at = $2, updated_by = $3 WHERE id = $4",
        )
        .bind(&role.name)
        .bind(role.audit_info.updated_at)
        .bind(role.audit_info.updated_by.map(|u| u.0))
        .bind(role.id.0)
        .execute(&mut *tx)
        .await
        .map_err(|e| db_error("Failed to update role", e))?;

        if result.rows_affected() == 0 {
            return Err(AppError::not_found(format!("Role {} not found", role.id)));
        }

        replace_permissions(&mut tx, role).await?;

        tx.commit()
            .await
            .map_err(|e| db_error("Failed to commit role", e))
    }

    async fn delete(&self, id: RoleId) -> AppResult<bool> {
        let result = sqlx::query("DELETE FROM roles WHERE id = $1")
            .bind(id.0)
            .execute(&self.pool)
            .await
            .map_err(|e| db_error("Failed to delete role", e))?;
        Ok(result.rows_affected() > 0)
    }

    async fn roles_for_user(&self, user_id: UserId) -> AppResult<Vec<Role>> {
        let rows = sqlx::query_as::<_, RoleRow>(
            r#"
            SELECT r.id, r.name, r.created_at, r.created_by, r.updated_at, r.updated_by
            FROM roles r
            JOIN user_roles ur ON ur.role_id = r.id
            WHERE ur.user_id = $1
            ORDER BY LOWER(r.name), r.id
            "#,
        )
        .bind(user_id.0)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| db_error("Failed to load user roles", e))?;

        self.with_permissions(rows).await
    }

    async fn assign_role(&self, user_id: UserId, role_id: RoleId) -> AppResult<()> {
        let result = sqlx::query(
            "INSERT INTO user_roles (user_id, role_id) VALUES ($1, $2) ON CONFLICT DO NOTHING",
        )
        .bind(user_id.0)
        .bind(role_id.0)
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(()),
            Err(sqlx::Error::Database(db)) if db.is_foreign_key_violation() => Err(
                AppError::not_found(format!("Role {} or user {} not found", role_id, user_id)),
            ),
            Err(e) => Err(db_error("Failed to assign role", e)),
        }
    }

    async fn remove_role(&self, user_id: UserId, role_id: RoleId) -> AppResult<bool> {
        let result = sqlx::query("DELETE FROM user_roles WHERE user_id = $1 AND role_id = $2")
            .bind(user_id.0)
            .bind(role_id.0)
            .execute(&self.pool)
            .await
            .map_err(|e| db_error("Failed to remove role", e))?;
        Ok(result.rows_affected() > 0)
    }

    async fn count_users_with_role(&self, role_id: RoleId) -> AppResult<u64> {
        let (total,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM user_roles WHERE role_id = $1")
            .bind(role_id.0)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| db_error("Failed to count role users", e))?;
        Ok(total.max(0) as u64)
    }

    async fn direct_permissions(&self, user_id: UserId) -> AppResult<BTreeSet<PermissionKind>> {
        let rows: Vec<(String,)> =
            sqlx::query_as("SELECT permission FROM user_permissions WHERE user_id = $1")
                .bind(user_id.0)
                .fetch_all(&self.pool)
                .await
                .map_err(|e| db_error("Failed to load user permissions", e))?;

        Ok(rows
            .iter()
            .filter_map(|(name,)| parse_permission(name))
            .collect())
    }

    async fn give_permission(&self, user_id: UserId, permission: PermissionKind) -> AppResult<()> {
        sqlx::query(
            "INSERT INTO user_permissions (user_id, permission) VALUES ($1, $2) ON CONFLICT DO NOTHING",
        )
        .bind(user_id.0)
        .bind(permission.as_str())
        .execute(&self.pool)
        .await
        .map_err(|e| db_error("Failed to grant permission", e))?;
        Ok(())
    }

    async fn revoke_permission(&self, user_id: UserId, permission: PermissionKind) -> AppResult<bool> {
        let result =
            sqlx::query("DELETE FROM user_permissions WHERE user_id = $1 AND permission = $2")
                .bind(user_id.0)
                .bind(permission.as_str())
                .execute(&self.pool)
                .await
                .map_err(|e| db_error("Failed to revoke permission", e))?;
        Ok(result.rows_affected() > 0)
    }
}
