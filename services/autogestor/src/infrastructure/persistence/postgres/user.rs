use ag_common::{PagedResult, Pagination};
use ag_errors::{AppError, AppResult};
use async_trait::async_trait;
use sqlx::{PgPool, Postgres, QueryBuilder};

use super::rows::{USER_COLUMNS, UserRow, UserStatsRow};
use super::{db_error, like_pattern};
use crate::domain::entities::{User, normalize_email};
use crate::domain::rbac::{ADMIN_ROLE, USER_ROLE};
use crate::domain::repositories::{UserFilter, UserRepository, UserStats};
use crate::domain::value_objects::UserId;

pub struct PostgresUserRepository {
    pool: PgPool,
}

impl PostgresUserRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn push_filter(query: &mut QueryBuilder<'_, Postgres>, filter: &UserFilter) {
    query.push(" WHERE TRUE");
    if let Some(term) = filter.search_term() {
        let pattern = like_pattern(term);
        query.push(" AND (users.name ILIKE ");
        query.push_bind(pattern.clone());
        query.push(" OR users.email ILIKE ");
        query.push_bind(pattern);
        query.push(")");
    }
    if let Some(role) = filter.role_name() {
        query.push(
            " AND EXISTS (SELECT 1 FROM user_roles ur JOIN roles r ON r.id = ur.role_id \
             WHERE ur.user_id = users.id AND LOWER(r.name) = LOWER(",
        );
        query.push_bind(role.to_string());
        query.push("))");
    }
    match filter.verified {
        Some(true) => {
            query.push(" AND users.email_verified_at IS NOT NULL");
        }
        Some(false) => {
            query.push(" AND users.email_verified_at IS NULL");
        }
        None => {}
    }
}

#[async_trait]
impl UserRepository for PostgresUserRepository {
    async fn list(&self, filter: &UserFilter, pagination: Pagination) -> AppResult<PagedResult<User>> {
        let mut count = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM users");
        push_filter(&mut count, filter);
        let (total,): (i64,) = count
            .build_query_as()
            .fetch_one(&self.pool)
            .await
            .map_err(|e| db_error("Failed to count users", e))?;

        let mut query = QueryBuilder::<Postgres>::new(format!("SELECT {} FROM users", USER_COLUMNS));
        push_filter(&mut query, filter);
        query.push(" ORDER BY created_at DESC, id DESC LIMIT ");
        query.push_bind(pagination.limit() as i64);
        query.push(" OFFSET ");
        query.push_bind(i64::try_from(pagination.offset()).unwrap_or(i64::MAX));

        let rows = query
            .build_query_as::<UserRow>()
            .fetch_all(&self.pool)
            .await
            .map_err(|e| db_error("Failed to list users", e))?;

        Ok(PagedResult::new(
            rows.into_iter().map(User::from).collect(),
            total.max(0) as u64,
            &pagination,
        ))
    }

    async fn find_by_id(&self, id: UserId) -> AppResult<Option<User>> {
        let sql = format!("SELECT {} FROM users WHERE id = $1", USER_COLUMNS);
        let row = sqlx::query_as::<_, UserRow>(&sql)
            .bind(id.0)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| db_error("Failed to load user", e))?;
        Ok(row.map(User::from))
    }

    async fn find_by_email(&self, email: &str) -> AppResult<Option<User>> {
        let sql = format!("SELECT {} FROM users WHERE email = $1", USER_COLUMNS);
        let row = sqlx::query_as::<_, UserRow>(&sql)
            .bind(normalize_email(email))
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| db_error("Failed to load user", e))?;
        Ok(row.map(User::from))
    }

    async fn insert(&self, user: &User) -> AppResult<()> {
        sqlx::query(
            r#"
            INSERT INTO users (
                id, name, email, password_hash, email_verified_at,
                created_at, created_by, updated_at, updated_by
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(user.id.0)
        .bind(&user.name)
        .bind(&user.email)
        .bind(user.password_hash.as_str())
        .bind(user.email_verified_at)
        .bind(user.audit_info.created_at)
        .bind(user.audit_info.created_by.map(|u| u.0))
        .bind(user.audit_info.updated_at)
        .bind(user.audit_info.updated_by.map(|u| u.0))
        .execute(&self.pool)
        .await
        .map_err(|e| db_error("Failed to insert user", e))?;

        Ok(())
    }

    async fn update(&self, user: &User) -> AppResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE users SET
                name = $1, email = $2, password_hash = $3, email_verified_at = $4,
                updated_at = $5, updated_by = $6
            WHERE id = $7
            "#,
        )
        .bind(&user.name)
        .bind(&user.email)
        .bind(user.password_hash.as_str())
        .bind(user.email_verified_at)
        .bind(user.audit_info.updated_at)
        .bind(user.audit_info.updated_by.map(|u| u.0))
        .bind(user.id.0)
        .execute(&self.pool)
        .await
        .map_err(|e| db_error("Failed to update user", e))?;

        if result.rows_affected() == 0 {
            return Err(AppError::not_found(format!("User {} not found", user.id)));
        }
        Ok(())
    }

    async fn delete(&self, id: UserId) -> AppResult<bool> {
        let result = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id.0)
            .execute(&self.pool)
            .await
            .map_err(|e| db_error("Failed to delete user", e))?;
        Ok(result.rows_affected() > 0)
    }

    async fn without_roles(&self) -> AppResult<Vec<User>> {
        let sql = format!(
            r#"
            SELECT {} FROM users
            WHERE NOT EXISTS (SELECT 1 FROM user_roles ur WHERE ur.user_id = users.id)
            ORDER BY created_at, id
            "#,
            USER_COLUMNS
        );
        let rows = sqlx::query_as::<_, UserRow>(&sql)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| db_error("Failed to load users without roles", e))?;
        Ok(rows.into_iter().map(User::from).collect())
    }

    async fn stats(&self) -> AppResult<UserStats> {
        let row = sqlx::query_as::<_, UserStatsRow>(
            r#"
            SELECT
                COUNT(*) AS total,
                COUNT(*) FILTER (WHERE u.email_verified_at IS NOT NULL) AS verified,
                COUNT(*) FILTER (WHERE EXISTS (
                    SELECT 1 FROM user_roles ur JOIN roles r ON r.id = ur.role_id
                    WHERE ur.user_id = u.id AND r.name = $1
                )) AS admins,
                COUNT(*) FILTER (WHERE EXISTS (
                    SELECT 1 FROM user_roles ur JOIN roles r ON r.id = ur.role_id
                    WHERE ur.user_id = u.id AND r.name = $2
                )) AS staff,
                COUNT(*) FILTER (WHERE NOT EXISTS (
                    SELECT 1 FROM user_roles ur WHERE ur.user_id = u.id
                )) AS without_role
            FROM users u
            "#,
        )
        .bind(ADMIN_ROLE)
        .bind(USER_ROLE)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| db_error("Failed to compute user stats", e))?;

        Ok(row.into())
    }

    async fn recent(&self, limit: usize) -> AppResult<Vec<User>> {
        let sql = format!(
            "SELECT {} FROM users ORDER BY created_at DESC, id DESC LIMIT $1",
            USER_COLUMNS
        );
        let rows = sqlx::query_as::<_, UserRow>(&sql)
            .bind(limit as i64)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| db_error("Failed to load users", e))?;
        Ok(rows.into_iter().map(User::from).collect())
    }
}
