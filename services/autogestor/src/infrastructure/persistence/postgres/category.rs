use ag_common::{PagedResult, Pagination};
use ag_errors::{AppError, AppResult};
use async_trait::async_trait;
use sqlx::{PgPool, Postgres, QueryBuilder};
use uuid::Uuid;

use super::rows::{CATEGORY_COLUMNS, CategoryRow, CategoryStatsRow, CategoryWithCountRow};
use super::{db_error, like_pattern};
use crate::domain::entities::{Category, CategoryWithCount};
use crate::domain::repositories::{CategoryFilter, CategoryRepository, CategoryStats, SelectOption};
use crate::domain::value_objects::CategoryId;

pub struct PostgresCategoryRepository {
    pool: PgPool,
}

impl PostgresCategoryRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn push_filter(query: &mut QueryBuilder<'_, Postgres>, filter: &CategoryFilter) {
    query.push(" WHERE TRUE");
    if let Some(term) = filter.search_term() {
        let pattern = like_pattern(term);
        query.push(" AND (name ILIKE ");
        query.push_bind(pattern.clone());
        query.push(" OR description ILIKE ");
        query.push_bind(pattern);
        query.push(")");
    }
    if let Some(is_active) = filter.is_active {
        query.push(" AND is_active = ");
        query.push_bind(is_active);
    }
}

#[async_trait]
impl CategoryRepository for PostgresCategoryRepository {
    async fn list(&self, filter: &CategoryFilter, pagination: Pagination) -> AppResult<PagedResult<Category>> {
        let mut count = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM categories");
        push_filter(&mut count, filter);
        let (total,): (i64,) = count
            .build_query_as()
            .fetch_one(&self.pool)
            .await
            .map_err(|e| db_error("Failed to count categories", e))?;

        let mut query =
            QueryBuilder::<Postgres>::new(format!("SELECT {} FROM categories", CATEGORY_COLUMNS));
        push_filter(&mut query, filter);
        query.push(" ORDER BY LOWER(name), id LIMIT ");
        query.push_bind(pagination.limit() as i64);
        query.push(" OFFSET ");
        query.push_bind(i64::try_from(pagination.offset()).unwrap_or(i64::MAX));

        let rows = query
            .build_query_as::<CategoryRow>()
            .fetch_all(&self.pool)
            .await
            .map_err(|e| db_error("Failed to list categories", e))?;

        Ok(PagedResult::new(
            rows.into_iter().map(Category::from).collect(),
            total.max(0) as u64,
            &pagination,
        ))
    }

    async fn all(&self, filter: &CategoryFilter) -> AppResult<Vec<Category>> {
        let mut query =
            QueryBuilder::<Postgres>::new(format!("SELECT {} FROM categories", CATEGORY_COLUMNS));
        push_filter(&mut query, filter);
        query.push(" ORDER BY LOWER(name), id");

        let rows = query
            .build_query_as::<CategoryRow>()
            .fetch_all(&self.pool)
            .await
            .map_err(|e| db_error("Failed to load categories", e))?;
        Ok(rows.into_iter().map(Category::from).collect())
    }

    async fn find_by_id(&self, id: CategoryId) -> AppResult<Option<Category>> {
        let sql = format!("SELECT {} FROM categories WHERE id = $1", CATEGORY_COLUMNS);
        let row = sqlx::query_as::<_, CategoryRow>(&sql)
            .bind(id.0)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| db_error("Failed to load category", e))?;
        Ok(row.map(Category::from))
    }

    async fn find_by_name(&self, name: &str) -> AppResult<Option<Category>> {
        let sql = format!(
            "SELECT {} FROM categories WHERE LOWER(name) = LOWER($1)",
            CATEGORY_COLUMNS
        );
        let row = sqlx::query_as::<_, CategoryRow>(&sql)
            .bind(name.trim())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| db_error("Failed to load category", e))?;
        Ok(row.map(Category::from))
    }

    async fn insert(&self, category: &Category) -> AppResult<()> {
        sqlx::query(
            r#"
            INSERT INTO categories (
                id, name, description, is_active, created_at, created_by, updated_at, updated_by
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(category.id.0)
        .bind(&category.name)
        .bind(&category.description)
        .bind(category.is_active)
        .bind(category.audit_info.created_at)
        .bind(category.audit_info.created_by.map(|u| u.0))
        .bind(category.audit_info.updated_at)
        .bind(category.audit_info.updated_by.map(|u| u.0))
        .execute(&self.pool)
        .await
        .map_err(|e| db_error("Failed to insert category", e))?;

        Ok(())
    }

    async fn update(&self, category: &Category) -> AppResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE categories SET
                name = $1, description = $2, is_active = $3, updated_at = $4, updated_by = $5
            WHERE id = $6
            "#,
        )
        .bind(&category.name)
        .bind(&category.description)
        .bind(category.is_active)
        .bind(category.audit_info.updated_at)
        .bind(category.audit_info.updated_by.map(|u| u.0))
        .bind(category.id.0)
        .execute(&self.pool)
        .await
        .map_err(|e| db_error("Failed to update category", e))?;

        if result.rows_affected() == 0 {
            return Err(AppError::not_found(format!("Category {} not found", category.id)));
        }
        Ok(())
    }

    async fn delete(&self, id: CategoryId) -> AppResult<bool> {
        // 商品随外键级联删除
        let result = sqlx::query("DELETE FROM categories WHERE id = $1")
            .bind(id.0)
            .execute(&self.pool)
            .await
            .map_err(|e| db_error("Failed to delete category", e))?;
        Ok(result.rows_affected() > 0)
    }

    async fn active_select(&self) -> AppResult<Vec<SelectOption>> {
        let rows: Vec<(Uuid, String)> =
            sqlx::query_as("SELECT id, name FROM categories WHERE is_active ORDER BY LOWER(name), id")
                .fetch_all(&self.pool)
                .await
                .map_err(|e| db_error("Failed to load category options", e))?;

        Ok(rows
            .into_iter()
            .map(|(id, name)| SelectOption { id, name })
            .collect())
    }

    async fn stats(&self) -> AppResult<CategoryStats> {
        let row = sqlx::query_as::<_, CategoryStatsRow>(
            r#"
            SELECT
                COUNT(*) AS total,
                COUNT(*) FILTER (WHERE c.is_active) AS active,
                COUNT(*) FILTER (WHERE NOT c.is_active) AS inactive,
                COUNT(*) FILTER (WHERE EXISTS (
                    SELECT 1 FROM products p
                    WHERE p.category_id = c.id AND p.deleted_at IS NULL
                )) AS with_products
            FROM categories c
            "#,
        )
        .fetch_one(&self.pool)
        .await
        .map_err(|e| db_error("Failed to compute category stats", e))?;

        Ok(row.into())
    }

    async fn top_by_product_count(&self, limit: usize) -> AppResult<Vec<CategoryWithCount>> {
        let rows = sqlx::query_as::<_, CategoryWithCountRow>(
            r#"
            SELECT c.id, c.name, c.description, c.is_active,
                   c.created_at, c.created_by, c.updated_at, c.updated_by,
                   COUNT(p.id) AS products_count
            FROM categories c
            LEFT JOIN products p ON p.category_id = c.id AND p.deleted_at IS NULL
            GROUP BY c.id
            ORDER BY products_count DESC, c.id ASC
            LIMIT $1
            "#,
        )
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| db_error("Failed to rank categories", e))?;

        Ok(rows.into_iter().map(CategoryWithCount::from).collect())
    }

    async fn recent(&self, limit: usize) -> AppResult<Vec<Category>> {
        let sql = format!(
            "SELECT {} FROM categories ORDER BY created_at DESC, id DESC LIMIT $1",
            CATEGORY_COLUMNS
        );
        let rows = sqlx::query_as::<_, CategoryRow>(&sql)
            .bind(limit as i64)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| db_error("Failed to load categories", e))?;
        Ok(rows.into_iter().map(Category::from).collect())
    }
}
