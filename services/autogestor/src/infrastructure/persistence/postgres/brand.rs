use ag_common::{PagedResult, Pagination};
use ag_errors::{AppError, AppResult};
use async_trait::async_trait;
use sqlx::{PgPool, Postgres, QueryBuilder};
use uuid::Uuid;

use super::rows::{BRAND_COLUMNS, BrandRow, BrandStatsRow, BrandWithCountRow};
use super::{db_error, like_pattern};
use crate::domain::entities::{Brand, BrandWithCount};
use crate::domain::repositories::{BrandFilter, BrandRepository, BrandStats, SelectOption};
use crate::domain::value_objects::BrandId;

pub struct PostgresBrandRepository {
    pool: PgPool,
}

impl PostgresBrandRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn push_filter(query: &mut QueryBuilder<'_, Postgres>, filter: &BrandFilter) {
    query.push(" WHERE TRUE");
    if let Some(term) = filter.search_term() {
        let pattern = like_pattern(term);
        query.push(" AND (name ILIKE ");
        query.push_bind(pattern.clone());
        query.push(" OR country_of_origin ILIKE ");
        query.push_bind(pattern.clone());
        query.push(" OR description ILIKE ");
        query.push_bind(pattern);
        query.push(")");
    }
    if let Some(country) = filter.country_term() {
        query.push(" AND LOWER(country_of_origin) = LOWER(");
        query.push_bind(country.to_string());
        query.push(")");
    }
}

#[async_trait]
impl BrandRepository for PostgresBrandRepository {
    async fn list(&self, filter: &BrandFilter, pagination: Pagination) -> AppResult<PagedResult<Brand>> {
        let mut count = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM brands");
        push_filter(&mut count, filter);
        let (total,): (i64,) = count
            .build_query_as()
            .fetch_one(&self.pool)
            .await
            .map_err(|e| db_error("Failed to count brands", e))?;

        let mut query = QueryBuilder::<Postgres>::new(format!("SELECT {} FROM brands", BRAND_COLUMNS));
        push_filter(&mut query, filter);
        query.push(" ORDER BY LOWER(name), id LIMIT ");
        query.push_bind(pagination.limit() as i64);
        query.push(" OFFSET ");
        query.push_bind(i64::try_from(pagination.offset()).unwrap_or(i64::MAX));

        let rows = query
            .build_query_as::<BrandRow>()
            .fetch_all(&self.pool)
            .await
            .map_err(|e| db_error("Failed to list brands", e))?;

        Ok(PagedResult::new(
            rows.into_iter().map(Brand::from).collect(),
            total.max(0) as u64,
            &pagination,
        ))
    }

    async fn all(&self, filter: &BrandFilter) -> AppResult<Vec<Brand>> {
        let mut query = QueryBuilder::<Postgres>::new(format!("SELECT {} FROM brands", BRAND_COLUMNS));
        push_filter(&mut query, filter);
        query.push(" ORDER BY LOWER(name), id");

        let rows = query
            .build_query_as::<BrandRow>()
            .fetch_all(&self.pool)
            .await
            .map_err(|e| db_error("Failed to load brands", e))?;
        Ok(rows.into_iter().map(Brand::from).collect())
    }

    async fn find_by_id(&self, id: BrandId) -> AppResult<Option<Brand>> {
        let sql = format!("SELECT {} FROM brands WHERE id = $1", BRAND_COLUMNS);
        let row = sqlx::query_as::<_, BrandRow>(&sql)
            .bind(id.0)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| db_error("Failed to load brand", e))?;
        Ok(row.map(Brand::from))
    }

    async fn find_by_name(&self, name: &str) -> AppResult<Option<Brand>> {
        let sql = format!("SELECT {} FROM brands WHERE LOWER(name) = LOWER($1)", BRAND_COLUMNS);
        let row = sqlx::query_as::<_, BrandRow>(&sql)
            .bind(name.trim())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| db_error("Failed to load brand", e))?;
        Ok(row.map(Brand::from))
    }

    async fn insert(&self, brand: &Brand) -> AppResult<()> {
        sqlx::query(
            r#"
            INSERT INTO brands (
                id, name, country_of_origin, founded_year, website, description,
                created_at, created_by, updated_at, updated_by
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            "#,
        )
        .bind(brand.id.0)
        .bind(&brand.name)
        .bind(&brand.country_of_origin)
        .bind(brand.founded_year)
        .bind(&brand.website)
        .bind(&brand.description)
        .bind(brand.audit_info.created_at)
        .bind(brand.audit_info.created_by.map(|u| u.0))
        .bind(brand.audit_info.updated_at)
        .bind(brand.audit_info.updated_by.map(|u| u.0))
        .execute(&self.pool)
        .await
        .map_err(|e| db_error("Failed to insert brand", e))?;

        Ok(())
    }

    async fn update(&self, brand: &Brand) -> AppResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE brands SET
                name = $1, country_of_origin = $2, founded_year = $3, website = $4,
                description = $5, updated_at = $6, updated_by = $7
            WHERE id = $8
            "#,
        )
        .bind(&brand.name)
        .bind(&brand.country_of_origin)
        .bind(brand.founded_year)
        .bind(&brand.website)
        .bind(&brand.description)
        .bind(brand.audit_info.updated_at)
        .bind(brand.audit_info.updated_by.map(|u| u.0))
        .bind(brand.id.0)
        .execute(&self.pool)
        .await
        .map_err(|e| db_error("Failed to update brand", e))?;

        if result.rows_affected() == 0 {
            return Err(AppError::not_found(format!("Brand {} not found", brand.id)));
        }
        Ok(())
    }

    async fn delete(&self, id: BrandId) -> AppResult<bool> {
        // products.brand_id 由外键置空
        let result = sqlx::query("DELETE FROM brands WHERE id = $1")
            .bind(id.0)
            .execute(&self.pool)
            .await
            .map_err(|e| db_error("Failed to delete brand", e))?;
        Ok(result.rows_affected() > 0)
    }

    async fn select(&self) -> AppResult<Vec<SelectOption>> {
        let rows: Vec<(Uuid, String)> =
            sqlx::query_as("SELECT id, name FROM brands ORDER BY LOWER(name), id")
                .fetch_all(&self.pool)
                .await
                .map_err(|e| db_error("Failed to load brand options", e))?;

        Ok(rows
            .into_iter()
            .map(|(id, name)| SelectOption { id, name })
            .collect())
    }

    async fn countries(&self) -> AppResult<Vec<String>> {
        let rows: Vec<(String,)> = sqlx::query_as(
            r#"
            SELECT DISTINCT country_of_origin FROM brands
            WHERE country_of_origin IS NOT NULL AND country_of_origin <> ''
            ORDER BY country_of_origin
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| db_error("Failed to load brand countries", e))?;

        Ok(rows.into_iter().map(|(country,)| country).collect())
    }

    async fn stats(&self) -> AppResult<BrandStats> {
        let row = sqlx::query_as::<_, BrandStatsRow>(
            r#"
            SELECT
                COUNT(*) AS total,
                COUNT(*) FILTER (WHERE EXISTS (
                    SELECT 1 FROM products p
                    WHERE p.brand_id = b.id AND p.deleted_at IS NULL
                )) AS with_products,
                COUNT(*) FILTER (WHERE b.website IS NOT NULL) AS with_website
            FROM brands b
            "#,
        )
        .fetch_one(&self.pool)
        .await
        .map_err(|e| db_error("Failed to compute brand stats", e))?;

        Ok(row.into())
    }

    async fn top_by_product_count(&self, limit: usize) -> AppResult<Vec<BrandWithCount>> {
        let rows = sqlx::query_as::<_, BrandWithCountRow>(
            r#"
            SELECT b.id, b.name, b.country_of_origin, b.founded_year, b.website, b.description,
                   b.created_at, b.created_by, b.updated_at, b.updated_by,
                   COUNT(p.id) AS products_count
            FROM brands b
            LEFT JOIN products p ON p.brand_id = b.id AND p.deleted_at IS NULL
            GROUP BY b.id
            ORDER BY products_count DESC, b.id ASC
            LIMIT $1
            "#,
        )
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| db_error("Failed to rank brands", e))?;

        Ok(rows.into_iter().map(BrandWithCount::from).collect())
    }

    async fn recent(&self, limit: usize) -> AppResult<Vec<Brand>> {
        let sql = format!(
            "SELECT {} FROM brands ORDER BY created_at DESC, id DESC LIMIT $1",
            BRAND_COLUMNS
        );
        let rows = sqlx::query_as::<_, BrandRow>(&sql)
            .bind(limit as i64)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| db_error("Failed to load brands", e))?;
        Ok(rows.into_iter().map(Brand::from).collect())
    }
}
