use ag_common::{PagedResult, Pagination};
use ag_errors::{AppError, AppResult};
use async_trait::async_trait;
use sqlx::types::Json;
use sqlx::{PgPool, Postgres, QueryBuilder};
use uuid::Uuid;

use super::rows::{PRODUCT_COLUMNS, ProductRow, ProductStatsRow};
use super::{db_error, like_pattern};
use crate::domain::entities::Product;
use crate::domain::repositories::{
    ProductFilter, ProductRepository, ProductStats, SelectOption, StockFilter, TrashedFilter,
};
use crate::domain::value_objects::{BrandId, CategoryId, ProductId};

pub struct PostgresProductRepository {
    pool: PgPool,
}

impl PostgresProductRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn fetch_where(&self, condition: &str, limit: usize, order: &str) -> AppResult<Vec<Product>> {
        let sql = format!(
            "SELECT {} FROM products WHERE deleted_at IS NULL AND {} ORDER BY {} LIMIT $1",
            PRODUCT_COLUMNS, condition, order
        );
        let rows = sqlx::query_as::<_, ProductRow>(&sql)
            .bind(limit as i64)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| db_error("Failed to load products", e))?;
        Ok(rows.into_iter().map(Product::from).collect())
    }

    async fn fetch_one_by(&self, column: &str, value: &str) -> AppResult<Option<Product>> {
        let sql = format!("SELECT {} FROM products WHERE {} = $1", PRODUCT_COLUMNS, column);
        let row = sqlx::query_as::<_, ProductRow>(&sql)
            .bind(value)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| db_error("Failed to load product", e))?;
        Ok(row.map(Product::from))
    }
}

fn push_filter(query: &mut QueryBuilder<'_, Postgres>, filter: &ProductFilter) {
    query.push(match filter.trashed {
        TrashedFilter::Without => " WHERE deleted_at IS NULL",
        TrashedFilter::Only => " WHERE deleted_at IS NOT NULL",
        TrashedFilter::With => " WHERE TRUE",
    });

    if let Some(term) = filter.search_term() {
        let pattern = like_pattern(term);
        query.push(" AND (name ILIKE ");
        query.push_bind(pattern.clone());
        query.push(" OR sku ILIKE ");
        query.push_bind(pattern.clone());
        query.push(" OR barcode ILIKE ");
        query.push_bind(pattern.clone());
        query.push(" OR description ILIKE ");
        query.push_bind(pattern);
        query.push(")");
    }
    if let Some(category_id) = filter.category_id {
        query.push(" AND category_id = ");
        query.push_bind(category_id.0);
    }
    if let Some(brand_id) = filter.brand_id {
        query.push(" AND brand_id = ");
        query.push_bind(brand_id.0);
    }
    if let Some(is_active) = filter.is_active {
        query.push(" AND is_active = ");
        query.push_bind(is_active);
    }
    match filter.stock {
        Some(StockFilter::Low) => {
            query.push(" AND stock > 0 AND stock <= min_stock");
        }
        Some(StockFilter::Out) => {
            query.push(" AND stock = 0");
        }
        Some(StockFilter::Available) => {
            query.push(" AND stock > 0");
        }
        None => {}
    }
}

#[async_trait]
impl ProductRepository for PostgresProductRepository {
    async fn list(&self, filter: &ProductFilter, pagination: Pagination) -> AppResult<PagedResult<Product>> {
        let mut count = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM products");
        push_filter(&mut count, filter);
        let (total,): (i64,) = count
            .build_query_as()
            .fetch_one(&self.pool)
            .await
            .map_err(|e| db_error("Failed to count products", e))?;

        let mut query = QueryBuilder::<Postgres>::new(format!("SELECT {} FROM products", PRODUCT_COLUMNS));
        push_filter(&mut query, filter);
        query.push(" ORDER BY created_at DESC, id DESC LIMIT ");
        query.push_bind(pagination.limit() as i64);
        query.push(" OFFSET ");
        query.push_bind(i64::try_from(pagination.offset()).unwrap_or(i64::MAX));

        let rows = query
            .build_query_as::<ProductRow>()
            .fetch_all(&self.pool)
            .await
            .map_err(|e| db_error("Failed to list products", e))?;

        Ok(PagedResult::new(
            rows.into_iter().map(Product::from).collect(),
            total.max(0) as u64,
            &pagination,
        ))
    }

    async fn all(&self, filter: &ProductFilter) -> AppResult<Vec<Product>> {
        let mut query = QueryBuilder::<Postgres>::new(format!("SELECT {} FROM products", PRODUCT_COLUMNS));
        push_filter(&mut query, filter);
        query.push(" ORDER BY created_at DESC, id DESC");

        let rows = query
            .build_query_as::<ProductRow>()
            .fetch_all(&self.pool)
            .await
            .map_err(|e| db_error("Failed to load products", e))?;
        Ok(rows.into_iter().map(Product::from).collect())
    }

    async fn find_by_id(&self, id: ProductId) -> AppResult<Option<Product>> {
        let sql = format!(
            "SELECT {} FROM products WHERE id = $1 AND deleted_at IS NULL",
            PRODUCT_COLUMNS
        );
        let row = sqlx::query_as::<_, ProductRow>(&sql)
            .bind(id.0)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| db_error("Failed to load product", e))?;
        Ok(row.map(Product::from))
    }

    async fn find_by_id_with_trashed(&self, id: ProductId) -> AppResult<Option<Product>> {
        let sql = format!("SELECT {} FROM products WHERE id = $1", PRODUCT_COLUMNS);
        let row = sqlx::query_as::<_, ProductRow>(&sql)
            .bind(id.0)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| db_error("Failed to load product", e))?;
        Ok(row.map(Product::from))
    }

    async fn find_by_sku(&self, sku: &str) -> AppResult<Option<Product>> {
        self.fetch_one_by("sku", sku).await
    }

    async fn find_by_barcode(&self, barcode: &str) -> AppResult<Option<Product>> {
        self.fetch_one_by("barcode", barcode).await
    }

    async fn insert(&self, product: &Product) -> AppResult<()> {
        sqlx::query(
            r#"
            INSERT INTO products (
                id, name, description, price, cost_price, sale_price,
                stock, min_stock, max_stock, sku, barcode, is_active, category_id, brand_id,
                weight, height, width, length, specifications, images,
                last_purchase_date, last_sale_date, deleted_at,
                created_at, created_by, updated_at, updated_by
            ) VALUES (
                $1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14,
                $15, $16, $17, $18, $19, $20, $21, $22, $23, $24, $25, $26, $27
            )
            "#,
        )
        .bind(product.id.0)
        .bind(&product.name)
        .bind(&product.description)
        .bind(product.price)
        .bind(product.cost_price)
        .bind(product.sale_price)
        .bind(product.stock)
        .bind(product.min_stock)
        .bind(product.max_stock)
        .bind(&product.sku)
        .bind(&product.barcode)
        .bind(product.is_active)
        .bind(product.category_id.0)
        .bind(product.brand_id.map(|b| b.0))
        .bind(product.dimensions.weight)
        .bind(product.dimensions.height)
        .bind(product.dimensions.width)
        .bind(product.dimensions.length)
        .bind(Json(product.specifications.clone()))
        .bind(Json(product.images.clone()))
        .bind(product.last_purchase_date)
        .bind(product.last_sale_date)
        .bind(product.deleted_at)
        .bind(product.audit_info.created_at)
        .bind(product.audit_info.created_by.map(|u| u.0))
        .bind(product.audit_info.updated_at)
        .bind(product.audit_info.updated_by.map(|u| u.0))
        .execute(&self.pool)
        .await
        .map_err(|e| db_error("Failed to insert product", e))?;

        Ok(())
    }

    async fn update(&self, product: &Product) -> AppResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE products SET
                name = $1, description = $2, price = $3, cost_price = $4, sale_price = $5,
                stock = $6, min_stock = $7, max_stock = $8, sku = $9, barcode = $10,
                is_active = $11, category_id = $12, brand_id = $13,
                weight = $14, height = $15, width = $16, length = $17,
                specifications = $18, images = $19,
                last_purchase_date = $20, last_sale_date = $21, deleted_at = $22,
                updated_at = $23, updated_by = $24
            WHERE id = $25
            "#,
        )
        .bind(&product.name)
        .bind(&product.description)
        .bind(product.price)
        .bind(product.cost_price)
        .bind(product.sale_price)
        .bind(product.stock)
        .bind(product.min_stock)
        .bind(product.max_stock)
        .bind(&product.sku)
        .bind(&product.barcode)
        .bind(product.is_active)
        .bind(product.category_id.0)
        .bind(product.brand_id.map(|b| b.0))
        .bind(product.dimensions.weight)
        .bind(product.dimensions.height)
        .bind(product.dimensions.width)
        .bind(product.dimensions.length)
        .bind(Json(product.specifications.clone()))
        .bind(Json(product.images.clone()))
        .bind(product.last_purchase_date)
        .bind(product.last_sale_date)
        .bind(product.deleted_at)
        .bind(product.audit_info.updated_at)
        .bind(product.audit_info.updated_by.map(|u| u.0))
        .bind(product.id.0)
        .execute(&self.pool)
        .await
        .map_err(|e| db_error("Failed to update product", e))?;

        if result.rows_affected() == 0 {
            return Err(AppError::not_found(format!("Product {} not found", product.id)));
        }
        Ok(())
    }

    async fn force_delete(&self, id: ProductId) -> AppResult<bool> {
        let result = sqlx::query("DELETE FROM products WHERE id = $1")
            .bind(id.0)
            .execute(&self.pool)
            .await
            .map_err(|e| db_error("Failed to delete product", e))?;
        Ok(result.rows_affected() > 0)
    }

    async fn count_by_category(&self, category_id: CategoryId) -> AppResult<u64> {
        let (total,): (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM products WHERE category_id = $1 AND deleted_at IS NULL",
        )
        .bind(category_id.0)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| db_error("Failed to count products", e))?;
        Ok(total.max(0) as u64)
    }

    async fn count_by_brand(&self, brand_id: BrandId) -> AppResult<u64> {
        let (total,): (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM products WHERE brand_id = $1 AND deleted_at IS NULL",
        )
        .bind(brand_id.0)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| db_error("Failed to count products", e))?;
        Ok(total.max(0) as u64)
    }

    async fn low_stock(&self, limit: usize) -> AppResult<Vec<Product>> {
        self.fetch_where("stock > 0 AND stock <= min_stock", limit, "stock ASC, id ASC")
            .await
    }

    async fn out_of_stock(&self, limit: usize) -> AppResult<Vec<Product>> {
        self.fetch_where("stock = 0", limit, "LOWER(name) ASC, id ASC")
            .await
    }

    async fn recent(&self, limit: usize) -> AppResult<Vec<Product>> {
        self.fetch_where("TRUE", limit, "created_at DESC, id DESC")
            .await
    }

    async fn active_select(&self) -> AppResult<Vec<SelectOption>> {
        let rows: Vec<(Uuid, String)> = sqlx::query_as(
            r#"
            SELECT id, name FROM products
            WHERE deleted_at IS NULL AND is_active
            ORDER BY LOWER(name), id
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| db_error("Failed to load product options", e))?;

        Ok(rows
            .into_iter()
            .map(|(id, name)| SelectOption { id, name })
            .collect())
    }

    async fn stats(&self) -> AppResult<ProductStats> {
        let row = sqlx::query_as::<_, ProductStatsRow>(
            r#"
            SELECT
                COUNT(*) FILTER (WHERE deleted_at IS NULL) AS total,
                COUNT(*) FILTER (WHERE deleted_at IS NULL AND is_active) AS active,
                COUNT(*) FILTER (WHERE deleted_at IS NULL AND NOT is_active) AS inactive,
                COUNT(*) FILTER (WHERE deleted_at IS NULL AND brand_id IS NOT NULL) AS with_brand,
                COUNT(*) FILTER (WHERE deleted_at IS NULL AND brand_id IS NULL) AS without_brand,
                COUNT(*) FILTER (WHERE deleted_at IS NULL AND stock > 0 AND stock <= min_stock) AS low_stock,
                COUNT(*) FILTER (WHERE deleted_at IS NULL AND stock = 0) AS out_of_stock,
                COUNT(*) FILTER (WHERE deleted_at IS NOT NULL) AS trashed
            FROM products
            "#,
        )
        .fetch_one(&self.pool)
        .await
        .map_err(|e| db_error("Failed to compute product stats", e))?;

        Ok(row.into())
    }
}
