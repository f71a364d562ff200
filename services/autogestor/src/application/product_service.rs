//! 商品服务

use std::collections::HashMap;
use std::sync::Arc;

use ag_common::{PagedResult, Pagination};
use ag_domain_core::SoftDeletable;
use ag_errors::{AppError, AppResult, FieldErrors};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::info;

use super::cache::{ListingCachePolicy, ServiceCache, keys};
use super::export::{self, write_csv};
use super::reports::{BulkReport, ImportReport};
use super::validation::{self, MAX_NAME_LEN};
use super::EventSink;
use crate::domain::entities::{Product, ProductData, StockOperation};
use crate::domain::events::{ChangeKind, EntityChanged, EntityKind, FieldChange, diff};
use crate::domain::repositories::{
    BrandFilter, BrandRepository, CategoryFilter, CategoryRepository, ProductFilter,
    ProductRepository, ProductStats, SelectOption,
};
use crate::domain::value_objects::{BrandId, CategoryId, ProductId, UserId, sku};

const SKU_MAX_LEN: usize = 50;
const BARCODE_MAX_LEN: usize = 50;

/// 批量更新的字段，未设置的字段保持不变
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ProductBulkUpdate {
    pub is_active: Option<bool>,
    pub category_id: Option<CategoryId>,
    /// `Some(None)`（JSON 中为 `null`）表示解除品牌
    #[serde(
        deserialize_with = "present_field",
        skip_serializing_if = "Option::is_none"
    )]
    pub brand_id: Option<Option<BrandId>>,
}

/// 字段出现即为 `Some`，值为 null 时得到 `Some(None)`
fn present_field<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: serde::Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

impl ProductBulkUpdate {
    pub fn is_empty(&self) -> bool {
        self.is_active.is_none() && self.category_id.is_none() && self.brand_id.is_none()
    }
}

/// CSV 导入行，所有列按文本读取后再解析
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ProductCsvRow {
    name: Option<String>,
    sku: Option<String>,
    barcode: Option<String>,
    category: Option<String>,
    brand: Option<String>,
    description: Option<String>,
    price: Option<String>,
    cost_price: Option<String>,
    sale_price: Option<String>,
    stock: Option<String>,
    min_stock: Option<String>,
    max_stock: Option<String>,
    is_active: Option<String>,
}

pub const EXPORT_HEADER: &[&str] = &[
    "id",
    "name",
    "sku",
    "barcode",
    "category",
    "brand",
    "description",
    "price",
    "cost_price",
    "sale_price",
    "stock",
    "min_stock",
    "max_stock",
    "is_active",
    "created_at",
];

pub struct ProductService {
    products: Arc<dyn ProductRepository>,
    categories: Arc<dyn CategoryRepository>,
    brands: Arc<dyn BrandRepository>,
    cache: ServiceCache,
    policy: ListingCachePolicy,
    events: EventSink,
}

impl ProductService {
    pub fn new(
        products: Arc<dyn ProductRepository>,
        categories: Arc<dyn CategoryRepository>,
        brands: Arc<dyn BrandRepository>,
        cache: ServiceCache,
        policy: ListingCachePolicy,
        events: EventSink,
    ) -> Self {
        Self {
            products,
            categories,
            brands,
            cache,
            policy,
            events,
        }
    }

    // ========== 查询 ==========

    /// 分页列表；无过滤条件的默认分页结果走缓存
    pub async fn list(
        &self,
        filter: &ProductFilter,
        pagination: Pagination,
    ) -> AppResult<PagedResult<Product>> {
        if filter.is_default() && self.policy.is_cacheable(&pagination) {
            let key = self.policy.listing_key(EntityKind::Product, &pagination);
            return self
                .cache
                .remember(&key, || self.products.list(filter, pagination))
                .await;
        }
        self.products.list(filter, pagination).await
    }

    pub async fn search(&self, term: &str, pagination: Pagination) -> AppResult<PagedResult<Product>> {
        self.products
            .list(&ProductFilter::search(term), pagination)
            .await
    }

    pub async fn find(&self, id: ProductId) -> AppResult<Option<Product>> {
        self.products.find_by_id(id).await
    }

    pub async fn get(&self, id: ProductId) -> AppResult<Product> {
        self.products
            .find_by_id(id)
            .await?
            .ok_or_else(|| AppError::not_found(format!("Product {} not found", id)))
    }

    pub async fn find_by_sku(&self, sku: &str) -> AppResult<Option<Product>> {
        self.products.find_by_sku(sku.trim()).await
    }

    pub async fn find_by_barcode(&self, barcode: &str) -> AppResult<Option<Product>> {
        self.products.find_by_barcode(barcode.trim()).await
    }

    pub async fn stats(&self) -> AppResult<ProductStats> {
        self.cache
            .remember(keys::PRODUCTS_STATS, || self.products.stats())
            .await
    }

    pub async fn active_select(&self) -> AppResult<Vec<SelectOption>> {
        self.cache
            .remember(keys::PRODUCTS_ACTIVE_SELECT, || self.products.active_select())
            .await
    }

    pub async fn low_stock(&self, limit: usize) -> AppResult<Vec<Product>> {
        self.products.low_stock(limit).await
    }

    pub async fn out_of_stock(&self, limit: usize) -> AppResult<Vec<Product>> {
        self.products.out_of_stock(limit).await
    }

    pub async fn recent(&self, limit: usize) -> AppResult<Vec<Product>> {
        self.products.recent(limit).await
    }

    // ========== 校验 ==========

    /// 校验写入数据，`ignore` 为更新时的自身 id（唯一性检查排除自己）
    pub async fn validate_product_data(
        &self,
        data: &ProductData,
        ignore: Option<ProductId>,
    ) -> AppResult<FieldErrors> {
        let mut errors = FieldErrors::new();

        if validation::required(&mut errors, "name", &data.name) {
            validation::max_len(&mut errors, "name", &data.name, MAX_NAME_LEN);
        }

        validation::non_negative(&mut errors, "price", Some(data.price));
        validation::non_negative(&mut errors, "cost_price", data.cost_price);
        validation::non_negative(&mut errors, "sale_price", data.sale_price);
        validation::non_negative_int(&mut errors, "stock", Some(data.stock));
        validation::non_negative_int(&mut errors, "min_stock", Some(data.min_stock));
        validation::non_negative_int(&mut errors, "max_stock", data.max_stock);
        if data.max_stock.is_some_and(|max| max < data.min_stock) {
            errors.add(
                "max_stock",
                "The max stock must be greater than or equal to min stock.",
            );
        }

        for (field, value) in [
            ("weight", data.dimensions.weight),
            ("height", data.dimensions.height),
            ("width", data.dimensions.width),
            ("length", data.dimensions.length),
        ] {
            validation::non_negative(&mut errors, field, value);
        }

        if data.specifications.iter().any(|s| s.key.trim().is_empty()) {
            errors.add("specifications", "Every specification needs a key.");
        }
        for image in &data.images {
            validation::url(&mut errors, "images", Some(image));
        }

        match data.category_id {
            None => errors.add("category_id", "The category id field is required."),
            Some(category_id) => {
                if self.categories.find_by_id(category_id).await?.is_none() {
                    errors.add("category_id", "The selected category id is invalid.");
                }
            }
        }
        if let Some(brand_id) = data.brand_id {
            if self.brands.find_by_id(brand_id).await?.is_none() {
                errors.add("brand_id", "The selected brand id is invalid.");
            }
        }

        if let Some(sku) = data.sku.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            validation::max_len(&mut errors, "sku", sku, SKU_MAX_LEN);
            let existing = self.products.find_by_sku(sku).await?;
            if existing.is_some_and(|p| Some(p.id) != ignore) {
                validation::taken(&mut errors, "sku");
            }
        }
        if let Some(barcode) = data.barcode.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            validation::max_len(&mut errors, "barcode", barcode, BARCODE_MAX_LEN);
            let existing = self.products.find_by_barcode(barcode).await?;
            if existing.is_some_and(|p| Some(p.id) != ignore) {
                validation::taken(&mut errors, "barcode");
            }
        }

        Ok(errors)
    }

    // ========== 写操作 ==========

    pub async fn create(&self, data: ProductData, actor: Option<UserId>) -> AppResult<Product> {
        info!(name = %data.name, "Creating product");

        self.validate_product_data(&data, None).await?.into_result()?;
        let category_id = data
            .category_id
            .ok_or_else(|| AppError::invalid_field("category_id", "The category id field is required."))?;

        let sku = match data.sku.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            Some(sku) => sku.to_string(),
            None => self.generate_sku(&data.name, category_id).await?,
        };

        let product = Product::new(data, sku, category_id, actor);
        self.products.insert(&product).await?;

        info!(product_id = %product.id, sku = %product.sku, "Product created");
        self.publish(&product, ChangeKind::Created, Vec::new(), actor)
            .await;
        Ok(product)
    }

    pub async fn update(
        &self,
        id: ProductId,
        data: ProductData,
        actor: Option<UserId>,
    ) -> AppResult<Product> {
        let mut product = self.get(id).await?;

        self.validate_product_data(&data, Some(id)).await?.into_result()?;
        let category_id = data.category_id.unwrap_or(product.category_id);

        let before = product.clone();
        product.apply(data, category_id, actor);
        self.products.update(&product).await?;

        info!(product_id = %id, "Product updated");
        self.publish(&product, ChangeKind::Updated, diff(&before, &product), actor)
            .await;
        Ok(product)
    }

    /// 移入回收站
    pub async fn delete(&self, id: ProductId, actor: Option<UserId>) -> AppResult<()> {
        let mut product = self.get(id).await?;
        product.soft_delete();
        product.audit_info.update(actor);
        self.products.update(&product).await?;

        info!(product_id = %id, "Product moved to trash");
        self.publish(&product, ChangeKind::Deleted, Vec::new(), actor)
            .await;
        Ok(())
    }

    pub async fn restore(&self, id: ProductId, actor: Option<UserId>) -> AppResult<Product> {
        let mut product = self
            .products
            .find_by_id_with_trashed(id)
            .await?
            .ok_or_else(|| AppError::not_found(format!("Product {} not found", id)))?;
        if !product.is_trashed() {
            return Err(AppError::business_rule("The product is not in the trash."));
        }

        product.restore();
        product.audit_info.update(actor);
        self.products.update(&product).await?;

        info!(product_id = %id, "Product restored");
        self.publish(&product, ChangeKind::Restored, Vec::new(), actor)
            .await;
        Ok(product)
    }

    /// 物理删除（包括回收站中的商品）
    pub async fn force_delete(&self, id: ProductId, actor: Option<UserId>) -> AppResult<()> {
        let product = self
            .products
            .find_by_id_with_trashed(id)
            .await?
            .ok_or_else(|| AppError::not_found(format!("Product {} not found", id)))?;

        self.products.force_delete(id).await?;

        info!(product_id = %id, "Product permanently deleted");
        self.publish(&product, ChangeKind::ForceDeleted, Vec::new(), actor)
            .await;
        Ok(())
    }

    pub async fn toggle_status(&self, id: ProductId, actor: Option<UserId>) -> AppResult<Product> {
        let mut product = self.get(id).await?;
        let before = product.clone();
        product.toggle_status(actor);
        self.products.update(&product).await?;

        self.publish(&product, ChangeKind::Updated, diff(&before, &product), actor)
            .await;
        Ok(product)
    }

    pub async fn adjust_stock(
        &self,
        id: ProductId,
        operation: StockOperation,
        quantity: i32,
        actor: Option<UserId>,
    ) -> AppResult<Product> {
        if quantity < 0 {
            return Err(AppError::invalid_field(
                "quantity",
                "The quantity must be at least 0.",
            ));
        }

        let mut product = self.get(id).await?;
        let before = product.clone();
        product.adjust_stock(operation, quantity, actor);
        self.products.update(&product).await?;

        info!(
            product_id = %id,
            operation = ?operation,
            quantity,
            stock = product.stock,
            "Stock adjusted"
        );
        self.publish(&product, ChangeKind::Updated, diff(&before, &product), actor)
            .await;
        Ok(product)
    }

    /// 生成 `{CAT}-{SLUG}-{NNN}` 格式的 SKU，取第一个未被占用的序号
    pub async fn generate_sku(&self, name: &str, category_id: CategoryId) -> AppResult<String> {
        let category = self
            .categories
            .find_by_id(category_id)
            .await?
            .ok_or_else(|| AppError::not_found(format!("Category {} not found", category_id)))?;

        for candidate in sku::candidates(&category.name, name) {
            if self.products.find_by_sku(&candidate).await?.is_none() {
                return Ok(candidate);
            }
        }

        Err(AppError::conflict(format!(
            "No free SKU sequence left for '{}' in category '{}'",
            name, category.name
        )))
    }

    // ========== 批量操作 ==========

    /// 批量更新，逐个处理
    pub async fn bulk_update(
        &self,
        ids: &[ProductId],
        changes: &ProductBulkUpdate,
        actor: Option<UserId>,
    ) -> AppResult<BulkReport> {
        if changes.is_empty() {
            return Err(AppError::validation("No fields to update"));
        }
        if let Some(category_id) = changes.category_id {
            if self.categories.find_by_id(category_id).await?.is_none() {
                return Err(AppError::invalid_field(
                    "category_id",
                    "The selected category id is invalid.",
                ));
            }
        }
        if let Some(Some(brand_id)) = changes.brand_id {
            if self.brands.find_by_id(brand_id).await?.is_none() {
                return Err(AppError::invalid_field(
                    "brand_id",
                    "The selected brand id is invalid.",
                ));
            }
        }

        let mut report = BulkReport::default();
        for &id in ids {
            let mut product = match self.products.find_by_id(id).await {
                Ok(Some(product)) => product,
                Ok(None) => {
                    report.failed(id.0, "Product not found");
                    continue;
                }
                Err(e) => {
                    report.failed(id.0, e.to_string());
                    continue;
                }
            };

            let before = product.clone();
            if let Some(is_active) = changes.is_active {
                product.is_active = is_active;
            }
            if let Some(category_id) = changes.category_id {
                product.category_id = category_id;
            }
            if let Some(brand_id) = changes.brand_id {
                product.brand_id = brand_id;
            }
            product.audit_info.update(actor);

            match self.products.update(&product).await {
                Ok(()) => {
                    report.succeeded();
                    self.publish(&product, ChangeKind::Updated, diff(&before, &product), actor)
                        .await;
                }
                Err(e) => report.failed(id.0, e.to_string()),
            }
        }

        info!(
            requested = ids.len(),
            affected = report.affected,
            failed = report.failures.len(),
            "Bulk product update finished"
        );
        Ok(report)
    }

    /// 批量移入回收站，逐个处理
    pub async fn bulk_delete(&self, ids: &[ProductId], actor: Option<UserId>) -> AppResult<BulkReport> {
        let mut report = BulkReport::default();
        for &id in ids {
            match self.delete(id, actor).await {
                Ok(()) => report.succeeded(),
                Err(e) => report.failed(id.0, e.to_string()),
            }
        }

        info!(
            requested = ids.len(),
            affected = report.affected,
            failed = report.failures.len(),
            "Bulk product delete finished"
        );
        Ok(report)
    }

    // ========== 导入导出 ==========

    /// 导入 CSV，每行独立校验；合法行直接创建
    pub async fn import_csv(&self, input: &[u8], actor: Option<UserId>) -> AppResult<ImportReport> {
        let mut reader = csv::ReaderBuilder::new()
            .flexible(true)
            .trim(csv::Trim::All)
            .from_reader(input);
        let headers = reader
            .headers()
            .map_err(|e| AppError::validation(format!("Invalid CSV header: {}", e)))?
            .clone();
        if !headers.iter().any(|h| h == "name") {
            return Err(AppError::validation("The CSV file must contain a 'name' column"));
        }

        let mut report = ImportReport::default();
        for record in reader.records() {
            let record = match record {
                Ok(record) => record,
                Err(e) => {
                    let line = e.position().map(|p| p.line()).unwrap_or_default();
                    report.row_failed(line, e.to_string());
                    continue;
                }
            };
            let line = record.position().map(|p| p.line()).unwrap_or_default();
            if record.iter().all(str::is_empty) {
                continue;
            }

            let row: ProductCsvRow = match record.deserialize(Some(&headers)) {
                Ok(row) => row,
                Err(e) => {
                    report.row_failed(line, e.to_string());
                    continue;
                }
            };

            match self.import_row(row, actor).await {
                Ok(()) => report.created += 1,
                Err(reason) => report.row_failed(line, reason),
            }
        }

        info!(
            created = report.created,
            failed = report.errors.len(),
            "Product import finished"
        );
        Ok(report)
    }

    async fn import_row(&self, row: ProductCsvRow, actor: Option<UserId>) -> Result<(), String> {
        let category_name = non_empty(row.category).ok_or("The category field is required.")?;
        let category = self
            .categories
            .find_by_name(&category_name)
            .await
            .map_err(|e| e.to_string())?
            .ok_or_else(|| format!("Category '{}' not found.", category_name))?;

        let brand_id = match non_empty(row.brand) {
            Some(brand_name) => Some(
                self.brands
                    .find_by_name(&brand_name)
                    .await
                    .map_err(|e| e.to_string())?
                    .ok_or_else(|| format!("Brand '{}' not found.", brand_name))?
                    .id,
            ),
            None => None,
        };

        let is_active = match non_empty(row.is_active) {
            Some(raw) => Some(
                export::parse_flag(&raw).ok_or_else(|| format!("Invalid is_active value '{}'.", raw))?,
            ),
            None => None,
        };

        let data = ProductData {
            name: row.name.unwrap_or_default(),
            description: non_empty(row.description),
            price: parse_decimal("price", row.price)?.unwrap_or(Decimal::ZERO),
            cost_price: parse_decimal("cost_price", row.cost_price)?,
            sale_price: parse_decimal("sale_price", row.sale_price)?,
            stock: parse_int("stock", row.stock)?.unwrap_or(0),
            min_stock: parse_int("min_stock", row.min_stock)?.unwrap_or(0),
            max_stock: parse_int("max_stock", row.max_stock)?,
            sku: non_empty(row.sku),
            barcode: non_empty(row.barcode),
            is_active,
            category_id: Some(category.id),
            brand_id,
            ..Default::default()
        };

        match self.create(data, actor).await {
            Ok(_) => Ok(()),
            Err(e) => Err(match e.field_errors() {
                Some(errors) => errors.to_string(),
                None => e.to_string(),
            }),
        }
    }

    /// 按与列表相同的过滤条件导出
    pub async fn export_csv(&self, filter: &ProductFilter) -> AppResult<Vec<u8>> {
        let products = self.products.all(filter).await?;

        let categories: HashMap<CategoryId, String> = self
            .categories
            .all(&CategoryFilter::default())
            .await?
            .into_iter()
            .map(|c| (c.id, c.name))
            .collect();
        let brands: HashMap<BrandId, String> = self
            .brands
            .all(&BrandFilter::default())
            .await?
            .into_iter()
            .map(|b| (b.id, b.name))
            .collect();

        let rows = products.into_iter().map(|p| {
            vec![
                p.id.to_string(),
                p.name,
                p.sku,
                export::opt_text(p.barcode.as_deref()),
                categories.get(&p.category_id).cloned().unwrap_or_default(),
                p.brand_id
                    .and_then(|id| brands.get(&id).cloned())
                    .unwrap_or_default(),
                export::opt_text(p.description.as_deref()),
                p.price.to_string(),
                export::opt_decimal(p.cost_price),
                export::opt_decimal(p.sale_price),
                p.stock.to_string(),
                p.min_stock.to_string(),
                export::opt_int(p.max_stock),
                export::flag(p.is_active),
                export::timestamp(p.audit_info.created_at),
            ]
        });

        write_csv(EXPORT_HEADER, rows)
    }

    async fn publish(
        &self,
        product: &Product,
        kind: ChangeKind,
        changes: Vec<FieldChange>,
        actor: Option<UserId>,
    ) {
        let event = EntityChanged::new(
            EntityKind::Product,
            kind,
            product.id.0,
            format!("{} ({})", product.name, product.sku),
            actor,
        )
        .with_changes(changes);
        self.events.publish(event).await;
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

fn parse_decimal(field: &str, value: Option<String>) -> Result<Option<Decimal>, String> {
    non_empty(value)
        .map(|raw| {
            raw.replace(',', ".")
                .parse::<Decimal>()
                .map_err(|_| format!("The {} must be a number.", field))
        })
        .transpose()
}

fn parse_int(field: &str, value: Option<String>) -> Result<Option<i32>, String> {
    non_empty(value)
        .map(|raw| {
            raw.parse::<i32>()
                .map_err(|_| format!("The {} must be an integer.", field))
        })
        .transpose()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bulk_update_distinguishes_null_brand() {
        let changes: ProductBulkUpdate = serde_json::from_str(r#"{"is_active": true}"#).unwrap();
        assert_eq!(changes.brand_id, None);

        let changes: ProductBulkUpdate = serde_json::from_str(r#"{"brand_id": null}"#).unwrap();
        assert_eq!(changes.brand_id, Some(None));
        assert!(!changes.is_empty());
    }

    #[test]
    fn test_parse_decimal_accepts_comma() {
        assert_eq!(
            parse_decimal("price", Some("12,50".to_string())).unwrap(),
            Some(Decimal::new(1250, 2))
        );
        assert_eq!(parse_decimal("price", Some("  ".to_string())).unwrap(), None);
        assert!(parse_decimal("price", Some("abc".to_string())).is_err());
    }

    #[test]
    fn test_bulk_update_emptiness() {
        assert!(ProductBulkUpdate::default().is_empty());
        assert!(
            !ProductBulkUpdate {
                is_active: Some(false),
                ..Default::default()
            }
            .is_empty()
        );
    }
}
