//! 商品实体

use ag_common::AuditInfo;
use ag_domain_core::{AggregateRoot, Entity, SoftDeletable};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::value_objects::{BrandId, CategoryId, ProductId, UserId};

/// 尺寸与重量
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Dimensions {
    pub weight: Option<Decimal>,
    pub height: Option<Decimal>,
    pub width: Option<Decimal>,
    pub length: Option<Decimal>,
}

/// 规格参数（保持录入顺序）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Specification {
    pub key: String,
    pub value: String,
}

/// 商品写入数据（创建与更新共用）
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ProductData {
    pub name: String,
    pub description: Option<String>,
    pub price: Decimal,
    pub cost_price: Option<Decimal>,
    pub sale_price: Option<Decimal>,
    pub stock: i32,
    pub min_stock: i32,
    pub max_stock: Option<i32>,
    /// 为空时自动生成
    pub sku: Option<String>,
    pub barcode: Option<String>,
    pub is_active: Option<bool>,
    pub category_id: Option<CategoryId>,
    pub brand_id: Option<BrandId>,
    pub dimensions: Dimensions,
    pub specifications: Vec<Specification>,
    pub images: Vec<String>,
    pub last_purchase_date: Option<DateTime<Utc>>,
    pub last_sale_date: Option<DateTime<Utc>>,
}

/// 商品
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    pub description: Option<String>,
    pub price: Decimal,
    pub cost_price: Option<Decimal>,
    pub sale_price: Option<Decimal>,
    pub stock: i32,
    pub min_stock: i32,
    pub max_stock: Option<i32>,
    pub sku: String,
    pub barcode: Option<String>,
    pub is_active: bool,
    pub category_id: CategoryId,
    pub brand_id: Option<BrandId>,
    pub dimensions: Dimensions,
    pub specifications: Vec<Specification>,
    pub images: Vec<String>,
    pub last_purchase_date: Option<DateTime<Utc>>,
    pub last_sale_date: Option<DateTime<Utc>>,
    pub deleted_at: Option<DateTime<Utc>>,
    pub audit_info: AuditInfo,
}

/// 库存操作
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StockOperation {
    Add,
    Subtract,
    Set,
}

impl Product {
    /// 由已校验的数据创建商品
    pub fn new(
        data: ProductData,
        sku: String,
        category_id: CategoryId,
        actor: Option<UserId>,
    ) -> Self {
        Self {
            id: ProductId::new(),
            name: data.name.trim().to_string(),
            description: data.description,
            price: data.price,
            cost_price: data.cost_price,
            sale_price: data.sale_price,
            stock: data.stock,
            min_stock: data.min_stock,
            max_stock: data.max_stock,
            sku,
            barcode: normalize_optional(data.barcode),
            is_active: data.is_active.unwrap_or(true),
            category_id,
            brand_id: data.brand_id,
            dimensions: data.dimensions,
            specifications: data.specifications,
            images: data.images,
            last_purchase_date: data.last_purchase_date,
            last_sale_date: data.last_sale_date,
            deleted_at: None,
            audit_info: AuditInfo::new(actor),
        }
    }

    /// 用新数据覆盖可编辑字段；SKU 为空时保留原值
    pub fn apply(&mut self, data: ProductData, category_id: CategoryId, actor: Option<UserId>) {
        self.name = data.name.trim().to_string();
        self.description = data.description;
        self.price = data.price;
        self.cost_price = data.cost_price;
        self.sale_price = data.sale_price;
        self.stock = data.stock;
        self.min_stock = data.min_stock;
        self.max_stock = data.max_stock;
        if let Some(sku) = normalize_optional(data.sku) {
            self.sku = sku;
        }
        self.barcode = normalize_optional(data.barcode);
        if let Some(is_active) = data.is_active {
            self.is_active = is_active;
        }
        self.category_id = category_id;
        self.brand_id = data.brand_id;
        self.dimensions = data.dimensions;
        self.specifications = data.specifications;
        self.images = data.images;
        self.last_purchase_date = data.last_purchase_date;
        self.last_sale_date = data.last_sale_date;
        self.audit_info.update(actor);
    }

    pub fn toggle_status(&mut self, actor: Option<UserId>) {
        self.is_active = !self.is_active;
        self.audit_info.update(actor);
    }

    /// 调整库存，结果不低于 0；数量必须非负
    pub fn adjust_stock(&mut self, operation: StockOperation, quantity: i32, actor: Option<UserId>) {
        let quantity = quantity.max(0);
        self.stock = match operation {
            StockOperation::Add => self.stock.saturating_add(quantity),
            StockOperation::Subtract => self.stock.saturating_sub(quantity).max(0),
            StockOperation::Set => quantity,
        };
        if operation == StockOperation::Add {
            self.last_purchase_date = Some(Utc::now());
        }
        self.audit_info.update(actor);
    }

    /// 低库存：有货且不高于最低库存
    pub fn is_low_stock(&self) -> bool {
        self.stock > 0 && self.stock <= self.min_stock
    }

    pub fn is_out_of_stock(&self) -> bool {
        self.stock == 0
    }

    /// 毛利率（百分比），缺少成本价或售价为 0 时为空
    pub fn profit_margin(&self) -> Option<Decimal> {
        let cost = self.cost_price?;
        let price = self.sale_price.unwrap_or(self.price);
        if price.is_zero() {
            return None;
        }
        Some(((price - cost) / price * Decimal::ONE_HUNDRED).round_dp(2))
    }
}

pub(crate) fn normalize_optional(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

impl Entity for Product {
    type Id = ProductId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

impl AggregateRoot for Product {
    fn audit_info(&self) -> &AuditInfo {
        &self.audit_info
    }

    fn audit_info_mut(&mut self) -> &mut AuditInfo {
        &mut self.audit_info
    }
}

impl SoftDeletable for Product {
    fn deleted_at(&self) -> Option<DateTime<Utc>> {
        self.deleted_at
    }

    fn set_deleted_at(&mut self, at: Option<DateTime<Utc>>) {
        self.deleted_at = at;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dec(value: &str) -> Decimal {
        value.parse().unwrap()
    }

    fn sample(stock: i32, min_stock: i32) -> Product {
        let data = ProductData {
            name: " Mouse ".to_string(),
            price: dec("20.00"),
            stock,
            min_stock,
            ..Default::default()
        };
        Product::new(data, "ELE-MOUSE-001".to_string(), CategoryId::new(), None)
    }

    #[test]
    fn test_new_trims_name_and_defaults_active() {
        let product = sample(5, 2);
        assert_eq!(product.name, "Mouse");
        assert!(product.is_active);
        assert!(!product.is_trashed());
    }

    #[test]
    fn test_stock_never_goes_negative() {
        let mut product = sample(3, 1);
        product.adjust_stock(StockOperation::Subtract, 10, None);
        assert_eq!(product.stock, 0);

        product.adjust_stock(StockOperation::Add, 4, None);
        assert_eq!(product.stock, 4);
        assert!(product.last_purchase_date.is_some());

        product.adjust_stock(StockOperation::Set, 9, None);
        assert_eq!(product.stock, 9);
    }

    #[test]
    fn test_stock_thresholds() {
        assert!(sample(2, 2).is_low_stock());
        assert!(!sample(0, 2).is_low_stock());
        assert!(sample(0, 2).is_out_of_stock());
        assert!(!sample(3, 2).is_low_stock());
    }

    #[test]
    fn test_toggle_is_involution() {
        let mut product = sample(1, 0);
        let original = product.is_active;
        product.toggle_status(None);
        product.toggle_status(None);
        assert_eq!(product.is_active, original);
    }

    #[test]
    fn test_profit_margin() {
        let mut product = sample(1, 0);
        assert_eq!(product.profit_margin(), None);
        product.cost_price = Some(dec("15.00"));
        assert_eq!(product.profit_margin(), Some(dec("25.00")));
    }
}
