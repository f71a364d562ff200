//! 数据库行映射结构

use std::collections::BTreeSet;

use ag_common::AuditInfo;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::FromRow;
use sqlx::types::Json;
use tracing::warn;
use uuid::Uuid;

use crate::domain::entities::{
    Brand, BrandWithCount, Category, CategoryWithCount, Dimensions, Product, Specification, User,
};
use crate::domain::rbac::{PermissionKind, Role};
use crate::domain::repositories::{BrandStats, CategoryStats, ProductStats, UserStats};
use crate::domain::value_objects::{
    BrandId, CategoryId, HashedPassword, ProductId, RoleId, UserId,
};

pub const PRODUCT_COLUMNS: &str = "id, name, description, price, cost_price, sale_price, \
    stock, min_stock, max_stock, sku, barcode, is_active, category_id, brand_id, \
    weight, height, width, length, specifications, images, last_purchase_date, last_sale_date, \
    deleted_at, created_at, created_by, updated_at, updated_by";

pub const CATEGORY_COLUMNS: &str =
    "id, name, description, is_active, created_at, created_by, updated_at, updated_by";

pub const BRAND_COLUMNS: &str = "id, name, country_of_origin, founded_year, website, description, \
    created_at, created_by, updated_at, updated_by";

pub const USER_COLUMNS: &str = "id, name, email, password_hash, email_verified_at, \
    created_at, created_by, updated_at, updated_by";

pub const ROLE_COLUMNS: &str = "id, name, created_at, created_by, updated_at, updated_by";

fn audit(
    created_at: DateTime<Utc>,
    created_by: Option<Uuid>,
    updated_at: DateTime<Utc>,
    updated_by: Option<Uuid>,
) -> AuditInfo {
    AuditInfo {
        created_at,
        created_by: created_by.map(UserId),
        updated_at,
        updated_by: updated_by.map(UserId),
    }
}

fn count(value: i64) -> u64 {
    value.max(0) as u64
}

/// 商品数据库行
#[derive(Debug, FromRow)]
pub struct ProductRow {
    pub id: Uuid,
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
    pub category_id: Uuid,
    pub brand_id: Option<Uuid>,
    pub weight: Option<Decimal>,
    pub height: Option<Decimal>,
    pub width: Option<Decimal>,
    pub length: Option<Decimal>,
    pub specifications: Json<Vec<Specification>>,
    pub images: Json<Vec<String>>,
    pub last_purchase_date: Option<DateTime<Utc>>,
    pub last_sale_date: Option<DateTime<Utc>>,
    pub deleted_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub created_by: Option<Uuid>,
    pub updated_at: DateTime<Utc>,
    pub updated_by: Option<Uuid>,
}

impl From<ProductRow> for Product {
    fn from(row: ProductRow) -> Self {
        Self {
            id: ProductId(row.id),
            name: row.name,
            description: row.description,
            price: row.price,
            cost_price: row.cost_price,
            sale_price: row.sale_price,
            stock: row.stock,
            min_stock: row.min_stock,
            max_stock: row.max_stock,
            sku: row.sku,
            barcode: row.barcode,
            is_active: row.is_active,
            category_id: CategoryId(row.category_id),
            brand_id: row.brand_id.map(BrandId),
            dimensions: Dimensions {
                weight: row.weight,
                height: row.height,
                width: row.width,
                length: row.length,
            },
            specifications: row.specifications.0,
            images: row.images.0,
            last_purchase_date: row.last_purchase_date,
            last_sale_date: row.last_sale_date,
            deleted_at: row.deleted_at,
            audit_info: audit(row.created_at, row.created_by, row.updated_at, row.updated_by),
        }
    }
}

/// 分类数据库行
#[derive(Debug, FromRow)]
pub struct CategoryRow {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub created_by: Option<Uuid>,
    pub updated_at: DateTime<Utc>,
    pub updated_by: Option<Uuid>,
}

impl From<CategoryRow> for Category {
    fn from(row: CategoryRow) -> Self {
        Self {
            id: CategoryId(row.id),
            name: row.name,
            description: row.description,
            is_active: row.is_active,
            audit_info: audit(row.created_at, row.created_by, row.updated_at, row.updated_by),
        }
    }
}

#[derive(Debug, FromRow)]
pub struct CategoryWithCountRow {
    #[sqlx(flatten)]
    pub category: CategoryRow,
    pub products_count: i64,
}

impl From<CategoryWithCountRow> for CategoryWithCount {
    fn from(row: CategoryWithCountRow) -> Self {
        Self {
            category: row.category.into(),
            products_count: count(row.products_count),
        }
    }
}

/// 品牌数据库行
#[derive(Debug, FromRow)]
pub struct BrandRow {
    pub id: Uuid,
    pub name: String,
    pub country_of_origin: Option<String>,
    pub founded_year: Option<i32>,
    pub website: Option<String>,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
    pub created_by: Option<Uuid>,
    pub updated_at: DateTime<Utc>,
    pub updated_by: Option<Uuid>,
}

impl From<BrandRow> for Brand {
    fn from(row: BrandRow) -> Self {
        Self {
            id: BrandId(row.id),
            name: row.name,
            country_of_origin: row.country_of_origin,
            founded_year: row.founded_year,
            website: row.website,
            description: row.description,
            audit_info: audit(row.created_at, row.created_by, row.updated_at, row.updated_by),
        }
    }
}

#[derive(Debug, FromRow)]
pub struct BrandWithCountRow {
    #[sqlx(flatten)]
    pub brand: BrandRow,
    pub products_count: i64,
}

impl From<BrandWithCountRow> for BrandWithCount {
    fn from(row: BrandWithCountRow) -> Self {
        Self {
            brand: row.brand.into(),
            products_count: count(row.products_count),
        }
    }
}

/// 用户数据库行
#[derive(Debug, FromRow)]
pub struct UserRow {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub password_hash: String,
    pub email_verified_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub created_by: Option<Uuid>,
    pub updated_at: DateTime<Utc>,
    pub updated_by: Option<Uuid>,
}

impl From<UserRow> for User {
    fn from(row: UserRow) -> Self {
        Self {
            id: UserId(row.id),
            name: row.name,
            email: row.email,
            password_hash: HashedPassword::from_hash(row.password_hash),
            email_verified_at: row.email_verified_at,
            audit_info: audit(row.created_at, row.created_by, row.updated_at, row.updated_by),
        }
    }
}

/// 角色数据库行（权限另行加载）
#[derive(Debug, FromRow)]
pub struct RoleRow {
    pub id: Uuid,
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub created_by: Option<Uuid>,
    pub updated_at: DateTime<Utc>,
    pub updated_by: Option<Uuid>,
}

impl RoleRow {
    pub fn into_role(self, permissions: BTreeSet<PermissionKind>) -> Role {
        Role {
            id: RoleId(self.id),
            name: self.name,
            permissions,
            audit_info: audit(self.created_at, self.created_by, self.updated_at, self.updated_by),
        }
    }
}

/// 解析持久化的权限名；未知名称记录告警后跳过
pub fn parse_permission(name: &str) -> Option<PermissionKind> {
    match name.parse() {
        Ok(kind) => Some(kind),
        Err(e) => {
            warn!(error = %e, "Skipping unknown stored permission");
            None
        }
    }
}

#[derive(Debug, FromRow)]
pub struct ProductStatsRow {
    pub total: i64,
    pub active: i64,
    pub inactive: i64,
    pub with_brand: i64,
    pub without_brand: i64,
    pub low_stock: i64,
    pub out_of_stock: i64,
    pub trashed: i64,
}

impl From<ProductStatsRow> for ProductStats {
    fn from(row: ProductStatsRow) -> Self {
        Self {
            total: count(row.total),
            active: count(row.active),
            inactive: count(row.inactive),
            with_brand: count(row.with_brand),
            without_brand: count(row.without_brand),
            low_stock: count(row.low_stock),
            out_of_stock: count(row.out_of_stock),
            trashed: count(row.trashed),
        }
    }
}

#[derive(Debug, FromRow)]
pub struct CategoryStatsRow {
    pub total: i64,
    pub active: i64,
    pub inactive: i64,
    pub with_products: i64,
}

impl From<CategoryStatsRow> for CategoryStats {
    fn from(row: CategoryStatsRow) -> Self {
        Self {
            total: count(row.total),
            active: count(row.active),
            inactive: count(row.inactive),
            with_products: count(row.with_products),
            without_products: count(row.total - row.with_products),
        }
    }
}

#[derive(Debug, FromRow)]
pub struct BrandStatsRow {
    pub total: i64,
    pub with_products: i64,
    pub with_website: i64,
}

impl From<BrandStatsRow> for BrandStats {
    fn from(row: BrandStatsRow) -> Self {
        Self {
            total: count(row.total),
            with_products: count(row.with_products),
            without_products: count(row.total - row.with_products),
            with_website: count(row.with_website),
        }
    }
}

#[derive(Debug, FromRow)]
pub struct UserStatsRow {
    pub total: i64,
    pub verified: i64,
    pub admins: i64,
    pub staff: i64,
    pub without_role: i64,
}

impl From<UserStatsRow> for UserStats {
    fn from(row: UserStatsRow) -> Self {
        Self {
            total: count(row.total),
            verified: count(row.verified),
            unverified: count(row.total - row.verified),
            admins: count(row.admins),
            staff: count(row.staff),
            without_role: count(row.without_role),
        }
    }
}
