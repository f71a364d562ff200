//! 商品仓储接口

use ag_common::{PagedResult, Pagination};
use ag_errors::AppResult;
use async_trait::async_trait;

use super::filters::{ProductFilter, ProductStats, SelectOption};
use crate::domain::entities::Product;
use crate::domain::value_objects::{BrandId, CategoryId, ProductId};

/// 商品仓储接口
///
/// 除 `*_with_trashed` 与唯一键查询外，回收站中的商品不可见
#[async_trait]
pub trait ProductRepository: Send + Sync {
    /// 分页列表（最新创建的在前）
    async fn list(&self, filter: &ProductFilter, pagination: Pagination) -> AppResult<PagedResult<Product>>;

    /// 不分页的全部匹配项（导出用）
    async fn all(&self, filter: &ProductFilter) -> AppResult<Vec<Product>>;

    async fn find_by_id(&self, id: ProductId) -> AppResult<Option<Product>>;

    async fn find_by_id_with_trashed(&self, id: ProductId) -> AppResult<Option<Product>>;

    /// 唯一键查询，包含回收站
    async fn find_by_sku(&self, sku: &str) -> AppResult<Option<Product>>;

    /// 唯一键查询，包含回收站
    async fn find_by_barcode(&self, barcode: &str) -> AppResult<Option<Product>>;

    async fn insert(&self, product: &Product) -> AppResult<()>;

    /// 更新（包括软删除与恢复）
    async fn update(&self, product: &Product) -> AppResult<()>;

    /// 物理删除，返回是否存在
    async fn force_delete(&self, id: ProductId) -> AppResult<bool>;

    async fn count_by_category(&self, category_id: CategoryId) -> AppResult<u64>;

    async fn count_by_brand(&self, brand_id: BrandId) -> AppResult<u64>;

    /// 低库存商品，库存升序
    async fn low_stock(&self, limit: usize) -> AppResult<Vec<Product>>;

    async fn out_of_stock(&self, limit: usize) -> AppResult<Vec<Product>>;

    /// 最近创建的 N 个
    async fn recent(&self, limit: usize) -> AppResult<Vec<Product>>;

    /// 启用商品的下拉选项（按名称）
    async fn active_select(&self) -> AppResult<Vec<SelectOption>>;

    async fn stats(&self) -> AppResult<ProductStats>;
}
