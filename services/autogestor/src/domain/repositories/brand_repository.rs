//! 品牌仓储接口

use ag_common::{PagedResult, Pagination};
use ag_errors::AppResult;
use async_trait::async_trait;

use super::filters::{BrandFilter, BrandStats, SelectOption};
use crate::domain::entities::{Brand, BrandWithCount};
use crate::domain::value_objects::BrandId;

/// 品牌仓储接口
#[async_trait]
pub trait BrandRepository: Send + Sync {
    /// 分页列表（按名称）
    async fn list(&self, filter: &BrandFilter, pagination: Pagination) -> AppResult<PagedResult<Brand>>;

    async fn all(&self, filter: &BrandFilter) -> AppResult<Vec<Brand>>;

    async fn find_by_id(&self, id: BrandId) -> AppResult<Option<Brand>>;

    /// 名称精确匹配（不区分大小写）
    async fn find_by_name(&self, name: &str) -> AppResult<Option<Brand>>;

    async fn insert(&self, brand: &Brand) -> AppResult<()>;

    async fn update(&self, brand: &Brand) -> AppResult<()>;

    /// 删除品牌，其商品的 brand_id 置空
    async fn delete(&self, id: BrandId) -> AppResult<bool>;

    /// 全部品牌的下拉选项
    async fn select(&self) -> AppResult<Vec<SelectOption>>;

    /// 出现过的原产国（去重、排序）
    async fn countries(&self) -> AppResult<Vec<String>>;

    async fn stats(&self) -> AppResult<BrandStats>;

    /// 按商品数降序，相同数量按自然行序
    async fn top_by_product_count(&self, limit: usize) -> AppResult<Vec<BrandWithCount>>;

    async fn recent(&self, limit: usize) -> AppResult<Vec<Brand>>;
}
