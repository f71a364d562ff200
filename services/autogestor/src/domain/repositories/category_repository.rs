//! 分类仓储接口

use ag_common::{PagedResult, Pagination};
use ag_errors::AppResult;
use async_trait::async_trait;

use super::filters::{CategoryFilter, CategoryStats, SelectOption};
use crate::domain::entities::{Category, CategoryWithCount};
use crate::domain::value_objects::CategoryId;

/// 分类仓储接口
#[async_trait]
pub trait CategoryRepository: Send + Sync {
    /// 分页列表（按名称）
    async fn list(&self, filter: &CategoryFilter, pagination: Pagination) -> AppResult<PagedResult<Category>>;

    async fn all(&self, filter: &CategoryFilter) -> AppResult<Vec<Category>>;

    async fn find_by_id(&self, id: CategoryId) -> AppResult<Option<Category>>;

    /// 名称精确匹配（不区分大小写）
    async fn find_by_name(&self, name: &str) -> AppResult<Option<Category>>;

    async fn insert(&self, category: &Category) -> AppResult<()>;

    async fn update(&self, category: &Category) -> AppResult<()>;

    /// 删除分类，回收站中引用它的商品一并删除
    async fn delete(&self, id: CategoryId) -> AppResult<bool>;

    /// 启用分类的下拉选项
    async fn active_select(&self) -> AppResult<Vec<SelectOption>>;

    async fn stats(&self) -> AppResult<CategoryStats>;

    /// 按商品数降序，相同数量按自然行序
    async fn top_by_product_count(&self, limit: usize) -> AppResult<Vec<CategoryWithCount>>;

    async fn recent(&self, limit: usize) -> AppResult<Vec<Category>>;
}
