//! 查询过滤条件与统计结构

use serde::{Deserialize, Serialize};

use crate::domain::value_objects::{BrandId, CategoryId};

/// 库存过滤
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StockFilter {
    /// 有货且不高于最低库存
    Low,
    /// 库存为 0
    Out,
    /// 有货
    Available,
}

/// 回收站过滤
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrashedFilter {
    #[default]
    Without,
    With,
    Only,
}

/// 商品过滤
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProductFilter {
    /// 名称、SKU、条码、描述的子串（不区分大小写）
    pub search: Option<String>,
    pub category_id: Option<CategoryId>,
    pub brand_id: Option<BrandId>,
    pub is_active: Option<bool>,
    pub stock: Option<StockFilter>,
    pub trashed: TrashedFilter,
}

impl ProductFilter {
    pub fn search(term: impl Into<String>) -> Self {
        Self {
            search: Some(term.into()),
            ..Default::default()
        }
    }

    /// 无任何条件（默认列表，可缓存）
    pub fn is_default(&self) -> bool {
        self.search_term().is_none()
            && self.category_id.is_none()
            && self.brand_id.is_none()
            && self.is_active.is_none()
            && self.stock.is_none()
            && self.trashed == TrashedFilter::Without
    }

    /// 去除空白后的搜索词
    pub fn search_term(&self) -> Option<&str> {
        non_blank(self.search.as_deref())
    }
}

/// 分类过滤
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CategoryFilter {
    /// 名称、描述的子串
    pub search: Option<String>,
    pub is_active: Option<bool>,
}

impl CategoryFilter {
    pub fn search(term: impl Into<String>) -> Self {
        Self {
            search: Some(term.into()),
            ..Default::default()
        }
    }

    pub fn is_default(&self) -> bool {
        self.search_term().is_none() && self.is_active.is_none()
    }

    pub fn search_term(&self) -> Option<&str> {
        non_blank(self.search.as_deref())
    }
}

/// 品牌过滤
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BrandFilter {
    /// 名称、原产国、描述的子串
    pub search: Option<String>,
    /// 原产国（精确匹配，不区分大小写）
    pub country: Option<String>,
}

impl BrandFilter {
    pub fn search(term: impl Into<String>) -> Self {
        Self {
            search: Some(term.into()),
            ..Default::default()
        }
    }

    pub fn is_default(&self) -> bool {
        self.search_term().is_none() && non_blank(self.country.as_deref()).is_none()
    }

    pub fn search_term(&self) -> Option<&str> {
        non_blank(self.search.as_deref())
    }

    pub fn country_term(&self) -> Option<&str> {
        non_blank(self.country.as_deref())
    }
}

/// 用户过滤
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct UserFilter {
    /// 姓名、邮箱的子串
    pub search: Option<String>,
    /// 角色名
    pub role: Option<String>,
    pub verified: Option<bool>,
}

impl UserFilter {
    pub fn is_default(&self) -> bool {
        self.search_term().is_none() && self.role_name().is_none() && self.verified.is_none()
    }

    pub fn search_term(&self) -> Option<&str> {
        non_blank(self.search.as_deref())
    }

    pub fn role_name(&self) -> Option<&str> {
        non_blank(self.role.as_deref())
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

/// 下拉选项
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectOption {
    pub id: uuid::Uuid,
    pub name: String,
}

/// 商品统计
///
/// `total == active + inactive == with_brand + without_brand`，均不含回收站
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductStats {
    pub total: u64,
    pub active: u64,
    pub inactive: u64,
    pub with_brand: u64,
    pub without_brand: u64,
    pub low_stock: u64,
    pub out_of_stock: u64,
    pub trashed: u64,
}

/// 分类统计
///
/// `total == active + inactive == with_products + without_products`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryStats {
    pub total: u64,
    pub active: u64,
    pub inactive: u64,
    pub with_products: u64,
    pub without_products: u64,
}

/// 品牌统计
///
/// `total == with_products + without_products`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BrandStats {
    pub total: u64,
    pub with_products: u64,
    pub without_products: u64,
    pub with_website: u64,
}

/// 用户统计
///
/// `total == verified + unverified`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserStats {
    pub total: u64,
    pub verified: u64,
    pub unverified: u64,
    pub admins: u64,
    pub staff: u64,
    pub without_role: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blank_search_is_default() {
        assert!(ProductFilter::default().is_default());
        assert!(ProductFilter::search("   ").is_default());
        assert!(!ProductFilter::search("mouse").is_default());
        assert!(
            !ProductFilter {
                trashed: TrashedFilter::Only,
                ..Default::default()
            }
            .is_default()
        );
    }

    #[test]
    fn test_category_and_brand_defaults() {
        assert!(CategoryFilter::default().is_default());
        assert!(!CategoryFilter::search("tv").is_default());
        assert!(
            !BrandFilter {
                country: Some("Japan".to_string()),
                ..Default::default()
            }
            .is_default()
        );
        assert!(!UserFilter {
            role: Some("admin".to_string()),
            ..Default::default()
        }
        .is_default());
    }
}
