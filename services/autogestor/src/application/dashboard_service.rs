//! 仪表盘汇总

use std::sync::Arc;

use ag_errors::AppResult;
use serde::Serialize;

use super::brand_service::BrandService;
use super::category_service::CategoryService;
use super::product_service::ProductService;
use super::user_service::UserService;
use crate::domain::entities::{CategoryWithCount, Product};
use crate::domain::repositories::{BrandStats, CategoryStats, ProductStats, UserStats};

const TOP_CATEGORIES: usize = 5;
const RECENT_PRODUCTS: usize = 5;

#[derive(Debug, Clone, Serialize)]
pub struct Dashboard {
    pub products: ProductStats,
    pub categories: CategoryStats,
    pub brands: BrandStats,
    pub users: UserStats,
    pub low_stock_products: Vec<Product>,
    pub top_categories: Vec<CategoryWithCount>,
    pub recent_products: Vec<Product>,
}

pub struct DashboardService {
    products: Arc<ProductService>,
    categories: Arc<CategoryService>,
    brands: Arc<BrandService>,
    users: Arc<UserService>,
    low_stock_limit: usize,
}

impl DashboardService {
    pub fn new(
        products: Arc<ProductService>,
        categories: Arc<CategoryService>,
        brands: Arc<BrandService>,
        users: Arc<UserService>,
        low_stock_limit: usize,
    ) -> Self {
        Self {
            products,
            categories,
            brands,
            users,
            low_stock_limit,
        }
    }

    pub async fn overview(&self) -> AppResult<Dashboard> {
        let (products, categories, brands, users) = tokio::try_join!(
            self.products.stats(),
            self.categories.stats(),
            self.brands.stats(),
            self.users.stats(),
        )?;
        let (low_stock_products, top_categories, recent_products) = tokio::try_join!(
            self.products.low_stock(self.low_stock_limit),
            self.categories.top_by_product_count(TOP_CATEGORIES),
            self.products.recent(RECENT_PRODUCTS),
        )?;

        Ok(Dashboard {
            products,
            categories,
            brands,
            users,
            low_stock_products,
            top_categories,
            recent_products,
        })
    }
}
