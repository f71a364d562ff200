//! 路由共享状态

use std::sync::Arc;

use ag_auth_core::TokenService;

use crate::application::{
    AuthorizationService, BrandService, CategoryService, DashboardService, ListingCachePolicy,
    ProductService, RoleService, UserService,
};
use crate::container::Container;

#[derive(Clone)]
pub struct AppState {
    pub products: Arc<ProductService>,
    pub categories: Arc<CategoryService>,
    pub brands: Arc<BrandService>,
    pub users: Arc<UserService>,
    pub roles: Arc<RoleService>,
    pub dashboard: Arc<DashboardService>,
    pub authorization: AuthorizationService,
    pub tokens: Arc<TokenService>,
    pub policy: ListingCachePolicy,
}

impl AppState {
    pub fn new(container: &Container, tokens: Arc<TokenService>) -> Self {
        Self {
            products: container.products.clone(),
            categories: container.categories.clone(),
            brands: container.brands.clone(),
            users: container.users.clone(),
            roles: container.roles.clone(),
            dashboard: container.dashboard.clone(),
            authorization: container.authorization.clone(),
            tokens,
            policy: container.policy,
        }
    }
}
