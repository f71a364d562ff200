//! 路由组装
//!
//! 中间件顺序（外到内）：认证 → 管理员拦截（仅目录路由）→ 权限检查 → 处理函数

use ag_errors::AppResult;
use axum::Router;
use axum::middleware::from_fn_with_state;

use super::handlers::{brands, categories, dashboard, products, roles, users};
use super::middleware::{authenticate, block_admin};
use super::state::AppState;

pub fn build_router(state: AppState) -> AppResult<Router> {
    let catalog = Router::new()
        .merge(products::routes(&state)?)
        .merge(categories::routes(&state)?)
        .merge(brands::routes(&state)?)
        .route_layer(from_fn_with_state(state.authorization.clone(), block_admin));

    let admin = Router::new()
        .merge(users::routes(&state)?)
        .merge(roles::routes(&state)?);

    Ok(Router::new()
        .merge(dashboard::routes(&state)?)
        .merge(catalog)
        .merge(admin)
        .layer(from_fn_with_state(state.clone(), authenticate))
        .with_state(state))
}
