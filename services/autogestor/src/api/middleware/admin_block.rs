//! 禁止管理员操作商品目录
//!
//! 管理员只负责用户与权限；按路由名前缀拦截，与请求方法和资源 id 无关

use axum::extract::{MatchedPath, Request, State};
use axum::http::header::{LOCATION, SET_COOKIE};
use axum::http::{HeaderValue, Method, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use tracing::{info, warn};

use super::auth::CurrentUser;
use crate::application::AuthorizationService;
use crate::domain::rbac::ADMIN_ROLE;

pub const HOME_PATH: &str = "/";
pub const FLASH_COOKIE: &str = "flash_error";
pub const ADMIN_BLOCKED_MESSAGE: &str =
    "Administrators cannot manage products, categories or brands. Use a staff account instead.";

const BLOCKED_PREFIXES: &[&str] = &["products.", "categories.", "brands."];

/// 由方法与路由模板推导资源路由名，例如 `GET /products/{id}/edit` → `products.edit`
pub fn route_name(method: &Method, path: &str) -> Option<String> {
    let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
    let is_param = |segment: &str| segment.starts_with('{') && segment.ends_with('}');

    let action = match segments.as_slice() {
        [] => return Some("home".to_string()),
        [resource] if !is_param(*resource) => match *method {
            Method::GET | Method::HEAD => "index",
            Method::POST => "store",
            _ => return None,
        },
        [_, id] if is_param(*id) => match *method {
            Method::GET | Method::HEAD => "show",
            Method::PUT | Method::PATCH => "update",
            Method::DELETE => "destroy",
            _ => return None,
        },
        [_, action] => *action,
        [_, id, action] if is_param(*id) => *action,
        _ => return None,
    };

    Some(format!("{}.{}", segments[0], action))
}

/// 路由名是否属于被拦截的目录资源
pub fn is_blocked_route(name: &str) -> bool {
    BLOCKED_PREFIXES.iter().any(|prefix| name.starts_with(prefix))
}

fn redirect_home(message: &str) -> Response {
    let cookie = format!(
        "{}={}; Path=/; HttpOnly; SameSite=Lax",
        FLASH_COOKIE,
        urlencoding::encode(message)
    );

    let mut response = StatusCode::SEE_OTHER.into_response();
    let headers = response.headers_mut();
    headers.insert(LOCATION, HeaderValue::from_static(HOME_PATH));
    match HeaderValue::from_str(&cookie) {
        Ok(value) => {
            headers.insert(SET_COOKIE, value);
        }
        Err(e) => warn!(error = %e, "Invalid flash cookie"),
    }
    response
}

pub async fn block_admin(
    State(authorization): State<AuthorizationService>,
    request: Request,
    next: Next,
) -> Response {
    let user_id = match request.extensions().get::<CurrentUser>() {
        Some(user) => user.id,
        None => return next.run(request).await,
    };

    let name = request
        .extensions()
        .get::<MatchedPath>()
        .and_then(|path| route_name(request.method(), path.as_str()));
    let Some(name) = name.filter(|name| is_blocked_route(name)) else {
        return next.run(request).await;
    };

    match authorization.has_role(user_id, ADMIN_ROLE).await {
        Ok(true) => {
            info!(user_id = %user_id, route = %name, "Administrator redirected away from catalog route");
            redirect_home(ADMIN_BLOCKED_MESSAGE)
        }
        Ok(false) => next.run(request).await,
        Err(e) => e.into_response(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_route_names() {
        let cases = [
            (Method::GET, "/", "home"),
            (Method::GET, "/products", "products.index"),
            (Method::POST, "/products", "products.store"),
            (Method::GET, "/products/create", "products.create"),
            (Method::GET, "/products/{id}", "products.show"),
            (Method::PUT, "/products/{id}", "products.update"),
            (Method::PATCH, "/categories/{id}", "categories.update"),
            (Method::DELETE, "/brands/{id}", "brands.destroy"),
            (Method::GET, "/brands/{id}/edit", "brands.edit"),
            (Method::PATCH, "/categories/{id}/toggle-status", "categories.toggle-status"),
            (Method::GET, "/products/export", "products.export"),
            (Method::PATCH, "/users/{id}/reset-password", "users.reset-password"),
        ];
        for (method, path, expected) in cases {
            assert_eq!(route_name(&method, path).as_deref(), Some(expected), "{} {}", method, path);
        }
        assert_eq!(route_name(&Method::DELETE, "/products"), None);
    }

    #[test]
    fn test_blocked_prefixes() {
        assert!(is_blocked_route("products.index"));
        assert!(is_blocked_route("categories.toggle-status"));
        assert!(is_blocked_route("brands.destroy"));
        assert!(!is_blocked_route("users.index"));
        assert!(!is_blocked_route("home"));
        assert!(!is_blocked_route("productsx"));
    }

    #[test]
    fn test_redirect_carries_flash() {
        let response = redirect_home("Nope, admin");
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(response.headers().get(LOCATION).unwrap(), "/");
        let cookie = response.headers().get(SET_COOKIE).unwrap().to_str().unwrap();
        assert!(cookie.starts_with("flash_error=Nope%2C%20admin;"));
    }
}
