//! 权限检查中间件

use std::sync::Arc;

use ag_errors::{AppError, AppResult};
use ag_telemetry::record_authorization_denied;
use axum::extract::{Request, State};
use axum::http::header::ACCEPT;
use axum::http::{HeaderMap, StatusCode};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::{Json, Router};
use serde_json::json;
use tracing::{debug, error};

use super::auth::CurrentUser;
use crate::api::state::AppState;
use crate::application::AuthorizationService;
use crate::domain::rbac::PermissionKind;

pub const UNAUTHENTICATED_MESSAGE: &str = "Unauthenticated.";
pub const FORBIDDEN_MESSAGE: &str = "User does not have the right permissions.";

/// 一个路由组要求的权限（满足其一即可）
#[derive(Clone)]
pub struct PermissionGate {
    authorization: AuthorizationService,
    required: Arc<[PermissionKind]>,
}

impl PermissionGate {
    /// 解析逗号分隔的权限名，未知名称在建路由时即报错
    pub fn parse(authorization: AuthorizationService, permissions: &str) -> AppResult<Self> {
        let required = PermissionKind::parse_list(permissions)
            .map_err(|e| AppError::internal(format!("Invalid route permission: {}", e)))?;
        if required.is_empty() {
            return Err(AppError::internal("Route permission list is empty"));
        }
        Ok(Self {
            authorization,
            required: required.into(),
        })
    }

    pub fn required(&self) -> &[PermissionKind] {
        &self.required
    }
}

/// 给路由组加上权限检查
pub fn guard(state: &AppState, permissions: &str, routes: Router<AppState>) -> AppResult<Router<AppState>> {
    let gate = PermissionGate::parse(state.authorization.clone(), permissions)?;
    Ok(routes.route_layer(middleware::from_fn_with_state(gate, check_permission)))
}

/// 请求是否期望 JSON 响应
pub fn wants_json(headers: &HeaderMap) -> bool {
    let accepts_json = headers
        .get(ACCEPT)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.to_ascii_lowercase().contains("json"));
    let is_ajax = headers
        .get("x-requested-with")
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.eq_ignore_ascii_case("XMLHttpRequest"));
    accepts_json || is_ajax
}

/// 401/403 响应：JSON 请求返回 `{"message": ...}`，其他请求返回纯文本错误页
pub fn deny(headers: &HeaderMap, status: StatusCode, message: &str) -> Response {
    if wants_json(headers) {
        (status, Json(json!({ "message": message }))).into_response()
    } else {
        let body = format!("{} | {}", status.as_u16(), message);
        (status, body).into_response()
    }
}

pub async fn check_permission(State(gate): State<PermissionGate>, request: Request, next: Next) -> Response {
    let user_id = match request.extensions().get::<CurrentUser>() {
        Some(user) => user.id,
        None => {
            record_authorization_denied("unauthenticated");
            return deny(request.headers(), StatusCode::UNAUTHORIZED, UNAUTHENTICATED_MESSAGE);
        }
    };

    match gate.authorization.can_any(user_id, gate.required()).await {
        Ok(true) => next.run(request).await,
        Ok(false) => {
            debug!(user_id = %user_id, required = ?gate.required(), "Permission denied");
            record_authorization_denied("forbidden");
            deny(request.headers(), StatusCode::FORBIDDEN, FORBIDDEN_MESSAGE)
        }
        Err(e) => {
            error!(user_id = %user_id, error = %e, "Permission check failed");
            e.into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_wants_json() {
        let mut headers = HeaderMap::new();
        assert!(!wants_json(&headers));

        headers.insert(ACCEPT, HeaderValue::from_static("text/html"));
        assert!(!wants_json(&headers));

        headers.insert(ACCEPT, HeaderValue::from_static("application/json, text/plain"));
        assert!(wants_json(&headers));

        let mut ajax = HeaderMap::new();
        ajax.insert("x-requested-with", HeaderValue::from_static("XMLHttpRequest"));
        assert!(wants_json(&ajax));
    }
}
