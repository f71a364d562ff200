//! 认证中间件与当前用户提取器

use std::convert::Infallible;

use ag_auth_core::Claims;
use ag_errors::{AppError, AppResult};
use axum::extract::{FromRequestParts, Request, State};
use axum::http::HeaderMap;
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use axum::middleware::Next;
use axum::response::Response;
use tracing::{debug, warn};

use crate::api::state::AppState;
use crate::domain::value_objects::UserId;

/// 已认证的当前用户
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CurrentUser {
    pub id: UserId,
    pub name: String,
    pub email: String,
}

/// 必须已认证，否则 401
impl<S> FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<CurrentUser>()
            .cloned()
            .ok_or_else(|| AppError::unauthenticated("Unauthenticated."))
    }
}

/// 操作人，匿名请求为 None
#[derive(Debug, Clone, Copy)]
pub struct Actor(pub Option<UserId>);

impl<S> FromRequestParts<S> for Actor
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(Actor(parts.extensions.get::<CurrentUser>().map(|user| user.id)))
    }
}

pub(crate) fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

async fn resolve_user(state: &AppState, claims: &Claims) -> AppResult<Option<CurrentUser>> {
    let user_id = claims.user_id()?;
    Ok(state.users.find(user_id).await?.map(|user| CurrentUser {
        id: user.id,
        name: user.name,
        email: user.email,
    }))
}

/// JWT 认证中间件
///
/// 令牌有效且用户存在时注入 [`CurrentUser`]；否则按匿名请求继续，由后续的权限检查决定是否拒绝
pub async fn authenticate(State(state): State<AppState>, mut request: Request, next: Next) -> Response {
    let claims = match bearer_token(request.headers()) {
        Some(token) => match state.tokens.validate_access_token(token) {
            Ok(claims) => Some(claims),
            Err(e) => {
                debug!(error = %e, "Token validation failed");
                None
            }
        },
        None => None,
    };

    if let Some(claims) = claims {
        match resolve_user(&state, &claims).await {
            Ok(Some(user)) => {
                debug!(user_id = %user.id, "Request authenticated");
                request.extensions_mut().insert(user);
            }
            Ok(None) => debug!(sub = %claims.sub, "Token subject no longer exists"),
            Err(e) => warn!(sub = %claims.sub, error = %e, "Failed to resolve token subject"),
        }
    }

    next.run(request).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_bearer_token() {
        let mut headers = HeaderMap::new();
        assert_eq!(bearer_token(&headers), None);

        headers.insert(AUTHORIZATION, HeaderValue::from_static("Basic abc"));
        assert_eq!(bearer_token(&headers), None);

        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer "));
        assert_eq!(bearer_token(&headers), None);

        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer abc.def"));
        assert_eq!(bearer_token(&headers), Some("abc.def"));
    }
}
