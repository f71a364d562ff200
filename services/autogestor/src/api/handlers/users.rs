//! 用户路由

use std::collections::BTreeSet;

use ag_common::PagedResult;
use ag_errors::AppResult;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{delete, get, patch, post, put};
use axum::{Json, Router};
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};

use super::{BulkRequest, LimitQuery, MessageResponse, PageQuery};
use crate::api::middleware::{Actor, CurrentUser, guard};
use crate::api::state::AppState;
use crate::application::{BulkReport, UserBulkUpdate};
use crate::domain::entities::{UserData, UserView};
use crate::domain::rbac::PermissionKind;
use crate::domain::repositories::{UserFilter, UserStats};
use crate::domain::value_objects::UserId;

pub fn routes(state: &AppState) -> AppResult<Router<AppState>> {
    let view = Router::new()
        .route("/users", get(index))
        .route("/users/stats", get(stats))
        .route("/users/recent", get(recent))
        .route("/users/without-roles", get(without_roles))
        .route("/users/{id}", get(show));
    let create = Router::new()
        .route("/users", post(store))
        .route("/users/create", get(create));
    let edit = Router::new()
        .route("/users/{id}", patch(update).put(update))
        .route("/users/{id}/edit", get(edit))
        .route("/users/{id}/reset-password", patch(reset_password))
        .route("/users/bulk-update", post(bulk_update));
    let remove = Router::new().route("/users/{id}", delete(destroy));
    let roles = Router::new()
        .route("/users/{id}/roles", post(assign_role))
        .route("/users/{id}/roles/{role}", delete(remove_role));
    let permissions = Router::new()
        .route("/users/{id}/permissions", get(direct_permissions).post(give_permission))
        .route("/users/{id}/permissions/{permission}", delete(revoke_permission));

    // 修改自己的密码只要求已登录
    let account = Router::new().route("/password", put(change_password));

    Ok(Router::new()
        .merge(guard(state, "users.view", view)?)
        .merge(guard(state, "users.create", create)?)
        .merge(guard(state, "users.edit", edit)?)
        .merge(guard(state, "users.delete", remove)?)
        .merge(guard(state, "roles.manage", roles)?)
        .merge(guard(state, "permissions.manage", permissions)?)
        .merge(account))
}

#[derive(Debug, Default, Deserialize)]
pub struct UserQuery {
    pub search: Option<String>,
    pub role: Option<String>,
    pub verified: Option<bool>,
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

/// 用户表单：可选角色列表
#[derive(Debug, Serialize)]
pub struct UserForm {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<UserView>,
    pub roles: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct RoleRequest {
    pub role: String,
}

#[derive(Debug, Deserialize)]
pub struct PermissionRequest {
    pub permission: PermissionKind,
}

#[derive(Debug, Deserialize)]
pub struct ChangePasswordRequest {
    pub current_password: String,
    pub password: String,
}

/// 重置后的明文密码只在此响应中出现一次
#[derive(Serialize)]
pub struct ResetPasswordResponse {
    pub message: String,
    pub password: String,
}

async fn index(
    State(state): State<AppState>,
    Query(query): Query<UserQuery>,
) -> AppResult<Json<PagedResult<UserView>>> {
    let filter = UserFilter {
        search: query.search,
        role: query.role,
        verified: query.verified,
    };
    let pagination = PageQuery {
        page: query.page,
        per_page: query.per_page,
    }
    .pagination(&state.policy);
    Ok(Json(state.users.list(&filter, pagination).await?))
}

async fn stats(State(state): State<AppState>) -> AppResult<Json<UserStats>> {
    Ok(Json(state.users.stats().await?))
}

async fn recent(
    State(state): State<AppState>,
    Query(query): Query<LimitQuery>,
) -> AppResult<Json<Vec<UserView>>> {
    let users = state.users.recent(query.limit()).await?;
    let mut views = Vec::with_capacity(users.len());
    for user in &users {
        views.push(UserView::new(user, state.users.role_names(user.id).await?));
    }
    Ok(Json(views))
}

async fn without_roles(State(state): State<AppState>) -> AppResult<Json<Vec<UserView>>> {
    let users = state.users.without_roles().await?;
    Ok(Json(users.iter().map(|user| UserView::new(user, Vec::new())).collect()))
}

async fn show(State(state): State<AppState>, Path(id): Path<UserId>) -> AppResult<Json<UserView>> {
    Ok(Json(state.users.view(id).await?))
}

async fn create(State(state): State<AppState>) -> AppResult<Json<UserForm>> {
    form(&state, None).await.map(Json)
}

async fn edit(State(state): State<AppState>, Path(id): Path<UserId>) -> AppResult<Json<UserForm>> {
    let user = state.users.view(id).await?;
    form(&state, Some(user)).await.map(Json)
}

async fn form(state: &AppState, user: Option<UserView>) -> AppResult<UserForm> {
    let roles = state
        .roles
        .list()
        .await?
        .into_iter()
        .map(|summary| summary.role.name)
        .collect();
    Ok(UserForm { user, roles })
}

async fn store(
    State(state): State<AppState>,
    Actor(actor): Actor,
    Json(data): Json<UserData>,
) -> AppResult<impl IntoResponse> {
    let user = state.users.create(data, actor).await?;
    let view = state.users.view(user.id).await?;
    Ok((StatusCode::CREATED, Json(view)))
}

async fn update(
    State(state): State<AppState>,
    Actor(actor): Actor,
    Path(id): Path<UserId>,
    Json(data): Json<UserData>,
) -> AppResult<Json<UserView>> {
    let user = state.users.update(id, data, actor).await?;
    Ok(Json(state.users.view(user.id).await?))
}

async fn destroy(
    State(state): State<AppState>,
    Actor(actor): Actor,
    Path(id): Path<UserId>,
) -> AppResult<StatusCode> {
    state.users.delete(id, actor).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn reset_password(
    State(state): State<AppState>,
    Actor(actor): Actor,
    Path(id): Path<UserId>,
) -> AppResult<Json<ResetPasswordResponse>> {
    let password = state.users.reset_password(id, actor).await?;
    Ok(Json(ResetPasswordResponse {
        message: "Password reset successfully.".to_string(),
        password: password.expose_secret().to_string(),
    }))
}

async fn bulk_update(
    State(state): State<AppState>,
    Actor(actor): Actor,
    Json(request): Json<BulkRequest<UserId, UserBulkUpdate>>,
) -> AppResult<Json<BulkReport>> {
    let report = state
        .users
        .bulk_update(&request.ids, &request.changes, actor)
        .await?;
    Ok(Json(report))
}

async fn assign_role(
    State(state): State<AppState>,
    Actor(actor): Actor,
    Path(id): Path<UserId>,
    Json(request): Json<RoleRequest>,
) -> AppResult<Json<UserView>> {
    state.users.assign_role(id, &request.role, actor).await?;
    Ok(Json(state.users.view(id).await?))
}

async fn remove_role(
    State(state): State<AppState>,
    Actor(actor): Actor,
    Path((id, role)): Path<(UserId, String)>,
) -> AppResult<Json<UserView>> {
    state.users.remove_role(id, &role, actor).await?;
    Ok(Json(state.users.view(id).await?))
}

async fn direct_permissions(
    State(state): State<AppState>,
    Path(id): Path<UserId>,
) -> AppResult<Json<BTreeSet<PermissionKind>>> {
    Ok(Json(state.roles.direct_permissions(id).await?))
}

async fn give_permission(
    State(state): State<AppState>,
    Actor(actor): Actor,
    Path(id): Path<UserId>,
    Json(request): Json<PermissionRequest>,
) -> AppResult<Json<BTreeSet<PermissionKind>>> {
    state
        .roles
        .give_permission_to(id, request.permission, actor)
        .await?;
    Ok(Json(state.roles.direct_permissions(id).await?))
}

async fn revoke_permission(
    State(state): State<AppState>,
    Actor(actor): Actor,
    Path((id, permission)): Path<(UserId, PermissionKind)>,
) -> AppResult<Json<BTreeSet<PermissionKind>>> {
    state
        .roles
        .revoke_permission_from(id, permission, actor)
        .await?;
    Ok(Json(state.roles.direct_permissions(id).await?))
}

async fn change_password(
    State(state): State<AppState>,
    user: CurrentUser,
    Json(request): Json<ChangePasswordRequest>,
) -> AppResult<Json<MessageResponse>> {
    state
        .users
        .change_password(user.id, &request.current_password, &request.password)
        .await?;
    Ok(Json(MessageResponse::new("Password updated successfully.")))
}
