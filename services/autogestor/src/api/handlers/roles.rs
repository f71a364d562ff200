//! 角色与权限路由

use ag_errors::AppResult;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use serde::Serialize;

use crate::api::middleware::{Actor, guard};
use crate::api::state::AppState;
use crate::application::{RoleData, RoleSummary};
use crate::domain::rbac::{PermissionKind, Role};
use crate::domain::value_objects::RoleId;

pub fn routes(state: &AppState) -> AppResult<Router<AppState>> {
    let roles = Router::new()
        .route("/roles", get(index).post(store))
        .route("/roles/create", get(create))
        .route("/roles/{id}", get(show).patch(update).put(update).delete(destroy))
        .route("/roles/{id}/edit", get(edit));
    let permissions = Router::new().route("/permissions", get(list_permissions));

    Ok(Router::new()
        .merge(guard(state, "roles.manage", roles)?)
        .merge(guard(state, "permissions.manage", permissions)?))
}

/// 按资源分组的权限清单
#[derive(Debug, Serialize)]
pub struct PermissionGroup {
    pub resource: &'static str,
    pub permissions: Vec<PermissionKind>,
}

#[derive(Debug, Serialize)]
pub struct RoleForm {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<Role>,
    pub permissions: Vec<PermissionGroup>,
}

fn grouped(permissions: &[PermissionKind]) -> Vec<PermissionGroup> {
    let mut groups: Vec<PermissionGroup> = Vec::new();
    for permission in permissions {
        match groups.iter_mut().find(|g| g.resource == permission.resource()) {
            Some(group) => group.permissions.push(*permission),
            None => groups.push(PermissionGroup {
                resource: permission.resource(),
                permissions: vec![*permission],
            }),
        }
    }
    groups
}

async fn index(State(state): State<AppState>) -> AppResult<Json<Vec<RoleSummary>>> {
    Ok(Json(state.roles.list().await?))
}

async fn show(State(state): State<AppState>, Path(id): Path<RoleId>) -> AppResult<Json<Role>> {
    Ok(Json(state.roles.get(id).await?))
}

async fn create(State(state): State<AppState>) -> Json<RoleForm> {
    Json(RoleForm {
        role: None,
        permissions: grouped(state.roles.permissions()),
    })
}

async fn edit(State(state): State<AppState>, Path(id): Path<RoleId>) -> AppResult<Json<RoleForm>> {
    let role = state.roles.get(id).await?;
    Ok(Json(RoleForm {
        role: Some(role),
        permissions: grouped(state.roles.permissions()),
    }))
}

async fn store(
    State(state): State<AppState>,
    Actor(actor): Actor,
    Json(data): Json<RoleData>,
) -> AppResult<impl IntoResponse> {
    let role = state.roles.create(data, actor).await?;
    Ok((StatusCode::CREATED, Json(role)))
}

async fn update(
    State(state): State<AppState>,
    Actor(actor): Actor,
    Path(id): Path<RoleId>,
    Json(data): Json<RoleData>,
) -> AppResult<Json<Role>> {
    Ok(Json(state.roles.update(id, data, actor).await?))
}

/// 受保护角色不可删除
async fn destroy(
    State(state): State<AppState>,
    Actor(actor): Actor,
    Path(id): Path<RoleId>,
) -> AppResult<StatusCode> {
    state.roles.delete(id, actor).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn list_permissions(State(state): State<AppState>) -> Json<Vec<PermissionGroup>> {
    Json(grouped(state.roles.permissions()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_grouped_keeps_declaration_order() {
        let groups = grouped(PermissionKind::ALL);
        let resources: Vec<&str> = groups.iter().map(|g| g.resource).collect();
        assert_eq!(
            resources,
            vec!["dashboard", "products", "categories", "brands", "users", "roles", "permissions"]
        );
        assert_eq!(groups[1].permissions.len(), 6);
    }
}
