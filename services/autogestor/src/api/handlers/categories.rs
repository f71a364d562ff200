//! 分类路由

use ag_common::PagedResult;
use ag_errors::AppResult;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{delete, get, patch, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};

use super::{LimitQuery, PageQuery, csv_download};
use crate::api::middleware::{Actor, guard};
use crate::api::state::AppState;
use crate::domain::entities::{Category, CategoryData, CategoryWithCount};
use crate::domain::repositories::{CategoryFilter, CategoryStats, SelectOption};
use crate::domain::value_objects::CategoryId;

pub fn routes(state: &AppState) -> AppResult<Router<AppState>> {
    let view = Router::new()
        .route("/categories", get(index))
        .route("/categories/stats", get(stats))
        .route("/categories/select", get(select))
        .route("/categories/top", get(top))
        .route("/categories/{id}", get(show))
        .route("/categories/export", get(export));
    let create = Router::new()
        .route("/categories", post(store))
        .route("/categories/create", get(create));
    let edit = Router::new()
        .route("/categories/{id}", patch(update).put(update))
        .route("/categories/{id}/edit", get(edit))
        .route("/categories/{id}/toggle-status", patch(toggle_status));
    let remove = Router::new().route("/categories/{id}", delete(destroy));

    Ok(Router::new()
        .merge(guard(state, "categories.view", view)?)
        .merge(guard(state, "categories.create", create)?)
        .merge(guard(state, "categories.edit", edit)?)
        .merge(guard(state, "categories.delete", remove)?))
}

#[derive(Debug, Default, Deserialize)]
pub struct CategoryQuery {
    pub search: Option<String>,
    pub is_active: Option<bool>,
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

impl CategoryQuery {
    fn filter(&self) -> CategoryFilter {
        CategoryFilter {
            search: self.search.clone(),
            is_active: self.is_active,
        }
    }
}

/// 分类详情附带商品数
#[derive(Debug, Serialize)]
pub struct CategoryDetail {
    #[serde(flatten)]
    pub category: Category,
    pub products_count: u64,
}

async fn index(
    State(state): State<AppState>,
    Query(query): Query<CategoryQuery>,
) -> AppResult<Json<PagedResult<Category>>> {
    let pagination = PageQuery {
        page: query.page,
        per_page: query.per_page,
    }
    .pagination(&state.policy);
    Ok(Json(state.categories.list(&query.filter(), pagination).await?))
}

async fn stats(State(state): State<AppState>) -> AppResult<Json<CategoryStats>> {
    Ok(Json(state.categories.stats().await?))
}

async fn select(State(state): State<AppState>) -> AppResult<Json<Vec<SelectOption>>> {
    Ok(Json(state.categories.active_select().await?))
}

async fn top(
    State(state): State<AppState>,
    Query(query): Query<LimitQuery>,
) -> AppResult<Json<Vec<CategoryWithCount>>> {
    Ok(Json(state.categories.top_by_product_count(query.limit()).await?))
}

async fn show(
    State(state): State<AppState>,
    Path(id): Path<CategoryId>,
) -> AppResult<Json<CategoryDetail>> {
    let category = state.categories.get(id).await?;
    let products_count = state.categories.products_count(id).await?;
    Ok(Json(CategoryDetail {
        category,
        products_count,
    }))
}

async fn create() -> Json<CategoryData> {
    Json(CategoryData {
        is_active: Some(true),
        ..Default::default()
    })
}

async fn edit(State(state): State<AppState>, Path(id): Path<CategoryId>) -> AppResult<Json<Category>> {
    Ok(Json(state.categories.get(id).await?))
}

async fn store(
    State(state): State<AppState>,
    Actor(actor): Actor,
    Json(data): Json<CategoryData>,
) -> AppResult<impl IntoResponse> {
    let category = state.categories.create(data, actor).await?;
    Ok((StatusCode::CREATED, Json(category)))
}

async fn update(
    State(state): State<AppState>,
    Actor(actor): Actor,
    Path(id): Path<CategoryId>,
    Json(data): Json<CategoryData>,
) -> AppResult<Json<Category>> {
    Ok(Json(state.categories.update(id, data, actor).await?))
}

async fn toggle_status(
    State(state): State<AppState>,
    Actor(actor): Actor,
    Path(id): Path<CategoryId>,
) -> AppResult<Json<Category>> {
    Ok(Json(state.categories.toggle_status(id, actor).await?))
}

/// 仍有商品的分类返回 409 业务错误
async fn destroy(
    State(state): State<AppState>,
    Actor(actor): Actor,
    Path(id): Path<CategoryId>,
) -> AppResult<StatusCode> {
    state.categories.delete(id, actor).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn export(
    State(state): State<AppState>,
    Query(query): Query<CategoryQuery>,
) -> AppResult<Response> {
    let body = state.categories.export_csv(&query.filter()).await?;
    Ok(csv_download("categories", body))
}
