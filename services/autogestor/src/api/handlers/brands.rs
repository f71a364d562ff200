//! 品牌路由

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
use crate::domain::entities::{Brand, BrandData, BrandWithCount};
use crate::domain::repositories::{BrandFilter, BrandStats, SelectOption};
use crate::domain::value_objects::BrandId;

pub fn routes(state: &AppState) -> AppResult<Router<AppState>> {
    let view = Router::new()
        .route("/brands", get(index))
        .route("/brands/stats", get(stats))
        .route("/brands/select", get(select))
        .route("/brands/countries", get(countries))
        .route("/brands/top", get(top))
        .route("/brands/{id}", get(show))
        .route("/brands/export", get(export));
    let create = Router::new()
        .route("/brands", post(store))
        .route("/brands/create", get(create));
    let edit = Router::new()
        .route("/brands/{id}", patch(update).put(update))
        .route("/brands/{id}/edit", get(edit));
    let remove = Router::new().route("/brands/{id}", delete(destroy));

    Ok(Router::new()
        .merge(guard(state, "brands.view", view)?)
        .merge(guard(state, "brands.create", create)?)
        .merge(guard(state, "brands.edit", edit)?)
        .merge(guard(state, "brands.delete", remove)?))
}

#[derive(Debug, Default, Deserialize)]
pub struct BrandQuery {
    pub search: Option<String>,
    pub country: Option<String>,
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

impl BrandQuery {
    fn filter(&self) -> BrandFilter {
        BrandFilter {
            search: self.search.clone(),
            country: self.country.clone(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct BrandDetail {
    #[serde(flatten)]
    pub brand: Brand,
    pub products_count: u64,
}

async fn index(
    State(state): State<AppState>,
    Query(query): Query<BrandQuery>,
) -> AppResult<Json<PagedResult<Brand>>> {
    let pagination = PageQuery {
        page: query.page,
        per_page: query.per_page,
    }
    .pagination(&state.policy);
    Ok(Json(state.brands.list(&query.filter(), pagination).await?))
}

async fn stats(State(state): State<AppState>) -> AppResult<Json<BrandStats>> {
    Ok(Json(state.brands.stats().await?))
}

async fn select(State(state): State<AppState>) -> AppResult<Json<Vec<SelectOption>>> {
    Ok(Json(state.brands.select().await?))
}

async fn countries(State(state): State<AppState>) -> AppResult<Json<Vec<String>>> {
    Ok(Json(state.brands.countries().await?))
}

async fn top(
    State(state): State<AppState>,
    Query(query): Query<LimitQuery>,
) -> AppResult<Json<Vec<BrandWithCount>>> {
    Ok(Json(state.brands.top_by_product_count(query.limit()).await?))
}

async fn show(State(state): State<AppState>, Path(id): Path<BrandId>) -> AppResult<Json<BrandDetail>> {
    let brand = state.brands.get(id).await?;
    let products_count = state.brands.products_count(id).await?;
    Ok(Json(BrandDetail {
        brand,
        products_count,
    }))
}

async fn create() -> Json<BrandData> {
    Json(BrandData::default())
}

async fn edit(State(state): State<AppState>, Path(id): Path<BrandId>) -> AppResult<Json<Brand>> {
    Ok(Json(state.brands.get(id).await?))
}

async fn store(
    State(state): State<AppState>,
    Actor(actor): Actor,
    Json(data): Json<BrandData>,
) -> AppResult<impl IntoResponse> {
    let brand = state.brands.create(data, actor).await?;
    Ok((StatusCode::CREATED, Json(brand)))
}

async fn update(
    State(state): State<AppState>,
    Actor(actor): Actor,
    Path(id): Path<BrandId>,
    Json(data): Json<BrandData>,
) -> AppResult<Json<Brand>> {
    Ok(Json(state.brands.update(id, data, actor).await?))
}

/// 品牌下的商品保留，品牌字段置空
async fn destroy(
    State(state): State<AppState>,
    Actor(actor): Actor,
    Path(id): Path<BrandId>,
) -> AppResult<StatusCode> {
    state.brands.delete(id, actor).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn export(
    State(state): State<AppState>,
    Query(query): Query<BrandQuery>,
) -> AppResult<Response> {
    let body = state.brands.export_csv(&query.filter()).await?;
    Ok(csv_download("brands", body))
}
