//! 商品路由

use ag_common::PagedResult;
use ag_errors::{AppError, AppResult};
use axum::body::Bytes;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{delete, get, patch, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};

use super::{BulkRequest, LimitQuery, PageQuery, csv_download};
use crate::api::middleware::{Actor, guard};
use crate::api::state::AppState;
use crate::application::{BulkReport, ImportReport, ProductBulkUpdate};
use crate::domain::entities::{Product, ProductData, StockOperation};
use crate::domain::repositories::{
    ProductFilter, ProductStats, SelectOption, StockFilter, TrashedFilter,
};
use crate::domain::value_objects::{BrandId, CategoryId, ProductId};

pub fn routes(state: &AppState) -> AppResult<Router<AppState>> {
    let view = Router::new()
        .route("/products", get(index))
        .route("/products/stats", get(stats))
        .route("/products/low-stock", get(low_stock))
        .route("/products/out-of-stock", get(out_of_stock))
        .route("/products/lookup", get(lookup))
        .route("/products/{id}", get(show));
    let create = Router::new()
        .route("/products", post(store))
        .route("/products/create", get(create))
        .route("/products/generate-sku", get(generate_sku));
    let edit = Router::new()
        .route("/products/{id}", patch(update).put(update))
        .route("/products/{id}/edit", get(edit))
        .route("/products/{id}/toggle-status", patch(toggle_status))
        .route("/products/{id}/stock", patch(adjust_stock))
        .route("/products/{id}/restore", patch(restore))
        .route("/products/bulk-update", post(bulk_update));
    let remove = Router::new()
        .route("/products/{id}", delete(destroy))
        .route("/products/{id}/force-delete", delete(force_delete))
        .route("/products/bulk-delete", post(bulk_delete));
    let import = Router::new().route("/products/import", post(import));
    let export = Router::new().route("/products/export", get(export));

    Ok(Router::new()
        .merge(guard(state, "products.view", view)?)
        .merge(guard(state, "products.create", create)?)
        .merge(guard(state, "products.edit", edit)?)
        .merge(guard(state, "products.delete", remove)?)
        .merge(guard(state, "products.import", import)?)
        .merge(guard(state, "products.export", export)?))
}

#[derive(Debug, Default, Deserialize)]
pub struct ProductQuery {
    pub search: Option<String>,
    pub category_id: Option<CategoryId>,
    pub brand_id: Option<BrandId>,
    pub is_active: Option<bool>,
    pub stock: Option<StockFilter>,
    pub trashed: Option<TrashedFilter>,
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

impl ProductQuery {
    fn filter(&self) -> ProductFilter {
        ProductFilter {
            search: self.search.clone(),
            category_id: self.category_id,
            brand_id: self.brand_id,
            is_active: self.is_active,
            stock: self.stock,
            trashed: self.trashed.unwrap_or_default(),
        }
    }

    fn page(&self) -> PageQuery {
        PageQuery {
            page: self.page,
            per_page: self.per_page,
        }
    }
}

/// 创建/编辑表单需要的选项
#[derive(Debug, Serialize)]
pub struct ProductForm {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub product: Option<Product>,
    pub categories: Vec<SelectOption>,
    pub brands: Vec<SelectOption>,
}

#[derive(Debug, Deserialize)]
pub struct StockRequest {
    pub operation: StockOperation,
    pub quantity: i32,
}

#[derive(Debug, Deserialize)]
pub struct LookupQuery {
    pub sku: Option<String>,
    pub barcode: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SkuQuery {
    pub name: String,
    pub category_id: CategoryId,
}

#[derive(Debug, Serialize)]
pub struct SkuResponse {
    pub sku: String,
}

async fn index(
    State(state): State<AppState>,
    Query(query): Query<ProductQuery>,
) -> AppResult<Json<PagedResult<Product>>> {
    let pagination = query.page().pagination(&state.policy);
    Ok(Json(state.products.list(&query.filter(), pagination).await?))
}

async fn stats(State(state): State<AppState>) -> AppResult<Json<ProductStats>> {
    Ok(Json(state.products.stats().await?))
}

async fn low_stock(
    State(state): State<AppState>,
    Query(query): Query<LimitQuery>,
) -> AppResult<Json<Vec<Product>>> {
    Ok(Json(state.products.low_stock(query.limit()).await?))
}

async fn out_of_stock(
    State(state): State<AppState>,
    Query(query): Query<LimitQuery>,
) -> AppResult<Json<Vec<Product>>> {
    Ok(Json(state.products.out_of_stock(query.limit()).await?))
}

/// 按 SKU 或条码精确查找
async fn lookup(
    State(state): State<AppState>,
    Query(query): Query<LookupQuery>,
) -> AppResult<Json<Product>> {
    let found = match (query.sku.as_deref(), query.barcode.as_deref()) {
        (Some(sku), _) => state.products.find_by_sku(sku).await?,
        (None, Some(barcode)) => state.products.find_by_barcode(barcode).await?,
        (None, None) => return Err(AppError::validation("Either sku or barcode is required")),
    };
    found
        .map(Json)
        .ok_or_else(|| AppError::not_found("Product not found"))
}

async fn show(State(state): State<AppState>, Path(id): Path<ProductId>) -> AppResult<Json<Product>> {
    Ok(Json(state.products.get(id).await?))
}

async fn create(State(state): State<AppState>) -> AppResult<Json<ProductForm>> {
    form(&state, None).await.map(Json)
}

async fn edit(State(state): State<AppState>, Path(id): Path<ProductId>) -> AppResult<Json<ProductForm>> {
    let product = state.products.get(id).await?;
    form(&state, Some(product)).await.map(Json)
}

async fn form(state: &AppState, product: Option<Product>) -> AppResult<ProductForm> {
    let (categories, brands) = tokio::try_join!(state.categories.active_select(), state.brands.select())?;
    Ok(ProductForm {
        product,
        categories,
        brands,
    })
}

async fn generate_sku(
    State(state): State<AppState>,
    Query(query): Query<SkuQuery>,
) -> AppResult<Json<SkuResponse>> {
    let sku = state.products.generate_sku(&query.name, query.category_id).await?;
    Ok(Json(SkuResponse { sku }))
}

async fn store(
    State(state): State<AppState>,
    Actor(actor): Actor,
    Json(data): Json<ProductData>,
) -> AppResult<impl IntoResponse> {
    let product = state.products.create(data, actor).await?;
    Ok((StatusCode::CREATED, Json(product)))
}

async fn update(
    State(state): State<AppState>,
    Actor(actor): Actor,
    Path(id): Path<ProductId>,
    Json(data): Json<ProductData>,
) -> AppResult<Json<Product>> {
    Ok(Json(state.products.update(id, data, actor).await?))
}

async fn toggle_status(
    State(state): State<AppState>,
    Actor(actor): Actor,
    Path(id): Path<ProductId>,
) -> AppResult<Json<Product>> {
    Ok(Json(state.products.toggle_status(id, actor).await?))
}

async fn adjust_stock(
    State(state): State<AppState>,
    Actor(actor): Actor,
    Path(id): Path<ProductId>,
    Json(request): Json<StockRequest>,
) -> AppResult<Json<Product>> {
    let product = state
        .products
        .adjust_stock(id, request.operation, request.quantity, actor)
        .await?;
    Ok(Json(product))
}

async fn restore(
    State(state): State<AppState>,
    Actor(actor): Actor,
    Path(id): Path<ProductId>,
) -> AppResult<Json<Product>> {
    Ok(Json(state.products.restore(id, actor).await?))
}

async fn destroy(
    State(state): State<AppState>,
    Actor(actor): Actor,
    Path(id): Path<ProductId>,
) -> AppResult<StatusCode> {
    state.products.delete(id, actor).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn force_delete(
    State(state): State<AppState>,
    Actor(actor): Actor,
    Path(id): Path<ProductId>,
) -> AppResult<StatusCode> {
    state.products.force_delete(id, actor).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn bulk_update(
    State(state): State<AppState>,
    Actor(actor): Actor,
    Json(request): Json<BulkRequest<ProductId, ProductBulkUpdate>>,
) -> AppResult<Json<BulkReport>> {
    let report = state
        .products
        .bulk_update(&request.ids, &request.changes, actor)
        .await?;
    Ok(Json(report))
}

#[derive(Debug, Deserialize)]
pub struct BulkDeleteRequest {
    pub ids: Vec<ProductId>,
}

async fn bulk_delete(
    State(state): State<AppState>,
    Actor(actor): Actor,
    Json(request): Json<BulkDeleteRequest>,
) -> AppResult<Json<BulkReport>> {
    Ok(Json(state.products.bulk_delete(&request.ids, actor).await?))
}

/// 请求体为 CSV 文本
async fn import(
    State(state): State<AppState>,
    Actor(actor): Actor,
    body: Bytes,
) -> AppResult<Json<ImportReport>> {
    if body.is_empty() {
        return Err(AppError::invalid_field("file", "The file field is required."));
    }
    Ok(Json(state.products.import_csv(&body, actor).await?))
}

async fn export(
    State(state): State<AppState>,
    Query(query): Query<ProductQuery>,
) -> AppResult<Response> {
    let body = state.products.export_csv(&query.filter()).await?;
    Ok(csv_download("products", body))
}
