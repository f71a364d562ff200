//! 仪表盘

use ag_errors::AppResult;
use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};

use crate::api::middleware::guard;
use crate::api::state::AppState;
use crate::application::Dashboard;

pub fn routes(state: &AppState) -> AppResult<Router<AppState>> {
    guard(state, "dashboard.view", Router::new().route("/", get(home)))
}

async fn home(State(state): State<AppState>) -> AppResult<Json<Dashboard>> {
    Ok(Json(state.dashboard.overview().await?))
}
