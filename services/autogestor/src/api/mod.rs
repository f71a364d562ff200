//! HTTP 接口层

pub mod handlers;
pub mod middleware;
mod router;
mod state;

pub use router::build_router;
pub use state::AppState;
