//! HTTP 服务启动

use std::net::SocketAddr;
use std::time::Duration;

use ag_config::ServerConfig;
use ag_errors::{AppError, AppResult};
use axum::Router;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::runtime::shutdown_signal;

/// 启动 HTTP 服务，收到关闭信号后优雅退出
pub async fn serve(router: Router, config: &ServerConfig) -> AppResult<()> {
    let addr: SocketAddr = format!("{}:{}", config.host, config.port)
        .parse()
        .map_err(|e| AppError::validation(format!("Invalid server address: {}", e)))?;

    let app = router
        .layer(TimeoutLayer::new(Duration::from_secs(config.request_timeout_secs)))
        .layer(TraceLayer::new_for_http());

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| AppError::internal(format!("Failed to bind {}: {}", addr, e)))?;

    info!(%addr, "HTTP server starting");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| AppError::internal(format!("HTTP server error: {}", e)))?;

    info!("HTTP server stopped");
    Ok(())
}
