//! 健康检查模块
//!
//! 提供 /health、/ready 与 /metrics 端点

use std::sync::Arc;

use ag_adapter_postgres::ping;
use ag_ports::CachePort;
use ag_telemetry::HealthStatus;
use axum::{Json, Router, http::StatusCode, response::IntoResponse, routing::get};
use metrics_exporter_prometheus::PrometheusHandle;
use sqlx::PgPool;

/// 健康检查器
#[derive(Clone, Default)]
pub struct HealthChecker {
    postgres: Option<PgPool>,
    cache: Option<Arc<dyn CachePort>>,
}

impl HealthChecker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_postgres(mut self, pool: Option<PgPool>) -> Self {
        self.postgres = pool;
        self
    }

    pub fn with_cache(mut self, cache: Arc<dyn CachePort>) -> Self {
        self.cache = Some(cache);
        self
    }

    /// 存活检查，不检查依赖
    pub fn liveness(&self) -> HealthStatus {
        HealthStatus::new()
    }

    /// 就绪检查，检查所有已配置的依赖
    pub async fn readiness(&self) -> HealthStatus {
        let mut status = HealthStatus::new();

        match &self.postgres {
            Some(pool) => match ping(pool).await {
                Ok(()) => status.add_check("postgres", true, None),
                Err(e) => status.add_check("postgres", false, Some(e.to_string())),
            },
            None => status.add_check("storage", true, Some("in-memory".to_string())),
        }

        if let Some(cache) = &self.cache {
            match cache.ping().await {
                Ok(()) => status.add_check("cache", true, None),
                Err(e) => status.add_check("cache", false, Some(e.to_string())),
            }
        }

        status
    }
}

fn status_response(status: HealthStatus) -> impl IntoResponse {
    let code = if status.healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (code, Json(status))
}

/// 构建健康检查路由
pub fn health_routes(checker: HealthChecker, metrics: Option<PrometheusHandle>) -> Router {
    let live = checker.clone();
    let ready = checker;

    let router = Router::new()
        .route(
            "/health",
            get(move || {
                let checker = live.clone();
                async move { status_response(checker.liveness()) }
            }),
        )
        .route(
            "/ready",
            get(move || {
                let checker = ready.clone();
                async move { status_response(checker.readiness().await) }
            }),
        );

    match metrics {
        Some(handle) => router.route(
            "/metrics",
            get(move || {
                let handle = handle.clone();
                async move { handle.render() }
            }),
        ),
        None => router,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ag_errors::{AppError, AppResult};
    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::Request;
    use std::time::Duration;
    use tower::ServiceExt;

    struct DownCache;

    #[async_trait]
    impl CachePort for DownCache {
        async fn get(&self, _key: &str) -> AppResult<Option<String>> {
            Ok(None)
        }
        async fn set(&self, _key: &str, _value: &str, _ttl: Option<Duration>) -> AppResult<()> {
            Ok(())
        }
        async fn delete(&self, _key: &str) -> AppResult<()> {
            Ok(())
        }
        async fn exists(&self, _key: &str) -> AppResult<bool> {
            Ok(false)
        }
        async fn expire(&self, _key: &str, _ttl: Duration) -> AppResult<()> {
            Ok(())
        }
        async fn incr(&self, _key: &str) -> AppResult<i64> {
            Ok(1)
        }
        async fn ping(&self) -> AppResult<()> {
            Err(AppError::external_service("connection refused"))
        }
    }

    #[tokio::test]
    async fn test_health_is_always_ok() {
        let app = health_routes(HealthChecker::new().with_cache(Arc::new(DownCache)), None);
        let response = app
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_ready_reports_unavailable_cache() {
        let app = health_routes(HealthChecker::new().with_cache(Arc::new(DownCache)), None);
        let response = app
            .oneshot(Request::builder().uri("/ready").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn test_ready_with_memory_storage() {
        let status = HealthChecker::new().readiness().await;
        assert!(status.healthy);
        assert_eq!(status.checks[0].name, "storage");
    }
}
