//! ag-telemetry - 可观测性库
//!
//! 日志初始化、Prometheus 指标以及就绪检查的汇总结构

use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use serde::Serialize;
use thiserror::Error;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

pub mod names {
    //! 指标名称
    pub const CACHE_REQUESTS: &str = "autogestor_cache_requests_total";
    pub const AUTHORIZATION_DENIED: &str = "autogestor_authorization_denied_total";
    pub const ENTITY_EVENTS: &str = "autogestor_entity_events_total";
}

#[derive(Debug, Error)]
pub enum TelemetryError {
    #[error("Failed to install Prometheus recorder: {0}")]
    Metrics(String),
}

fn env_filter(log_level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level))
}

/// 初始化 tracing
pub fn init_tracing(log_level: &str) {
    let _ = tracing_subscriber::registry()
        .with(env_filter(log_level))
        .with(tracing_subscriber::fmt::layer())
        .try_init();
}

/// 初始化 JSON 格式的 tracing（生产环境）
pub fn init_tracing_json(log_level: &str) {
    let _ = tracing_subscriber::registry()
        .with(env_filter(log_level))
        .with(tracing_subscriber::fmt::layer().json())
        .try_init();
}

/// CLI 用的精简输出：不带时间戳，写到 stderr
pub fn init_cli_tracing(log_level: &str) {
    let _ = tracing_subscriber::registry()
        .with(env_filter(log_level))
        .with(
            tracing_subscriber::fmt::layer()
                .without_time()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .try_init();
}

/// 初始化 Prometheus metrics
pub fn init_metrics() -> Result<PrometheusHandle, TelemetryError> {
    PrometheusBuilder::new()
        .install_recorder()
        .map_err(|e| TelemetryError::Metrics(e.to_string()))
}

/// 缓存命中/未命中/错误计数
pub fn record_cache_request(result: &'static str) {
    metrics::counter!(names::CACHE_REQUESTS, "result" => result).increment(1);
}

/// 授权拒绝计数（unauthenticated / forbidden / admin_blocked）
pub fn record_authorization_denied(reason: &'static str) {
    metrics::counter!(names::AUTHORIZATION_DENIED, "reason" => reason).increment(1);
}

/// 实体事件计数
pub fn record_entity_event(entity: &'static str, kind: &'static str) {
    metrics::counter!(names::ENTITY_EVENTS, "entity" => entity, "kind" => kind).increment(1);
}

/// 健康检查状态
#[derive(Debug, Clone, Serialize)]
pub struct HealthStatus {
    pub healthy: bool,
    pub checks: Vec<HealthCheck>,
}

#[derive(Debug, Clone, Serialize)]
pub struct HealthCheck {
    pub name: String,
    pub healthy: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl HealthStatus {
    pub fn new() -> Self {
        Self {
            healthy: true,
            checks: Vec::new(),
        }
    }

    pub fn add_check(&mut self, name: impl Into<String>, healthy: bool, message: Option<String>) {
        if !healthy {
            self.healthy = false;
        }
        self.checks.push(HealthCheck {
            name: name.into(),
            healthy,
            message,
        });
    }
}

impl Default for HealthStatus {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failed_check_marks_status_unhealthy() {
        let mut status = HealthStatus::new();
        status.add_check("storage", true, None);
        assert!(status.healthy);

        status.add_check("cache", false, Some("connection refused".to_string()));
        assert!(!status.healthy);
        assert_eq!(status.checks.len(), 2);
    }

    #[test]
    fn test_health_status_serializes_without_empty_message() {
        let mut status = HealthStatus::new();
        status.add_check("storage", true, None);
        let json = serde_json::to_value(&status).unwrap();
        assert_eq!(json["healthy"], true);
        assert!(json["checks"][0].get("message").is_none());
    }

    #[test]
    fn test_counters_without_recorder_are_noops() {
        record_cache_request("hit");
        record_authorization_denied("forbidden");
        record_entity_event("product", "created");
    }
}
