//! AutoGestor HTTP 服务入口

use ag_bootstrap::{HealthChecker, Infrastructure, health_routes, init_runtime, serve};
use ag_config::AppConfig;
use ag_telemetry::init_metrics;
use autogestor::api::{AppState, build_router};
use autogestor::container::Container;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load("config")?;
    init_runtime(&config);

    let metrics = match init_metrics() {
        Ok(handle) => Some(handle),
        Err(e) => {
            warn!(error = %e, "Metrics exporter disabled");
            None
        }
    };

    let infra = Infrastructure::from_config(config).await?;
    let container = Container::from_infrastructure(&infra).await?;
    container.maintenance.seed_roles().await?;
    info!("Services initialized");

    let checker = HealthChecker::new()
        .with_postgres(infra.postgres_pool())
        .with_cache(container.cache.clone());

    let state = AppState::new(&container, infra.token_service());
    let router = build_router(state)?.merge(health_routes(checker, metrics));

    serve(router, &infra.config().server).await?;
    Ok(())
}
