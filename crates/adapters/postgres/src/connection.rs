//! 连接池

use std::time::Duration;

use ag_errors::{AppError, AppResult};
use sqlx::postgres::{PgPool, PgPoolOptions};
use tracing::debug;

/// 空闲时保留的连接数上限
const MIN_IDLE_CONNECTIONS: u32 = 1;
const ACQUIRE_TIMEOUT: Duration = Duration::from_secs(30);
const IDLE_TIMEOUT: Duration = Duration::from_secs(600);

/// 建立连接池；`max_connections` 为 0 时按 1 处理
pub async fn connect(url: &str, max_connections: u32) -> AppResult<PgPool> {
    let (min, max) = pool_bounds(max_connections);
    debug!(min_connections = min, max_connections = max, "Opening PostgreSQL pool");

    PgPoolOptions::new()
        .max_connections(max)
        .min_connections(min)
        .acquire_timeout(ACQUIRE_TIMEOUT)
        .idle_timeout(IDLE_TIMEOUT)
        .connect(url)
        .await
        .map_err(|e| AppError::database(format!("Failed to create pool: {}", e)))
}

fn pool_bounds(max_connections: u32) -> (u32, u32) {
    let max = max_connections.max(1);
    (MIN_IDLE_CONNECTIONS.min(max), max)
}

/// 就绪检查用的往返查询
pub async fn ping(pool: &PgPool) -> AppResult<()> {
    sqlx::query("SELECT 1")
        .execute(pool)
        .await
        .map_err(|e| AppError::database(format!("Database health check failed: {}", e)))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pool_bounds() {
        assert_eq!(pool_bounds(0), (1, 1));
        assert_eq!(pool_bounds(10), (1, 10));
        assert_eq!(pool_bounds(50), (1, 50));
    }
}
