//! Redis Cache 实现

use ag_errors::{AppError, AppResult};
use ag_ports::CachePort;
use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Client};
use std::time::Duration;

/// Redis Cache
///
/// 所有键加上命名空间前缀，多个应用可共用同一个 Redis 实例
pub struct RedisCache {
    conn: ConnectionManager,
    namespace: String,
}

impl RedisCache {
    /// 打开连接管理器，断线后自动重连
    pub async fn connect(url: &str) -> AppResult<Self> {
        let client = Client::open(url)
            .map_err(|e| AppError::external_service(format!("Failed to create Redis client: {}", e)))?;
        let conn = ConnectionManager::new(client).await.map_err(|e| {
            AppError::external_service(format!("Failed to create Redis connection manager: {}", e))
        })?;
        Ok(Self::new(conn))
    }

    pub fn new(conn: ConnectionManager) -> Self {
        Self {
            conn,
            namespace: String::new(),
        }
    }

    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = namespace.into();
        self
    }

    fn key(&self, key: &str) -> String {
        namespaced(&self.namespace, key)
    }
}

fn namespaced(namespace: &str, key: &str) -> String {
    if namespace.is_empty() {
        key.to_string()
    } else {
        format!("{}:{}", namespace, key)
    }
}

fn redis_error(op: &str, e: redis::RedisError) -> AppError {
    AppError::external_service(format!("Redis {} failed: {}", op, e))
}

#[async_trait]
impl CachePort for RedisCache {
    async fn get(&self, key: &str) -> AppResult<Option<String>> {
        let mut conn = self.conn.clone();
        conn.get(self.key(key))
            .await
            .map_err(|e| redis_error("get", e))
    }

    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> AppResult<()> {
        let mut conn = self.conn.clone();
        let key = self.key(key);
        match ttl {
            Some(duration) => conn
                .set_ex::<_, _, ()>(key, value, duration.as_secs())
                .await
                .map_err(|e| redis_error("set", e)),
            None => conn
                .set::<_, _, ()>(key, value)
                .await
                .map_err(|e| redis_error("set", e)),
        }
    }

    async fn delete(&self, key: &str) -> AppResult<()> {
        let mut conn = self.conn.clone();
        conn.del::<_, ()>(self.key(key))
            .await
            .map_err(|e| redis_error("delete", e))
    }

    async fn exists(&self, key: &str) -> AppResult<bool> {
        let mut conn = self.conn.clone();
        conn.exists(self.key(key))
            .await
            .map_err(|e| redis_error("exists", e))
    }

    async fn expire(&self, key: &str, ttl: Duration) -> AppResult<()> {
        let mut conn = self.conn.clone();
        conn.expire::<_, ()>(self.key(key), ttl.as_secs() as i64)
            .await
            .map_err(|e| redis_error("expire", e))
    }

    async fn incr(&self, key: &str) -> AppResult<i64> {
        let mut conn = self.conn.clone();
        conn.incr(self.key(key), 1)
            .await
            .map_err(|e| redis_error("incr", e))
    }

    async fn ping(&self) -> AppResult<()> {
        let mut conn = self.conn.clone();
        redis::cmd("PING")
            .query_async::<String>(&mut conn)
            .await
            .map_err(|e| redis_error("ping", e))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::namespaced;

    #[test]
    fn test_namespaced_keys() {
        assert_eq!(namespaced("", "products.stats"), "products.stats");
        assert_eq!(namespaced("autogestor", "products.stats"), "autogestor:products.stats");
    }
}
