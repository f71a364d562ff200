//! 进程内缓存（未配置 Redis 时使用）

use std::time::{Duration, Instant};

use ag_errors::{AppError, AppResult};
use ag_ports::CachePort;
use async_trait::async_trait;
use moka::future::Cache as MokaCache;
use tokio::sync::Mutex;

const DEFAULT_CAPACITY: u64 = 10_000;

#[derive(Debug, Clone)]
struct Entry {
    value: String,
    expires_at: Option<Instant>,
}

impl Entry {
    fn is_expired(&self) -> bool {
        self.expires_at.is_some_and(|at| at <= Instant::now())
    }
}

/// 基于 Moka 的 `CachePort` 实现
///
/// 条目级 TTL 在读取时检查；容量满时按 Moka 的策略淘汰
pub struct MemoryCache {
    entries: MokaCache<String, Entry>,
    counter_lock: Mutex<()>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    pub fn with_capacity(capacity: u64) -> Self {
        Self {
            entries: MokaCache::builder().max_capacity(capacity).build(),
            counter_lock: Mutex::new(()),
        }
    }

    async fn live(&self, key: &str) -> Option<Entry> {
        let entry = self.entries.get(key).await?;
        if entry.is_expired() {
            self.entries.invalidate(key).await;
            return None;
        }
        Some(entry)
    }
}

impl Default for MemoryCache {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CachePort for MemoryCache {
    async fn get(&self, key: &str) -> AppResult<Option<String>> {
        Ok(self.live(key).await.map(|e| e.value))
    }

    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> AppResult<()> {
        let entry = Entry {
            value: value.to_string(),
            expires_at: ttl.map(|ttl| Instant::now() + ttl),
        };
        self.entries.insert(key.to_string(), entry).await;
        Ok(())
    }

    async fn delete(&self, key: &str) -> AppResult<()> {
        self.entries.invalidate(key).await;
        Ok(())
    }

    async fn exists(&self, key: &str) -> AppResult<bool> {
        Ok(self.live(key).await.is_some())
    }

    async fn expire(&self, key: &str, ttl: Duration) -> AppResult<()> {
        if let Some(mut entry) = self.live(key).await {
            entry.expires_at = Some(Instant::now() + ttl);
            self.entries.insert(key.to_string(), entry).await;
        }
        Ok(())
    }

    async fn incr(&self, key: &str) -> AppResult<i64> {
        let _guard = self.counter_lock.lock().await;
        let (current, expires_at) = match self.live(key).await {
            Some(entry) => {
                let value = entry.value.parse::<i64>().map_err(|_| {
                    AppError::validation(format!("Cache value at '{}' is not an integer", key))
                })?;
                (value, entry.expires_at)
            }
            None => (0, None),
        };

        let next = current + 1;
        let entry = Entry {
            value: next.to_string(),
            expires_at,
        };
        self.entries.insert(key.to_string(), entry).await;
        Ok(next)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_set_get_delete() {
        let cache = MemoryCache::new();
        cache.set("products.stats", "{}", None).await.unwrap();
        assert_eq!(cache.get("products.stats").await.unwrap().as_deref(), Some("{}"));
        assert!(cache.exists("products.stats").await.unwrap());

        cache.delete("products.stats").await.unwrap();
        assert_eq!(cache.get("products.stats").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_ttl_expiry() {
        let cache = MemoryCache::new();
        cache
            .set("short", "1", Some(Duration::from_millis(10)))
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(30)).await;
        assert!(!cache.exists("short").await.unwrap());
    }

    #[tokio::test]
    async fn test_incr() {
        let cache = MemoryCache::new();
        assert_eq!(cache.incr("gen").await.unwrap(), 1);
        assert_eq!(cache.incr("gen").await.unwrap(), 2);

        cache.set("text", "abc", None).await.unwrap();
        assert!(cache.incr("text").await.is_err());
    }
}
