//! 服务层缓存
//!
//! cache-aside：先读缓存，未命中时回源并写回；缓存故障只记录日志，不影响读取结果

use std::future::Future;
use std::sync::Arc;

use ag_common::Pagination;
use ag_config::CatalogConfig;
use ag_errors::AppResult;
use ag_ports::CachePort;
use ag_telemetry::record_cache_request;
use serde::{Serialize, de::DeserializeOwned};
use tracing::{debug, warn};

use crate::domain::events::EntityKind;

/// 固定缓存键
pub mod keys {
    pub const PRODUCTS_STATS: &str = "products.stats";
    pub const PRODUCTS_ACTIVE_SELECT: &str = "products.active.select";
    pub const CATEGORIES_STATS: &str = "categories.stats";
    pub const CATEGORIES_ACTIVE_SELECT: &str = "categories.active.select";
    pub const BRANDS_STATS: &str = "brands.stats";
    pub const BRANDS_SELECT: &str = "brands.select";
    pub const BRANDS_COUNTRIES: &str = "brands.countries";
    pub const USERS_STATS: &str = "users.stats";
}

/// 分页列表缓存策略
///
/// 读取方与失效方共用同一个范围，范围外的页永远不进缓存
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ListingCachePolicy {
    pub default_per_page: u32,
    pub cached_pages: u32,
}

impl ListingCachePolicy {
    pub fn new(default_per_page: u32, cached_pages: u32) -> Self {
        Self {
            default_per_page,
            cached_pages,
        }
    }

    pub fn from_config(config: &CatalogConfig) -> Self {
        Self::new(config.default_per_page, config.cached_listing_pages)
    }

    pub fn default_pagination(&self, page: Option<u32>, per_page: Option<u32>) -> Pagination {
        Pagination::new(page.unwrap_or(1), per_page.unwrap_or(self.default_per_page))
    }

    pub fn is_cacheable(&self, pagination: &Pagination) -> bool {
        pagination.per_page == self.default_per_page
            && pagination.page >= 1
            && pagination.page <= self.cached_pages
    }

    /// `{entity}.all.{per_page}.{page}`
    pub fn listing_key(&self, entity: EntityKind, pagination: &Pagination) -> String {
        format!(
            "{}.all.{}.{}",
            entity.cache_namespace(),
            pagination.per_page,
            pagination.page
        )
    }

    /// 需要失效的全部列表页键
    pub fn invalidation_keys(&self, entity: EntityKind) -> Vec<String> {
        (1..=self.cached_pages)
            .map(|page| self.listing_key(entity, &Pagination::new(page, self.default_per_page)))
            .collect()
    }
}

impl Default for ListingCachePolicy {
    fn default() -> Self {
        Self::from_config(&CatalogConfig::default())
    }
}

/// 服务层缓存封装
#[derive(Clone)]
pub struct ServiceCache {
    port: Arc<dyn CachePort>,
}

impl ServiceCache {
    pub fn new(port: Arc<dyn CachePort>) -> Self {
        Self { port }
    }

    pub fn port(&self) -> &Arc<dyn CachePort> {
        &self.port
    }

    /// 读取缓存，未命中时调用 `loader` 并永久写回
    pub async fn remember<T, F, Fut>(&self, key: &str, loader: F) -> AppResult<T>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = AppResult<T>>,
    {
        match self.port.get(key).await {
            Ok(Some(raw)) => match serde_json::from_str::<T>(&raw) {
                Ok(value) => {
                    record_cache_request("hit");
                    debug!(key, "Cache hit");
                    return Ok(value);
                }
                Err(e) => {
                    record_cache_request("error");
                    warn!(key, error = %e, "Discarding undecodable cache entry");
                }
            },
            Ok(None) => record_cache_request("miss"),
            Err(e) => {
                record_cache_request("error");
                warn!(key, error = %e, "Cache read failed, falling back to repository");
            }
        }

        let value = loader().await?;

        match serde_json::to_string(&value) {
            Ok(raw) => {
                if let Err(e) = self.port.set(key, &raw, None).await {
                    warn!(key, error = %e, "Cache write failed");
                }
            }
            Err(e) => warn!(key, error = %e, "Failed to encode cache entry"),
        }

        Ok(value)
    }

    /// 删除缓存键，失败只记录日志，返回是否成功
    pub async fn forget(&self, key: &str) -> bool {
        match self.port.delete(key).await {
            Ok(()) => true,
            Err(e) => {
                warn!(key, error = %e, "Cache forget failed");
                false
            }
        }
    }

    /// 批量删除，返回失败数量
    pub async fn forget_many<I, K>(&self, keys: I) -> usize
    where
        I: IntoIterator<Item = K>,
        K: AsRef<str>,
    {
        let mut failures = 0;
        for key in keys {
            if !self.forget(key.as_ref()).await {
                failures += 1;
            }
        }
        failures
    }
}

/// 某个实体的全部目录缓存键
pub fn entity_keys(entity: EntityKind, policy: &ListingCachePolicy) -> Vec<String> {
    let fixed: &[&str] = match entity {
        EntityKind::Product => &[keys::PRODUCTS_STATS, keys::PRODUCTS_ACTIVE_SELECT],
        EntityKind::Category => &[keys::CATEGORIES_STATS, keys::CATEGORIES_ACTIVE_SELECT],
        EntityKind::Brand => &[keys::BRANDS_STATS, keys::BRANDS_SELECT, keys::BRANDS_COUNTRIES],
        EntityKind::User => &[keys::USERS_STATS],
        EntityKind::Role => &[],
    };

    let mut all: Vec<String> = fixed.iter().map(|k| k.to_string()).collect();
    if entity != EntityKind::Role {
        all.extend(policy.invalidation_keys(entity));
    }
    all
}

/// 目录相关的全部缓存键（商品、分类、品牌、用户）
pub fn catalog_keys(policy: &ListingCachePolicy) -> Vec<String> {
    [
        EntityKind::Product,
        EntityKind::Category,
        EntityKind::Brand,
        EntityKind::User,
    ]
    .into_iter()
    .flat_map(|entity| entity_keys(entity, policy))
    .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::cache::MemoryCache;
    use ag_errors::AppError;
    use async_trait::async_trait;
    use mockall::mock;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    mock! {
        Cache {}

        #[async_trait]
        impl CachePort for Cache {
            async fn get(&self, key: &str) -> AppResult<Option<String>>;
            async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> AppResult<()>;
            async fn delete(&self, key: &str) -> AppResult<()>;
            async fn exists(&self, key: &str) -> AppResult<bool>;
            async fn expire(&self, key: &str, ttl: Duration) -> AppResult<()>;
            async fn incr(&self, key: &str) -> AppResult<i64>;
        }
    }

    fn broken_cache() -> MockCache {
        let mut cache = MockCache::new();
        cache
            .expect_get()
            .returning(|_| Err(AppError::external_service("cache down")));
        cache
            .expect_set()
            .times(1)
            .returning(|_, _, _| Err(AppError::external_service("cache down")));
        cache
            .expect_delete()
            .times(2)
            .returning(|_| Err(AppError::external_service("cache down")));
        cache
    }

    #[test]
    fn test_policy_range() {
        let policy = ListingCachePolicy::new(15, 10);
        assert!(policy.is_cacheable(&Pagination::new(1, 15)));
        assert!(policy.is_cacheable(&Pagination::new(10, 15)));
        assert!(!policy.is_cacheable(&Pagination::new(11, 15)));
        assert!(!policy.is_cacheable(&Pagination::new(1, 50)));

        let keys = policy.invalidation_keys(EntityKind::Product);
        assert_eq!(keys.len(), 10);
        assert_eq!(keys[0], "products.all.15.1");
        assert_eq!(keys[9], "products.all.15.10");
    }

    #[test]
    fn test_entity_keys() {
        let policy = ListingCachePolicy::new(15, 2);
        let keys = entity_keys(EntityKind::Category, &policy);
        assert!(keys.contains(&"categories.stats".to_string()));
        assert!(keys.contains(&"categories.active.select".to_string()));
        assert!(keys.contains(&"categories.all.15.2".to_string()));
        assert!(entity_keys(EntityKind::Role, &policy).is_empty());
    }

    #[tokio::test]
    async fn test_remember_loads_once() {
        let cache = ServiceCache::new(Arc::new(MemoryCache::new()));
        let calls = AtomicUsize::new(0);

        for _ in 0..3 {
            let value: u64 = cache
                .remember("numbers", || async {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok(42)
                })
                .await
                .unwrap();
            assert_eq!(value, 42);
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        assert!(cache.forget("numbers").await);
        let _: u64 = cache.remember("numbers", || async { Ok(7) }).await.unwrap();
        let cached: u64 = cache.remember("numbers", || async { Ok(0) }).await.unwrap();
        assert_eq!(cached, 7);
    }

    #[tokio::test]
    async fn test_broken_cache_falls_through() {
        let cache = ServiceCache::new(Arc::new(broken_cache()));
        let value: String = cache
            .remember("stats", || async { Ok("fresh".to_string()) })
            .await
            .unwrap();
        assert_eq!(value, "fresh");
        assert_eq!(cache.forget_many(["a", "b"]).await, 2);
    }
}
