//! Cache trait 定义

use ag_errors::AppResult;
use async_trait::async_trait;
use std::time::Duration;

/// 缓存 trait
///
/// 值统一为字符串，序列化由调用方负责
#[async_trait]
pub trait CachePort: Send + Sync {
    /// 获取缓存值
    async fn get(&self, key: &str) -> AppResult<Option<String>>;

    /// 设置缓存值，`ttl` 为 `None` 时永不过期
    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> AppResult<()>;

    /// 删除缓存
    async fn delete(&self, key: &str) -> AppResult<()>;

    /// 检查是否存在
    async fn exists(&self, key: &str) -> AppResult<bool>;

    /// 设置过期时间
    async fn expire(&self, key: &str, ttl: Duration) -> AppResult<()>;

    /// 原子自增，键不存在时从 0 开始
    async fn incr(&self, key: &str) -> AppResult<i64>;

    /// 连通性检查
    async fn ping(&self) -> AppResult<()> {
        Ok(())
    }
}
