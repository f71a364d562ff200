//! 基础设施资源管理
//!
//! 数据库与 Redis 均为可选：未配置时服务回退到内存实现

use std::sync::Arc;

use ag_adapter_postgres::connect;
use ag_adapter_redis::RedisCache;
use ag_auth_core::TokenService;
use ag_config::AppConfig;
use ag_errors::AppResult;
use ag_ports::CachePort;
use secrecy::ExposeSecret;
use sqlx::PgPool;
use tracing::info;

use crate::retry::{RetryConfig, with_retry};

/// 基础设施资源容器
pub struct Infrastructure {
    config: AppConfig,
    postgres_pool: Option<PgPool>,
    redis_cache: Option<Arc<RedisCache>>,
    token_service: Arc<TokenService>,
}

impl Infrastructure {
    /// 从配置创建基础设施资源（带重试）
    pub async fn from_config(config: AppConfig) -> AppResult<Self> {
        let retry_config = RetryConfig::default();

        let postgres_pool = match &config.database {
            Some(database) => {
                let pool = with_retry(&retry_config, "PostgreSQL connection", || {
                    let url = database.url.expose_secret().clone();
                    let max_connections = database.max_connections;
                    async move { connect(&url, max_connections).await }
                })
                .await?;
                info!(max_connections = database.max_connections, "PostgreSQL connection pool created");
                Some(pool)
            }
            None => {
                info!("Database not configured, using in-memory storage");
                None
            }
        };

        let redis_cache = match &config.redis {
            Some(redis) => {
                let cache = with_retry(&retry_config, "Redis connection", || {
                    let url = redis.url.expose_secret().clone();
                    async move { RedisCache::connect(&url).await }
                })
                .await?;
                info!("Redis connection created");
                Some(Arc::new(cache.with_namespace(config.app_name.clone())))
            }
            None => {
                info!("Redis not configured, using in-process cache");
                None
            }
        };

        let token_service = Arc::new(TokenService::new(
            config.jwt.secret.expose_secret(),
            config.jwt.expires_in as i64,
            config.jwt.issuer.clone(),
            config.jwt.audience.clone(),
        ));

        Ok(Self {
            config,
            postgres_pool,
            redis_cache,
            token_service,
        })
    }

    /// 获取应用配置
    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// PostgreSQL 连接池（未配置数据库时为 None）
    pub fn postgres_pool(&self) -> Option<PgPool> {
        self.postgres_pool.clone()
    }

    /// Redis 缓存（未配置 Redis 时为 None）
    pub fn redis_cache(&self) -> Option<Arc<dyn CachePort>> {
        self.redis_cache
            .clone()
            .map(|cache| cache as Arc<dyn CachePort>)
    }

    /// 获取 Token 服务
    pub fn token_service(&self) -> Arc<TokenService> {
        self.token_service.clone()
    }
}
