//! 服务装配
//!
//! 存储：配置了数据库时用 PostgreSQL，否则用内存存储。
//! 缓存：配置了 Redis 时用 Redis，否则用进程内缓存

use std::sync::Arc;

use ag_adapter_postgres::MigrationManager;
use ag_bootstrap::Infrastructure;
use ag_config::CatalogConfig;
use ag_errors::AppResult;
use ag_ports::CachePort;
use sqlx::PgPool;
use tracing::info;

use crate::application::maintenance::Maintenance;
use crate::application::{
    AuthorizationService, BrandService, CategoryService, DashboardService, EventSink,
    ListingCachePolicy, PermissionCache, ProductService, RoleService, ServiceCache, UserService,
};
use crate::domain::repositories::{
    BrandRepository, CategoryRepository, ProductRepository, RoleRepository, UserRepository,
};
use crate::infrastructure::cache::MemoryCache;
use crate::infrastructure::events::build_event_bus;
use crate::infrastructure::persistence::{
    InMemoryBrandRepository, InMemoryCategoryRepository, InMemoryProductRepository,
    InMemoryRoleRepository, InMemoryStore, InMemoryUserRepository, PostgresBrandRepository,
    PostgresCategoryRepository, PostgresProductRepository, PostgresRoleRepository,
    PostgresUserRepository, migrations,
};

/// 一组仓储实现
#[derive(Clone)]
pub struct Repositories {
    pub products: Arc<dyn ProductRepository>,
    pub categories: Arc<dyn CategoryRepository>,
    pub brands: Arc<dyn BrandRepository>,
    pub users: Arc<dyn UserRepository>,
    pub roles: Arc<dyn RoleRepository>,
}

impl Repositories {
    pub fn in_memory(store: InMemoryStore) -> Self {
        Self {
            products: Arc::new(InMemoryProductRepository::new(store.clone())),
            categories: Arc::new(InMemoryCategoryRepository::new(store.clone())),
            brands: Arc::new(InMemoryBrandRepository::new(store.clone())),
            users: Arc::new(InMemoryUserRepository::new(store.clone())),
            roles: Arc::new(InMemoryRoleRepository::new(store)),
        }
    }

    pub fn postgres(pool: PgPool) -> Self {
        Self {
            products: Arc::new(PostgresProductRepository::new(pool.clone())),
            categories: Arc::new(PostgresCategoryRepository::new(pool.clone())),
            brands: Arc::new(PostgresBrandRepository::new(pool.clone())),
            users: Arc::new(PostgresUserRepository::new(pool.clone())),
            roles: Arc::new(PostgresRoleRepository::new(pool)),
        }
    }
}

/// 已装配的应用服务
#[derive(Clone)]
pub struct Container {
    pub products: Arc<ProductService>,
    pub categories: Arc<CategoryService>,
    pub brands: Arc<BrandService>,
    pub users: Arc<UserService>,
    pub roles: Arc<RoleService>,
    pub dashboard: Arc<DashboardService>,
    pub maintenance: Arc<Maintenance>,
    pub authorization: AuthorizationService,
    pub policy: ListingCachePolicy,
    pub cache: Arc<dyn CachePort>,
}

impl Container {
    /// 内存存储 + 进程内缓存
    pub fn in_memory(catalog: &CatalogConfig) -> Self {
        Self::assemble(
            Repositories::in_memory(InMemoryStore::new()),
            Arc::new(MemoryCache::new()),
            catalog,
        )
    }

    /// 按基础设施配置装配，必要时执行迁移
    pub async fn from_infrastructure(infra: &Infrastructure) -> AppResult<Self> {
        let config = infra.config();
        let cache: Arc<dyn CachePort> = match infra.redis_cache() {
            Some(cache) => cache,
            None => Arc::new(MemoryCache::new()),
        };

        let repositories = match infra.postgres_pool() {
            Some(pool) => {
                let run_migrations = config
                    .database
                    .as_ref()
                    .is_some_and(|database| database.run_migrations);
                if run_migrations {
                    let report = MigrationManager::new(pool.clone())
                        .migrate(&migrations())
                        .await?;
                    info!(
                        applied = report.applied_count(),
                        skipped = report.skipped.len(),
                        "Database migrations finished"
                    );
                }
                Repositories::postgres(pool)
            }
            None => Repositories::in_memory(InMemoryStore::new()),
        };

        Ok(Self::assemble(repositories, cache, &config.catalog))
    }

    pub fn assemble(
        repositories: Repositories,
        cache: Arc<dyn CachePort>,
        catalog: &CatalogConfig,
    ) -> Self {
        let policy = ListingCachePolicy::from_config(catalog);
        let service_cache = ServiceCache::new(cache.clone());
        let permissions = PermissionCache::new(cache.clone());

        let bus = build_event_bus(
            service_cache.clone(),
            policy,
            repositories.users.clone(),
            repositories.roles.clone(),
            permissions.clone(),
        );
        let events: EventSink = Arc::new(bus);

        let products = Arc::new(ProductService::new(
            repositories.products.clone(),
            repositories.categories.clone(),
            repositories.brands.clone(),
            service_cache.clone(),
            policy,
            events.clone(),
        ));
        let categories = Arc::new(CategoryService::new(
            repositories.categories.clone(),
            repositories.products.clone(),
            service_cache.clone(),
            policy,
            events.clone(),
        ));
        let brands = Arc::new(BrandService::new(
            repositories.brands.clone(),
            repositories.products.clone(),
            service_cache.clone(),
            policy,
            events.clone(),
        ));
        let users = Arc::new(UserService::new(
            repositories.users.clone(),
            repositories.roles.clone(),
            permissions.clone(),
            service_cache.clone(),
            policy,
            events.clone(),
        ));
        let roles = Arc::new(RoleService::new(
            repositories.roles.clone(),
            repositories.users.clone(),
            permissions.clone(),
            events,
        ));
        let dashboard = Arc::new(DashboardService::new(
            products.clone(),
            categories.clone(),
            brands.clone(),
            users.clone(),
            catalog.low_stock_limit,
        ));
        let maintenance = Arc::new(Maintenance::new(
            users.clone(),
            roles.clone(),
            service_cache,
            policy,
        ));
        let authorization = AuthorizationService::new(repositories.roles, permissions);

        Self {
            products,
            categories,
            brands,
            users,
            roles,
            dashboard,
            maintenance,
            authorization,
            policy,
            cache,
        }
    }
}
