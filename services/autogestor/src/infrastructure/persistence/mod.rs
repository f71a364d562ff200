//! 持久化实现：PostgreSQL 与内存

mod memory;
pub mod postgres;

pub use memory::{
    InMemoryBrandRepository, InMemoryCategoryRepository, InMemoryProductRepository,
    InMemoryRoleRepository, InMemoryStore, InMemoryUserRepository,
};
pub use postgres::{
    PostgresBrandRepository, PostgresCategoryRepository, PostgresProductRepository,
    PostgresRoleRepository, PostgresUserRepository, migrations,
};
