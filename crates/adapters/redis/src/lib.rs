//! ag-adapter-redis - Redis 适配器

mod cache;

pub use cache::*;
