//! ag-adapter-postgres - PostgreSQL 适配器
//!
//! 连接池、连通性检查与内嵌迁移

mod connection;
mod migration;

pub use connection::*;
pub use migration::*;
