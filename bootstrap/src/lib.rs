//! ag-bootstrap - 统一服务启动骨架
//!
//! 配置加载之后的共用启动逻辑：日志、基础设施连接、健康检查与 HTTP 服务

mod health;
mod infrastructure;
mod retry;
mod runtime;
mod server;

pub use health::*;
pub use infrastructure::*;
pub use retry::*;
pub use runtime::*;
pub use server::*;
