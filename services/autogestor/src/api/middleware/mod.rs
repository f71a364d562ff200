//! HTTP 中间件

pub mod admin_block;
pub mod auth;
pub mod permission;

pub use admin_block::block_admin;
pub use auth::{Actor, CurrentUser, authenticate};
pub use permission::{PermissionGate, check_permission, guard};
