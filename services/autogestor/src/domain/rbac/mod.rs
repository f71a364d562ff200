//! 角色与权限

mod permission;
mod role;

pub use permission::*;
pub use role::*;
