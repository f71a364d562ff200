//! 值对象

mod ids;
pub mod password;
pub mod sku;

pub use ids::*;
pub use password::HashedPassword;
