//! 仓储接口

mod brand_repository;
mod category_repository;
mod filters;
mod product_repository;
mod role_repository;
mod user_repository;

pub use brand_repository::*;
pub use category_repository::*;
pub use filters::*;
pub use product_repository::*;
pub use role_repository::*;
pub use user_repository::*;
