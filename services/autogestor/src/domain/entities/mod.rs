//! 领域实体

mod brand;
mod category;
mod product;
mod user;

pub use brand::*;
pub use category::*;
pub use product::{Dimensions, Product, ProductData, Specification, StockOperation};
pub use user::*;
