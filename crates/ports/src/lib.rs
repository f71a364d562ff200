//! ports - 抽象 trait 层
//!
//! 定义基础设施的抽象接口，具体实现位于 adapters

mod cache;
mod event_publisher;

pub use cache::*;
pub use event_publisher::*;
