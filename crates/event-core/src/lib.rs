//! ag-event-core - 事件核心库
//!
//! 领域事件、处理方与进程内事件总线

mod bus;
mod domain_event;
mod event_handler;

pub use bus::*;
pub use domain_event::*;
pub use event_handler::*;
