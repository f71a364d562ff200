//! 事件处理方

use ag_errors::AppResult;
use async_trait::async_trait;

use crate::{DomainEvent, EventEnvelope};

/// 同步订阅总线上的事件；返回错误只影响自身
#[async_trait]
pub trait EventHandler<E: DomainEvent>: Send + Sync {
    fn name(&self) -> &'static str;

    async fn handle(&self, envelope: &EventEnvelope<E>) -> AppResult<()>;
}
