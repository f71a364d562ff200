//! Event Publisher trait 定义

use async_trait::async_trait;

/// 事件发布者 trait
///
/// 发布发生在写操作提交之后，处理方的失败不会回传给发布方
#[async_trait]
pub trait EventPublisher<E>: Send + Sync
where
    E: Send + Sync + 'static,
{
    /// 发布事件
    async fn publish(&self, event: E);
}
