//! 进程内事件总线
//!
//! 按注册顺序依次调用处理方；单个处理方失败只记录警告，其余处理方照常执行

use std::sync::Arc;

use ag_ports::EventPublisher;
use async_trait::async_trait;

use crate::{DomainEvent, EventEnvelope, EventHandler};

pub struct EventBus<E: DomainEvent> {
    handlers: Vec<Arc<dyn EventHandler<E>>>,
}

impl<E: DomainEvent> EventBus<E> {
    pub fn new() -> Self {
        Self {
            handlers: Vec::new(),
        }
    }

    pub fn with_handler(mut self, handler: Arc<dyn EventHandler<E>>) -> Self {
        self.handlers.push(handler);
        self
    }

    pub fn register(&mut self, handler: Arc<dyn EventHandler<E>>) {
        self.handlers.push(handler);
    }

    pub fn handler_count(&self) -> usize {
        self.handlers.len()
    }

    /// 分发一个已封装的事件，返回失败的处理方数量
    pub async fn dispatch(&self, envelope: &EventEnvelope<E>) -> usize {
        let mut failures = 0;
        for handler in &self.handlers {
            if let Err(e) = handler.handle(envelope).await {
                failures += 1;
                tracing::warn!(
                    handler = handler.name(),
                    event = %envelope.name,
                    subject_id = %envelope.subject_id,
                    error = %e,
                    "Event handler failed"
                );
            }
        }
        failures
    }
}

impl<E: DomainEvent> Default for EventBus<E> {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl<E> EventPublisher<E> for EventBus<E>
where
    E: DomainEvent + 'static,
{
    async fn publish(&self, event: E) {
        let envelope = EventEnvelope::wrap(event);
        self.dispatch(&envelope).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ag_errors::{AppError, AppResult};
    use parking_lot::Mutex;
    use uuid::Uuid;

    struct Renamed {
        id: Uuid,
        actor: Uuid,
    }

    impl Renamed {
        fn new() -> Self {
            Self {
                id: Uuid::now_v7(),
                actor: Uuid::now_v7(),
            }
        }
    }

    impl DomainEvent for Renamed {
        fn subject_type(&self) -> &'static str {
            "widget"
        }

        fn action(&self) -> &'static str {
            "renamed"
        }

        fn subject_id(&self) -> Uuid {
            self.id
        }

        fn actor(&self) -> Option<Uuid> {
            Some(self.actor)
        }
    }

    struct Recorder {
        seen: Arc<Mutex<Vec<String>>>,
    }

    #[async_trait]
    impl EventHandler<Renamed> for Recorder {
        fn name(&self) -> &'static str {
            "recorder"
        }

        async fn handle(&self, envelope: &EventEnvelope<Renamed>) -> AppResult<()> {
            self.seen.lock().push(format!(
                "{}:{}",
                envelope.name,
                envelope.actor.map(|a| a.to_string()).unwrap_or_default()
            ));
            Ok(())
        }
    }

    struct Failing;

    #[async_trait]
    impl EventHandler<Renamed> for Failing {
        fn name(&self) -> &'static str {
            "failing"
        }

        async fn handle(&self, _envelope: &EventEnvelope<Renamed>) -> AppResult<()> {
            Err(AppError::internal("boom"))
        }
    }

    #[tokio::test]
    async fn test_failing_handler_does_not_stop_others() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let bus = EventBus::new()
            .with_handler(Arc::new(Failing))
            .with_handler(Arc::new(Recorder { seen: seen.clone() }));

        let envelope = EventEnvelope::wrap(Renamed::new());
        let failures = bus.dispatch(&envelope).await;

        assert_eq!(failures, 1);
        assert_eq!(seen.lock().len(), 1);
    }

    #[tokio::test]
    async fn test_publish_carries_actor_into_envelope() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let bus = EventBus::new().with_handler(Arc::new(Recorder { seen: seen.clone() }));

        let event = Renamed::new();
        let expected = format!("widget.renamed:{}", event.actor);
        bus.publish(event).await;

        assert_eq!(seen.lock().as_slice(), [expected]);
    }
}
