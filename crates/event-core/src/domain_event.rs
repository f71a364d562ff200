//! 领域事件与事件信封

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// 领域事件
pub trait DomainEvent: Send + Sync {
    /// 记录类型，例如 `product`
    fn subject_type(&self) -> &'static str;

    /// 变更动作，例如 `updated`
    fn action(&self) -> &'static str;

    /// 被变更记录的 ID
    fn subject_id(&self) -> Uuid;

    /// 操作人，系统操作时为空
    fn actor(&self) -> Option<Uuid> {
        None
    }

    /// `{subject_type}.{action}`
    fn name(&self) -> String {
        format!("{}.{}", self.subject_type(), self.action())
    }
}

/// 分发给处理方的事件信封
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventEnvelope<E> {
    pub id: Uuid,
    pub name: String,
    pub subject_id: Uuid,
    pub actor: Option<Uuid>,
    pub occurred_at: DateTime<Utc>,
    pub data: E,
}

impl<E: DomainEvent> EventEnvelope<E> {
    pub fn wrap(event: E) -> Self {
        Self {
            id: Uuid::now_v7(),
            name: event.name(),
            subject_id: event.subject_id(),
            actor: event.actor(),
            occurred_at: Utc::now(),
            data: event,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Archived(Uuid);

    impl DomainEvent for Archived {
        fn subject_type(&self) -> &'static str {
            "widget"
        }

        fn action(&self) -> &'static str {
            "archived"
        }

        fn subject_id(&self) -> Uuid {
            self.0
        }
    }

    #[test]
    fn test_wrap_copies_event_identity() {
        let id = Uuid::now_v7();
        let envelope = EventEnvelope::wrap(Archived(id));
        assert_eq!(envelope.name, "widget.archived");
        assert_eq!(envelope.subject_id, id);
        assert_eq!(envelope.actor, None);
        assert_ne!(envelope.id, id);
    }
}
