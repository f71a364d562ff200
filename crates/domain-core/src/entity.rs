//! 实体基础 trait

use ag_common::AuditInfo;
use chrono::{DateTime, Utc};

/// 实体 trait
pub trait Entity {
    type Id;

    fn id(&self) -> &Self::Id;
}

/// 聚合根 trait
pub trait AggregateRoot: Entity {
    fn audit_info(&self) -> &AuditInfo;
    fn audit_info_mut(&mut self) -> &mut AuditInfo;
}

/// 支持软删除的实体
pub trait SoftDeletable {
    fn deleted_at(&self) -> Option<DateTime<Utc>>;
    fn set_deleted_at(&mut self, at: Option<DateTime<Utc>>);

    fn is_trashed(&self) -> bool {
        self.deleted_at().is_some()
    }

    fn soft_delete(&mut self) {
        self.set_deleted_at(Some(Utc::now()));
    }

    fn restore(&mut self) {
        self.set_deleted_at(None);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Draft {
        deleted_at: Option<DateTime<Utc>>,
    }

    impl SoftDeletable for Draft {
        fn deleted_at(&self) -> Option<DateTime<Utc>> {
            self.deleted_at
        }

        fn set_deleted_at(&mut self, at: Option<DateTime<Utc>>) {
            self.deleted_at = at;
        }
    }

    #[test]
    fn test_soft_delete_and_restore() {
        let mut draft = Draft { deleted_at: None };
        assert!(!draft.is_trashed());

        draft.soft_delete();
        assert!(draft.is_trashed());

        draft.restore();
        assert!(!draft.is_trashed());
    }
}
