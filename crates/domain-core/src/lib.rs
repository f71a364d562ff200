//! domain-core - 领域核心 trait
//!
//! 实体、聚合根与软删除的公共抽象

mod entity;

pub use entity::*;

pub use ag_common::{AuditInfo, UserId};
