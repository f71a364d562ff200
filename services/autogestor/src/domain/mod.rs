//! 领域层

pub mod entities;
pub mod events;
pub mod rbac;
pub mod repositories;
pub mod value_objects;
