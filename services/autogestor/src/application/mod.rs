//! 应用层

pub mod authorization;
pub mod brand_service;
pub mod cache;
pub mod category_service;
pub mod dashboard_service;
pub mod export;
pub mod maintenance;
pub mod product_service;
pub mod reports;
pub mod role_service;
pub mod user_service;
mod validation;

use std::sync::Arc;

use ag_ports::EventPublisher;

use crate::domain::events::EntityChanged;

pub use authorization::{AuthorizationService, PermissionCache, PermissionCacheScope, UserAccess};
pub use brand_service::BrandService;
pub use cache::{ListingCachePolicy, ServiceCache};
pub use category_service::CategoryService;
pub use dashboard_service::{Dashboard, DashboardService};
pub use product_service::{ProductBulkUpdate, ProductService};
pub use reports::{BulkFailure, BulkReport, ImportReport, ImportRowError};
pub use role_service::{RoleData, RoleService, RoleSummary, SeedReport};
pub use user_service::{UserBulkUpdate, UserService};

/// 实体变更事件的发布端
pub type EventSink = Arc<dyn EventPublisher<EntityChanged>>;
