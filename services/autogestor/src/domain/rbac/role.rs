//! 角色实体

use std::collections::BTreeSet;

use ag_common::AuditInfo;
use ag_domain_core::{AggregateRoot, Entity};
use serde::{Deserialize, Serialize};

use super::permission::PermissionKind;
use crate::domain::value_objects::{RoleId, UserId};

/// 管理员角色
pub const ADMIN_ROLE: &str = "admin";

/// 普通员工角色
pub const USER_ROLE: &str = "user";

/// 受保护、不可删除的角色
pub const PROTECTED_ROLES: &[&str] = &[ADMIN_ROLE, USER_ROLE];

/// 角色
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Role {
    pub id: RoleId,
    pub name: String,
    pub permissions: BTreeSet<PermissionKind>,
    pub audit_info: AuditInfo,
}

impl Role {
    pub fn new(name: &str, permissions: BTreeSet<PermissionKind>, actor: Option<UserId>) -> Self {
        Self {
            id: RoleId::new(),
            name: normalize_role_name(name),
            permissions,
            audit_info: AuditInfo::new(actor),
        }
    }

    /// 不带任何权限的角色
    pub fn bare(name: &str) -> Self {
        Self::new(name, BTreeSet::new(), None)
    }

    pub fn has_permission(&self, permission: PermissionKind) -> bool {
        self.permissions.contains(&permission)
    }

    /// 同步权限集合，返回是否有变化
    pub fn sync_permissions(&mut self, permissions: BTreeSet<PermissionKind>, actor: Option<UserId>) -> bool {
        if self.permissions == permissions {
            return false;
        }
        self.permissions = permissions;
        self.audit_info.update(actor);
        true
    }

    pub fn is_protected(&self) -> bool {
        PROTECTED_ROLES.contains(&self.name.as_str())
    }
}

pub fn normalize_role_name(name: &str) -> String {
    name.trim().to_lowercase()
}

/// 默认角色的权限集合
pub fn default_permissions(role_name: &str) -> BTreeSet<PermissionKind> {
    use PermissionKind::*;

    match role_name {
        ADMIN_ROLE => [
            DashboardView,
            UsersView,
            UsersCreate,
            UsersEdit,
            UsersDelete,
            RolesManage,
            PermissionsManage,
        ]
        .into_iter()
        .collect(),
        USER_ROLE => [
            DashboardView,
            ProductsView,
            ProductsCreate,
            ProductsEdit,
            ProductsDelete,
            ProductsImport,
            ProductsExport,
            CategoriesView,
            CategoriesCreate,
            CategoriesEdit,
            CategoriesDelete,
            BrandsView,
            BrandsCreate,
            BrandsEdit,
            BrandsDelete,
        ]
        .into_iter()
        .collect(),
        _ => BTreeSet::new(),
    }
}

/// 按邮箱决定默认角色：包含 `admin`（不区分大小写）为管理员
pub fn default_role_for_email<'a>(email: &str, fallback: &'a str) -> &'a str {
    if email.to_lowercase().contains(ADMIN_ROLE) {
        ADMIN_ROLE
    } else {
        fallback
    }
}

impl Entity for Role {
    type Id = RoleId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

impl AggregateRoot for Role {
    fn audit_info(&self) -> &AuditInfo {
        &self.audit_info
    }

    fn audit_info_mut(&mut self) -> &mut AuditInfo {
        &mut self.audit_info
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_role_for_email() {
        assert_eq!(default_role_for_email("ADMIN@shop.com", USER_ROLE), ADMIN_ROLE);
        assert_eq!(default_role_for_email("sysadmin.ops@shop.com", USER_ROLE), ADMIN_ROLE);
        assert_eq!(default_role_for_email("ana@shop.com", USER_ROLE), USER_ROLE);
        assert_eq!(default_role_for_email("ana@shop.com", "auditor"), "auditor");
    }

    #[test]
    fn test_admin_defaults_exclude_catalog() {
        let admin = default_permissions(ADMIN_ROLE);
        assert!(admin.contains(&PermissionKind::UsersEdit));
        assert!(!admin.iter().any(|p| p.resource() == "products"));

        let user = default_permissions(USER_ROLE);
        assert!(user.contains(&PermissionKind::ProductsView));
        assert!(!user.contains(&PermissionKind::RolesManage));
    }

    #[test]
    fn test_sync_permissions_reports_change() {
        let mut role = Role::bare(" Editor ");
        assert_eq!(role.name, "editor");
        assert!(!role.sync_permissions(BTreeSet::new(), None));
        assert!(role.sync_permissions([PermissionKind::BrandsView].into_iter().collect(), None));
        assert!(role.has_permission(PermissionKind::BrandsView));
        assert!(!role.is_protected());
        assert!(Role::bare("admin").is_protected());
    }
}
