//! 权限定义
//!
//! 权限是封闭枚举，以名称持久化

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
#[error("Unknown permission: {0}")]
pub struct UnknownPermission(pub String);

macro_rules! permissions {
    ($($variant:ident => $name:literal),+ $(,)?) => {
        /// 权限种类
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        pub enum PermissionKind {
            $(
                #[serde(rename = $name)]
                $variant,
            )+
        }

        impl PermissionKind {
            pub const ALL: &'static [PermissionKind] = &[$(PermissionKind::$variant),+];

            pub fn as_str(&self) -> &'static str {
                match self {
                    $(PermissionKind::$variant => $name,)+
                }
            }
        }

        impl FromStr for PermissionKind {
            type Err = UnknownPermission;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s.trim() {
                    $($name => Ok(PermissionKind::$variant),)+
                    other => Err(UnknownPermission(other.to_string())),
                }
            }
        }
    };
}

permissions! {
    DashboardView => "dashboard.view",
    ProductsView => "products.view",
    ProductsCreate => "products.create",
    ProductsEdit => "products.edit",
    ProductsDelete => "products.delete",
    ProductsImport => "products.import",
    ProductsExport => "products.export",
    CategoriesView => "categories.view",
    CategoriesCreate => "categories.create",
    CategoriesEdit => "categories.edit",
    CategoriesDelete => "categories.delete",
    BrandsView => "brands.view",
    BrandsCreate => "brands.create",
    BrandsEdit => "brands.edit",
    BrandsDelete => "brands.delete",
    UsersView => "users.view",
    UsersCreate => "users.create",
    UsersEdit => "users.edit",
    UsersDelete => "users.delete",
    RolesManage => "roles.manage",
    PermissionsManage => "permissions.manage",
}

impl PermissionKind {
    /// 解析逗号分隔的权限列表，空项忽略
    pub fn parse_list(list: &str) -> Result<Vec<PermissionKind>, UnknownPermission> {
        list.split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(PermissionKind::from_str)
            .collect()
    }

    /// 所属资源前缀（`products.view` → `products`）
    pub fn resource(&self) -> &'static str {
        self.as_str().split('.').next().unwrap_or_default()
    }
}

impl fmt::Display for PermissionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_names_round_trip() {
        for kind in PermissionKind::ALL {
            assert_eq!(kind.as_str().parse::<PermissionKind>().unwrap(), *kind);
        }
    }

    #[test]
    fn test_parse_list() {
        let kinds = PermissionKind::parse_list("products.view, products.edit,").unwrap();
        assert_eq!(kinds, vec![PermissionKind::ProductsView, PermissionKind::ProductsEdit]);

        let err = PermissionKind::parse_list("products.view,products.fly").unwrap_err();
        assert_eq!(err, UnknownPermission("products.fly".to_string()));
    }

    #[test]
    fn test_serde_uses_names() {
        let json = serde_json::to_string(&PermissionKind::RolesManage).unwrap();
        assert_eq!(json, "\"roles.manage\"");
        assert_eq!(PermissionKind::BrandsDelete.resource(), "brands");
    }
}
