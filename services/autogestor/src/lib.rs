//! AutoGestor - 汽车配件库存与目录管理
//!
//! 商品、分类、品牌的维护与统计，用户、角色与权限管理

pub mod api;
pub mod application;
pub mod cli;
pub mod container;
pub mod domain;
pub mod infrastructure;
