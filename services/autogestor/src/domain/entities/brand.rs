//! 品牌实体

use ag_common::AuditInfo;
use ag_domain_core::{AggregateRoot, Entity};
use serde::{Deserialize, Serialize};

use super::product::normalize_optional;
use crate::domain::value_objects::{BrandId, UserId};

/// 品牌写入数据
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BrandData {
    pub name: String,
    pub country_of_origin: Option<String>,
    pub founded_year: Option<i32>,
    pub website: Option<String>,
    pub description: Option<String>,
}

/// 品牌
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Brand {
    pub id: BrandId,
    pub name: String,
    pub country_of_origin: Option<String>,
    pub founded_year: Option<i32>,
    pub website: Option<String>,
    pub description: Option<String>,
    pub audit_info: AuditInfo,
}

/// 品牌及其商品数
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BrandWithCount {
    #[serde(flatten)]
    pub brand: Brand,
    pub products_count: u64,
}

impl Brand {
    pub fn new(data: BrandData, actor: Option<UserId>) -> Self {
        Self {
            id: BrandId::new(),
            name: data.name.trim().to_string(),
            country_of_origin: normalize_optional(data.country_of_origin),
            founded_year: data.founded_year,
            website: normalize_optional(data.website),
            description: normalize_optional(data.description),
            audit_info: AuditInfo::new(actor),
        }
    }

    pub fn apply(&mut self, data: BrandData, actor: Option<UserId>) {
        self.name = data.name.trim().to_string();
        self.country_of_origin = normalize_optional(data.country_of_origin);
        self.founded_year = data.founded_year;
        self.website = normalize_optional(data.website);
        self.description = normalize_optional(data.description);
        self.audit_info.update(actor);
    }
}

impl Entity for Brand {
    type Id = BrandId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

impl AggregateRoot for Brand {
    fn audit_info(&self) -> &AuditInfo {
        &self.audit_info
    }

    fn audit_info_mut(&mut self) -> &mut AuditInfo {
        &mut self.audit_info
    }
}
