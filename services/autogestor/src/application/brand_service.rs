//! 品牌服务

use std::sync::Arc;

use ag_common::{PagedResult, Pagination};
use ag_errors::{AppError, AppResult, FieldErrors};
use chrono::{Datelike, Utc};
use tracing::info;

use super::EventSink;
use super::cache::{ListingCachePolicy, ServiceCache, keys};
use super::export::{self, write_csv};
use super::validation::{self, MAX_NAME_LEN};
use crate::domain::entities::{Brand, BrandData, BrandWithCount};
use crate::domain::events::{ChangeKind, EntityChanged, EntityKind, FieldChange, diff};
use crate::domain::repositories::{
    BrandFilter, BrandRepository, BrandStats, ProductRepository, SelectOption,
};
use crate::domain::value_objects::{BrandId, UserId};

const COUNTRY_MAX_LEN: usize = 100;
const DESCRIPTION_MAX_LEN: usize = 1000;
const EARLIEST_FOUNDED_YEAR: i32 = 1800;

pub const EXPORT_HEADER: &[&str] = &[
    "id",
    "name",
    "country_of_origin",
    "founded_year",
    "website",
    "description",
    "products_count",
    "created_at",
];

pub struct BrandService {
    brands: Arc<dyn BrandRepository>,
    products: Arc<dyn ProductRepository>,
    cache: ServiceCache,
    policy: ListingCachePolicy,
    events: EventSink,
}

impl BrandService {
    pub fn new(
        brands: Arc<dyn BrandRepository>,
        products: Arc<dyn ProductRepository>,
        cache: ServiceCache,
        policy: ListingCachePolicy,
        events: EventSink,
    ) -> Self {
        Self {
            brands,
            products,
            cache,
            policy,
            events,
        }
    }

    pub async fn list(&self, filter: &BrandFilter, pagination: Pagination) -> AppResult<PagedResult<Brand>> {
        if filter.is_default() && self.policy.is_cacheable(&pagination) {
            let key = self.policy.listing_key(EntityKind::Brand, &pagination);
            return self
                .cache
                .remember(&key, || self.brands.list(filter, pagination))
                .await;
        }
        self.brands.list(filter, pagination).await
    }

    pub async fn search(&self, term: &str, pagination: Pagination) -> AppResult<PagedResult<Brand>> {
        self.brands.list(&BrandFilter::search(term), pagination).await
    }

    pub async fn find(&self, id: BrandId) -> AppResult<Option<Brand>> {
        self.brands.find_by_id(id).await
    }

    pub async fn get(&self, id: BrandId) -> AppResult<Brand> {
        self.brands
            .find_by_id(id)
            .await?
            .ok_or_else(|| AppError::not_found(format!("Brand {} not found", id)))
    }

    pub async fn find_by_name(&self, name: &str) -> AppResult<Option<Brand>> {
        self.brands.find_by_name(name.trim()).await
    }

    pub async fn products_count(&self, id: BrandId) -> AppResult<u64> {
        self.products.count_by_brand(id).await
    }

    pub async fn stats(&self) -> AppResult<BrandStats> {
        self.cache
            .remember(keys::BRANDS_STATS, || self.brands.stats())
            .await
    }

    pub async fn select(&self) -> AppResult<Vec<SelectOption>> {
        self.cache
            .remember(keys::BRANDS_SELECT, || self.brands.select())
            .await
    }

    pub async fn countries(&self) -> AppResult<Vec<String>> {
        self.cache
            .remember(keys::BRANDS_COUNTRIES, || self.brands.countries())
            .await
    }

    pub async fn top_by_product_count(&self, limit: usize) -> AppResult<Vec<BrandWithCount>> {
        self.brands.top_by_product_count(limit).await
    }

    pub async fn recent(&self, limit: usize) -> AppResult<Vec<Brand>> {
        self.brands.recent(limit).await
    }

    pub async fn validate_brand_data(
        &self,
        data: &BrandData,
        ignore: Option<BrandId>,
    ) -> AppResult<FieldErrors> {
        let mut errors = FieldErrors::new();

        if validation::required(&mut errors, "name", &data.name) {
            validation::max_len(&mut errors, "name", &data.name, MAX_NAME_LEN);
            let existing = self.brands.find_by_name(data.name.trim()).await?;
            if existing.is_some_and(|b| Some(b.id) != ignore) {
                validation::taken(&mut errors, "name");
            }
        }
        validation::optional_max_len(
            &mut errors,
            "country_of_origin",
            data.country_of_origin.as_deref(),
            COUNTRY_MAX_LEN,
        );
        validation::optional_max_len(
            &mut errors,
            "description",
            data.description.as_deref(),
            DESCRIPTION_MAX_LEN,
        );
        validation::url(&mut errors, "website", data.website.as_deref());

        let current_year = Utc::now().year();
        if data
            .founded_year
            .is_some_and(|year| !(EARLIEST_FOUNDED_YEAR..=current_year).contains(&year))
        {
            errors.add(
                "founded_year",
                format!(
                    "The founded year must be between {} and {}.",
                    EARLIEST_FOUNDED_YEAR, current_year
                ),
            );
        }

        Ok(errors)
    }

    pub async fn create(&self, data: BrandData, actor: Option<UserId>) -> AppResult<Brand> {
        info!(name = %data.name, "Creating brand");
        self.validate_brand_data(&data, None).await?.into_result()?;

        let brand = Brand::new(data, actor);
        self.brands.insert(&brand).await?;

        info!(brand_id = %brand.id, "Brand created");
        self.publish(&brand, ChangeKind::Created, Vec::new(), actor)
            .await;
        Ok(brand)
    }

    pub async fn update(&self, id: BrandId, data: BrandData, actor: Option<UserId>) -> AppResult<Brand> {
        let mut brand = self.get(id).await?;
        self.validate_brand_data(&data, Some(id)).await?.into_result()?;

        let before = brand.clone();
        brand.apply(data, actor);
        self.brands.update(&brand).await?;

        info!(brand_id = %id, "Brand updated");
        self.publish(&brand, ChangeKind::Updated, diff(&before, &brand), actor)
            .await;
        Ok(brand)
    }

    /// 删除品牌，其商品保留但不再关联品牌
    pub async fn delete(&self, id: BrandId, actor: Option<UserId>) -> AppResult<()> {
        let brand = self.get(id).await?;
        let detached = self.products.count_by_brand(id).await?;

        self.brands.delete(id).await?;

        info!(brand_id = %id, detached_products = detached, "Brand deleted");
        self.publish(&brand, ChangeKind::Deleted, Vec::new(), actor)
            .await;
        Ok(())
    }

    pub async fn export_csv(&self, filter: &BrandFilter) -> AppResult<Vec<u8>> {
        let brands = self.brands.all(filter).await?;

        let mut rows = Vec::with_capacity(brands.len());
        for brand in brands {
            let count = self.products.count_by_brand(brand.id).await?;
            rows.push(vec![
                brand.id.to_string(),
                brand.name,
                export::opt_text(brand.country_of_origin.as_deref()),
                export::opt_int(brand.founded_year),
                export::opt_text(brand.website.as_deref()),
                export::opt_text(brand.description.as_deref()),
                count.to_string(),
                export::timestamp(brand.audit_info.created_at),
            ]);
        }

        write_csv(EXPORT_HEADER, rows)
    }

    async fn publish(&self, brand: &Brand, kind: ChangeKind, changes: Vec<FieldChange>, actor: Option<UserId>) {
        let event = EntityChanged::new(EntityKind::Brand, kind, brand.id.0, brand.name.clone(), actor)
            .with_changes(changes);
        self.events.publish(event).await;
    }
}
