//! 分类服务

use std::sync::Arc;

use ag_common::{PagedResult, Pagination};
use ag_errors::{AppError, AppResult, FieldErrors};
use tracing::info;

use super::EventSink;
use super::cache::{ListingCachePolicy, ServiceCache, keys};
use super::export::{self, write_csv};
use super::validation::{self, MAX_NAME_LEN};
use crate::domain::entities::{Category, CategoryData, CategoryWithCount};
use crate::domain::events::{ChangeKind, EntityChanged, EntityKind, FieldChange, diff};
use crate::domain::repositories::{
    CategoryFilter, CategoryRepository, CategoryStats, ProductRepository, SelectOption,
};
use crate::domain::value_objects::{CategoryId, UserId};

const DESCRIPTION_MAX_LEN: usize = 1000;

pub const EXPORT_HEADER: &[&str] = &[
    "id",
    "name",
    "description",
    "is_active",
    "products_count",
    "created_at",
];

pub struct CategoryService {
    categories: Arc<dyn CategoryRepository>,
    products: Arc<dyn ProductRepository>,
    cache: ServiceCache,
    policy: ListingCachePolicy,
    events: EventSink,
}

impl CategoryService {
    pub fn new(
        categories: Arc<dyn CategoryRepository>,
        products: Arc<dyn ProductRepository>,
        cache: ServiceCache,
        policy: ListingCachePolicy,
        events: EventSink,
    ) -> Self {
        Self {
            categories,
            products,
            cache,
            policy,
            events,
        }
    }

    pub async fn list(
        &self,
        filter: &CategoryFilter,
        pagination: Pagination,
    ) -> AppResult<PagedResult<Category>> {
        if filter.is_default() && self.policy.is_cacheable(&pagination) {
            let key = self.policy.listing_key(EntityKind::Category, &pagination);
            return self
                .cache
                .remember(&key, || self.categories.list(filter, pagination))
                .await;
        }
        self.categories.list(filter, pagination).await
    }

    pub async fn search(&self, term: &str, pagination: Pagination) -> AppResult<PagedResult<Category>> {
        self.categories
            .list(&CategoryFilter::search(term), pagination)
            .await
    }

    pub async fn find(&self, id: CategoryId) -> AppResult<Option<Category>> {
        self.categories.find_by_id(id).await
    }

    pub async fn get(&self, id: CategoryId) -> AppResult<Category> {
        self.categories
            .find_by_id(id)
            .await?
            .ok_or_else(|| AppError::not_found(format!("Category {} not found", id)))
    }

    pub async fn find_by_name(&self, name: &str) -> AppResult<Option<Category>> {
        self.categories.find_by_name(name.trim()).await
    }

    pub async fn products_count(&self, id: CategoryId) -> AppResult<u64> {
        self.products.count_by_category(id).await
    }

    pub async fn stats(&self) -> AppResult<CategoryStats> {
        self.cache
            .remember(keys::CATEGORIES_STATS, || self.categories.stats())
            .await
    }

    pub async fn active_select(&self) -> AppResult<Vec<SelectOption>> {
        self.cache
            .remember(keys::CATEGORIES_ACTIVE_SELECT, || {
                self.categories.active_select()
            })
            .await
    }

    pub async fn top_by_product_count(&self, limit: usize) -> AppResult<Vec<CategoryWithCount>> {
        self.categories.top_by_product_count(limit).await
    }

    pub async fn recent(&self, limit: usize) -> AppResult<Vec<Category>> {
        self.categories.recent(limit).await
    }

    pub async fn validate_category_data(
        &self,
        data: &CategoryData,
        ignore: Option<CategoryId>,
    ) -> AppResult<FieldErrors> {
        let mut errors = FieldErrors::new();

        if validation::required(&mut errors, "name", &data.name) {
            validation::max_len(&mut errors, "name", &data.name, MAX_NAME_LEN);
            let existing = self.categories.find_by_name(data.name.trim()).await?;
            if existing.is_some_and(|c| Some(c.id) != ignore) {
                validation::taken(&mut errors, "name");
            }
        }
        validation::optional_max_len(
            &mut errors,
            "description",
            data.description.as_deref(),
            DESCRIPTION_MAX_LEN,
        );

        Ok(errors)
    }

    pub async fn create(&self, data: CategoryData, actor: Option<UserId>) -> AppResult<Category> {
        info!(name = %data.name, "Creating category");
        self.validate_category_data(&data, None).await?.into_result()?;

        let category = Category::new(data, actor);
        self.categories.insert(&category).await?;

        info!(category_id = %category.id, "Category created");
        self.publish(&category, ChangeKind::Created, Vec::new(), actor)
            .await;
        Ok(category)
    }

    pub async fn update(
        &self,
        id: CategoryId,
        data: CategoryData,
        actor: Option<UserId>,
    ) -> AppResult<Category> {
        let mut category = self.get(id).await?;
        self.validate_category_data(&data, Some(id)).await?.into_result()?;

        let before = category.clone();
        category.apply(data, actor);
        self.categories.update(&category).await?;

        info!(category_id = %id, "Category updated");
        self.publish(&category, ChangeKind::Updated, diff(&before, &category), actor)
            .await;
        Ok(category)
    }

    /// 删除分类；仍有商品时拒绝
    pub async fn delete(&self, id: CategoryId, actor: Option<UserId>) -> AppResult<()> {
        let category = self.get(id).await?;

        let products = self.products.count_by_category(id).await?;
        if products > 0 {
            info!(category_id = %id, products, "Refusing to delete category with products");
            return Err(AppError::business_rule(format!(
                "Cannot delete category '{}' because it has {} associated product(s).",
                category.name, products
            )));
        }

        self.categories.delete(id).await?;

        info!(category_id = %id, "Category deleted");
        self.publish(&category, ChangeKind::Deleted, Vec::new(), actor)
            .await;
        Ok(())
    }

    pub async fn toggle_status(&self, id: CategoryId, actor: Option<UserId>) -> AppResult<Category> {
        let mut category = self.get(id).await?;
        let before = category.clone();
        category.toggle_status(actor);
        self.categories.update(&category).await?;

        self.publish(&category, ChangeKind::Updated, diff(&before, &category), actor)
            .await;
        Ok(category)
    }

    pub async fn export_csv(&self, filter: &CategoryFilter) -> AppResult<Vec<u8>> {
        let categories = self.categories.all(filter).await?;

        let mut rows = Vec::with_capacity(categories.len());
        for category in categories {
            let count = self.products.count_by_category(category.id).await?;
            rows.push(vec![
                category.id.to_string(),
                category.name,
                export::opt_text(category.description.as_deref()),
                export::flag(category.is_active),
                count.to_string(),
                export::timestamp(category.audit_info.created_at),
            ]);
        }

        write_csv(EXPORT_HEADER, rows)
    }

    async fn publish(
        &self,
        category: &Category,
        kind: ChangeKind,
        changes: Vec<FieldChange>,
        actor: Option<UserId>,
    ) {
        let event = EntityChanged::new(
            EntityKind::Category,
            kind,
            category.id.0,
            category.name.clone(),
            actor,
        )
        .with_changes(changes);
        self.events.publish(event).await;
    }
}
