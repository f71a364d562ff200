//! 内存存储
//!
//! 所有仓储共享一个 [`InMemoryStore`]；每个操作只持有一次锁。
//! 行按插入顺序保存，插入顺序即自然行序

use std::collections::BTreeSet;
use std::sync::Arc;

use ag_common::{PagedResult, Pagination, contains_ignore_case};
use ag_domain_core::SoftDeletable;
use ag_errors::{AppError, AppResult};
use async_trait::async_trait;
use parking_lot::RwLock;

use crate::domain::entities::{
    Brand, BrandWithCount, Category, CategoryWithCount, Product, User,
};
use crate::domain::rbac::{ADMIN_ROLE, PermissionKind, Role, USER_ROLE};
use crate::domain::repositories::{
    BrandFilter, BrandRepository, BrandStats, CategoryFilter, CategoryRepository, CategoryStats,
    ProductFilter, ProductRepository, ProductStats, RoleRepository, SelectOption, StockFilter,
    TrashedFilter, UserFilter, UserRepository, UserStats,
};
use crate::domain::value_objects::{BrandId, CategoryId, ProductId, RoleId, UserId};

#[derive(Default)]
struct Tables {
    products: Vec<Product>,
    categories: Vec<Category>,
    brands: Vec<Brand>,
    users: Vec<User>,
    roles: Vec<Role>,
    user_roles: Vec<(UserId, RoleId)>,
    user_permissions: Vec<(UserId, PermissionKind)>,
}

impl Tables {
    fn active_products(&self) -> impl Iterator<Item = &Product> {
        self.products.iter().filter(|p| !p.is_trashed())
    }

    fn products_in_category(&self, id: CategoryId) -> u64 {
        self.active_products().filter(|p| p.category_id == id).count() as u64
    }

    fn products_of_brand(&self, id: BrandId) -> u64 {
        self.active_products()
            .filter(|p| p.brand_id == Some(id))
            .count() as u64
    }

    fn role_names_of(&self, user_id: UserId) -> Vec<&str> {
        self.user_roles
            .iter()
            .filter(|(u, _)| *u == user_id)
            .filter_map(|(_, r)| self.roles.iter().find(|role| role.id == *r))
            .map(|role| role.name.as_str())
            .collect()
    }
}

/// 共享的内存表
#[derive(Clone, Default)]
pub struct InMemoryStore {
    tables: Arc<RwLock<Tables>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn paginate<T: Clone>(items: Vec<&T>, pagination: Pagination) -> PagedResult<T> {
    let total = items.len() as u64;
    let page = items
        .into_iter()
        .skip(usize::try_from(pagination.offset()).unwrap_or(usize::MAX))
        .take(pagination.limit() as usize)
        .cloned()
        .collect();
    PagedResult::new(page, total, &pagination)
}

fn by_name<T>(items: &mut [&T], name: impl Fn(&T) -> &str) {
    items.sort_by(|a, b| name(a).to_lowercase().cmp(&name(b).to_lowercase()));
}

// ============================================================================
// 商品
// ============================================================================

pub struct InMemoryProductRepository {
    store: InMemoryStore,
}

impl InMemoryProductRepository {
    pub fn new(store: InMemoryStore) -> Self {
        Self { store }
    }
}

fn product_matches(product: &Product, filter: &ProductFilter) -> bool {
    let trashed_ok = match filter.trashed {
        TrashedFilter::Without => !product.is_trashed(),
        TrashedFilter::Only => product.is_trashed(),
        TrashedFilter::With => true,
    };
    let search_ok = filter.search_term().is_none_or(|term| {
        contains_ignore_case(&product.name, term)
            || contains_ignore_case(&product.sku, term)
            || product
                .barcode
                .as_deref()
                .is_some_and(|b| contains_ignore_case(b, term))
            || product
                .description
                .as_deref()
                .is_some_and(|d| contains_ignore_case(d, term))
    });
    let stock_ok = match filter.stock {
        None => true,
        Some(StockFilter::Low) => product.is_low_stock(),
        Some(StockFilter::Out) => product.is_out_of_stock(),
        Some(StockFilter::Available) => product.stock > 0,
    };

    trashed_ok
        && search_ok
        && stock_ok
        && filter.category_id.is_none_or(|id| product.category_id == id)
        && filter.brand_id.is_none_or(|id| product.brand_id == Some(id))
        && filter.is_active.is_none_or(|active| product.is_active == active)
}

fn check_product_unique(tables: &Tables, product: &Product) -> AppResult<()> {
    for other in tables.products.iter().filter(|p| p.id != product.id) {
        if other.sku == product.sku {
            return Err(AppError::conflict(format!("SKU '{}' already exists", product.sku)));
        }
        if product.barcode.is_some() && other.barcode == product.barcode {
            return Err(AppError::conflict("Barcode already exists"));
        }
    }
    if !tables.categories.iter().any(|c| c.id == product.category_id) {
        return Err(AppError::database("Product references a missing category"));
    }
    Ok(())
}

#[async_trait]
impl ProductRepository for InMemoryProductRepository {
    async fn list(&self, filter: &ProductFilter, pagination: Pagination) -> AppResult<PagedResult<Product>> {
        let tables = self.store.tables.read();
        let items: Vec<&Product> = tables
            .products
            .iter()
            .rev()
            .filter(|p| product_matches(p, filter))
            .collect();
        Ok(paginate(items, pagination))
    }

    async fn all(&self, filter: &ProductFilter) -> AppResult<Vec<Product>> {
        let tables = self.store.tables.read();
        Ok(tables
            .products
            .iter()
            .rev()
            .filter(|p| product_matches(p, filter))
            .cloned()
            .collect())
    }

    async fn find_by_id(&self, id: ProductId) -> AppResult<Option<Product>> {
        let tables = self.store.tables.read();
        Ok(tables.active_products().find(|p| p.id == id).cloned())
    }

    async fn find_by_id_with_trashed(&self, id: ProductId) -> AppResult<Option<Product>> {
        let tables = self.store.tables.read();
        Ok(tables.products.iter().find(|p| p.id == id).cloned())
    }

    async fn find_by_sku(&self, sku: &str) -> AppResult<Option<Product>> {
        let tables = self.store.tables.read();
        Ok(tables.products.iter().find(|p| p.sku == sku).cloned())
    }

    async fn find_by_barcode(&self, barcode: &str) -> AppResult<Option<Product>> {
        let tables = self.store.tables.read();
        Ok(tables
            .products
            .iter()
            .find(|p| p.barcode.as_deref() == Some(barcode))
            .cloned())
    }

    async fn insert(&self, product: &Product) -> AppResult<()> {
        let mut tables = self.store.tables.write();
        check_product_unique(&tables, product)?;
        tables.products.push(product.clone());
        Ok(())
    }

    async fn update(&self, product: &Product) -> AppResult<()> {
        let mut tables = self.store.tables.write();
        check_product_unique(&tables, product)?;
        let slot = tables
            .products
            .iter_mut()
            .find(|p| p.id == product.id)
            .ok_or_else(|| AppError::not_found(format!("Product {} not found", product.id)))?;
        *slot = product.clone();
        Ok(())
    }

    async fn force_delete(&self, id: ProductId) -> AppResult<bool> {
        let mut tables = self.store.tables.write();
        let before = tables.products.len();
        tables.products.retain(|p| p.id != id);
        Ok(tables.products.len() != before)
    }

    async fn count_by_category(&self, category_id: CategoryId) -> AppResult<u64> {
        Ok(self.store.tables.read().products_in_category(category_id))
    }

    async fn count_by_brand(&self, brand_id: BrandId) -> AppResult<u64> {
        Ok(self.store.tables.read().products_of_brand(brand_id))
    }

    async fn low_stock(&self, limit: usize) -> AppResult<Vec<Product>> {
        let tables = self.store.tables.read();
        let mut items: Vec<&Product> = tables.active_products().filter(|p| p.is_low_stock()).collect();
        items.sort_by_key(|p| p.stock);
        Ok(items.into_iter().take(limit).cloned().collect())
    }

    async fn out_of_stock(&self, limit: usize) -> AppResult<Vec<Product>> {
        let tables = self.store.tables.read();
        let mut items: Vec<&Product> = tables
            .active_products()
            .filter(|p| p.is_out_of_stock())
            .collect();
        by_name(&mut items, |p| p.name.as_str());
        Ok(items.into_iter().take(limit).cloned().collect())
    }

    async fn recent(&self, limit: usize) -> AppResult<Vec<Product>> {
        let tables = self.store.tables.read();
        Ok(tables
            .products
            .iter()
            .rev()
            .filter(|p| !p.is_trashed())
            .take(limit)
            .cloned()
            .collect())
    }

    async fn active_select(&self) -> AppResult<Vec<SelectOption>> {
        let tables = self.store.tables.read();
        let mut items: Vec<&Product> = tables.active_products().filter(|p| p.is_active).collect();
        by_name(&mut items, |p| p.name.as_str());
        Ok(items
            .into_iter()
            .map(|p| SelectOption {
                id: p.id.0,
                name: p.name.clone(),
            })
            .collect())
    }

    async fn stats(&self) -> AppResult<ProductStats> {
        let tables = self.store.tables.read();
        let mut stats = ProductStats::default();
        for product in &tables.products {
            if product.is_trashed() {
                stats.trashed += 1;
                continue;
            }
            stats.total += 1;
            if product.is_active {
                stats.active += 1;
            } else {
                stats.inactive += 1;
            }
            if product.brand_id.is_some() {
                stats.with_brand += 1;
            } else {
                stats.without_brand += 1;
            }
            if product.is_low_stock() {
                stats.low_stock += 1;
            }
            if product.is_out_of_stock() {
                stats.out_of_stock += 1;
            }
        }
        Ok(stats)
    }
}

// ============================================================================
// 分类
// ============================================================================

pub struct InMemoryCategoryRepository {
    store: InMemoryStore,
}

impl InMemoryCategoryRepository {
    pub fn new(store: InMemoryStore) -> Self {
        Self { store }
    }
}

fn category_matches(category: &Category, filter: &CategoryFilter) -> bool {
    let search_ok = filter.search_term().is_none_or(|term| {
        contains_ignore_case(&category.name, term)
            || category
                .description
                .as_deref()
                .is_some_and(|d| contains_ignore_case(d, term))
    });
    search_ok && filter.is_active.is_none_or(|active| category.is_active == active)
}

fn check_category_unique(tables: &Tables, category: &Category) -> AppResult<()> {
    let taken = tables
        .categories
        .iter()
        .any(|c| c.id != category.id && c.name.eq_ignore_ascii_case(&category.name));
    if taken {
        return Err(AppError::conflict(format!(
            "Category '{}' already exists",
            category.name
        )));
    }
    Ok(())
}

impl InMemoryCategoryRepository {
    fn filtered<'a>(tables: &'a Tables, filter: &CategoryFilter) -> Vec<&'a Category> {
        let mut items: Vec<&Category> = tables
            .categories
            .iter()
            .filter(|c| category_matches(c, filter))
            .collect();
        by_name(&mut items, |c| c.name.as_str());
        items
    }
}

#[async_trait]
impl CategoryRepository for InMemoryCategoryRepository {
    async fn list(&self, filter: &CategoryFilter, pagination: Pagination) -> AppResult<PagedResult<Category>> {
        let tables = self.store.tables.read();
        Ok(paginate(Self::filtered(&tables, filter), pagination))
    }

    async fn all(&self, filter: &CategoryFilter) -> AppResult<Vec<Category>> {
        let tables = self.store.tables.read();
        Ok(Self::filtered(&tables, filter).into_iter().cloned().collect())
    }

    async fn find_by_id(&self, id: CategoryId) -> AppResult<Option<Category>> {
        let tables = self.store.tables.read();
        Ok(tables.categories.iter().find(|c| c.id == id).cloned())
    }

    async fn find_by_name(&self, name: &str) -> AppResult<Option<Category>> {
        let tables = self.store.tables.read();
        Ok(tables
            .categories
            .iter()
            .find(|c| c.name.eq_ignore_ascii_case(name.trim()))
            .cloned())
    }

    async fn insert(&self, category: &Category) -> AppResult<()> {
        let mut tables = self.store.tables.write();
        check_category_unique(&tables, category)?;
        tables.categories.push(category.clone());
        Ok(())
    }

    async fn update(&self, category: &Category) -> AppResult<()> {
        let mut tables = self.store.tables.write();
        check_category_unique(&tables, category)?;
        let slot = tables
            .categories
            .iter_mut()
            .find(|c| c.id == category.id)
            .ok_or_else(|| AppError::not_found(format!("Category {} not found", category.id)))?;
        *slot = category.clone();
        Ok(())
    }

    async fn delete(&self, id: CategoryId) -> AppResult<bool> {
        let mut tables = self.store.tables.write();
        let before = tables.categories.len();
        tables.categories.retain(|c| c.id != id);
        tables.products.retain(|p| p.category_id != id);
        Ok(tables.categories.len() != before)
    }

    async fn active_select(&self) -> AppResult<Vec<SelectOption>> {
        let tables = self.store.tables.read();
        let filter = CategoryFilter {
            is_active: Some(true),
            ..Default::default()
        };
        Ok(Self::filtered(&tables, &filter)
            .into_iter()
            .map(|c| SelectOption {
                id: c.id.0,
                name: c.name.clone(),
            })
            .collect())
    }

    async fn stats(&self) -> AppResult<CategoryStats> {
        let tables = self.store.tables.read();
        let mut stats = CategoryStats::default();
        for category in &tables.categories {
            stats.total += 1;
            if category.is_active {
                stats.active += 1;
            } else {
                stats.inactive += 1;
            }
            if tables.products_in_category(category.id) > 0 {
                stats.with_products += 1;
            } else {
                stats.without_products += 1;
            }
        }
        Ok(stats)
    }

    async fn top_by_product_count(&self, limit: usize) -> AppResult<Vec<CategoryWithCount>> {
        let tables = self.store.tables.read();
        let mut ranked: Vec<CategoryWithCount> = tables
            .categories
            .iter()
            .map(|c| CategoryWithCount {
                category: c.clone(),
                products_count: tables.products_in_category(c.id),
            })
            .collect();
        // 稳定排序：数量相同保持自然行序
        ranked.sort_by(|a, b| b.products_count.cmp(&a.products_count));
        ranked.truncate(limit);
        Ok(ranked)
    }

    async fn recent(&self, limit: usize) -> AppResult<Vec<Category>> {
        let tables = self.store.tables.read();
        Ok(tables.categories.iter().rev().take(limit).cloned().collect())
    }
}

// ============================================================================
// 品牌
// ============================================================================

pub struct InMemoryBrandRepository {
    store: InMemoryStore,
}

impl InMemoryBrandRepository {
    pub fn new(store: InMemoryStore) -> Self {
        Self { store }
    }

    fn filtered<'a>(tables: &'a Tables, filter: &BrandFilter) -> Vec<&'a Brand> {
        let mut items: Vec<&Brand> = tables
            .brands
            .iter()
            .filter(|b| brand_matches(b, filter))
            .collect();
        by_name(&mut items, |b| b.name.as_str());
        items
    }
}

fn brand_matches(brand: &Brand, filter: &BrandFilter) -> bool {
    let optional = |value: &Option<String>, term: &str| {
        value
            .as_deref()
            .is_some_and(|v| contains_ignore_case(v, term))
    };
    let search_ok = filter.search_term().is_none_or(|term| {
        contains_ignore_case(&brand.name, term)
            || optional(&brand.country_of_origin, term)
            || optional(&brand.description, term)
    });
    let country_ok = filter.country_term().is_none_or(|country| {
        brand
            .country_of_origin
            .as_deref()
            .is_some_and(|c| c.eq_ignore_ascii_case(country))
    });
    search_ok && country_ok
}

fn check_brand_unique(tables: &Tables, brand: &Brand) -> AppResult<()> {
    let taken = tables
        .brands
        .iter()
        .any(|b| b.id != brand.id && b.name.eq_ignore_ascii_case(&brand.name));
    if taken {
        return Err(AppError::conflict(format!("Brand '{}' already exists", brand.name)));
    }
    Ok(())
}

#[async_trait]
impl BrandRepository for InMemoryBrandRepository {
    async fn list(&self, filter: &BrandFilter, pagination: Pagination) -> AppResult<PagedResult<Brand>> {
        let tables = self.store.tables.read();
        Ok(paginate(Self::filtered(&tables, filter), pagination))
    }

    async fn all(&self, filter: &BrandFilter) -> AppResult<Vec<Brand>> {
        let tables = self.store.tables.read();
        Ok(Self::filtered(&tables, filter).into_iter().cloned().collect())
    }

    async fn find_by_id(&self, id: BrandId) -> AppResult<Option<Brand>> {
        let tables = self.store.tables.read();
        Ok(tables.brands.iter().find(|b| b.id == id).cloned())
    }

    async fn find_by_name(&self, name: &str) -> AppResult<Option<Brand>> {
        let tables = self.store.tables.read();
        Ok(tables
            .brands
            .iter()
            .find(|b| b.name.eq_ignore_ascii_case(name.trim()))
            .cloned())
    }

    async fn insert(&self, brand: &Brand) -> AppResult<()> {
        let mut tables = self.store.tables.write();
        check_brand_unique(&tables, brand)?;
        tables.brands.push(brand.clone());
        Ok(())
    }

    async fn update(&self, brand: &Brand) -> AppResult<()> {
        let mut tables = self.store.tables.write();
        check_brand_unique(&tables, brand)?;
        let slot = tables
            .brands
            .iter_mut()
            .find(|b| b.id == brand.id)
            .ok_or_else(|| AppError::not_found(format!("Brand {} not found", brand.id)))?;
        *slot = brand.clone();
        Ok(())
    }

    async fn delete(&self, id: BrandId) -> AppResult<bool> {
        let mut tables = self.store.tables.write();
        let before = tables.brands.len();
        tables.brands.retain(|b| b.id != id);
        for product in tables.products.iter_mut().filter(|p| p.brand_id == Some(id)) {
            product.brand_id = None;
        }
        Ok(tables.brands.len() != before)
    }

    async fn select(&self) -> AppResult<Vec<SelectOption>> {
        let tables = self.store.tables.read();
        Ok(Self::filtered(&tables, &BrandFilter::default())
            .into_iter()
            .map(|b| SelectOption {
                id: b.id.0,
                name: b.name.clone(),
            })
            .collect())
    }

    async fn countries(&self) -> AppResult<Vec<String>> {
        let tables = self.store.tables.read();
        let countries: BTreeSet<String> = tables
            .brands
            .iter()
            .filter_map(|b| b.country_of_origin.clone())
            .filter(|c| !c.is_empty())
            .collect();
        Ok(countries.into_iter().collect())
    }

    async fn stats(&self) -> AppResult<BrandStats> {
        let tables = self.store.tables.read();
        let mut stats = BrandStats::default();
        for brand in &tables.brands {
            stats.total += 1;
            if tables.products_of_brand(brand.id) > 0 {
                stats.with_products += 1;
            } else {
                stats.without_products += 1;
            }
            if brand.website.is_some() {
                stats.with_website += 1;
            }
        }
        Ok(stats)
    }

    async fn top_by_product_count(&self, limit: usize) -> AppResult<Vec<BrandWithCount>> {
        let tables = self.store.tables.read();
        let mut ranked: Vec<BrandWithCount> = tables
            .brands
            .iter()
            .map(|b| BrandWithCount {
                brand: b.clone(),
                products_count: tables.products_of_brand(b.id),
            })
            .collect();
        ranked.sort_by(|a, b| b.products_count.cmp(&a.products_count));
        ranked.truncate(limit);
        Ok(ranked)
    }

    async fn recent(&self, limit: usize) -> AppResult<Vec<Brand>> {
        let tables = self.store.tables.read();
        Ok(tables.brands.iter().rev().take(limit).cloned().collect())
    }
}

// ============================================================================
// 用户
// ============================================================================

pub struct InMemoryUserRepository {
    store: InMemoryStore,
}

impl InMemoryUserRepository {
    pub fn new(store: InMemoryStore) -> Self {
        Self { store }
    }
}

fn user_matches(tables: &Tables, user: &User, filter: &UserFilter) -> bool {
    let search_ok = filter.search_term().is_none_or(|term| {
        contains_ignore_case(&user.name, term) || contains_ignore_case(&user.email, term)
    });
    let role_ok = filter.role_name().is_none_or(|role| {
        tables
            .role_names_of(user.id)
            .iter()
            .any(|name| name.eq_ignore_ascii_case(role))
    });
    search_ok && role_ok && filter.verified.is_none_or(|v| user.is_verified() == v)
}

fn check_user_unique(tables: &Tables, user: &User) -> AppResult<()> {
    if tables
        .users
        .iter()
        .any(|u| u.id != user.id && u.email == user.email)
    {
        return Err(AppError::conflict(format!("Email '{}' already exists", user.email)));
    }
    Ok(())
}

#[async_trait]
impl UserRepository for InMemoryUserRepository {
    async fn list(&self, filter: &UserFilter, pagination: Pagination) -> AppResult<PagedResult<User>> {
        let tables = self.store.tables.read();
        let items: Vec<&User> = tables
            .users
            .iter()
            .rev()
            .filter(|u| user_matches(&tables, u, filter))
            .collect();
        Ok(paginate(items, pagination))
    }

    async fn find_by_id(&self, id: UserId) -> AppResult<Option<User>> {
        let tables = self.store.tables.read();
        Ok(tables.users.iter().find(|u| u.id == id).cloned())
    }

    async fn find_by_email(&self, email: &str) -> AppResult<Option<User>> {
        let email = email.trim().to_lowercase();
        let tables = self.store.tables.read();
        Ok(tables.users.iter().find(|u| u.email == email).cloned())
    }

    async fn insert(&self, user: &User) -> AppResult<()> {
        let mut tables = self.store.tables.write();
        check_user_unique(&tables, user)?;
        tables.users.push(user.clone());
        Ok(())
    }

    async fn update(&self, user: &User) -> AppResult<()> {
        let mut tables = self.store.tables.write();
        check_user_unique(&tables, user)?;
        let slot = tables
            .users
            .iter_mut()
            .find(|u| u.id == user.id)
            .ok_or_else(|| AppError::not_found(format!("User {} not found", user.id)))?;
        *slot = user.clone();
        Ok(())
    }

    async fn delete(&self, id: UserId) -> AppResult<bool> {
        let mut tables = self.store.tables.write();
        let before = tables.users.len();
        tables.users.retain(|u| u.id != id);
        tables.user_roles.retain(|(u, _)| *u != id);
        tables.user_permissions.retain(|(u, _)| *u != id);
        Ok(tables.users.len() != before)
    }

    async fn without_roles(&self) -> AppResult<Vec<User>> {
        let tables = self.store.tables.read();
        Ok(tables
            .users
            .iter()
            .filter(|u| !tables.user_roles.iter().any(|(id, _)| *id == u.id))
            .cloned()
            .collect())
    }

    async fn stats(&self) -> AppResult<UserStats> {
        let tables = self.store.tables.read();
        let mut stats = UserStats::default();
        for user in &tables.users {
            stats.total += 1;
            if user.is_verified() {
                stats.verified += 1;
            } else {
                stats.unverified += 1;
            }
            let roles = tables.role_names_of(user.id);
            if roles.is_empty() {
                stats.without_role += 1;
            }
            if roles.contains(&ADMIN_ROLE) {
                stats.admins += 1;
            }
            if roles.contains(&USER_ROLE) {
                stats.staff += 1;
            }
        }
        Ok(stats)
    }

    async fn recent(&self, limit: usize) -> AppResult<Vec<User>> {
        let tables = self.store.tables.read();
        Ok(tables.users.iter().rev().take(limit).cloned().collect())
    }
}

// ============================================================================
// 角色
// ============================================================================

pub struct InMemoryRoleRepository {
    store: InMemoryStore,
}

impl InMemoryRoleRepository {
    pub fn new(store: InMemoryStore) -> Self {
        Self { store }
    }
}

fn check_role_unique(tables: &Tables, role: &Role) -> AppResult<()> {
    if tables
        .roles
        .iter()
        .any(|r| r.id != role.id && r.name == role.name)
    {
        return Err(AppError::conflict(format!("Role '{}' already exists", role.name)));
    }
    Ok(())
}

#[async_trait]
impl RoleRepository for InMemoryRoleRepository {
    async fn list(&self) -> AppResult<Vec<Role>> {
        let tables = self.store.tables.read();
        let mut roles: Vec<&Role> = tables.roles.iter().collect();
        by_name(&mut roles, |r| r.name.as_str());
        Ok(roles.into_iter().cloned().collect())
    }

    async fn find_by_id(&self, id: RoleId) -> AppResult<Option<Role>> {
        let tables = self.store.tables.read();
        Ok(tables.roles.iter().find(|r| r.id == id).cloned())
    }

    async fn find_by_name(&self, name: &str) -> AppResult<Option<Role>> {
        let tables = self.store.tables.read();
        Ok(tables.roles.iter().find(|r| r.name == name).cloned())
    }

    async fn insert(&self, role: &Role) -> AppResult<()> {
        let mut tables = self.store.tables.write();
        check_role_unique(&tables, role)?;
        tables.roles.push(role.clone());
        Ok(())
    }

    async fn update(&self, role: &Role) -> AppResult<()> {
        let mut tables = self.store.tables.write();
        check_role_unique(&tables, role)?;
        let slot = tables
            .roles
            .iter_mut()
            .find(|r| r.id == role.id)
            .ok_or_else(|| AppError::not_found(format!("Role {} not found", role.id)))?;
        *slot = role.clone();
        Ok(())
    }

    async fn delete(&self, id: RoleId) -> AppResult<bool> {
        let mut tables = self.store.tables.write();
        let before = tables.roles.len();
        tables.roles.retain(|r| r.id != id);
        tables.user_roles.retain(|(_, r)| *r != id);
        Ok(tables.roles.len() != before)
    }

    async fn roles_for_user(&self, user_id: UserId) -> AppResult<Vec<Role>> {
        let tables = self.store.tables.read();
        let mut roles: Vec<&Role> = tables
            .roles
            .iter()
            .filter(|r| tables.user_roles.contains(&(user_id, r.id)))
            .collect();
        by_name(&mut roles, |r| r.name.as_str());
        Ok(roles.into_iter().cloned().collect())
    }

    async fn assign_role(&self, user_id: UserId, role_id: RoleId) -> AppResult<()> {
        let mut tables = self.store.tables.write();
        if !tables.roles.iter().any(|r| r.id == role_id) {
            return Err(AppError::not_found(format!("Role {} not found", role_id)));
        }
        if !tables.user_roles.contains(&(user_id, role_id)) {
            tables.user_roles.push((user_id, role_id));
        }
        Ok(())
    }

    async fn remove_role(&self, user_id: UserId, role_id: RoleId) -> AppResult<bool> {
        let mut tables = self.store.tables.write();
        let before = tables.user_roles.len();
        tables.user_roles.retain(|pair| *pair != (user_id, role_id));
        Ok(tables.user_roles.len() != before)
    }

    async fn count_users_with_role(&self, role_id: RoleId) -> AppResult<u64> {
        let tables = self.store.tables.read();
        Ok(tables.user_roles.iter().filter(|(_, r)| *r == role_id).count() as u64)
    }

    async fn direct_permissions(&self, user_id: UserId) -> AppResult<BTreeSet<PermissionKind>> {
        let tables = self.store.tables.read();
        Ok(tables
            .user_permissions
            .iter()
            .filter(|(u, _)| *u == user_id)
            .map(|(_, p)| *p)
            .collect())
    }

    async fn give_permission(&self, user_id: UserId, permission: PermissionKind) -> AppResult<()> {
        let mut tables = self.store.tables.write();
        if !tables.user_permissions.contains(&(user_id, permission)) {
            tables.user_permissions.push((user_id, permission));
        }
        Ok(())
    }

    async fn revoke_permission(&self, user_id: UserId, permission: PermissionKind) -> AppResult<bool> {
        let mut tables = self.store.tables.write();
        let before = tables.user_permissions.len();
        tables
            .user_permissions
            .retain(|pair| *pair != (user_id, permission));
        Ok(tables.user_permissions.len() != before)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entities::{CategoryData, ProductData};
    use rust_decimal::Decimal;

    fn category(name: &str) -> Category {
        Category::new(
            CategoryData {
                name: name.to_string(),
                ..Default::default()
            },
            None,
        )
    }

    fn product(name: &str, sku: &str, category_id: CategoryId, stock: i32, min_stock: i32) -> Product {
        let data = ProductData {
            name: name.to_string(),
            price: Decimal::ONE,
            stock,
            min_stock,
            ..Default::default()
        };
        Product::new(data, sku.to_string(), category_id, None)
    }

    #[tokio::test]
    async fn test_category_search_is_case_insensitive_substring() {
        let store = InMemoryStore::new();
        let repo = InMemoryCategoryRepository::new(store);
        repo.insert(&category("Electronics")).await.unwrap();
        repo.insert(&category("Electronics Accessories")).await.unwrap();
        repo.insert(&category("Garden")).await.unwrap();

        let found = repo
            .list(&CategoryFilter::search("electronics"), Pagination::default())
            .await
            .unwrap();
        assert_eq!(found.total, 2);

        let none = repo
            .list(&CategoryFilter::search("Clothing"), Pagination::default())
            .await
            .unwrap();
        assert_eq!(none.total, 0);
        assert!(none.items.is_empty());
    }

    #[tokio::test]
    async fn test_stock_filters_and_trash() {
        let store = InMemoryStore::new();
        let categories = InMemoryCategoryRepository::new(store.clone());
        let products = InMemoryProductRepository::new(store);
        let tools = category("Tools");
        categories.insert(&tools).await.unwrap();

        let low = product("Hammer", "TOO-HAMMER-001", tools.id, 2, 5);
        let out = product("Saw", "TOO-SAW-001", tools.id, 0, 5);
        let mut trashed = product("Drill", "TOO-DRILL-001", tools.id, 1, 5);
        trashed.soft_delete();
        for p in [&low, &out, &trashed] {
            products.insert(p).await.unwrap();
        }

        let low_stock = products.low_stock(10).await.unwrap();
        assert_eq!(low_stock.len(), 1);
        assert_eq!(low_stock[0].id, low.id);
        assert_eq!(products.out_of_stock(10).await.unwrap().len(), 1);

        let stats = products.stats().await.unwrap();
        assert_eq!(stats.total, 2);
        assert_eq!(stats.trashed, 1);
        assert_eq!(stats.total, stats.active + stats.inactive);
        assert_eq!(stats.total, stats.with_brand + stats.without_brand);

        assert!(products.find_by_id(trashed.id).await.unwrap().is_none());
        assert!(products.find_by_id_with_trashed(trashed.id).await.unwrap().is_some());
        let only_trashed = ProductFilter {
            trashed: TrashedFilter::Only,
            ..Default::default()
        };
        assert_eq!(products.all(&only_trashed).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_unique_sku() {
        let store = InMemoryStore::new();
        let categories = InMemoryCategoryRepository::new(store.clone());
        let products = InMemoryProductRepository::new(store);
        let tools = category("Tools");
        categories.insert(&tools).await.unwrap();

        products
            .insert(&product("Hammer", "TOO-HAMMER-001", tools.id, 1, 0))
            .await
            .unwrap();
        let err = products
            .insert(&product("Other", "TOO-HAMMER-001", tools.id, 1, 0))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_role_assignment_is_idempotent() {
        let store = InMemoryStore::new();
        let roles = InMemoryRoleRepository::new(store);
        let role = Role::bare("user");
        roles.insert(&role).await.unwrap();
        let user_id = UserId::new();

        roles.assign_role(user_id, role.id).await.unwrap();
        roles.assign_role(user_id, role.id).await.unwrap();
        assert_eq!(roles.count_users_with_role(role.id).await.unwrap(), 1);
        assert!(roles.remove_role(user_id, role.id).await.unwrap());
        assert!(roles.roles_for_user(user_id).await.unwrap().is_empty());
    }
}
