//! 目录服务流程测试（内存存储）

mod common;

use ag_common::Pagination;
use ag_errors::AppError;
use autogestor::domain::entities::{ProductData, StockOperation};
use autogestor::domain::repositories::{CategoryFilter, ProductFilter, StockFilter};
use autogestor::domain::value_objects::ProductId;
use common::{container, create_brand, create_category, create_product, product_data};

#[tokio::test]
async fn test_category_with_products_cannot_be_deleted() {
    let c = container().await;
    let category = create_category(&c, "Electronics").await;
    let product = create_product(&c, "Smart Phone", category.id, None).await;

    let err = c.categories.delete(category.id, None).await.unwrap_err();
    assert!(matches!(err, AppError::BusinessRule(_)));
    assert!(err.to_string().contains("1 associated product(s)"));
    assert!(c.categories.find(category.id).await.unwrap().is_some());

    // 商品进入回收站后不再计数
    c.products.delete(product.id, None).await.unwrap();
    c.categories.delete(category.id, None).await.unwrap();
    assert!(c.categories.find(category.id).await.unwrap().is_none());
}

#[tokio::test]
async fn test_toggle_status_twice_restores_original() {
    let c = container().await;
    let category = create_category(&c, "Tools").await;
    assert!(category.is_active);

    let toggled = c.categories.toggle_status(category.id, None).await.unwrap();
    assert!(!toggled.is_active);
    let back = c.categories.toggle_status(category.id, None).await.unwrap();
    assert!(back.is_active);

    let product = create_product(&c, "Hammer", category.id, None).await;
    let toggled = c.products.toggle_status(product.id, None).await.unwrap();
    let back = c.products.toggle_status(product.id, None).await.unwrap();
    assert_eq!(toggled.is_active, !product.is_active);
    assert_eq!(back.is_active, product.is_active);
}

#[tokio::test]
async fn test_stats_partition_totals() {
    let c = container().await;
    let tools = create_category(&c, "Tools").await;
    let garden = create_category(&c, "Garden").await;
    c.categories.toggle_status(garden.id, None).await.unwrap();
    let acme = create_brand(&c, "Acme", Some("USA")).await;

    create_product(&c, "Hammer", tools.id, Some(acme.id)).await;
    let saw = create_product(&c, "Saw", tools.id, None).await;
    c.products.toggle_status(saw.id, None).await.unwrap();
    c.products
        .adjust_stock(saw.id, StockOperation::Set, 0, None)
        .await
        .unwrap();

    let stats = c.products.stats().await.unwrap();
    assert_eq!(stats.total, 2);
    assert_eq!(stats.active + stats.inactive, stats.total);
    assert_eq!(stats.with_brand + stats.without_brand, stats.total);
    assert_eq!(stats.out_of_stock, 1);

    let stats = c.categories.stats().await.unwrap();
    assert_eq!(stats.total, 2);
    assert_eq!(stats.active, 1);
    assert_eq!(stats.active + stats.inactive, stats.total);
    assert_eq!(stats.with_products, 1);
    assert_eq!(stats.with_products + stats.without_products, stats.total);

    let stats = c.brands.stats().await.unwrap();
    assert_eq!(stats.total, 1);
    assert_eq!(stats.with_products + stats.without_products, stats.total);
}

#[tokio::test]
async fn test_search_is_case_insensitive() {
    let c = container().await;
    let category = create_category(&c, "Electronics").await;
    create_product(&c, "Blue Widget", category.id, None).await;
    create_product(&c, "Red Gadget", category.id, None).await;

    let page = c
        .products
        .search("wIdGeT", Pagination::new(1, 15))
        .await
        .unwrap();
    assert_eq!(page.items.len(), 1);
    assert_eq!(page.items[0].name, "Blue Widget");

    let page = c
        .categories
        .list(&CategoryFilter::search("ELECTRO"), Pagination::new(1, 15))
        .await
        .unwrap();
    assert_eq!(page.items.len(), 1);
}

#[tokio::test]
async fn test_category_search_matches_substrings_only() {
    let c = container().await;
    create_category(&c, "Electronics").await;
    create_category(&c, "Electronics Accessories").await;
    create_category(&c, "Garden").await;

    let page = c
        .categories
        .list(&CategoryFilter::search("electronics"), Pagination::new(1, 15))
        .await
        .unwrap();
    assert_eq!(page.total, 2);
    let mut names: Vec<&str> = page.items.iter().map(|category| category.name.as_str()).collect();
    names.sort();
    assert_eq!(names, vec!["Electronics", "Electronics Accessories"]);

    let page = c
        .categories
        .list(&CategoryFilter::search("Clothing"), Pagination::new(1, 15))
        .await
        .unwrap();
    assert_eq!(page.total, 0);
    assert!(page.items.is_empty());
}

#[tokio::test]
async fn test_top_categories_by_product_count() {
    let c = container().await;
    let first = create_category(&c, "First").await;
    let second = create_category(&c, "Second").await;
    let third = create_category(&c, "Third").await;

    create_product(&c, "One", third.id, None).await;
    create_product(&c, "Two", third.id, None).await;
    create_product(&c, "Three", second.id, None).await;
    create_product(&c, "Four", first.id, None).await;

    let top = c.categories.top_by_product_count(2).await.unwrap();
    assert_eq!(top.len(), 2);
    assert_eq!(top[0].category.id, third.id);
    assert_eq!(top[0].products_count, 2);
    // 数量相同按创建顺序
    assert_eq!(top[1].category.id, first.id);
    assert_eq!(top[1].products_count, 1);
}

#[tokio::test]
async fn test_generated_sku_takes_next_free_sequence() {
    let c = container().await;
    let category = create_category(&c, "Electronics").await;

    let sku = c.products.generate_sku("Smart Phone", category.id).await.unwrap();
    assert_eq!(sku, "ELE-SMART-PHONE-001");

    let product = create_product(&c, "Smart Phone", category.id, None).await;
    assert_eq!(product.sku, "ELE-SMART-PHONE-001");

    let sku = c.products.generate_sku("Smart Phone", category.id).await.unwrap();
    assert_eq!(sku, "ELE-SMART-PHONE-002");
}

#[tokio::test]
async fn test_duplicate_sku_is_rejected() {
    let c = container().await;
    let category = create_category(&c, "Electronics").await;
    let product = create_product(&c, "Smart Phone", category.id, None).await;

    let data = ProductData {
        sku: Some(product.sku.clone()),
        ..product_data("Other Phone", category.id)
    };
    let err = c.products.create(data, None).await.unwrap_err();
    let errors = err.field_errors().expect("field errors");
    assert!(errors.has("sku"));
}

#[tokio::test]
async fn test_stock_never_goes_below_zero() {
    let c = container().await;
    let category = create_category(&c, "Tools").await;
    let product = create_product(&c, "Hammer", category.id, None).await;
    assert_eq!(product.stock, 10);

    let product = c
        .products
        .adjust_stock(product.id, StockOperation::Subtract, 25, None)
        .await
        .unwrap();
    assert_eq!(product.stock, 0);

    let product = c
        .products
        .adjust_stock(product.id, StockOperation::Add, 3, None)
        .await
        .unwrap();
    assert_eq!(product.stock, 3);
    assert!(product.last_purchase_date.is_some());

    let err = c
        .products
        .adjust_stock(product.id, StockOperation::Set, -1, None)
        .await
        .unwrap_err();
    assert!(err.field_errors().is_some());
}

#[tokio::test]
async fn test_stock_filters() {
    let c = container().await;
    let category = create_category(&c, "Tools").await;
    let hammer = create_product(&c, "Hammer", category.id, None).await;
    let saw = create_product(&c, "Saw", category.id, None).await;
    create_product(&c, "Drill", category.id, None).await;

    c.products
        .adjust_stock(hammer.id, StockOperation::Set, 1, None)
        .await
        .unwrap();
    c.products
        .adjust_stock(saw.id, StockOperation::Set, 0, None)
        .await
        .unwrap();

    let low = c.products.low_stock(10).await.unwrap();
    assert_eq!(low.len(), 1);
    assert_eq!(low[0].id, hammer.id);

    let out = c.products.out_of_stock(10).await.unwrap();
    assert_eq!(out.len(), 1);
    assert_eq!(out[0].id, saw.id);

    let filter = ProductFilter {
        stock: Some(StockFilter::Available),
        ..Default::default()
    };
    let page = c.products.list(&filter, Pagination::new(1, 15)).await.unwrap();
    assert_eq!(page.items.len(), 2);
}

#[tokio::test]
async fn test_trash_and_restore() {
    let c = container().await;
    let category = create_category(&c, "Tools").await;
    let product = create_product(&c, "Hammer", category.id, None).await;

    c.products.delete(product.id, None).await.unwrap();
    assert!(c.products.find(product.id).await.unwrap().is_none());
    assert_eq!(c.products.stats().await.unwrap().trashed, 1);

    let restored = c.products.restore(product.id, None).await.unwrap();
    assert!(restored.deleted_at.is_none());
    assert!(c.products.find(product.id).await.unwrap().is_some());

    c.products.force_delete(product.id, None).await.unwrap();
    assert!(c.products.restore(product.id, None).await.is_err());
}

#[tokio::test]
async fn test_bulk_update_reports_unknown_ids() {
    let c = container().await;
    let category = create_category(&c, "Tools").await;
    let hammer = create_product(&c, "Hammer", category.id, None).await;
    let saw = create_product(&c, "Saw", category.id, None).await;
    let missing = ProductId::new();

    let changes = autogestor::application::ProductBulkUpdate {
        is_active: Some(false),
        ..Default::default()
    };
    let report = c
        .products
        .bulk_update(&[hammer.id, missing, saw.id], &changes, None)
        .await
        .unwrap();
    assert_eq!(report.affected, 2);
    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].id, missing.0);
    assert!(!c.products.get(hammer.id).await.unwrap().is_active);

    let empty = autogestor::application::ProductBulkUpdate::default();
    assert!(c.products.bulk_update(&[hammer.id], &empty, None).await.is_err());
}

#[tokio::test]
async fn test_bulk_update_sets_and_clears_brand() {
    let c = container().await;
    let category = create_category(&c, "Tools").await;
    let acme = create_brand(&c, "Acme", None).await;
    let hammer = create_product(&c, "Hammer", category.id, None).await;
    let saw = create_product(&c, "Saw", category.id, None).await;

    let assign = autogestor::application::ProductBulkUpdate {
        brand_id: Some(Some(acme.id)),
        ..Default::default()
    };
    let report = c
        .products
        .bulk_update(&[hammer.id, saw.id], &assign, None)
        .await
        .unwrap();
    assert_eq!(report.affected, 2);
    assert_eq!(c.products.get(saw.id).await.unwrap().brand_id, Some(acme.id));

    let clear = autogestor::application::ProductBulkUpdate {
        brand_id: Some(None),
        ..Default::default()
    };
    c.products.bulk_update(&[saw.id], &clear, None).await.unwrap();
    assert_eq!(c.products.get(saw.id).await.unwrap().brand_id, None);
    assert_eq!(c.products.get(hammer.id).await.unwrap().brand_id, Some(acme.id));
}

#[tokio::test]
async fn test_import_keeps_valid_rows() {
    let c = container().await;
    create_category(&c, "Tools").await;
    create_brand(&c, "Acme", None).await;

    let csv = "name,category,brand,price,stock\n\
               Hammer,Tools,Acme,12.50,4\n\
               Ghost,Nowhere,,1,1\n\
               Saw,Tools,,\"9,90\",2\n";
    let report = c.products.import_csv(csv.as_bytes(), None).await.unwrap();

    assert_eq!(report.created, 2);
    assert_eq!(report.errors.len(), 1);
    assert_eq!(report.errors[0].row, 3);
    assert_eq!(report.errors[0].reason, "Category 'Nowhere' not found.");

    let page = c
        .products
        .search("saw", Pagination::new(1, 15))
        .await
        .unwrap();
    assert_eq!(page.items.len(), 1);
    assert_eq!(page.items[0].price.to_string(), "9.90");
}

#[tokio::test]
async fn test_import_requires_name_column() {
    let c = container().await;
    let err = c
        .products
        .import_csv(b"title,category\nHammer,Tools\n", None)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Validation(_)));
}

#[tokio::test]
async fn test_deleting_brand_detaches_products() {
    let c = container().await;
    let category = create_category(&c, "Tools").await;
    let acme = create_brand(&c, "Acme", Some("USA")).await;
    let product = create_product(&c, "Hammer", category.id, Some(acme.id)).await;

    c.brands.delete(acme.id, None).await.unwrap();
    let product = c.products.get(product.id).await.unwrap();
    assert_eq!(product.brand_id, None);
}

#[tokio::test]
async fn test_brand_countries_are_distinct_and_sorted() {
    let c = container().await;
    create_brand(&c, "Zeta", Some("Spain")).await;
    create_brand(&c, "Acme", Some("USA")).await;
    create_brand(&c, "Beta", Some("Spain")).await;
    create_brand(&c, "Nameless", None).await;

    let countries = c.brands.countries().await.unwrap();
    assert_eq!(countries, vec!["Spain".to_string(), "USA".to_string()]);
}
