//! HTTP 访问控制与路由测试

mod common;

use ag_ports::CachePort;
use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use common::{TestApp, body_json, body_text, create_category, get, json, request};
use serde_json::json;

#[tokio::test]
async fn test_anonymous_json_request_is_unauthenticated() {
    let app = TestApp::new().await;

    let response = app.send(get("/products", None)).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(body_json(response).await, json!({ "message": "Unauthenticated." }));
}

#[tokio::test]
async fn test_anonymous_page_request_gets_text_error() {
    let app = TestApp::new().await;

    let request = Request::builder()
        .uri("/categories")
        .body(Body::empty())
        .unwrap();
    let response = app.send(request).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(body_text(response).await, "401 | Unauthenticated.");
}

#[tokio::test]
async fn test_invalid_token_is_treated_as_anonymous() {
    let app = TestApp::new().await;

    let response = app.send(get("/brands", Some("not-a-jwt"))).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_staff_can_browse_catalog() {
    let app = TestApp::new().await;
    let (_, token) = app.login("Ana", "ana@example.com").await;

    for uri in ["/products", "/categories", "/brands", "/"] {
        let response = app.send(get(uri, Some(token.as_str()))).await;
        assert_eq!(response.status(), StatusCode::OK, "GET {}", uri);
    }
}

#[tokio::test]
async fn test_staff_cannot_manage_users() {
    let app = TestApp::new().await;
    let (_, token) = app.login("Ana", "ana@example.com").await;

    let response = app.send(get("/users", Some(token.as_str()))).await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert_eq!(
        body_json(response).await,
        json!({ "message": "User does not have the right permissions." })
    );

    let response = app.send(get("/roles", Some(token.as_str()))).await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_admin_manages_users_and_roles() {
    let app = TestApp::new().await;
    let (_, token) = app.login("Boss", "boss.admin@example.com").await;

    let response = app.send(get("/users", Some(token.as_str()))).await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["total"], 1);

    let response = app.send(get("/roles", Some(token.as_str()))).await;
    assert_eq!(response.status(), StatusCode::OK);

    let response = app.send(get("/permissions", Some(token.as_str()))).await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body[0]["resource"], "dashboard");
}

#[tokio::test]
async fn test_admin_is_redirected_away_from_catalog() {
    let app = TestApp::new().await;
    let (_, token) = app.login("Boss", "boss.admin@example.com").await;
    let category = create_category(&app.container, "Tools").await;

    let requests = vec![
        get("/products", Some(token.as_str())),
        get(&format!("/categories/{}", category.id), Some(token.as_str())),
        get("/brands/create", Some(token.as_str())),
        json("POST", "/categories", Some(token.as_str()), json!({ "name": "Garden" })),
    ];
    for request in requests {
        let uri = request.uri().to_string();
        let response = app.send(request).await;
        assert_eq!(response.status(), StatusCode::SEE_OTHER, "{}", uri);
        assert_eq!(response.headers()[header::LOCATION], "/");
        let cookie = response.headers()[header::SET_COOKIE].to_str().unwrap();
        assert!(cookie.starts_with("flash_error=Administrators%20cannot%20manage"));
    }

    assert!(app.container.categories.find_by_name("Garden").await.unwrap().is_none());
}

#[tokio::test]
async fn test_admin_can_open_dashboard() {
    let app = TestApp::new().await;
    let (_, token) = app.login("Boss", "boss.admin@example.com").await;

    let response = app.send(get("/", Some(token.as_str()))).await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_category_delete_conflict_over_http() {
    let app = TestApp::new().await;
    let (_, token) = app.login("Ana", "ana@example.com").await;

    let response = app
        .send(json("POST", "/categories", Some(token.as_str()), json!({ "name": "Tools" })))
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let category = body_json(response).await;
    let id = category["id"].as_str().unwrap().to_string();

    let response = app
        .send(json(
            "POST",
            "/products",
            Some(token.as_str()),
            json!({ "name": "Hammer", "price": "12.50", "stock": 3, "category_id": id }),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let product = body_json(response).await;
    assert_eq!(product["sku"], "TOO-HAMMER-001");

    let response = app
        .send(request("DELETE", &format!("/categories/{}", id), Some(token.as_str()), Body::empty()))
        .await;
    assert_eq!(response.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_invalid_product_reports_field_errors() {
    let app = TestApp::new().await;
    let (_, token) = app.login("Ana", "ana@example.com").await;

    let response = app
        .send(json("POST", "/products", Some(token.as_str()), json!({ "name": "" })))
        .await;
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn test_listing_cache_is_forgotten_after_write() {
    let app = TestApp::new().await;
    let (_, token) = app.login("Ana", "ana@example.com").await;
    let category = create_category(&app.container, "Tools").await;
    let cache = app.container.cache.clone();

    let response = app.send(get("/products", Some(token.as_str()))).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(cache.exists("products.all.15.1").await.unwrap());

    // 非默认分页不进缓存
    let response = app.send(get("/products?per_page=5", Some(token.as_str()))).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(!cache.exists("products.all.5.1").await.unwrap());

    let response = app
        .send(json(
            "POST",
            "/products",
            Some(token.as_str()),
            json!({ "name": "Saw", "price": "9.90", "category_id": category.id }),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    assert!(!cache.exists("products.all.15.1").await.unwrap());

    let response = app.send(get("/products", Some(token.as_str()))).await;
    let body = body_json(response).await;
    assert_eq!(body["total"], 1);
}

#[tokio::test]
async fn test_stock_adjustment_over_http() {
    let app = TestApp::new().await;
    let (_, token) = app.login("Ana", "ana@example.com").await;
    let category = create_category(&app.container, "Tools").await;
    let product = common::create_product(&app.container, "Hammer", category.id, None).await;

    let response = app
        .send(json(
            "PATCH",
            &format!("/products/{}/stock", product.id),
            Some(token.as_str()),
            json!({ "operation": "subtract", "quantity": 50 }),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["stock"], 0);
}

#[tokio::test]
async fn test_change_own_password_requires_login() {
    let app = TestApp::new().await;
    let body = json!({ "current_password": common::PASSWORD, "password": "brand-new-secret" });

    let response = app.send(json("PUT", "/password", None, body.clone())).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let (user, token) = app.login("Ana", "ana@example.com").await;
    let response = app.send(json("PUT", "/password", Some(token.as_str()), body)).await;
    assert_eq!(response.status(), StatusCode::OK);

    let user = app.container.users.get(user.id).await.unwrap();
    assert!(user.password_hash.verify("brand-new-secret").unwrap());
}

#[tokio::test]
async fn test_admin_resets_password() {
    let app = TestApp::new().await;
    let (_, token) = app.login("Boss", "boss.admin@example.com").await;
    let staff = common::create_user(&app.container, "Ana", "ana@example.com").await;

    let response = app
        .send(request(
            "PATCH",
            &format!("/users/{}/reset-password", staff.id),
            Some(token.as_str()),
            Body::empty(),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    let password = body["password"].as_str().unwrap();

    let staff = app.container.users.get(staff.id).await.unwrap();
    assert!(staff.password_hash.verify(password).unwrap());
}

#[tokio::test]
async fn test_huge_page_number_returns_empty_page() {
    let app = TestApp::new().await;
    let (_, token) = app.login("Ana", "ana@example.com").await;
    create_category(&app.container, "Tools").await;

    let response = app
        .send(get("/categories?page=4294967295&per_page=100000", Some(token.as_str())))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["total"], 1);
    assert_eq!(body["per_page"], 100);
    assert_eq!(body["items"], json!([]));
}
