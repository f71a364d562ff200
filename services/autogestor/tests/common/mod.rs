//! 集成测试公共工具

#![allow(dead_code)]

use std::sync::Arc;

use ag_auth_core::TokenService;
use ag_config::CatalogConfig;
use autogestor::api::{AppState, build_router};
use autogestor::container::Container;
use autogestor::domain::entities::{Brand, BrandData, Category, CategoryData, Product, ProductData, User, UserData};
use autogestor::domain::value_objects::{BrandId, CategoryId};
use axum::Router;
use axum::body::{Body, to_bytes};
use axum::http::{Request, Response, header};
use rust_decimal::Decimal;
use tower::ServiceExt;

pub const PASSWORD: &str = "secret-password";

/// 内存存储 + 进程内缓存，默认角色已写入
pub async fn container() -> Container {
    let container = Container::in_memory(&CatalogConfig::default());
    container
        .maintenance
        .seed_roles()
        .await
        .expect("seed default roles");
    container
}

pub fn tokens() -> Arc<TokenService> {
    Arc::new(TokenService::new(
        "test-secret",
        3600,
        "autogestor".to_string(),
        "autogestor-api".to_string(),
    ))
}

pub struct TestApp {
    pub container: Container,
    pub tokens: Arc<TokenService>,
    pub router: Router,
}

impl TestApp {
    pub async fn new() -> Self {
        let container = container().await;
        let tokens = tokens();
        let router = build_router(AppState::new(&container, tokens.clone())).expect("build router");
        Self {
            container,
            tokens,
            router,
        }
    }

    /// 创建用户并返回其令牌，角色由邮箱决定
    pub async fn login(&self, name: &str, email: &str) -> (User, String) {
        let user = create_user(&self.container, name, email).await;
        let token = self
            .tokens
            .issue_token(&user.id, &user.email)
            .expect("issue token");
        (user, token)
    }

    pub async fn send(&self, request: Request<Body>) -> Response<Body> {
        self.router
            .clone()
            .oneshot(request)
            .await
            .expect("infallible router")
    }
}

pub fn get(uri: &str, token: Option<&str>) -> Request<Body> {
    request("GET", uri, token, Body::empty())
}

pub fn json(method: &str, uri: &str, token: Option<&str>, body: serde_json::Value) -> Request<Body> {
    let mut request = request(method, uri, token, Body::from(body.to_string()));
    request.headers_mut().insert(
        header::CONTENT_TYPE,
        header::HeaderValue::from_static("application/json"),
    );
    request
}

pub fn request(method: &str, uri: &str, token: Option<&str>, body: Body) -> Request<Body> {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::ACCEPT, "application/json");
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    builder.body(body).expect("valid request")
}

pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    let bytes = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("read body");
    serde_json::from_slice(&bytes).expect("json body")
}

pub async fn body_text(response: Response<Body>) -> String {
    let bytes = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("read body");
    String::from_utf8(bytes.to_vec()).expect("utf-8 body")
}

// ========== 测试数据 ==========

pub async fn create_user(container: &Container, name: &str, email: &str) -> User {
    container
        .users
        .create(
            UserData {
                name: name.to_string(),
                email: email.to_string(),
                password: Some(PASSWORD.to_string()),
                roles: Vec::new(),
            },
            None,
        )
        .await
        .expect("create user")
}

pub async fn create_category(container: &Container, name: &str) -> Category {
    container
        .categories
        .create(
            CategoryData {
                name: name.to_string(),
                ..Default::default()
            },
            None,
        )
        .await
        .expect("create category")
}

pub async fn create_brand(container: &Container, name: &str, country: Option<&str>) -> Brand {
    container
        .brands
        .create(
            BrandData {
                name: name.to_string(),
                country_of_origin: country.map(str::to_string),
                ..Default::default()
            },
            None,
        )
        .await
        .expect("create brand")
}

pub fn product_data(name: &str, category_id: CategoryId) -> ProductData {
    ProductData {
        name: name.to_string(),
        price: Decimal::new(1999, 2),
        stock: 10,
        min_stock: 2,
        category_id: Some(category_id),
        ..Default::default()
    }
}

pub async fn create_product(
    container: &Container,
    name: &str,
    category_id: CategoryId,
    brand_id: Option<BrandId>,
) -> Product {
    let data = ProductData {
        brand_id,
        ..product_data(name, category_id)
    };
    container
        .products
        .create(data, None)
        .await
        .expect("create product")
}
