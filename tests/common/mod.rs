#![allow(dead_code)]

use std::str::FromStr;
use std::sync::Arc;

use axum::{
    body::Body,
    http::{Method, Request, StatusCode},
    response::Response,
    Router,
};
use rust_decimal::Decimal;
use sea_orm::{ConnectionTrait, DbErr, EntityTrait, ExecResult, Statement};
use serde_json::Value;
use storefront_api::{
    config::AppConfig,
    db,
    entities::product,
    events::{self, EventSender},
    services::{cart::AddToCartInput, catalog::CreateProductInput, checkout::CheckoutInput},
    AppState,
};
use tempfile::TempDir;
use tokio::sync::mpsc;
use tower::ServiceExt;

/// Product fields a test cares about; everything else gets a fixed value.
#[derive(Clone, Debug)]
pub struct ProductSeed {
    pub user_id: i32,
    pub heading: String,
    pub product_type: String,
    pub brand: String,
    pub item: String,
    pub price: Decimal,
    pub mrp: Decimal,
    pub stock: i32,
    pub images: Vec<String>,
}

impl ProductSeed {
    pub fn new(heading: &str, price: Decimal, stock: i32) -> Self {
        Self {
            user_id: 1,
            heading: heading.to_string(),
            product_type: "Apparel".to_string(),
            brand: "Basics Co".to_string(),
            item: "T-Shirt".to_string(),
            price,
            mrp: price,
            stock,
            images: Vec::new(),
        }
    }
}

/// Application backed by a throwaway SQLite file, driven through the real router.
pub struct TestApp {
    router: Router,
    pub state: AppState,
    _db_dir: TempDir,
    _event_task: tokio::task::JoinHandle<()>,
}

impl TestApp {
    pub async fn new() -> Self {
        Self::with_config(|_| {}).await
    }

    pub async fn with_config(adjust: impl FnOnce(&mut AppConfig)) -> Self {
        let db_dir = tempfile::tempdir().expect("failed to create temp dir");
        let db_path = db_dir.path().join("storefront_test.db");

        let mut cfg = AppConfig::new(
            format!("sqlite://{}?mode=rwc", db_path.display()),
            "127.0.0.1".to_string(),
            18_080,
            "test".to_string(),
        );
        cfg.db_max_connections = 1;
        cfg.db_min_connections = 1;
        adjust(&mut cfg);

        let pool = db::establish_connection_from_app_config(&cfg)
            .await
            .expect("failed to create test database");
        db::run_migrations(&pool)
            .await
            .expect("failed to run migrations");

        let (sender, receiver) = mpsc::channel(cfg.event_channel_capacity);
        let event_task = tokio::spawn(events::process_events(receiver));

        let state = AppState::new(Arc::new(pool), cfg, EventSender::new(sender));
        let router = storefront_api::app_router(state.clone());

        Self {
            router,
            state,
            _db_dir: db_dir,
            _event_task: event_task,
        }
    }

    pub async fn request(&self, method: Method, uri: &str, body: Option<Value>) -> Response {
        self.request_with_headers(method, uri, body, &[]).await
    }

    pub async fn request_with_headers(
        &self,
        method: Method,
        uri: &str,
        body: Option<Value>,
        headers: &[(&str, &str)],
    ) -> Response {
        let mut builder = Request::builder().method(method).uri(uri);
        for (name, value) in headers {
            builder = builder.header(*name, *value);
        }

        let request = match body {
            Some(json) => builder
                .header("content-type", "application/json")
                .body(Body::from(json.to_string()))
                .expect("failed to build request"),
            None => builder.body(Body::empty()).expect("failed to build request"),
        };

        self.router
            .clone()
            .oneshot(request)
            .await
            .expect("router should respond")
    }

    pub async fn seed_product(&self, seed: ProductSeed) -> i32 {
        self.state
            .services
            .catalog
            .create_product(CreateProductInput {
                user_id: seed.user_id,
                heading: seed.heading,
                sub_heading: None,
                details: None,
                price: seed.price,
                mrp: seed.mrp,
                specification: None,
                product_type: seed.product_type,
                brand: seed.brand,
                item: seed.item,
                stock_quantity: Some(seed.stock),
                images: seed.images,
            })
            .await
            .expect("failed to seed product")
    }

    pub async fn add_to_cart(&self, user_id: i32, product_id: i32, quantity: i32) {
        self.state
            .services
            .cart
            .add_item(AddToCartInput {
                user_id,
                product_id,
                quantity,
            })
            .await
            .expect("failed to add to cart");
    }

    /// Places an order for everything in the user's cart and returns its id.
    pub async fn place_order(&self, user_id: i32) -> i32 {
        self.state
            .services
            .checkout
            .checkout(CheckoutInput {
                user_id,
                shipping_address: Some(serde_json::json!({ "line1": "1 Test Street" })),
                billing_address: None,
            })
            .await
            .expect("checkout should succeed")
            .order_id
    }

    pub async fn stock_of(&self, product_id: i32) -> i32 {
        product::Entity::find_by_id(product_id)
            .one(self.state.db.as_ref())
            .await
            .expect("product lookup failed")
            .expect("product should exist")
            .stock_quantity
    }

    pub async fn count_rows(&self, table: &str) -> i64 {
        let db = self.state.db.as_ref();
        let row = db
            .query_one(Statement::from_string(
                db.get_database_backend(),
                format!("SELECT COUNT(*) AS total FROM {table}"),
            ))
            .await
            .expect("count query failed")
            .expect("count query returned no row");
        row.try_get::<i64>("", "total").expect("count column")
    }

    pub async fn execute(&self, sql: &str) {
        self.try_execute(sql).await.expect("statement failed");
    }

    pub async fn try_execute(&self, sql: &str) -> Result<ExecResult, DbErr> {
        let db = self.state.db.as_ref();
        db.execute(Statement::from_string(
            db.get_database_backend(),
            sql.to_string(),
        ))
        .await
    }
}

impl Drop for TestApp {
    fn drop(&mut self) {
        self._event_task.abort();
    }
}

pub async fn response_json(response: Response) -> (StatusCode, Value) {
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("failed to read body");
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).expect("response should be json")
    };
    (status, json)
}

/// Reads a decimal that was serialized either as a string or a number.
pub fn decimal(value: &Value) -> Decimal {
    match value {
        Value::String(raw) => Decimal::from_str(raw).expect("decimal string"),
        Value::Number(num) => Decimal::from_str(&num.to_string()).expect("decimal number"),
        other => panic!("expected decimal, got {other}"),
    }
}
