//! Storefront API Library
//!
//! Catalog, cart, checkout, order and cancellation services behind an axum HTTP API.
#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]
#![allow(elided_lifetimes_in_paths)]
#![warn(clippy::all, clippy::perf, clippy::dbg_macro)]

// Core modules
pub mod config;
pub mod db;
pub mod entities;
pub mod errors;
pub mod events;
pub mod handlers;
pub mod health;
pub mod middleware_helpers;
pub mod migrator;
pub mod openapi;
pub mod services;
pub mod tracing;

use axum::{
    extract::DefaultBodyLimit,
    http::{HeaderValue, Method},
    routing::get,
    Router,
};
use chrono::Utc;
use sea_orm::DatabaseConnection;
use serde::Serialize;
use std::sync::Arc;
use tower_http::{
    compression::CompressionLayer,
    cors::{AllowHeaders, CorsLayer},
    timeout::TimeoutLayer,
};
use utoipa::ToSchema;

// App state definition
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<DatabaseConnection>,
    pub config: config::AppConfig,
    pub event_sender: events::EventSender,
    pub services: handlers::AppServices,
}

impl AppState {
    /// Wires every service against one pool and one event channel.
    pub fn new(
        db: Arc<DatabaseConnection>,
        config: config::AppConfig,
        event_sender: events::EventSender,
    ) -> Self {
        let services =
            handlers::AppServices::new(db.clone(), Arc::new(event_sender.clone()), &config);
        Self {
            db,
            config,
            event_sender,
            services,
        }
    }
}

// Common response wrappers
#[derive(Serialize, ToSchema)]
pub struct ApiResponse<T> {
    /// Always `success`; failures use `ErrorResponse`
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    pub meta: ResponseMeta,
}

#[derive(Serialize, ToSchema)]
pub struct ResponseMeta {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
    pub timestamp: String,
}

impl ResponseMeta {
    fn capture() -> Self {
        Self {
            request_id: crate::tracing::current_request_id().map(|rid| rid.as_str().to_string()),
            timestamp: Utc::now().to_rfc3339(),
        }
    }
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            status: "success".to_string(),
            message: None,
            data: Some(data),
            meta: ResponseMeta::capture(),
        }
    }

    pub fn with_message(message: &str, data: Option<T>) -> Self {
        Self {
            status: "success".to_string(),
            message: Some(message.to_string()),
            data,
            meta: ResponseMeta::capture(),
        }
    }
}

#[cfg(test)]
mod response_tests {
    use super::*;
    use chrono::DateTime;

    #[tokio::test]
    async fn success_response_includes_request_metadata() {
        let response =
            crate::tracing::scope_request_id(crate::tracing::RequestId::new("meta-123"), async {
                ApiResponse::success("ok")
            })
            .await;

        assert_eq!(response.status, "success");
        assert_eq!(response.meta.request_id.as_deref(), Some("meta-123"));
        DateTime::parse_from_rfc3339(&response.meta.timestamp).expect("timestamp should parse");
    }

    #[test]
    fn message_response_skips_empty_data() {
        let response = ApiResponse::<()>::with_message("Cart cleared", None);
        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["message"], "Cart cleared");
        assert!(json.get("data").is_none());
        assert!(json["meta"].get("request_id").is_none());
    }
}

/// Every `/api` route
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .nest("/cart", handlers::cart::cart_routes())
        .nest("/products", handlers::products::product_routes())
        .nest("/orders", handlers::orders::order_routes())
        .nest("/admin", handlers::admin::admin_routes())
        .nest("/cancelOrders", handlers::cancel_orders::cancel_order_routes())
}

/// Builds the CORS layer from config: explicit origins win, otherwise permissive
/// where allowed, otherwise same-origin only.
pub fn cors_layer(cfg: &config::AppConfig) -> CorsLayer {
    let configured_origins: Option<Vec<HeaderValue>> = cfg
        .cors_allowed_origins
        .as_ref()
        .map(|raw| {
            raw.split(',')
                .filter_map(|origin| {
                    let trimmed = origin.trim();
                    if trimmed.is_empty() {
                        None
                    } else {
                        HeaderValue::from_str(trimmed).ok()
                    }
                })
                .collect::<Vec<_>>()
        })
        .filter(|origins| !origins.is_empty());

    if let Some(origins) = configured_origins {
        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods([
                Method::GET,
                Method::POST,
                Method::PUT,
                Method::DELETE,
                Method::OPTIONS,
            ])
            .allow_headers(AllowHeaders::mirror_request())
            .allow_credentials(cfg.cors_allow_credentials)
    } else if cfg.should_allow_permissive_cors() {
        ::tracing::info!(
            "Using permissive CORS because explicit origins were not configured ({})",
            if cfg.is_development() {
                "development environment"
            } else {
                "explicit override enabled"
            }
        );
        CorsLayer::permissive()
    } else {
        ::tracing::warn!("No CORS origins configured; cross-origin requests will be rejected");
        CorsLayer::new()
    }
}

/// Full application router with middleware, health checks and Swagger UI.
pub fn app_router(state: AppState) -> Router {
    let cfg = state.config.clone();

    Router::<AppState>::new()
        .route("/", get(|| async { "storefront-api up" }))
        .nest("/api", api_routes())
        .nest("/health", health::health_routes(state.db.clone()))
        .merge(openapi::swagger_ui())
        // HTTP tracing layer for consistent request/response telemetry
        .layer(crate::tracing::configure_http_tracing())
        .layer(CompressionLayer::new())
        .layer(cors_layer(&cfg))
        .layer(TimeoutLayer::new(cfg.request_timeout()))
        .layer(DefaultBodyLimit::max(cfg.max_body_size))
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            middleware_helpers::error_detail_middleware,
        ))
        // Ensure every request carries a request id for traceability
        .layer(axum::middleware::from_fn(
            middleware_helpers::request_id_middleware,
        ))
        .with_state(state)
}
