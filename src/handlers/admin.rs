//! Back-office endpoints: product maintenance and order oversight.

use crate::handlers::{
    common::{created_response, map_service_error, message_response, success_response, AppJson, PaginationParams},
    orders::{update_order_status, OrderListResponse},
    products::{ProductListQuery, ProductListResponse},
};
use crate::{
    errors::ApiError,
    services::catalog::{CreateProductInput, ProductView, UpdateProductInput},
    ApiResponse, AppState,
};
use axum::{
    extract::{Path, Query, State},
    response::IntoResponse,
    routing::{get, post, put},
    Router,
};

pub fn admin_routes() -> Router<AppState> {
    Router::new()
        .route("/products", get(list_products))
        .route("/products/add", post(add_product))
        .route("/products/update", put(update_product))
        .route("/products/:id", get(get_product).delete(delete_product))
        .route("/orders", get(list_orders))
        .route("/orders/update/:order_id", put(update_order_status))
}

/// List products, including inactive ones
#[utoipa::path(
    get,
    path = "/api/admin/products",
    summary = "List products (admin)",
    params(ProductListQuery),
    responses(
        (status = 200, description = "Products retrieved", body = ApiResponse<ProductListResponse>),
    ),
    tag = "admin"
)]
pub async fn list_products(
    State(state): State<AppState>,
    Query(query): Query<ProductListQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let per_page = state.config.page_size(query.limit);
    let page = state
        .services
        .catalog
        .list_products(query.into_filter(per_page, true))
        .await
        .map_err(map_service_error)?;

    Ok(success_response(ProductListResponse::from(page)))
}

#[utoipa::path(
    get,
    path = "/api/admin/products/{id}",
    summary = "Get product (admin)",
    params(("id" = i32, Path, description = "Product id")),
    responses(
        (status = 200, description = "Product retrieved", body = ApiResponse<ProductView>),
        (status = 404, description = "Product not found", body = crate::errors::ErrorResponse),
    ),
    tag = "admin"
)]
pub async fn get_product(
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> Result<impl IntoResponse, ApiError> {
    let product = state
        .services
        .catalog
        .get_product_admin(id)
        .await
        .map_err(map_service_error)?;

    Ok(success_response(product))
}

/// Create a product with its images
#[utoipa::path(
    post,
    path = "/api/admin/products/add",
    summary = "Add product",
    request_body = CreateProductInput,
    responses(
        (status = 201, description = "Product added"),
        (status = 400, description = "Missing required fields", body = crate::errors::ErrorResponse),
    ),
    tag = "admin"
)]
pub async fn add_product(
    State(state): State<AppState>,
    AppJson(payload): AppJson<CreateProductInput>,
) -> Result<impl IntoResponse, ApiError> {
    let product_id = state
        .services
        .catalog
        .create_product(payload)
        .await
        .map_err(map_service_error)?;

    Ok(created_response(
        "Product added",
        serde_json::json!({ "productId": product_id }),
    ))
}

/// Partially update a product; a non-empty image list replaces the existing images
#[utoipa::path(
    put,
    path = "/api/admin/products/update",
    summary = "Update product",
    request_body = UpdateProductInput,
    responses(
        (status = 200, description = "Product updated", body = ApiResponse<ProductView>),
        (status = 404, description = "Product not found", body = crate::errors::ErrorResponse),
    ),
    tag = "admin"
)]
pub async fn update_product(
    State(state): State<AppState>,
    AppJson(payload): AppJson<UpdateProductInput>,
) -> Result<impl IntoResponse, ApiError> {
    let product = state
        .services
        .catalog
        .update_product(payload)
        .await
        .map_err(map_service_error)?;

    Ok(message_response("Product updated", Some(product)))
}

/// Soft-delete a product
#[utoipa::path(
    delete,
    path = "/api/admin/products/{id}",
    summary = "Deactivate product",
    params(("id" = i32, Path, description = "Product id")),
    responses(
        (status = 200, description = "Product deactivated"),
        (status = 404, description = "Product not found", body = crate::errors::ErrorResponse),
    ),
    tag = "admin"
)]
pub async fn delete_product(
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> Result<impl IntoResponse, ApiError> {
    state
        .services
        .catalog
        .deactivate_product(id)
        .await
        .map_err(map_service_error)?;

    Ok(message_response::<()>("Product deactivated", None))
}

/// Paginated order listing
#[utoipa::path(
    get,
    path = "/api/admin/orders",
    summary = "List orders (admin)",
    params(PaginationParams),
    responses(
        (status = 200, description = "Orders retrieved", body = ApiResponse<OrderListResponse>),
    ),
    tag = "admin"
)]
pub async fn list_orders(
    State(state): State<AppState>,
    Query(params): Query<PaginationParams>,
) -> Result<impl IntoResponse, ApiError> {
    let per_page = state.config.page_size(params.limit);
    let page = state
        .services
        .orders
        .list_orders_paginated(None, params.page(), per_page)
        .await
        .map_err(map_service_error)?;

    Ok(success_response(OrderListResponse::from(page)))
}
