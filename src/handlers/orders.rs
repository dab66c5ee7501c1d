use crate::handlers::common::{map_service_error, message_response, success_response, AppJson, PaginationMeta};
use crate::{
    errors::ApiError,
    services::orders::{OrderPage, OrderView},
    ApiResponse, AppState,
};
use axum::{
    extract::{Path, Query, State},
    response::IntoResponse,
    routing::{get, put},
    Router,
};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

pub fn order_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_orders))
        .route("/user/:user_id", get(orders_by_user))
        .route("/:order_id", get(get_order))
        .route("/:order_id/status", put(update_order_status))
}

#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct OrderListQuery {
    #[serde(alias = "userId")]
    pub user_id: Option<i32>,
    pub page: Option<u64>,
    pub limit: Option<u64>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateOrderStatusRequest {
    #[serde(default)]
    pub status: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct OrderListResponse {
    /// Present when the listing was paginated
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pagination: Option<PaginationMeta>,
    pub orders: Vec<OrderView>,
}

impl From<OrderPage> for OrderListResponse {
    fn from(page: OrderPage) -> Self {
        Self {
            pagination: Some(PaginationMeta::new(page.page, page.per_page, page.total)),
            orders: page.orders,
        }
    }
}

/// List orders, newest first
#[utoipa::path(
    get,
    path = "/api/orders",
    summary = "List orders",
    description = "Orders newest first; paginated when page or limit is supplied",
    params(OrderListQuery),
    responses(
        (status = 200, description = "Orders retrieved", body = ApiResponse<OrderListResponse>),
    ),
    tag = "orders"
)]
pub async fn list_orders(
    State(state): State<AppState>,
    Query(query): Query<OrderListQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let orders = &state.services.orders;

    let response = if query.page.is_some() || query.limit.is_some() {
        let per_page = state.config.page_size(query.limit);
        orders
            .list_orders_paginated(query.user_id, query.page.unwrap_or(1), per_page)
            .await
            .map(OrderListResponse::from)
    } else {
        orders
            .list_orders(query.user_id)
            .await
            .map(|orders| OrderListResponse {
                pagination: None,
                orders,
            })
    }
    .map_err(map_service_error)?;

    Ok(success_response(response))
}

/// Orders placed by one user
#[utoipa::path(
    get,
    path = "/api/orders/user/{user_id}",
    summary = "Orders by user",
    params(("user_id" = i32, Path, description = "Customer id")),
    responses(
        (status = 200, description = "Orders retrieved", body = ApiResponse<Vec<OrderView>>),
    ),
    tag = "orders"
)]
pub async fn orders_by_user(
    State(state): State<AppState>,
    Path(user_id): Path<i32>,
) -> Result<impl IntoResponse, ApiError> {
    let orders = state
        .services
        .orders
        .orders_by_user(user_id)
        .await
        .map_err(map_service_error)?;

    Ok(success_response(orders))
}

#[utoipa::path(
    get,
    path = "/api/orders/{order_id}",
    summary = "Get order",
    params(("order_id" = i32, Path, description = "Order id")),
    responses(
        (status = 200, description = "Order retrieved", body = ApiResponse<OrderView>),
        (status = 404, description = "Order not found", body = crate::errors::ErrorResponse),
    ),
    tag = "orders"
)]
pub async fn get_order(
    State(state): State<AppState>,
    Path(order_id): Path<i32>,
) -> Result<impl IntoResponse, ApiError> {
    let order = state
        .services
        .orders
        .get_order(order_id)
        .await
        .map_err(map_service_error)?;

    Ok(success_response(order))
}

/// Overwrite an order's status
#[utoipa::path(
    put,
    path = "/api/orders/{order_id}/status",
    summary = "Update order status",
    params(("order_id" = i32, Path, description = "Order id")),
    request_body = UpdateOrderStatusRequest,
    responses(
        (status = 200, description = "Order status updated"),
        (status = 400, description = "Missing or unknown status", body = crate::errors::ErrorResponse),
        (status = 404, description = "Order not found", body = crate::errors::ErrorResponse),
    ),
    tag = "orders"
)]
pub async fn update_order_status(
    State(state): State<AppState>,
    Path(order_id): Path<i32>,
    AppJson(payload): AppJson<UpdateOrderStatusRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let order = state
        .services
        .orders
        .update_status(order_id, &payload.status)
        .await
        .map_err(map_service_error)?;

    Ok(message_response("Order status updated", Some(order)))
}
