use crate::handlers::common::{created_response, map_service_error, message_response, success_response, AppJson};
use crate::{
    errors::ApiError,
    services::cancellations::{
        CancelOrderFilter, CancelOrderInput, CancelOrderView, UpdateCancelOrderInput,
    },
    ApiResponse, AppState,
};
use axum::{
    extract::{Path, Query, State},
    response::IntoResponse,
    routing::{get, put},
    Router,
};
use serde::Deserialize;
use utoipa::IntoParams;

pub fn cancel_order_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_cancel_orders).post(create_cancel_order))
        .route(
            "/:id",
            put(update_cancel_order)
                .get(get_cancel_order)
                .delete(delete_cancel_order),
        )
}

#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct CancelOrderQuery {
    #[serde(alias = "userId")]
    pub user_id: Option<i32>,
    #[serde(alias = "orderId")]
    pub order_id: Option<i32>,
}

#[utoipa::path(
    get,
    path = "/api/cancelOrders",
    summary = "List cancellations",
    params(CancelOrderQuery),
    responses(
        (status = 200, description = "Cancellations retrieved", body = ApiResponse<Vec<CancelOrderView>>),
    ),
    tag = "cancel-orders"
)]
pub async fn list_cancel_orders(
    State(state): State<AppState>,
    Query(query): Query<CancelOrderQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let filter = CancelOrderFilter {
        user_id: query.user_id,
        order_id: query.order_id,
    };
    let records = state
        .services
        .cancellations
        .list(filter)
        .await
        .map_err(map_service_error)?;

    Ok(success_response(records))
}

#[utoipa::path(
    get,
    path = "/api/cancelOrders/{id}",
    summary = "Get cancellation",
    params(("id" = i32, Path, description = "Cancellation id")),
    responses(
        (status = 200, description = "Cancellation retrieved", body = ApiResponse<CancelOrderView>),
        (status = 404, description = "Cancellation not found", body = crate::errors::ErrorResponse),
    ),
    tag = "cancel-orders"
)]
pub async fn get_cancel_order(
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> Result<impl IntoResponse, ApiError> {
    let record = state
        .services
        .cancellations
        .get(id)
        .await
        .map_err(map_service_error)?;

    Ok(success_response(record))
}

/// Cancel an order
#[utoipa::path(
    post,
    path = "/api/cancelOrders",
    summary = "Cancel order",
    description = "Records the cancellation and marks the order cancelled in one transaction",
    request_body = CancelOrderInput,
    responses(
        (status = 201, description = "Order cancelled"),
        (status = 400, description = "Missing orderId or userId", body = crate::errors::ErrorResponse),
        (status = 404, description = "Order not found", body = crate::errors::ErrorResponse),
        (status = 409, description = "Order already cancelled", body = crate::errors::ErrorResponse),
    ),
    tag = "cancel-orders"
)]
pub async fn create_cancel_order(
    State(state): State<AppState>,
    AppJson(payload): AppJson<CancelOrderInput>,
) -> Result<impl IntoResponse, ApiError> {
    let record = state
        .services
        .cancellations
        .request_cancellation(payload)
        .await
        .map_err(map_service_error)?;

    Ok(created_response("Order cancelled", record))
}

#[utoipa::path(
    put,
    path = "/api/cancelOrders/{id}",
    summary = "Update cancellation",
    params(("id" = i32, Path, description = "Cancellation id")),
    request_body = UpdateCancelOrderInput,
    responses(
        (status = 200, description = "Cancellation updated"),
        (status = 400, description = "Unknown status", body = crate::errors::ErrorResponse),
        (status = 404, description = "Cancellation not found", body = crate::errors::ErrorResponse),
    ),
    tag = "cancel-orders"
)]
pub async fn update_cancel_order(
    State(state): State<AppState>,
    Path(id): Path<i32>,
    AppJson(payload): AppJson<UpdateCancelOrderInput>,
) -> Result<impl IntoResponse, ApiError> {
    let record = state
        .services
        .cancellations
        .update(id, payload)
        .await
        .map_err(map_service_error)?;

    Ok(message_response("Cancel order updated", Some(record)))
}

#[utoipa::path(
    delete,
    path = "/api/cancelOrders/{id}",
    summary = "Delete cancellation",
    params(("id" = i32, Path, description = "Cancellation id")),
    responses(
        (status = 200, description = "Cancellation deleted"),
        (status = 404, description = "Cancellation not found", body = crate::errors::ErrorResponse),
    ),
    tag = "cancel-orders"
)]
pub async fn delete_cancel_order(
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> Result<impl IntoResponse, ApiError> {
    state
        .services
        .cancellations
        .delete(id)
        .await
        .map_err(map_service_error)?;

    Ok(message_response::<()>("Cancel order deleted", None))
}
