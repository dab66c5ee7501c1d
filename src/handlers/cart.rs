use crate::handlers::common::{map_service_error, message_response, success_response, AppJson};
use crate::{
    errors::ApiError,
    services::cart::{AddToCartInput, CartItemView, RemoveCartItemInput, UpdateCartItemInput},
    services::checkout::{CheckoutInput, CheckoutOutcome},
    ApiResponse, AppState,
};
use axum::{
    extract::{Path, State},
    response::IntoResponse,
    routing::{delete, get, post, put},
    Router,
};

/// Creates the router for cart endpoints
pub fn cart_routes() -> Router<AppState> {
    Router::new()
        .route("/add", post(add_to_cart))
        .route("/update", put(update_cart_item))
        .route("/remove", delete(remove_cart_item))
        .route("/clear/:user_id", delete(clear_cart))
        .route("/checkout", post(checkout))
        .route("/:user_id", get(get_cart))
}

/// Add item to cart
#[utoipa::path(
    post,
    path = "/api/cart/add",
    summary = "Add to cart",
    description = "Adds a product to the user's cart, incrementing the quantity when it is already there",
    request_body = AddToCartInput,
    responses(
        (status = 200, description = "Item added to cart"),
        (status = 400, description = "Missing userId or productId", body = crate::errors::ErrorResponse),
        (status = 404, description = "Product not found", body = crate::errors::ErrorResponse),
    ),
    tag = "cart"
)]
pub async fn add_to_cart(
    State(state): State<AppState>,
    AppJson(payload): AppJson<AddToCartInput>,
) -> Result<impl IntoResponse, ApiError> {
    let item = state
        .services
        .cart
        .add_item(payload)
        .await
        .map_err(map_service_error)?;

    Ok(message_response("Item added to cart", Some(item)))
}

/// Get the user's active cart
#[utoipa::path(
    get,
    path = "/api/cart/{user_id}",
    summary = "Get cart",
    params(("user_id" = i32, Path, description = "Owner of the cart")),
    responses(
        (status = 200, description = "Active cart items", body = ApiResponse<Vec<CartItemView>>),
    ),
    tag = "cart"
)]
pub async fn get_cart(
    State(state): State<AppState>,
    Path(user_id): Path<i32>,
) -> Result<impl IntoResponse, ApiError> {
    let items = state
        .services
        .cart
        .list_items(user_id)
        .await
        .map_err(map_service_error)?;

    Ok(success_response(items))
}

/// Update cart item quantity
#[utoipa::path(
    put,
    path = "/api/cart/update",
    summary = "Update cart item",
    request_body = UpdateCartItemInput,
    responses(
        (status = 200, description = "Cart item updated"),
        (status = 400, description = "Invalid quantity", body = crate::errors::ErrorResponse),
        (status = 404, description = "Cart item not found", body = crate::errors::ErrorResponse),
    ),
    tag = "cart"
)]
pub async fn update_cart_item(
    State(state): State<AppState>,
    AppJson(payload): AppJson<UpdateCartItemInput>,
) -> Result<impl IntoResponse, ApiError> {
    let item = state
        .services
        .cart
        .update_item(payload)
        .await
        .map_err(map_service_error)?;

    Ok(message_response("Cart item updated", Some(item)))
}

/// Remove item from cart
#[utoipa::path(
    delete,
    path = "/api/cart/remove",
    summary = "Remove cart item",
    request_body = RemoveCartItemInput,
    responses(
        (status = 200, description = "Cart item removed"),
        (status = 404, description = "Cart item not found", body = crate::errors::ErrorResponse),
    ),
    tag = "cart"
)]
pub async fn remove_cart_item(
    State(state): State<AppState>,
    AppJson(payload): AppJson<RemoveCartItemInput>,
) -> Result<impl IntoResponse, ApiError> {
    state
        .services
        .cart
        .remove_item(payload)
        .await
        .map_err(map_service_error)?;

    Ok(message_response::<()>("Cart item removed", None))
}

/// Clear all items from cart
#[utoipa::path(
    delete,
    path = "/api/cart/clear/{user_id}",
    summary = "Clear cart",
    params(("user_id" = i32, Path, description = "Owner of the cart")),
    responses((status = 200, description = "Cart cleared")),
    tag = "cart"
)]
pub async fn clear_cart(
    State(state): State<AppState>,
    Path(user_id): Path<i32>,
) -> Result<impl IntoResponse, ApiError> {
    let removed = state
        .services
        .cart
        .clear(user_id)
        .await
        .map_err(map_service_error)?;

    Ok(message_response(
        "Cart cleared",
        Some(serde_json::json!({ "removed": removed })),
    ))
}

/// Place an order from the user's cart
#[utoipa::path(
    post,
    path = "/api/cart/checkout",
    summary = "Checkout",
    description = "Converts the active cart into a pending order, decrementing stock atomically",
    request_body = CheckoutInput,
    responses(
        (status = 200, description = "Order placed successfully", body = ApiResponse<CheckoutOutcome>),
        (status = 400, description = "Cart is empty", body = crate::errors::ErrorResponse),
        (status = 422, description = "Product missing or insufficient stock", body = crate::errors::ErrorResponse),
        (status = 500, description = "Order could not be placed", body = crate::errors::ErrorResponse),
    ),
    tag = "cart"
)]
pub async fn checkout(
    State(state): State<AppState>,
    AppJson(payload): AppJson<CheckoutInput>,
) -> Result<impl IntoResponse, ApiError> {
    let outcome = state
        .services
        .checkout
        .checkout(payload)
        .await
        .map_err(map_service_error)?;

    Ok(message_response("Order placed successfully", Some(outcome)))
}
