use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Storefront API",
        version = "0.1.0",
        description = r#"
# Storefront API

Catalog browsing, shopping carts, checkout, order tracking and order cancellation
for a single storefront.

## Responses

Successful responses share one envelope:

```json
{
  "status": "success",
  "message": "Item added to cart",
  "data": {},
  "meta": { "request_id": "…", "timestamp": "2024-01-01T00:00:00Z" }
}
```

Errors use:

```json
{
  "status": "error",
  "message": "Cart is empty",
  "request_id": "…",
  "timestamp": "2024-01-01T00:00:00Z"
}
```

## Pagination

Listings accept `page` (default 1) and `limit` (default 10, capped by the server).
        "#,
        license(
            name = "MIT",
            url = "https://opensource.org/licenses/MIT"
        )
    ),
    servers(
        (url = "http://localhost:8080", description = "Local development")
    ),
    tags(
        (name = "cart", description = "Shopping cart and checkout"),
        (name = "products", description = "Public catalog"),
        (name = "orders", description = "Order history and status"),
        (name = "admin", description = "Product maintenance and order oversight"),
        (name = "cancel-orders", description = "Order cancellations")
    ),
    paths(
        // Cart
        crate::handlers::cart::add_to_cart,
        crate::handlers::cart::get_cart,
        crate::handlers::cart::update_cart_item,
        crate::handlers::cart::remove_cart_item,
        crate::handlers::cart::clear_cart,
        crate::handlers::cart::checkout,

        // Catalog
        crate::handlers::products::list_products,
        crate::handlers::products::get_product,

        // Orders
        crate::handlers::orders::list_orders,
        crate::handlers::orders::orders_by_user,
        crate::handlers::orders::get_order,
        crate::handlers::orders::update_order_status,

        // Admin
        crate::handlers::admin::list_products,
        crate::handlers::admin::get_product,
        crate::handlers::admin::add_product,
        crate::handlers::admin::update_product,
        crate::handlers::admin::delete_product,
        crate::handlers::admin::list_orders,

        // Cancellations
        crate::handlers::cancel_orders::list_cancel_orders,
        crate::handlers::cancel_orders::get_cancel_order,
        crate::handlers::cancel_orders::create_cancel_order,
        crate::handlers::cancel_orders::update_cancel_order,
        crate::handlers::cancel_orders::delete_cancel_order,
    ),
    components(
        schemas(
            crate::ResponseMeta,
            crate::handlers::common::PaginationMeta,
            crate::entities::product::ProductStatus,
            crate::entities::order::OrderStatus,
            crate::entities::order::PaymentStatus,
            crate::entities::cancel_order::CancelStatus,
            crate::errors::ErrorResponse
        )
    )
)]
pub struct ApiDocV1;

pub fn swagger_ui() -> SwaggerUi {
    SwaggerUi::new("/swagger-ui")
        .url("/api-docs/openapi.json", ApiDocV1::openapi())
        .config(utoipa_swagger_ui::Config::from("/api-docs/openapi.json").try_it_out_enabled(true))
}
