use crate::handlers::common::{map_service_error, success_response, PaginationMeta};
use crate::{
    errors::ApiError,
    services::catalog::{ProductFilter, ProductPage, ProductSort, ProductView, SortDirection},
    ApiResponse, AppState,
};
use axum::{
    extract::{Path, Query, State},
    response::IntoResponse,
    routing::get,
    Router,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use utoipa::{IntoParams, ToSchema};

pub fn product_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_products))
        .route("/:id", get(get_product))
}

/// Query string accepted by the product listings
#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ProductListQuery {
    pub page: Option<u64>,
    pub limit: Option<u64>,
    pub product_type: Option<String>,
    pub item: Option<String>,
    pub brand: Option<String>,
    /// Maximum price
    pub price: Option<String>,
    #[serde(alias = "sortBy")]
    pub sort_by: Option<String>,
    pub order: Option<String>,
    #[serde(alias = "userId")]
    pub user_id: Option<i32>,
}

impl ProductListQuery {
    /// Builds a catalog filter; an unparsable price is ignored.
    pub fn into_filter(self, per_page: u64, include_inactive: bool) -> ProductFilter {
        ProductFilter {
            max_price: self
                .price
                .as_deref()
                .and_then(|raw| Decimal::from_str(raw.trim()).ok()),
            sort: ProductSort::parse(self.sort_by.as_deref()),
            direction: SortDirection::parse(self.order.as_deref()),
            page: self.page.unwrap_or(1).max(1),
            per_page,
            product_type: self.product_type,
            item: self.item,
            brand: self.brand,
            user_id: if include_inactive { self.user_id } else { None },
            include_inactive,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ProductListResponse {
    pub pagination: PaginationMeta,
    pub products: Vec<ProductView>,
}

impl From<ProductPage> for ProductListResponse {
    fn from(page: ProductPage) -> Self {
        Self {
            pagination: PaginationMeta::new(page.page, page.per_page, page.total),
            products: page.products,
        }
    }
}

/// List active products
#[utoipa::path(
    get,
    path = "/api/products",
    summary = "List products",
    description = "Active products with optional type, item, brand and price filters",
    params(ProductListQuery),
    responses(
        (status = 200, description = "Products retrieved", body = ApiResponse<ProductListResponse>),
    ),
    tag = "products"
)]
pub async fn list_products(
    State(state): State<AppState>,
    Query(query): Query<ProductListQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let per_page = state.config.page_size(query.limit);
    let page = state
        .services
        .catalog
        .list_products(query.into_filter(per_page, false))
        .await
        .map_err(map_service_error)?;

    Ok(success_response(ProductListResponse::from(page)))
}

/// Get one active product
#[utoipa::path(
    get,
    path = "/api/products/{id}",
    summary = "Get product",
    params(("id" = i32, Path, description = "Product id")),
    responses(
        (status = 200, description = "Product retrieved", body = ApiResponse<ProductView>),
        (status = 404, description = "Product not found", body = crate::errors::ErrorResponse),
    ),
    tag = "products"
)]
pub async fn get_product(
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> Result<impl IntoResponse, ApiError> {
    let product = state
        .services
        .catalog
        .get_product(id)
        .await
        .map_err(map_service_error)?;

    Ok(success_response(product))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn query_maps_to_filter() {
        let query = ProductListQuery {
            price: Some(" 499.5 ".into()),
            sort_by: Some("price".into()),
            order: Some("asc".into()),
            user_id: Some(3),
            ..Default::default()
        };
        let filter = query.into_filter(10, false);
        assert_eq!(filter.max_price, Some(dec!(499.5)));
        assert_eq!(filter.sort, ProductSort::Price);
        assert_eq!(filter.direction, SortDirection::Asc);
        assert_eq!(filter.page, 1);
        assert_eq!(filter.user_id, None);
    }

    #[test]
    fn bad_price_is_ignored() {
        let query = ProductListQuery {
            price: Some("cheap".into()),
            ..Default::default()
        };
        assert_eq!(query.into_filter(10, true).max_price, None);
    }
}
