use crate::errors::{ApiError, ServiceError};
use crate::ApiResponse;
use axum::{
    async_trait,
    extract::{rejection::JsonRejection, FromRequest, Request},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

/// Standard success response
pub fn success_response<T: Serialize>(data: T) -> Response {
    (StatusCode::OK, Json(ApiResponse::success(data))).into_response()
}

/// Success response carrying a human-readable message
pub fn message_response<T: Serialize>(message: &str, data: Option<T>) -> Response {
    (StatusCode::OK, Json(ApiResponse::with_message(message, data))).into_response()
}

/// Standard created response
pub fn created_response<T: Serialize>(message: &str, data: T) -> Response {
    (
        StatusCode::CREATED,
        Json(ApiResponse::with_message(message, Some(data))),
    )
        .into_response()
}

/// Map service errors to API errors
pub fn map_service_error(err: ServiceError) -> ApiError {
    ApiError::ServiceError(err)
}

/// JSON body extractor whose rejections use the error envelope.
pub struct AppJson<T>(pub T);

#[async_trait]
impl<S, T> FromRequest<S> for AppJson<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        match Json::<T>::from_request(req, state).await {
            Ok(Json(value)) => Ok(Self(value)),
            Err(rejection) => Err(json_rejection(rejection)),
        }
    }
}

fn json_rejection(rejection: JsonRejection) -> ApiError {
    ApiError::ValidationError(rejection.body_text())
}

/// Pagination parameters for list operations
#[derive(Debug, Default, Deserialize, Serialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct PaginationParams {
    pub page: Option<u64>,
    #[serde(alias = "per_page")]
    pub limit: Option<u64>,
}

impl PaginationParams {
    pub fn page(&self) -> u64 {
        self.page.unwrap_or(1).max(1)
    }
}

/// Standard pagination response metadata
#[derive(Debug, Serialize, ToSchema)]
pub struct PaginationMeta {
    pub total: u64,
    pub total_pages: u64,
    pub current_page: u64,
    pub per_page: u64,
}

impl PaginationMeta {
    pub fn new(page: u64, per_page: u64, total: u64) -> Self {
        let total_pages = if total == 0 || per_page == 0 {
            0
        } else {
            total.div_ceil(per_page)
        };
        Self {
            total,
            total_pages,
            current_page: page,
            per_page,
        }
    }
}
