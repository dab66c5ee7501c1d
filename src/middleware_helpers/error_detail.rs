//! Request-scoped switch controlling whether error envelopes carry the
//! underlying error text.

use crate::AppState;
use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use futures::Future;

tokio::task_local! {
    static ERROR_DETAILS: bool;
}

/// Runs `future` with error details enabled or disabled.
pub async fn scope_error_details<Fut, R>(enabled: bool, future: Fut) -> R
where
    Fut: Future<Output = R>,
{
    ERROR_DETAILS.scope(enabled, future).await
}

/// Defaults to `false` outside a request scope.
pub fn details_enabled() -> bool {
    ERROR_DETAILS.try_with(|enabled| *enabled).unwrap_or(false)
}

pub async fn error_detail_middleware(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    let enabled = state.config.error_details_enabled();
    scope_error_details(enabled, next.run(request)).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn flag_is_scoped() {
        assert!(!details_enabled());
        assert!(scope_error_details(true, async { details_enabled() }).await);
        assert!(!scope_error_details(false, async { details_enabled() }).await);
        assert!(!details_enabled());
    }
}
