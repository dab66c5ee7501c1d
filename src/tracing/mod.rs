//! Request correlation and HTTP tracing helpers.
//!
//! Every request gets a [`RequestId`] that is stored in a task-local for the
//! lifetime of the handler future, so error envelopes and success envelopes can
//! echo it without threading it through every call.

use axum::http::Request;
use futures::Future;
use metrics::{counter, histogram};
use std::{cell::RefCell, fmt, time::Instant};
use tower_http::{
    classify::{SharedClassifier, StatusInRangeAsFailures},
    trace::{
        DefaultOnBodyChunk, DefaultOnEos, DefaultOnFailure, DefaultOnRequest, DefaultOnResponse,
        MakeSpan, TraceLayer,
    },
};
pub use tracing::{debug, error, info, trace, warn};
use uuid::Uuid;

/// Request ID tracking information
#[derive(Clone, Debug)]
pub struct RequestId(pub String);

impl Default for RequestId {
    fn default() -> Self {
        RequestId(Uuid::new_v4().to_string())
    }
}

impl RequestId {
    pub fn new(value: impl Into<String>) -> Self {
        RequestId(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

tokio::task_local! {
    static CURRENT_REQUEST_ID: RefCell<Option<RequestId>>;
}

pub async fn scope_request_id<Fut, R>(request_id: RequestId, future: Fut) -> R
where
    Fut: Future<Output = R>,
{
    CURRENT_REQUEST_ID
        .scope(RefCell::new(Some(request_id)), future)
        .await
}

pub fn current_request_id() -> Option<RequestId> {
    CURRENT_REQUEST_ID
        .try_with(|cell| cell.borrow().clone())
        .ok()
        .flatten()
}

#[derive(Clone, Default)]
pub struct RequestSpanMaker;

impl<B> MakeSpan<B> for RequestSpanMaker {
    fn make_span(&mut self, request: &Request<B>) -> tracing::Span {
        let request_id = request
            .extensions()
            .get::<RequestId>()
            .cloned()
            .or_else(|| {
                request
                    .headers()
                    .get(crate::middleware_helpers::request_id::REQUEST_ID_HEADER)
                    .and_then(|v| v.to_str().ok())
                    .map(RequestId::new)
            })
            .unwrap_or_default();

        tracing::info_span!(
            "http.request",
            request_id = %request_id.as_str(),
            method = %request.method(),
            uri = %request.uri(),
        )
    }
}

pub type HttpTraceLayer = TraceLayer<
    SharedClassifier<StatusInRangeAsFailures>,
    RequestSpanMaker,
    DefaultOnRequest,
    DefaultOnResponse,
    DefaultOnBodyChunk,
    DefaultOnEos,
    DefaultOnFailure,
>;

/// Configure tracing for the application with tower-http
pub fn configure_http_tracing() -> HttpTraceLayer {
    let classifier = SharedClassifier::new(StatusInRangeAsFailures::new(500..=599));
    TraceLayer::new(classifier)
        .make_span_with(RequestSpanMaker)
        .on_request(DefaultOnRequest::default())
        .on_response(DefaultOnResponse::default())
        .on_body_chunk(DefaultOnBodyChunk::default())
        .on_eos(DefaultOnEos::default())
        .on_failure(DefaultOnFailure::default())
}

/// Log an error with the active request id attached
pub fn log_error<E: fmt::Display>(err: &E, context: &str) {
    match current_request_id() {
        Some(rid) => error!(request_id = %rid, context = context, error = %err, "Error occurred"),
        None => error!(context = context, error = %err, "Error occurred"),
    }
}

/// Runs a fallible operation, logging and recording its duration and outcome.
///
/// Emits `<operation>.duration_seconds` and either `<operation>.success` or
/// `<operation>.failure`.
pub async fn with_metrics<F, Fut, T, E>(operation: &'static str, task: F) -> Result<T, E>
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: fmt::Display,
{
    let start = Instant::now();
    let result = task().await;
    let elapsed = start.elapsed();

    histogram!(format!("{}.duration_seconds", operation), elapsed.as_secs_f64());
    match &result {
        Ok(_) => {
            counter!(format!("{}.success", operation), 1);
            info!(
                operation = operation,
                duration_ms = %elapsed.as_millis(),
                "Operation completed successfully"
            );
        }
        Err(e) => {
            counter!(format!("{}.failure", operation), 1);
            warn!(
                operation = operation,
                duration_ms = %elapsed.as_millis(),
                error = %e,
                "Operation failed"
            );
        }
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn request_id_is_visible_inside_scope_only() {
        assert!(current_request_id().is_none());
        let seen = scope_request_id(RequestId::new("abc"), async {
            current_request_id().map(|r| r.0)
        })
        .await;
        assert_eq!(seen.as_deref(), Some("abc"));
        assert!(current_request_id().is_none());
    }

    #[tokio::test]
    async fn with_metrics_passes_through_result() {
        let ok: Result<u32, String> = with_metrics("test.op", || async { Ok(7) }).await;
        assert_eq!(ok.unwrap(), 7);

        let err: Result<u32, String> =
            with_metrics("test.op", || async { Err("nope".to_string()) }).await;
        assert_eq!(err.unwrap_err(), "nope");
    }
}
