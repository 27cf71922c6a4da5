//! Trace ID middleware for Docker API requests.
//!
//! Every request gets a trace ID that shows up in:
//! - the `X-Trace-Id` response header
//! - the current tracing span and the request log line
//! - task-local storage, where the usage aggregator picks it up for its own
//!   log lines

use axum::extract::Request;
use axum::http::HeaderValue;
use axum::middleware::Next;
use axum::response::Response;

/// Header name for trace ID propagation.
pub const TRACE_ID_HEADER: &str = "X-Trace-Id";

/// Axum middleware that assigns a trace ID to each request.
///
/// A non-empty `X-Trace-Id` sent by the client is reused; otherwise a new
/// UUID v4 is generated.
pub async fn trace_id_middleware(request: Request, next: Next) -> Response {
    let trace_id = request
        .headers()
        .get(TRACE_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .filter(|s| !s.is_empty())
        .map_or_else(|| uuid::Uuid::new_v4().to_string(), String::from);

    tracing::Span::current().record("trace_id", trace_id.as_str());
    tracing::debug!(trace_id = %trace_id, method = %request.method(), uri = %request.uri(), "request");

    let mut response = arcbox_core::trace::scope(trace_id.clone(), next.run(request)).await;

    if let Ok(value) = HeaderValue::from_str(&trace_id) {
        response.headers_mut().insert(TRACE_ID_HEADER, value);
    }

    response
}
