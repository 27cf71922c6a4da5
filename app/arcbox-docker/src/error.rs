//! Error types for Docker API.

use arcbox_core::CoreError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use thiserror::Error;

/// Result type alias for Docker API operations.
pub type Result<T> = std::result::Result<T, DockerError>;

/// Errors that can occur in Docker API operations.
///
/// Messages are returned to clients as-is in the `message` field, the way
/// dockerd does, so variants carry no prefix of their own.
#[derive(Debug, Error)]
pub enum DockerError {
    /// Invalid parameter supplied by the client.
    #[error("{0}")]
    InvalidParameter(String),

    /// The daemon is shutting down or the request was abandoned.
    #[error("{0}")]
    Unavailable(String),

    /// Server error.
    #[error("{0}")]
    Server(String),
}

impl DockerError {
    /// Returns the HTTP status code for this error.
    #[must_use]
    pub const fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidParameter(_) => StatusCode::BAD_REQUEST,
            Self::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::Server(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<CoreError> for DockerError {
    fn from(err: CoreError) -> Self {
        let message = err.to_string();
        if err.is_invalid_argument() {
            Self::InvalidParameter(message)
        } else if err.is_cancelled() {
            Self::Unavailable(message)
        } else {
            Self::Server(message)
        }
    }
}

/// Docker API error response.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    /// Error message.
    pub message: String,
}

impl IntoResponse for DockerError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = ErrorResponse {
            message: self.to_string(),
        };

        (status, axum::Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn invalid_argument_maps_to_bad_request() {
        let err: DockerError = CoreError::invalid_argument("unknown object type: foo").into();
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(err.to_string(), "unknown object type: foo");
    }

    #[test]
    fn shared_collector_error_keeps_its_message() {
        let shared = CoreError::Shared(Arc::new(CoreError::internal("volume store offline")));
        let err: DockerError = shared.into();
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.to_string(), "internal error: volume store offline");
    }

    #[test]
    fn cancellation_maps_to_unavailable() {
        let err: DockerError = CoreError::cancelled().into();
        assert_eq!(err.status_code(), StatusCode::SERVICE_UNAVAILABLE);
    }
}
