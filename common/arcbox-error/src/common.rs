//! Common error types shared across `ArcBox` crates.

use thiserror::Error;

/// Common errors that occur across multiple `ArcBox` crates.
///
/// The variants form the classification every layer agrees on: the Docker
/// API maps them onto HTTP status codes, the core uses them to report
/// collector failures and caller cancellation. Crate-specific errors should
/// wrap this type using `#[from]` attribute.
#[derive(Debug, Error)]
pub enum CommonError {
    /// I/O error from the standard library.
    ///
    /// Wraps `std::io::Error` for filesystem walks and socket operations.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration error.
    ///
    /// Indicates invalid or missing configuration values, malformed config
    /// files, or configuration validation failures.
    #[error("configuration error: {0}")]
    Config(String),

    /// Invalid argument supplied by the caller.
    ///
    /// Raised before any work starts. The message is surfaced to clients
    /// verbatim, so it carries no prefix.
    #[error("{0}")]
    InvalidArgument(String),

    /// The caller stopped waiting before a result arrived.
    ///
    /// Only the cancelling caller observes this; shared work keeps running
    /// for everybody else.
    #[error("context canceled")]
    Cancelled,

    /// Internal error.
    ///
    /// A catch-all for unexpected internal errors. Should include enough
    /// context for debugging.
    #[error("internal error: {0}")]
    Internal(String),
}

impl CommonError {
    /// Creates a new configuration error.
    #[must_use]
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Creates a new invalid argument error.
    #[must_use]
    pub fn invalid_argument(msg: impl Into<String>) -> Self {
        Self::InvalidArgument(msg.into())
    }

    /// Creates a new internal error.
    #[must_use]
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Returns true if this is an I/O error.
    #[must_use]
    pub const fn is_io(&self) -> bool {
        matches!(self, Self::Io(_))
    }

    /// Returns true if this is an invalid argument error.
    #[must_use]
    pub const fn is_invalid_argument(&self) -> bool {
        matches!(self, Self::InvalidArgument(_))
    }

    /// Returns true if the caller was cancelled.
    #[must_use]
    pub const fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}
