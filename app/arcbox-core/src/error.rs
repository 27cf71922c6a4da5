//! Error types for the core layer.

use arcbox_error::CommonError;
use std::sync::Arc;
use thiserror::Error;

/// Result type alias for core operations.
pub type Result<T> = std::result::Result<T, CoreError>;

/// Errors that can occur in core operations.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Common errors (I/O, config, invalid argument, cancellation, etc.).
    #[error(transparent)]
    Common(#[from] CommonError),

    /// An error produced once and delivered to every caller sharing the
    /// computation that raised it.
    #[error(transparent)]
    Shared(Arc<CoreError>),
}

impl CoreError {
    /// Creates a new configuration error.
    #[must_use]
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Common(CommonError::config(msg))
    }

    /// Creates a new invalid argument error.
    #[must_use]
    pub fn invalid_argument(msg: impl Into<String>) -> Self {
        Self::Common(CommonError::invalid_argument(msg))
    }

    /// Creates a new internal error.
    #[must_use]
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Common(CommonError::internal(msg))
    }

    /// Creates a cancellation error.
    #[must_use]
    pub const fn cancelled() -> Self {
        Self::Common(CommonError::Cancelled)
    }

    /// Returns the originating error, looking through shared wrappers.
    #[must_use]
    pub fn root(&self) -> &Self {
        match self {
            Self::Shared(inner) => inner.root(),
            other => other,
        }
    }

    /// Returns the common classification of the originating error.
    #[must_use]
    pub fn common(&self) -> &CommonError {
        match self {
            Self::Common(common) => common,
            Self::Shared(inner) => inner.common(),
        }
    }

    /// Returns true if the caller supplied an invalid argument.
    #[must_use]
    pub fn is_invalid_argument(&self) -> bool {
        self.common().is_invalid_argument()
    }

    /// Returns true if the caller was cancelled.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.common().is_cancelled()
    }
}

// Allow automatic conversion from std::io::Error to CoreError via CommonError.
impl From<std::io::Error> for CoreError {
    fn from(err: std::io::Error) -> Self {
        Self::Common(CommonError::from(err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shared_error_displays_and_classifies_like_its_origin() {
        let origin = Arc::new(CoreError::invalid_argument("unknown object type: x"));
        let shared = CoreError::Shared(Arc::clone(&origin));

        assert_eq!(shared.to_string(), "unknown object type: x");
        assert!(shared.is_invalid_argument());
        assert!(std::ptr::eq(shared.root(), origin.as_ref()));
    }

    #[test]
    fn nested_sharing_is_unwrapped() {
        let origin = Arc::new(CoreError::cancelled());
        let twice = CoreError::Shared(Arc::new(CoreError::Shared(origin)));
        assert!(twice.is_cancelled());
        assert!(!twice.is_invalid_argument());
    }

    #[test]
    fn io_error_converts_through_common() {
        let err: CoreError = std::io::Error::other("disk gone").into();
        assert!(err.common().is_io());
    }
}
