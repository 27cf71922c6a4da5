//! Common error types for `ArcBox`.
//!
//! This crate provides the error classification shared by the core and the
//! Docker API layer, so that an error raised deep inside a collector can be
//! mapped onto a client-facing status without string matching.
//!
//! # Usage
//!
//! ```rust
//! use arcbox_error::CommonError;
//!
//! fn parse_selector(value: &str) -> Result<(), CommonError> {
//!     Err(CommonError::invalid_argument(format!(
//!         "unknown object type: {value}"
//!     )))
//! }
//!
//! assert!(parse_selector("bogus").unwrap_err().is_invalid_argument());
//! ```
//!
//! # Crate-Specific Errors
//!
//! Each crate can define its own error type that wraps `CommonError`:
//!
//! ```rust,ignore
//! use arcbox_error::CommonError;
//! use thiserror::Error;
//!
//! #[derive(Debug, Error)]
//! pub enum MyError {
//!     #[error(transparent)]
//!     Common(#[from] CommonError),
//!
//!     #[error("my specific error: {0}")]
//!     Specific(String),
//! }
//! ```

mod common;

pub use common::CommonError;

/// Result type alias using `CommonError`.
pub type Result<T> = std::result::Result<T, CommonError>;
