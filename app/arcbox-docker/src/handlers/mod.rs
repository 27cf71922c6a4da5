//! Request handlers for Docker API endpoints.
//!
//! All handlers respond from host state; disk usage is computed by the core
//! runtime and shared between concurrent requests.

mod system;

pub use system::{disk_usage, get_version, ping};
