//! # arcbox-docker
//!
//! Docker REST API compatibility layer for `ArcBox`.
//!
//! Serves the host-side endpoints of the Docker Engine API, most notably
//! `GET /system/df`, so `docker system df` works against an `ArcBox`
//! daemon.
//!
//! ## Compatibility
//!
//! Routes are mounted unversioned and under every Docker Engine API
//! compatibility prefix `v1.24..v1.43`.
//!
//! ## Architecture
//!
//! ```text
//! docker CLI ──► Unix Socket ──► arcbox-docker ──► arcbox-core
//!                                     │               (usage aggregator)
//!                                     ▼
//!                              HTTP REST API
//!                             (Axum server)
//! ```

#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions)]

pub mod api;
pub mod error;
pub mod handlers;
pub mod server;
pub mod trace;
pub mod types;

pub use error::{DockerError, Result};
pub use server::{DockerApiServer, ServerConfig};

/// Docker Engine API version advertised by this server.
pub const API_VERSION: &str = "1.43";

/// Oldest Docker Engine API version accepted by this server.
pub const MIN_API_VERSION: &str = "1.24";
