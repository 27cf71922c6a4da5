//! # arcbox-core
//!
//! Core layer for ArcBox.
//!
//! This crate provides:
//!
//! - [`SingleFlight`]: deduplication of concurrent keyed computations
//! - [`UsageAggregator`]: unified disk usage reports across containers,
//!   images, volumes and build cache
//! - [`LocalUsageStore`]: usage sources backed by the data directory
//! - [`Runtime`]: per-daemon owner of the above
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────┐
//! │                   arcbox-core                    │
//! │  ┌──────────┐   ┌─────────────────┐              │
//! │  │ Runtime  │──►│ UsageAggregator │              │
//! │  └──────────┘   └────────┬────────┘              │
//! │                          ▼                       │
//! │                 ┌─────────────────┐              │
//! │                 │  SingleFlight   │ per domain   │
//! │                 └────────┬────────┘              │
//! │                          ▼                       │
//! │        UsageSources (containers/images/...)      │
//! └──────────────────────────────────────────────────┘
//!                            ▲
//!                      arcbox-docker
//! ```

#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions)]

pub mod config;
pub mod error;
pub mod runtime;
pub mod singleflight;
pub mod trace;
pub mod usage;

pub use config::Config;
pub use error::{CoreError, Result};
pub use runtime::Runtime;
pub use singleflight::{FlightError, SingleFlight};
pub use usage::{Domain, LocalUsageStore, UsageAggregator, UsageReport, UsageRequest};
