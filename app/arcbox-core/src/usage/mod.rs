//! Disk usage reporting.
//!
//! The [`UsageAggregator`] turns a [`UsageRequest`] into a [`UsageReport`]
//! by running one collector per requested [`Domain`] in parallel. Concurrent
//! requests for the same domain share a single collection.
//!
//! ```text
//!  disk_usage(request)
//!        │ resolve + validate
//!        ▼
//!  ┌────────────┬────────────┬────────────┬─────────────┐
//!  │ containers │   images   │  volumes   │ build-cache │  SingleFlight per domain
//!  └─────┬──────┴─────┬──────┴─────┬──────┴──────┬──────┘
//!        └────────────┴─── join ───┴─────────────┘
//!                          ▼
//!                report  or  first error
//! ```

mod aggregator;
mod domain;
pub mod local;
mod report;
mod source;

pub use aggregator::UsageAggregator;
pub use domain::{Domain, UsageRequest};
pub use local::LocalUsageStore;
pub use report::{
    BuildCacheUsage, ContainerUsage, DomainUsage, ImageUsage, ImagesUsage, UsageReport,
    VolumeUsage,
};
pub use source::{
    BuildCacheUsageSource, ContainerUsageSource, ImageUsageSource, UsageSources,
    VolumeUsageSource,
};
