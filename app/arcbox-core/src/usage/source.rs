//! Collector interfaces consumed by the aggregator.
//!
//! Each domain is measured by its own source. Calls may be slow; retries and
//! rate limiting, if any, belong to the implementation. The token passed in
//! is the aggregator's lifetime token, not a caller's: a collection is shared
//! by every caller waiting on it and must not stop because one of them left.

use super::report::{BuildCacheUsage, ContainerUsage, ImageUsage, VolumeUsage};
use crate::error::Result;
use async_trait::async_trait;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Lists containers together with their sizes.
#[async_trait]
pub trait ContainerUsageSource: Send + Sync {
    /// Returns every container, including stopped ones, with sizes filled in.
    async fn list_with_size(&self, cancel: &CancellationToken) -> Result<Vec<ContainerUsage>>;
}

/// Reports image and layer usage.
#[async_trait]
pub trait ImageUsageSource: Send + Sync {
    /// Returns every image with its size.
    async fn usage(&self, cancel: &CancellationToken) -> Result<Vec<ImageUsage>>;

    /// Returns the aggregate size of all layers on disk.
    async fn layer_disk_usage(&self, cancel: &CancellationToken) -> Result<i64>;
}

/// Reports local volume usage.
#[async_trait]
pub trait VolumeUsageSource: Send + Sync {
    /// Returns every local volume with its size.
    async fn local_volumes_size(&self, cancel: &CancellationToken) -> Result<Vec<VolumeUsage>>;
}

/// Reports build cache usage.
#[async_trait]
pub trait BuildCacheUsageSource: Send + Sync {
    /// Returns every build cache record.
    async fn usage(&self, cancel: &CancellationToken) -> Result<Vec<BuildCacheUsage>>;
}

/// One source per domain.
#[derive(Clone)]
pub struct UsageSources {
    /// Container source.
    pub containers: Arc<dyn ContainerUsageSource>,
    /// Image source.
    pub images: Arc<dyn ImageUsageSource>,
    /// Volume source.
    pub volumes: Arc<dyn VolumeUsageSource>,
    /// Build cache source.
    pub build_cache: Arc<dyn BuildCacheUsageSource>,
}

impl UsageSources {
    /// Uses a single value that implements every source trait.
    pub fn from_store<S>(store: Arc<S>) -> Self
    where
        S: ContainerUsageSource
            + ImageUsageSource
            + VolumeUsageSource
            + BuildCacheUsageSource
            + 'static,
    {
        Self {
            containers: store.clone(),
            images: store.clone(),
            volumes: store.clone(),
            build_cache: store,
        }
    }
}

impl std::fmt::Debug for UsageSources {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UsageSources").finish_non_exhaustive()
    }
}
