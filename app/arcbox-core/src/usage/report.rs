//! Usage records and the aggregate report.

use super::domain::Domain;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Disk usage of a single container.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainerUsage {
    /// Container ID.
    pub id: String,
    /// Container names.
    pub names: Vec<String>,
    /// Image the container was created from.
    pub image: String,
    /// Bytes written to the container's writable layer.
    pub size_rw: i64,
    /// Total size of the container's root filesystem.
    pub size_root_fs: i64,
    /// Container state (running, exited, ...).
    pub state: String,
    /// Creation time.
    pub created: DateTime<Utc>,
}

/// Disk usage of a single image.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageUsage {
    /// Image ID.
    pub id: String,
    /// Repository tags.
    pub repo_tags: Vec<String>,
    /// Total size of the image.
    pub size: i64,
    /// Bytes shared with other images, -1 when unknown.
    pub shared_size: i64,
    /// Number of containers using the image, -1 when unknown.
    pub containers: i64,
    /// Creation time.
    pub created: DateTime<Utc>,
}

/// Disk usage of a single volume.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VolumeUsage {
    /// Volume name.
    pub name: String,
    /// Volume driver.
    pub driver: String,
    /// Host path backing the volume.
    pub mountpoint: String,
    /// Bytes used by the volume.
    pub size: i64,
    /// Number of containers referencing the volume, -1 when unknown.
    pub ref_count: i64,
}

/// A single build cache record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildCacheUsage {
    /// Record ID.
    pub id: String,
    /// Cache record type (regular, source.local, ...).
    pub cache_type: String,
    /// Description of the step that produced the record.
    pub description: String,
    /// Whether a running build uses the record.
    pub in_use: bool,
    /// Whether the record is shared with other records.
    pub shared: bool,
    /// Bytes used by the record.
    pub size: i64,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Last time a build used the record.
    pub last_used_at: Option<DateTime<Utc>>,
    /// Number of builds that used the record.
    pub usage_count: i64,
}

/// Image section of a report.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImagesUsage {
    /// Per-image records.
    pub images: Vec<ImageUsage>,
    /// Aggregate size of all layers on disk.
    pub layers_size: i64,
}

/// Outcome of collecting a single domain.
///
/// This is the value shared between all callers that asked for the same
/// domain at the same time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DomainUsage {
    /// Container records.
    Containers(Vec<ContainerUsage>),
    /// Image records plus layer total.
    Images(ImagesUsage),
    /// Volume records.
    Volumes(Vec<VolumeUsage>),
    /// Build cache records.
    BuildCache(Vec<BuildCacheUsage>),
}

impl DomainUsage {
    /// The domain this outcome belongs to.
    #[must_use]
    pub const fn domain(&self) -> Domain {
        match self {
            Self::Containers(_) => Domain::Containers,
            Self::Images(_) => Domain::Images,
            Self::Volumes(_) => Domain::Volumes,
            Self::BuildCache(_) => Domain::BuildCache,
        }
    }
}

/// Unified disk usage report.
///
/// Only requested domains are `Some`. A report is only ever produced when
/// every requested domain was collected successfully.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageReport {
    /// Container records.
    pub containers: Option<Vec<ContainerUsage>>,
    /// Image records and layer total.
    pub images: Option<ImagesUsage>,
    /// Volume records.
    pub volumes: Option<Vec<VolumeUsage>>,
    /// Build cache records.
    pub build_cache: Option<Vec<BuildCacheUsage>>,
}

impl UsageReport {
    /// Stores a collected domain in its section.
    pub fn insert(&mut self, usage: DomainUsage) {
        match usage {
            DomainUsage::Containers(records) => self.containers = Some(records),
            DomainUsage::Images(images) => self.images = Some(images),
            DomainUsage::Volumes(records) => self.volumes = Some(records),
            DomainUsage::BuildCache(records) => self.build_cache = Some(records),
        }
    }

    /// Returns true if the section for `domain` is populated.
    #[must_use]
    pub const fn contains(&self, domain: Domain) -> bool {
        match domain {
            Domain::Containers => self.containers.is_some(),
            Domain::Images => self.images.is_some(),
            Domain::Volumes => self.volumes.is_some(),
            Domain::BuildCache => self.build_cache.is_some(),
        }
    }

    /// Derived byte total for `domain`, `None` if it was not requested.
    ///
    /// For images this is the aggregate layer size rather than the sum of
    /// image sizes, since images share layers.
    #[must_use]
    pub fn total_size(&self, domain: Domain) -> Option<i64> {
        match domain {
            Domain::Containers => self
                .containers
                .as_ref()
                .map(|records| records.iter().map(|c| c.size_rw.max(0)).sum()),
            Domain::Images => self.images.as_ref().map(|images| images.layers_size),
            Domain::Volumes => self
                .volumes
                .as_ref()
                .map(|records| records.iter().map(|v| v.size.max(0)).sum()),
            Domain::BuildCache => self
                .build_cache
                .as_ref()
                .map(|records| records.iter().map(|r| r.size.max(0)).sum()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn volume(name: &str, size: i64) -> VolumeUsage {
        VolumeUsage {
            name: name.to_string(),
            driver: "local".to_string(),
            mountpoint: format!("/var/lib/arcbox/volumes/{name}"),
            size,
            ref_count: -1,
        }
    }

    #[test]
    fn only_inserted_sections_are_populated() {
        let mut report = UsageReport::default();
        report.insert(DomainUsage::Volumes(vec![volume("a", 3), volume("b", 4)]));

        assert!(report.contains(Domain::Volumes));
        assert!(!report.contains(Domain::Images));
        assert_eq!(report.total_size(Domain::Volumes), Some(7));
        assert_eq!(report.total_size(Domain::Images), None);
    }

    #[test]
    fn image_total_is_layer_size() {
        let mut report = UsageReport::default();
        report.insert(DomainUsage::Images(ImagesUsage {
            images: Vec::new(),
            layers_size: 100,
        }));
        assert_eq!(report.total_size(Domain::Images), Some(100));
    }

    #[test]
    fn unknown_sizes_do_not_reduce_totals() {
        let mut report = UsageReport::default();
        report.insert(DomainUsage::Volumes(vec![volume("a", -1), volume("b", 5)]));
        assert_eq!(report.total_size(Domain::Volumes), Some(5));
    }

    #[test]
    fn domain_usage_knows_its_domain() {
        assert_eq!(DomainUsage::BuildCache(Vec::new()).domain(), Domain::BuildCache);
        assert_eq!(
            DomainUsage::Images(ImagesUsage::default()).domain(),
            Domain::Images
        );
    }
}
