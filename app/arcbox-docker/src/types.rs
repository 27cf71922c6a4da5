//! Docker API types.
//!
//! Types defined according to Docker Engine API v1.43 specification.
//! See: <https://docs.docker.com/engine/api/v1.43>/

use arcbox_core::usage::{
    BuildCacheUsage, ContainerUsage, ImageUsage, UsageReport, VolumeUsage,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

// ============================================================================
// Disk Usage Types
// ============================================================================

/// Response of `GET /system/df`.
///
/// Sections for object types that were not requested are omitted entirely;
/// requested sections are always present, possibly empty.
#[derive(Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct DiskUsage {
    /// Aggregate size of all image layers.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub layers_size: Option<i64>,
    /// Images.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub images: Option<Vec<ImageSummary>>,
    /// Containers.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub containers: Option<Vec<ContainerSummary>>,
    /// Volumes.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub volumes: Option<Vec<VolumeSummary>>,
    /// Build cache records.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub build_cache: Option<Vec<BuildCache>>,
}

impl From<UsageReport> for DiskUsage {
    fn from(report: UsageReport) -> Self {
        let (layers_size, images) = report.images.map_or((None, None), |images| {
            (
                Some(images.layers_size),
                Some(images.images.into_iter().map(Into::into).collect()),
            )
        });
        Self {
            layers_size,
            images,
            containers: report
                .containers
                .map(|records| records.into_iter().map(Into::into).collect()),
            volumes: report
                .volumes
                .map(|records| records.into_iter().map(Into::into).collect()),
            build_cache: report
                .build_cache
                .map(|records| records.into_iter().map(Into::into).collect()),
        }
    }
}

// ============================================================================
// Container Types
// ============================================================================

/// Container summary, as listed with sizes.
#[derive(Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ContainerSummary {
    /// Container ID.
    pub id: String,
    /// Container names.
    pub names: Vec<String>,
    /// Image name.
    pub image: String,
    /// Created timestamp.
    pub created: i64,
    /// State.
    pub state: String,
    /// Labels.
    pub labels: HashMap<String, String>,
    /// Size of files written.
    pub size_rw: i64,
    /// Size of root filesystem.
    pub size_root_fs: i64,
}

impl From<ContainerUsage> for ContainerSummary {
    fn from(usage: ContainerUsage) -> Self {
        Self {
            id: usage.id,
            names: usage.names,
            image: usage.image,
            created: usage.created.timestamp(),
            state: usage.state,
            labels: HashMap::new(),
            size_rw: usage.size_rw,
            size_root_fs: usage.size_root_fs,
        }
    }
}

// ============================================================================
// Image Types
// ============================================================================

/// Image summary.
#[derive(Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ImageSummary {
    /// Image ID.
    pub id: String,
    /// Parent ID.
    pub parent_id: String,
    /// Repo tags.
    pub repo_tags: Vec<String>,
    /// Repo digests.
    pub repo_digests: Vec<String>,
    /// Created timestamp.
    pub created: i64,
    /// Size.
    pub size: i64,
    /// Shared size, -1 when not computed.
    pub shared_size: i64,
    /// Labels.
    pub labels: HashMap<String, String>,
    /// Number of containers, -1 when not computed.
    pub containers: i64,
}

impl From<ImageUsage> for ImageSummary {
    fn from(usage: ImageUsage) -> Self {
        Self {
            id: usage.id,
            parent_id: String::new(),
            repo_tags: usage.repo_tags,
            repo_digests: Vec::new(),
            created: usage.created.timestamp(),
            size: usage.size,
            shared_size: usage.shared_size,
            labels: HashMap::new(),
            containers: usage.containers,
        }
    }
}

// ============================================================================
// Volume Types
// ============================================================================

/// Volume summary.
#[derive(Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct VolumeSummary {
    /// Name.
    pub name: String,
    /// Driver.
    pub driver: String,
    /// Mountpoint.
    pub mountpoint: String,
    /// Labels.
    pub labels: HashMap<String, String>,
    /// Scope.
    pub scope: String,
    /// Options.
    pub options: HashMap<String, String>,
    /// Usage details.
    pub usage_data: VolumeUsageData,
}

/// Volume usage details.
#[derive(Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct VolumeUsageData {
    /// Bytes used, -1 when not computed.
    pub size: i64,
    /// Number of containers referencing the volume, -1 when not computed.
    pub ref_count: i64,
}

impl From<VolumeUsage> for VolumeSummary {
    fn from(usage: VolumeUsage) -> Self {
        Self {
            name: usage.name,
            driver: usage.driver,
            mountpoint: usage.mountpoint,
            labels: HashMap::new(),
            scope: "local".to_string(),
            options: HashMap::new(),
            usage_data: VolumeUsageData {
                size: usage.size,
                ref_count: usage.ref_count,
            },
        }
    }
}

// ============================================================================
// Build Cache Types
// ============================================================================

/// Build cache record.
#[derive(Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct BuildCache {
    /// Record ID.
    #[serde(rename = "ID")]
    pub id: String,
    /// Record type.
    #[serde(rename = "Type")]
    pub cache_type: String,
    /// Description.
    pub description: String,
    /// Whether the record is in use.
    pub in_use: bool,
    /// Whether the record is shared.
    pub shared: bool,
    /// Size in bytes.
    pub size: i64,
    /// Creation time (RFC 3339).
    pub created_at: String,
    /// Last use time (RFC 3339).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_used_at: Option<String>,
    /// Number of uses.
    pub usage_count: i64,
}

impl From<BuildCacheUsage> for BuildCache {
    fn from(usage: BuildCacheUsage) -> Self {
        Self {
            id: usage.id,
            cache_type: usage.cache_type,
            description: usage.description,
            in_use: usage.in_use,
            shared: usage.shared,
            size: usage.size,
            created_at: usage.created_at.to_rfc3339(),
            last_used_at: usage.last_used_at.map(|t| t.to_rfc3339()),
            usage_count: usage.usage_count,
        }
    }
}

// ============================================================================
// System Types
// ============================================================================

/// Version response.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct VersionResponse {
    /// Version.
    pub version: String,
    /// API version.
    pub api_version: String,
    /// Minimum API version.
    #[serde(rename = "MinAPIVersion")]
    pub min_api_version: String,
    /// Git commit.
    pub git_commit: String,
    /// OS.
    pub os: String,
    /// Architecture.
    pub arch: String,
}
