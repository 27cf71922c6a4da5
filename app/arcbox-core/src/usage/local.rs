//! Filesystem-backed usage sources.
//!
//! Measures the daemon data directory. Layout:
//!
//! ```text
//! <data_dir>/
//! ├── containers/<id>/...      one directory per container
//! ├── images/<id>/...          one directory per image
//! ├── images/layers/<id>/...   unpacked layers
//! ├── volumes/<name>/...       one directory per local volume
//! └── buildcache/<id>/...      one directory per build cache record
//! ```
//!
//! A missing root directory means "nothing of that kind" and yields an empty
//! list. Directory walks run on the blocking pool and stop early once the
//! cancellation token fires.

use super::report::{BuildCacheUsage, ContainerUsage, ImageUsage, VolumeUsage};
use super::source::{
    BuildCacheUsageSource, ContainerUsageSource, ImageUsageSource, VolumeUsageSource,
};
use crate::config::Config;
use crate::error::{CoreError, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};
use tokio_util::sync::CancellationToken;
use walkdir::WalkDir;

/// Name of the layer store inside the images directory.
const LAYERS_DIR: &str = "layers";

/// A top-level entry of a domain directory together with its size.
#[derive(Debug)]
struct Entry {
    name: String,
    path: PathBuf,
    size: i64,
    modified: DateTime<Utc>,
}

/// Usage sources reading the local data directory.
#[derive(Debug, Clone)]
pub struct LocalUsageStore {
    containers_dir: PathBuf,
    images_dir: PathBuf,
    volumes_dir: PathBuf,
    build_cache_dir: PathBuf,
}

impl LocalUsageStore {
    /// Creates a store over the directories named by `config`.
    #[must_use]
    pub fn new(config: &Config) -> Self {
        Self {
            containers_dir: config.containers_dir(),
            images_dir: config.images_dir(),
            volumes_dir: config.volumes_dir(),
            build_cache_dir: config.build_cache_dir(),
        }
    }

    async fn entries(
        &self,
        root: &Path,
        skip: Option<&'static str>,
        cancel: &CancellationToken,
    ) -> Result<Vec<Entry>> {
        let root = root.to_path_buf();
        let cancel = cancel.clone();
        tokio::task::spawn_blocking(move || list_entries(&root, skip, &cancel))
            .await
            .map_err(|e| CoreError::internal(format!("usage scan task failed: {e}")))?
    }

    async fn size_of(&self, root: &Path, cancel: &CancellationToken) -> Result<i64> {
        let root = root.to_path_buf();
        let cancel = cancel.clone();
        tokio::task::spawn_blocking(move || dir_size(&root, &cancel))
            .await
            .map_err(|e| CoreError::internal(format!("usage scan task failed: {e}")))?
    }
}

fn list_entries(
    root: &Path,
    skip: Option<&'static str>,
    cancel: &CancellationToken,
) -> Result<Vec<Entry>> {
    let Some(read_dir) = present(std::fs::read_dir(root))? else {
        return Ok(Vec::new());
    };

    let mut entries = Vec::new();
    for dirent in read_dir {
        // Entries removed while the scan runs are left out of the report.
        let Some(dirent) = present(dirent)? else {
            continue;
        };
        let Some(file_type) = present(dirent.file_type())? else {
            continue;
        };
        if !file_type.is_dir() {
            continue;
        }
        let name = dirent.file_name().to_string_lossy().into_owned();
        if skip == Some(name.as_str()) {
            continue;
        }
        let Some(metadata) = present(dirent.metadata())? else {
            continue;
        };
        let modified = metadata
            .modified()
            .map(DateTime::<Utc>::from)
            .unwrap_or_else(|_| Utc::now());
        let path = dirent.path();
        let size = dir_size(&path, cancel)?;
        entries.push(Entry {
            name,
            path,
            size,
            modified,
        });
    }
    entries.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(entries)
}

/// Maps `NotFound` to `None`; any other error is propagated.
fn present<T>(result: std::io::Result<T>) -> std::io::Result<Option<T>> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e),
    }
}

/// Sums the apparent size of every regular file under `root`.
///
/// Files and directories that disappear during the walk count as zero.
fn dir_size(root: &Path, cancel: &CancellationToken) -> Result<i64> {
    let mut total: u64 = 0;
    for entry in WalkDir::new(root).follow_links(false) {
        if cancel.is_cancelled() {
            return Err(CoreError::cancelled());
        }
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) if e.io_error().map(std::io::Error::kind) == Some(std::io::ErrorKind::NotFound) => {
                continue;
            }
            Err(e) => {
                return Err(CoreError::from(e.into_io_error().unwrap_or_else(|| {
                    std::io::Error::other(format!("walk failed under {}", root.display()))
                })));
            }
        };
        if entry.file_type().is_file() {
            total = total.saturating_add(entry.metadata().map_or(0, |m| m.len()));
        }
    }
    Ok(i64::try_from(total).unwrap_or(i64::MAX))
}

#[async_trait]
impl ContainerUsageSource for LocalUsageStore {
    async fn list_with_size(&self, cancel: &CancellationToken) -> Result<Vec<ContainerUsage>> {
        let entries = self.entries(&self.containers_dir, None, cancel).await?;
        Ok(entries
            .into_iter()
            .map(|entry| ContainerUsage {
                names: vec![format!("/{}", entry.name)],
                id: entry.name,
                image: String::new(),
                size_rw: entry.size,
                size_root_fs: entry.size,
                state: "unknown".to_string(),
                created: entry.modified,
            })
            .collect())
    }
}

#[async_trait]
impl ImageUsageSource for LocalUsageStore {
    async fn usage(&self, cancel: &CancellationToken) -> Result<Vec<ImageUsage>> {
        let entries = self
            .entries(&self.images_dir, Some(LAYERS_DIR), cancel)
            .await?;
        Ok(entries
            .into_iter()
            .map(|entry| ImageUsage {
                id: entry.name,
                repo_tags: Vec::new(),
                size: entry.size,
                shared_size: -1,
                containers: -1,
                created: entry.modified,
            })
            .collect())
    }

    async fn layer_disk_usage(&self, cancel: &CancellationToken) -> Result<i64> {
        self.size_of(&self.images_dir.join(LAYERS_DIR), cancel).await
    }
}

#[async_trait]
impl VolumeUsageSource for LocalUsageStore {
    async fn local_volumes_size(&self, cancel: &CancellationToken) -> Result<Vec<VolumeUsage>> {
        let entries = self.entries(&self.volumes_dir, None, cancel).await?;
        Ok(entries
            .into_iter()
            .map(|entry| VolumeUsage {
                mountpoint: entry.path.display().to_string(),
                name: entry.name,
                driver: "local".to_string(),
                size: entry.size,
                ref_count: -1,
            })
            .collect())
    }
}

#[async_trait]
impl BuildCacheUsageSource for LocalUsageStore {
    async fn usage(&self, cancel: &CancellationToken) -> Result<Vec<BuildCacheUsage>> {
        let entries = self.entries(&self.build_cache_dir, None, cancel).await?;
        Ok(entries
            .into_iter()
            .map(|entry| BuildCacheUsage {
                id: entry.name,
                cache_type: "regular".to_string(),
                description: String::new(),
                in_use: false,
                shared: false,
                size: entry.size,
                created_at: entry.modified,
                last_used_at: Some(entry.modified),
                usage_count: 0,
            })
            .collect())
    }
}
