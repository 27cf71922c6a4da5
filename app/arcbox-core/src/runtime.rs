//! ArcBox runtime.

use crate::config::Config;
use crate::error::{CoreError, Result};
use crate::usage::{LocalUsageStore, UsageAggregator, UsageReport, UsageRequest, UsageSources};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Per-daemon state shared by the API layers.
///
/// Owns the usage aggregator, so in-flight collections are shared by every
/// request served by this instance and by nothing else.
pub struct Runtime {
    /// Configuration.
    config: Config,
    /// Disk usage aggregator.
    usage: UsageAggregator,
    /// Fired on shutdown; parent of every request token.
    shutdown: CancellationToken,
}

impl Runtime {
    /// Creates a runtime measuring the configured data directory.
    ///
    /// # Errors
    ///
    /// Returns an error if the data directory cannot be created.
    pub fn new(config: Config) -> Result<Self> {
        std::fs::create_dir_all(&config.data_dir).map_err(|e| {
            CoreError::config(format!(
                "failed to create data directory {}: {e}",
                config.data_dir.display()
            ))
        })?;
        let store = Arc::new(LocalUsageStore::new(&config));
        Ok(Self::with_sources(config, UsageSources::from_store(store)))
    }

    /// Creates a runtime over explicit usage sources.
    #[must_use]
    pub fn with_sources(config: Config, sources: UsageSources) -> Self {
        let shutdown = CancellationToken::new();
        let usage = UsageAggregator::new(sources, shutdown.clone());
        Self {
            config,
            usage,
            shutdown,
        }
    }

    /// Returns the configuration.
    #[must_use]
    pub const fn config(&self) -> &Config {
        &self.config
    }

    /// Returns the usage aggregator.
    #[must_use]
    pub const fn usage(&self) -> &UsageAggregator {
        &self.usage
    }

    /// Returns a token for a single request.
    ///
    /// The token is cancelled when the runtime shuts down, or earlier by the
    /// request owner.
    #[must_use]
    pub fn request_token(&self) -> CancellationToken {
        self.shutdown.child_token()
    }

    /// Reports disk usage, applying the configured default object types to
    /// requests that name none.
    ///
    /// # Errors
    ///
    /// See [`UsageAggregator::disk_usage`].
    pub async fn disk_usage(
        &self,
        cancel: &CancellationToken,
        request: UsageRequest,
    ) -> Result<UsageReport> {
        let request = self.config.usage.apply_defaults(request);
        self.usage.disk_usage(cancel, &request).await
    }

    /// Returns true once [`Runtime::shutdown`] has been called.
    #[must_use]
    pub fn is_shutting_down(&self) -> bool {
        self.shutdown.is_cancelled()
    }

    /// Cancels every request and running collection.
    pub fn shutdown(&self) {
        tracing::info!("runtime shutting down");
        self.shutdown.cancel();
    }
}

impl std::fmt::Debug for Runtime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Runtime")
            .field("data_dir", &self.config.data_dir)
            .field("usage", &self.usage)
            .finish_non_exhaustive()
    }
}
