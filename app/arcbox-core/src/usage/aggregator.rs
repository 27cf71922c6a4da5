//! Disk usage aggregation across domains.
//!
//! A call moves through `validating → dispatching → joining` and ends
//! completed, failed or cancelled. Each requested domain is collected
//! through the shared [`SingleFlight`], so concurrent calls asking for the
//! same domain wait on one collection instead of starting their own.

use super::domain::{Domain, UsageRequest};
use super::report::{DomainUsage, ImagesUsage, UsageReport};
use super::source::UsageSources;
use crate::error::{CoreError, Result};
use crate::singleflight::{FlightError, SingleFlight};
use crate::trace::current_trace_id;
use futures::future::join_all;
use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Outcome of one domain collection, as shared between callers.
type Outcome = std::result::Result<DomainUsage, Arc<CoreError>>;

/// Builds unified disk usage reports.
pub struct UsageAggregator {
    sources: UsageSources,
    flight: SingleFlight<Domain, Outcome>,
    lifetime: CancellationToken,
}

impl UsageAggregator {
    /// Creates an aggregator over `sources`.
    ///
    /// `lifetime` is handed to every collection. It should only fire when the
    /// owner shuts down, never because an individual caller went away.
    #[must_use]
    pub fn new(sources: UsageSources, lifetime: CancellationToken) -> Self {
        Self {
            sources,
            flight: SingleFlight::new(),
            lifetime,
        }
    }

    /// Returns true while a collection for `domain` is running.
    #[must_use]
    pub fn is_collecting(&self, domain: Domain) -> bool {
        self.flight.is_in_flight(&domain)
    }

    /// Collects disk usage for the requested domains.
    ///
    /// The call returns either a report with every requested domain filled in
    /// or a single error, never both. All launched collections are awaited
    /// before returning, including when one of them fails.
    ///
    /// # Errors
    ///
    /// - invalid argument if a selector is not a known domain (no collector
    ///   runs in that case);
    /// - cancelled if `cancel` fires before the results arrive;
    /// - otherwise the error of the first failing domain, as raised by its
    ///   collector.
    pub async fn disk_usage(
        &self,
        cancel: &CancellationToken,
        request: &UsageRequest,
    ) -> Result<UsageReport> {
        let trace_id = current_trace_id();
        let domains = request.resolve()?;
        let started = Instant::now();
        debug!(trace_id = %trace_id, domains = ?domains, "dispatching disk usage collection");

        let outcomes = join_all(domains.iter().map(|&domain| self.collect(domain, cancel))).await;

        let mut report = UsageReport::default();
        let mut failure = None;
        for outcome in outcomes {
            match outcome {
                Ok(usage) => report.insert(usage),
                Err(err) => {
                    if failure.is_none() {
                        failure = Some(err);
                    }
                }
            }
        }

        let elapsed = started.elapsed();
        match failure {
            Some(err) if err.is_cancelled() => {
                debug!(trace_id = %trace_id, elapsed = ?elapsed, "disk usage cancelled");
                Err(err)
            }
            Some(err) => {
                warn!(trace_id = %trace_id, elapsed = ?elapsed, error = %err, "disk usage failed");
                Err(err)
            }
            None => {
                debug!(trace_id = %trace_id, elapsed = ?elapsed, "disk usage completed");
                Ok(report)
            }
        }
    }

    async fn collect(&self, domain: Domain, cancel: &CancellationToken) -> Result<DomainUsage> {
        let sources = self.sources.clone();
        let lifetime = self.lifetime.clone();
        let outcome = self
            .flight
            .run(domain, cancel, move || async move {
                collect_domain(&sources, domain, &lifetime)
                    .await
                    .map_err(Arc::new)
            })
            .await;

        match outcome {
            Ok(Ok(usage)) => Ok(usage),
            Ok(Err(err)) => Err(CoreError::Shared(err)),
            Err(FlightError::Cancelled) => Err(CoreError::cancelled()),
            Err(FlightError::Abandoned) => Err(CoreError::internal(format!(
                "{domain} disk usage collection ended without a result"
            ))),
        }
    }
}

impl std::fmt::Debug for UsageAggregator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UsageAggregator")
            .field("flight", &self.flight)
            .finish_non_exhaustive()
    }
}

async fn collect_domain(
    sources: &UsageSources,
    domain: Domain,
    cancel: &CancellationToken,
) -> Result<DomainUsage> {
    let started = Instant::now();
    let usage = match domain {
        Domain::Containers => {
            DomainUsage::Containers(sources.containers.list_with_size(cancel).await?)
        }
        Domain::Images => {
            let images = sources.images.usage(cancel).await?;
            let layers_size = sources.images.layer_disk_usage(cancel).await?;
            DomainUsage::Images(ImagesUsage {
                images,
                layers_size,
            })
        }
        Domain::Volumes => DomainUsage::Volumes(sources.volumes.local_volumes_size(cancel).await?),
        Domain::BuildCache => DomainUsage::BuildCache(sources.build_cache.usage(cancel).await?),
    };
    debug!(
        domain = %domain,
        elapsed = ?started.elapsed(),
        "collected disk usage"
    );
    Ok(usage)
}
