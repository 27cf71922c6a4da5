//! Single-flight execution of keyed computations.
//!
//! [`SingleFlight`] makes sure that at most one computation runs per key.
//! The first caller for an idle key claims it and spawns the computation;
//! every caller that arrives while it is running attaches to it and receives
//! the same outcome. Nothing is memoized: once the outcome has been handed
//! to the callers attached at completion time, the key is idle again and the
//! next caller starts a fresh computation.
//!
//! ```text
//!  caller A ──► run(k) ── claims k ──► spawn(compute) ──┐
//!  caller B ──► run(k) ── attaches ─────────────────────┤
//!  caller C ──► run(k) ── attaches ── cancelled ──► Err │ (computation unaffected)
//!                                                       ▼
//!                                      deregister k + take senders
//!                                                       │
//!                                  A ◄── outcome ───────┤
//!                                  B ◄── outcome ───────┘
//! ```
//!
//! The computation runs on its own task, so no caller owns it: a caller that
//! is cancelled, or whose future is dropped, only stops waiting.

use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::fmt;
use std::future::Future;
use std::hash::Hash;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use thiserror::Error;
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;

/// Reasons a caller can leave [`SingleFlight::run`] without an outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum FlightError {
    /// The caller's own cancellation token fired first.
    #[error("cancelled while waiting for in-flight computation")]
    Cancelled,
    /// The computation ended without producing an outcome (it panicked or
    /// its task was aborted).
    #[error("in-flight computation ended without a result")]
    Abandoned,
}

/// Registration for a key whose computation is currently running.
struct InFlight<V> {
    callers: Vec<oneshot::Sender<V>>,
}

type Calls<K, V> = Arc<Mutex<HashMap<K, InFlight<V>>>>;

fn lock<K, V>(calls: &Mutex<HashMap<K, InFlight<V>>>) -> MutexGuard<'_, HashMap<K, InFlight<V>>> {
    // The map is only touched by short, non-panicking critical sections.
    calls.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Deduplicates concurrent computations per key and broadcasts the outcome.
pub struct SingleFlight<K, V> {
    calls: Calls<K, V>,
}

impl<K, V> SingleFlight<K, V>
where
    K: Eq + Hash + Clone + fmt::Debug + Send + 'static,
    V: Clone + Send + 'static,
{
    /// Creates a coordinator with no keys in flight.
    #[must_use]
    pub fn new() -> Self {
        Self {
            calls: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Runs `compute` for `key`, or joins the computation already running
    /// for it.
    ///
    /// When the key is idle the caller claims it and `compute` is spawned
    /// onto the tokio runtime. In both cases the caller then waits for the
    /// outcome or for `cancel` to fire, whichever comes first. Cancellation
    /// detaches only this caller.
    ///
    /// # Errors
    ///
    /// Returns [`FlightError::Cancelled`] if `cancel` fires before the
    /// outcome is delivered, and [`FlightError::Abandoned`] if the
    /// computation dies without producing one.
    pub async fn run<F, Fut>(
        &self,
        key: K,
        cancel: &CancellationToken,
        compute: F,
    ) -> Result<V, FlightError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = V> + Send + 'static,
    {
        if cancel.is_cancelled() {
            return Err(FlightError::Cancelled);
        }

        let (tx, rx) = oneshot::channel();
        let claimed = {
            let mut calls = lock(&self.calls);
            match calls.entry(key.clone()) {
                Entry::Occupied(mut call) => {
                    let callers = &mut call.get_mut().callers;
                    // Drop senders of callers that stopped waiting.
                    callers.retain(|caller| !caller.is_closed());
                    callers.push(tx);
                    false
                }
                Entry::Vacant(slot) => {
                    slot.insert(InFlight { callers: vec![tx] });
                    true
                }
            }
        };

        if claimed {
            tracing::debug!(key = ?key, "starting computation");
            let release = Release {
                calls: Arc::clone(&self.calls),
                key: Some(key),
            };
            let work = compute();
            tokio::spawn(async move {
                let value = work.await;
                release.deliver(value);
            });
        } else {
            tracing::debug!(key = ?key, "joining in-flight computation");
        }

        tokio::select! {
            outcome = rx => outcome.map_err(|_| FlightError::Abandoned),
            () = cancel.cancelled() => Err(FlightError::Cancelled),
        }
    }

    /// Returns true while a computation is registered for `key`.
    #[must_use]
    pub fn is_in_flight(&self, key: &K) -> bool {
        lock(&self.calls).contains_key(key)
    }

    /// Number of callers currently attached to the computation for `key`.
    ///
    /// Callers that stopped waiting are pruned whenever a new caller
    /// attaches, so the count may include a few of them in between.
    #[must_use]
    pub fn callers(&self, key: &K) -> usize {
        lock(&self.calls)
            .get(key)
            .map_or(0, |call| call.callers.len())
    }
}

impl<K, V> Default for SingleFlight<K, V>
where
    K: Eq + Hash + Clone + fmt::Debug + Send + 'static,
    V: Clone + Send + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V> fmt::Debug for SingleFlight<K, V>
where
    K: fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let keys: Vec<String> = lock(&self.calls)
            .keys()
            .map(|key| format!("{key:?}"))
            .collect();
        f.debug_struct("SingleFlight")
            .field("in_flight", &keys)
            .finish()
    }
}

/// Owns the claim on a key for the lifetime of its computation.
///
/// Dropping it without calling [`Release::deliver`] still deregisters the
/// key; the attached callers then observe [`FlightError::Abandoned`].
struct Release<K: Eq + Hash, V> {
    calls: Calls<K, V>,
    key: Option<K>,
}

impl<K: Eq + Hash, V: Clone> Release<K, V> {
    fn take_callers(&mut self) -> Vec<oneshot::Sender<V>> {
        let Some(key) = self.key.take() else {
            return Vec::new();
        };
        lock(&self.calls)
            .remove(&key)
            .map(|call| call.callers)
            .unwrap_or_default()
    }

    fn deliver(mut self, value: V) {
        let mut callers = self.take_callers();
        tracing::debug!(callers = callers.len(), "delivering outcome");
        let Some(last) = callers.pop() else {
            return;
        };
        for tx in callers {
            // Receivers of cancelled callers are gone; nothing to do.
            let _ = tx.send(value.clone());
        }
        let _ = last.send(value);
    }
}

impl<K: Eq + Hash, V> Drop for Release<K, V> {
    fn drop(&mut self) {
        if let Some(key) = self.key.take() {
            let abandoned = lock(&self.calls).remove(&key);
            drop(abandoned);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::FutureExt;
    use futures::future::BoxFuture;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use tokio::sync::Notify;

    type Flight = SingleFlight<&'static str, Result<u32, String>>;

    async fn wait_for_callers(flight: &Flight, key: &'static str, expected: usize) {
        tokio::time::timeout(Duration::from_secs(5), async {
            while flight.callers(&key) < expected {
                tokio::time::sleep(Duration::from_millis(1)).await;
            }
        })
        .await
        .expect("callers never attached");
    }

    fn gated(
        gate: Arc<Notify>,
        runs: Arc<AtomicUsize>,
        outcome: Result<u32, String>,
    ) -> impl FnOnce() -> BoxFuture<'static, Result<u32, String>> {
        move || {
            Box::pin(async move {
                runs.fetch_add(1, Ordering::SeqCst);
                gate.notified().await;
                outcome
            })
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_callers_share_one_computation() {
        const CALLERS: usize = 8;
        let flight = Arc::new(Flight::new());
        let gate = Arc::new(Notify::new());
        let runs = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..CALLERS {
            let flight = Arc::clone(&flight);
            let compute = gated(Arc::clone(&gate), Arc::clone(&runs), Ok(42));
            handles.push(tokio::spawn(async move {
                flight
                    .run("images", &CancellationToken::new(), compute)
                    .await
            }));
        }

        wait_for_callers(&flight, "images", CALLERS).await;
        gate.notify_one();

        for handle in handles {
            assert_eq!(handle.await.unwrap(), Ok(Ok(42)));
        }
        assert_eq!(runs.load(Ordering::SeqCst), 1);
        assert!(!flight.is_in_flight(&"images"));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn error_is_delivered_to_every_caller() {
        let flight = Arc::new(Flight::new());
        let gate = Arc::new(Notify::new());
        let runs = Arc::new(AtomicUsize::new(0));

        let first = {
            let flight = Arc::clone(&flight);
            let compute = gated(
                Arc::clone(&gate),
                Arc::clone(&runs),
                Err("layer store offline".to_string()),
            );
            tokio::spawn(async move {
                flight
                    .run("volumes", &CancellationToken::new(), compute)
                    .await
            })
        };
        wait_for_callers(&flight, "volumes", 1).await;

        let second = {
            let flight = Arc::clone(&flight);
            let compute = gated(Arc::clone(&gate), Arc::clone(&runs), Ok(7));
            tokio::spawn(async move {
                flight
                    .run("volumes", &CancellationToken::new(), compute)
                    .await
            })
        };
        wait_for_callers(&flight, "volumes", 2).await;
        gate.notify_one();

        let expected = Ok(Err("layer store offline".to_string()));
        assert_eq!(first.await.unwrap(), expected);
        assert_eq!(second.await.unwrap(), expected);
        assert_eq!(runs.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn cancelled_waiter_does_not_disturb_others() {
        let flight = Arc::new(Flight::new());
        let gate = Arc::new(Notify::new());
        let runs = Arc::new(AtomicUsize::new(0));
        let impatient = CancellationToken::new();

        let mut handles = Vec::new();
        for token in [
            CancellationToken::new(),
            impatient.clone(),
            CancellationToken::new(),
        ] {
            let caller = Arc::clone(&flight);
            let compute = gated(Arc::clone(&gate), Arc::clone(&runs), Ok(5));
            handles.push(tokio::spawn(async move {
                caller.run("containers", &token, compute).await
            }));
            wait_for_callers(&flight, "containers", handles.len()).await;
        }

        impatient.cancel();
        let cancelled = handles.remove(1).await.unwrap();
        assert_eq!(cancelled, Err(FlightError::Cancelled));
        assert!(flight.is_in_flight(&"containers"));

        gate.notify_one();
        for handle in handles {
            assert_eq!(handle.await.unwrap(), Ok(Ok(5)));
        }
        assert_eq!(runs.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn cancelling_the_claiming_caller_keeps_the_computation_alive() {
        let flight = Arc::new(Flight::new());
        let gate = Arc::new(Notify::new());
        let runs = Arc::new(AtomicUsize::new(0));
        let claimer = CancellationToken::new();

        let first = {
            let flight = Arc::clone(&flight);
            let token = claimer.clone();
            let compute = gated(Arc::clone(&gate), Arc::clone(&runs), Ok(9));
            tokio::spawn(async move { flight.run("build-cache", &token, compute).await })
        };
        wait_for_callers(&flight, "build-cache", 1).await;

        let second = {
            let flight = Arc::clone(&flight);
            let compute = gated(Arc::clone(&gate), Arc::clone(&runs), Ok(0));
            tokio::spawn(async move {
                flight
                    .run("build-cache", &CancellationToken::new(), compute)
                    .await
            })
        };
        wait_for_callers(&flight, "build-cache", 2).await;

        claimer.cancel();
        assert_eq!(first.await.unwrap(), Err(FlightError::Cancelled));

        gate.notify_one();
        assert_eq!(second.await.unwrap(), Ok(Ok(9)));
        assert_eq!(runs.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn callers_that_stop_waiting_are_pruned() {
        let flight = Arc::new(Flight::new());
        let gate = Arc::new(Notify::new());
        let runs = Arc::new(AtomicUsize::new(0));

        let executor = {
            let flight = Arc::clone(&flight);
            let compute = gated(Arc::clone(&gate), Arc::clone(&runs), Ok(11));
            tokio::spawn(async move {
                flight
                    .run("volumes", &CancellationToken::new(), compute)
                    .await
            })
        };
        wait_for_callers(&flight, "volumes", 1).await;

        // Each retry attaches, then gives up: one by cancellation, the next
        // by having its future dropped.
        for attempt in 0..1000 {
            let token = CancellationToken::new();
            let compute = gated(Arc::clone(&gate), Arc::clone(&runs), Ok(0));
            let mut waiting = Box::pin(flight.run("volumes", &token, compute));
            assert!((&mut waiting).now_or_never().is_none());
            if attempt % 2 == 0 {
                token.cancel();
                assert_eq!(waiting.await, Err(FlightError::Cancelled));
            }
        }
        assert!(flight.callers(&"volumes") <= 2);

        gate.notify_one();
        assert_eq!(executor.await.unwrap(), Ok(Ok(11)));
        assert_eq!(runs.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn sequential_calls_recompute() {
        let flight = Flight::new();
        let runs = Arc::new(AtomicUsize::new(0));

        for expected in 1..=2 {
            let runs = Arc::clone(&runs);
            let value = flight
                .run("images", &CancellationToken::new(), move || async move {
                    let run = runs.fetch_add(1, Ordering::SeqCst) + 1;
                    Ok(u32::try_from(run).unwrap())
                })
                .await;
            assert_eq!(value, Ok(Ok(expected)));
        }
        assert_eq!(runs.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn panicking_computation_releases_the_key() {
        let flight = Flight::new();

        let outcome = flight
            .run("volumes", &CancellationToken::new(), || async {
                let explode = true;
                if explode {
                    panic!("collector exploded");
                }
                Ok(0)
            })
            .await;
        assert_eq!(outcome, Err(FlightError::Abandoned));
        assert!(!flight.is_in_flight(&"volumes"));

        let retry = flight
            .run("volumes", &CancellationToken::new(), || async { Ok(3) })
            .await;
        assert_eq!(retry, Ok(Ok(3)));
    }

    #[tokio::test]
    async fn already_cancelled_caller_never_starts_work() {
        let flight = Flight::new();
        let runs = Arc::new(AtomicUsize::new(0));
        let token = CancellationToken::new();
        token.cancel();

        let counted = Arc::clone(&runs);
        let outcome = flight
            .run("images", &token, move || async move {
                counted.fetch_add(1, Ordering::SeqCst);
                Ok(1)
            })
            .await;

        assert_eq!(outcome, Err(FlightError::Cancelled));
        assert_eq!(runs.load(Ordering::SeqCst), 0);
        assert!(!flight.is_in_flight(&"images"));
    }
}
