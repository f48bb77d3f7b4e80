//! Fetch orchestration.
//!
//! # Data Flow
//! ```text
//! request(id):
//!     cache hit  → publish value, done (no breaker, no network, no cancellation)
//!     cache miss → cancel the in-flight slot (whatever id it was for)
//!                → breaker.can_attempt()?
//!                    no  → publish CircuitOpen error (NOT a breaker failure)
//!                    yes → new slot (generation + token), publish loading,
//!                          spawn the remote call
//! settlement (still-current slots only):
//!     success   → cache.insert, publish value, breaker.record_success
//!     failure   → publish error, breaker.record_failure
//!     cancelled → clear loading; no cache write, no breaker report
//! ```
//!
//! # Design Decisions
//! - The in-flight slot is global, not per id: the newest requested id always
//!   wins, even when it supersedes a call for an unrelated id
//! - Staleness is decided by slot generation at settlement time, not by the
//!   abort signal alone, so a superseded call's late success cannot stomp on
//!   a newer request's state

use std::sync::{Arc, Mutex, MutexGuard};

use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use crate::fetch::cache::ResultCache;
use crate::fetch::remote::ResourceFetcher;
use crate::fetch::types::{FetchError, FetchResult, FetchState, ResourceId};
use crate::observability::metrics;
use crate::resilience::circuit_breaker::CircuitBreaker;

/// The single outstanding remote call.
#[derive(Debug)]
struct InFlight {
    generation: u64,
    id: ResourceId,
    cancel: CancellationToken,
}

#[derive(Debug, Default)]
struct SlotState {
    current: Option<InFlight>,
    next_generation: u64,
}

struct ControllerShared<F: ResourceFetcher> {
    fetcher: F,
    breaker: CircuitBreaker,
    cache: ResultCache<F::Output>,
    slot: Mutex<SlotState>,
    state_tx: watch::Sender<FetchState<F::Output>>,
}

/// Orchestrates cache, breaker and the single-flight remote call for one
/// resource type.
///
/// One controller owns the shared cache and in-flight slot; clone the handle
/// wherever fetches of this resource occur.
pub struct FetchController<F: ResourceFetcher> {
    shared: Arc<ControllerShared<F>>,
}

impl<F: ResourceFetcher> Clone for FetchController<F> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<F: ResourceFetcher> FetchController<F> {
    /// Create a controller around a fetcher and a breaker.
    pub fn new(fetcher: F, breaker: CircuitBreaker) -> Self {
        let (state_tx, _) = watch::channel(FetchState::default());
        Self {
            shared: Arc::new(ControllerShared {
                fetcher,
                breaker,
                cache: ResultCache::new(),
                slot: Mutex::new(SlotState::default()),
                state_tx,
            }),
        }
    }

    fn slot_locked(&self) -> MutexGuard<'_, SlotState> {
        self.shared.slot.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Subscribe to observable fetch state changes.
    pub fn subscribe(&self) -> watch::Receiver<FetchState<F::Output>> {
        self.shared.state_tx.subscribe()
    }

    /// Current snapshot of the observable state.
    pub fn snapshot(&self) -> FetchState<F::Output> {
        self.shared.state_tx.borrow().clone()
    }

    /// The breaker gating this controller's remote calls.
    pub fn breaker(&self) -> &CircuitBreaker {
        &self.shared.breaker
    }

    /// Number of cached results.
    pub fn cache_size(&self) -> usize {
        self.shared.cache.len()
    }

    /// Request a resource, superseding any call already in flight.
    pub fn request(&self, id: ResourceId) {
        if let Some(value) = self.shared.cache.get(id) {
            tracing::debug!(%id, "Cache hit");
            metrics::record_fetch_outcome("cache_hit");
            self.shared.state_tx.send_modify(|s| {
                s.id = Some(id);
                s.value = Some(value);
                s.loading = false;
                s.error = None;
            });
            return;
        }

        // Supersede the current call, whatever id it was for.
        {
            let mut slot = self.slot_locked();
            if let Some(inflight) = slot.current.take() {
                tracing::debug!(superseded = %inflight.id, "Cancelling in-flight request");
                inflight.cancel.cancel();
                self.shared.breaker.abandon_probe();
            }
        }

        if !self.shared.breaker.can_attempt() {
            tracing::warn!(%id, "Circuit open, skipping remote call");
            metrics::record_fetch_outcome("skipped_open");
            self.shared.state_tx.send_modify(|s| {
                s.id = Some(id);
                s.loading = false;
                s.error = Some(FetchError::CircuitOpen);
            });
            return;
        }

        let cancel = CancellationToken::new();
        let generation = {
            let mut slot = self.slot_locked();
            // A racing request may have slotted in between locks.
            if let Some(raced) = slot.current.take() {
                raced.cancel.cancel();
            }
            let generation = slot.next_generation;
            slot.next_generation += 1;
            slot.current = Some(InFlight {
                generation,
                id,
                cancel: cancel.clone(),
            });
            generation
        };

        self.shared.state_tx.send_modify(|s| {
            s.id = Some(id);
            s.loading = true;
            s.error = None;
        });
        tracing::info!(%id, generation, "Starting remote request");

        let controller = self.clone();
        tokio::spawn(async move {
            let result = controller.shared.fetcher.fetch(id, cancel).await;
            controller.settle(generation, id, result);
        });
    }

    /// Drop every cached result. Breaker state and any in-flight call are
    /// untouched; the next request for a cleared id goes back to the network.
    pub fn clear_cache(&self) {
        self.shared.cache.clear();
    }

    /// Apply a settled call's outcome, unless a newer request replaced it.
    fn settle(&self, generation: u64, id: ResourceId, result: FetchResult<F::Output>) {
        let still_current = {
            let mut slot = self.slot_locked();
            match &slot.current {
                Some(inflight) if inflight.generation == generation => {
                    slot.current = None;
                    true
                }
                _ => false,
            }
        };

        if !still_current {
            // Superseded: the newer request owns the observable state.
            tracing::debug!(%id, generation, "Discarding stale settlement");
            return;
        }

        match result {
            Ok(value) => {
                self.shared.cache.insert(id, value.clone());
                self.shared.breaker.record_success();
                metrics::record_fetch_outcome("success");
                tracing::info!(%id, "Request completed");
                self.shared.state_tx.send_modify(|s| {
                    s.id = Some(id);
                    s.value = Some(value);
                    s.loading = false;
                    s.error = None;
                });
            }
            Err(FetchError::Cancelled) => {
                // Not a dependency outcome: no cache write, no breaker report.
                self.shared.breaker.abandon_probe();
                metrics::record_fetch_outcome("cancelled");
                tracing::debug!(%id, "Request cancelled");
                self.shared.state_tx.send_modify(|s| s.loading = false);
            }
            Err(err) => {
                self.shared.breaker.record_failure();
                metrics::record_fetch_outcome("failure");
                tracing::warn!(%id, error = %err, "Request failed");
                self.shared.state_tx.send_modify(|s| {
                    s.id = Some(id);
                    s.loading = false;
                    s.error = Some(err);
                });
            }
        }
    }
}

impl<F: ResourceFetcher> std::fmt::Debug for FetchController<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FetchController")
            .field("cache_size", &self.shared.cache.len())
            .field("breaker", &self.shared.breaker)
            .finish()
    }
}
