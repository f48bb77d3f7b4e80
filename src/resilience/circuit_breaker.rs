//! Circuit breaker for remote-call protection.
//!
//! # States
//! - Closed: normal operation, calls pass through
//! - Open: dependency assumed down, calls fail fast
//! - Half-Open: a single probe call tests recovery
//!
//! # State Transitions
//! ```text
//! Closed → Open: failure_count >= threshold
//! Open → Half-Open: after cooldown elapses (lazy check or advisory timer)
//! Half-Open → Closed: probe succeeds
//! Half-Open → Open: probe fails, cooldown restarts
//! ```
//!
//! # Design Decisions
//! - The elapsed-time check inside `can_attempt` is the source of truth; the
//!   background timer only nudges Open → Half-Open early and must re-validate
//!   state, epoch and elapsed time before applying anything
//! - At most one probe may be outstanding in Half-Open; a cancelled probe
//!   releases its slot through `abandon_probe` without counting as an outcome
//! - Skipped calls (circuit open) are never recorded as failures

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

// Re-export BreakerConfig from config module to avoid duplication
pub use crate::config::schema::BreakerConfig;

use crate::observability::metrics;
use crate::resilience::clock::{Clock, SystemClock};

/// Breaker state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    /// Calls permitted.
    Closed,
    /// Calls blocked until the cooldown elapses.
    Open,
    /// One trial call permitted to test recovery.
    HalfOpen,
}

impl CircuitState {
    pub fn as_str(&self) -> &'static str {
        match self {
            CircuitState::Closed => "closed",
            CircuitState::Open => "open",
            CircuitState::HalfOpen => "half-open",
        }
    }
}

#[derive(Debug)]
struct BreakerInner {
    state: CircuitState,
    failure_count: u32,
    last_failure_at: Option<u64>,
    probe_in_flight: bool,
    /// Bumped on every transition into Open; a timer armed for an older
    /// epoch must not touch the state machine.
    open_epoch: u64,
}

/// Outcome of an advisory timer firing.
enum Nudge {
    Applied,
    Stale,
    Early { remaining_ms: u64 },
}

struct Shared {
    config: BreakerConfig,
    clock: Arc<dyn Clock>,
    inner: Mutex<BreakerInner>,
}

/// Tracks failure history for one protected dependency and decides whether a
/// call attempt is currently permitted.
///
/// Call [`CircuitBreaker::can_attempt`] before an operation; afterwards feed
/// the outcome back with [`CircuitBreaker::record_success`] or
/// [`CircuitBreaker::record_failure`]. A cancelled call reports neither and
/// releases a probe slot with [`CircuitBreaker::abandon_probe`].
///
/// Create one breaker per dependency; clones share the same state.
#[derive(Clone)]
pub struct CircuitBreaker {
    shared: Arc<Shared>,
}

impl CircuitBreaker {
    /// Create a breaker on the system clock.
    pub fn new(config: BreakerConfig) -> Self {
        Self::with_clock(config, Arc::new(SystemClock::default()))
    }

    /// Create a breaker on an explicit clock (tests).
    pub fn with_clock(config: BreakerConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            shared: Arc::new(Shared {
                config,
                clock,
                inner: Mutex::new(BreakerInner {
                    state: CircuitState::Closed,
                    failure_count: 0,
                    last_failure_at: None,
                    probe_in_flight: false,
                    open_epoch: 0,
                }),
            }),
        }
    }

    /// Current state, without advancing the machine.
    pub fn state(&self) -> CircuitState {
        self.shared.locked().state
    }

    /// Consecutive failures since the last reset.
    pub fn failure_count(&self) -> u32 {
        self.shared.locked().failure_count
    }

    /// Decide whether a call may be attempted right now.
    ///
    /// May itself advance the state machine: an expired cooldown flips
    /// Open → Half-Open and grants the single probe slot to this caller.
    pub fn can_attempt(&self) -> bool {
        let mut inner = self.shared.locked();
        match inner.state {
            CircuitState::Closed => true,
            CircuitState::Open => {
                let now = self.shared.clock.now_millis();
                let elapsed = inner
                    .last_failure_at
                    .map_or(u64::MAX, |t| now.saturating_sub(t));
                if elapsed >= self.shared.config.cooldown_ms {
                    inner.state = CircuitState::HalfOpen;
                    inner.probe_in_flight = true;
                    tracing::info!(elapsed_ms = elapsed, "Cooldown elapsed, probing recovery");
                    metrics::record_breaker_state(CircuitState::HalfOpen);
                    true
                } else {
                    false
                }
            }
            CircuitState::HalfOpen => {
                if inner.probe_in_flight {
                    // One probe at a time; further callers wait for it to settle.
                    false
                } else {
                    inner.probe_in_flight = true;
                    true
                }
            }
        }
    }

    /// Record a successful call. Unconditionally resets to Closed.
    pub fn record_success(&self) {
        let mut inner = self.shared.locked();
        if inner.state != CircuitState::Closed {
            tracing::info!(
                state = inner.state.as_str(),
                "Dependency recovered, closing circuit"
            );
        }
        inner.state = CircuitState::Closed;
        inner.failure_count = 0;
        inner.last_failure_at = None;
        inner.probe_in_flight = false;
        // Invalidate any cooldown timer armed for the previous Open period.
        inner.open_epoch += 1;
        metrics::record_breaker_state(CircuitState::Closed);
    }

    /// Record a failed call.
    ///
    /// Closed trips to Open at the failure threshold; a failed Half-Open probe
    /// reopens immediately and restarts the cooldown. A failure while already
    /// Open only refreshes the failure timestamp, extending the window.
    pub fn record_failure(&self) {
        let now = self.shared.clock.now_millis();
        let mut inner = self.shared.locked();
        inner.failure_count += 1;
        inner.last_failure_at = Some(now);

        match inner.state {
            CircuitState::Closed
                if inner.failure_count >= self.shared.config.failure_threshold =>
            {
                inner.state = CircuitState::Open;
                inner.open_epoch += 1;
                let epoch = inner.open_epoch;
                tracing::warn!(
                    failures = inner.failure_count,
                    cooldown_ms = self.shared.config.cooldown_ms,
                    "Failure threshold reached, opening circuit"
                );
                metrics::record_breaker_state(CircuitState::Open);
                drop(inner);
                self.arm_cooldown_timer(epoch);
            }
            CircuitState::HalfOpen => {
                inner.state = CircuitState::Open;
                inner.probe_in_flight = false;
                inner.open_epoch += 1;
                let epoch = inner.open_epoch;
                tracing::warn!(
                    cooldown_ms = self.shared.config.cooldown_ms,
                    "Probe failed, reopening circuit"
                );
                metrics::record_breaker_state(CircuitState::Open);
                drop(inner);
                self.arm_cooldown_timer(epoch);
            }
            _ => {}
        }
    }

    /// Release the Half-Open probe slot without recording an outcome.
    ///
    /// Called when an in-flight probe is cancelled (superseded); the next
    /// `can_attempt` grants a fresh probe.
    pub fn abandon_probe(&self) {
        let mut inner = self.shared.locked();
        if inner.state == CircuitState::HalfOpen && inner.probe_in_flight {
            inner.probe_in_flight = false;
            tracing::debug!("Probe abandoned before settling");
        }
    }

    /// Arm the advisory Open → Half-Open timer.
    ///
    /// An early nudge only: `can_attempt` performs the same elapsed-time check
    /// lazily and remains correct if this timer is delayed, dropped, or never
    /// scheduled because no runtime is present.
    fn arm_cooldown_timer(&self, epoch: u64) {
        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            return;
        };
        let shared = Arc::clone(&self.shared);
        let mut delay_ms = shared.config.cooldown_ms;
        handle.spawn(async move {
            // The window may have been extended by failures recorded while
            // Open; re-arm for the remainder a bounded number of times and
            // then leave the rest to the lazy check.
            for _ in 0..=3 {
                tokio::time::sleep(Duration::from_millis(delay_ms)).await;
                match shared.try_nudge_half_open(epoch) {
                    Nudge::Applied | Nudge::Stale => return,
                    Nudge::Early { remaining_ms } => delay_ms = remaining_ms,
                }
            }
        });
    }
}

impl Shared {
    fn locked(&self) -> MutexGuard<'_, BreakerInner> {
        // The state block is a handful of plain fields; recover it even if a
        // holder panicked mid-update.
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn try_nudge_half_open(&self, epoch: u64) -> Nudge {
        let mut inner = self.locked();
        if inner.state != CircuitState::Open || inner.open_epoch != epoch {
            // A success reset us, or a newer Open period owns the window.
            return Nudge::Stale;
        }
        let now = self.clock.now_millis();
        let elapsed = inner
            .last_failure_at
            .map_or(u64::MAX, |t| now.saturating_sub(t));
        if elapsed < self.config.cooldown_ms {
            return Nudge::Early {
                remaining_ms: self.config.cooldown_ms - elapsed,
            };
        }
        inner.state = CircuitState::HalfOpen;
        inner.probe_in_flight = false;
        tracing::debug!("Cooldown timer fired, circuit half-open");
        metrics::record_breaker_state(CircuitState::HalfOpen);
        Nudge::Applied
    }
}

impl std::fmt::Debug for CircuitBreaker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.shared.locked();
        f.debug_struct("CircuitBreaker")
            .field("state", &inner.state)
            .field("failure_count", &inner.failure_count)
            .field("failure_threshold", &self.shared.config.failure_threshold)
            .field("cooldown_ms", &self.shared.config.cooldown_ms)
            .finish()
    }
}
