//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Remote call attempt:
//!     → circuit_breaker.rs (permission check; Open fails fast)
//!     → on settlement: record_success / record_failure feed back in
//!     → clock.rs (time base for cooldown decisions)
//! ```
//!
//! # Design Decisions
//! - The breaker never errors; it answers with permission and mutates its own state
//! - Lazy elapsed-time checks are authoritative; background timers are advisory
//! - No in-layer retries: recovery is cooldown- and breaker-mediated

pub mod circuit_breaker;
pub mod clock;

pub use circuit_breaker::{CircuitBreaker, CircuitState};
pub use clock::{Clock, ManualClock, SystemClock};
