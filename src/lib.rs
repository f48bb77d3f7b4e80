//! Resilient fetch layer: circuit breaker + cached single-flight fetch controller.

pub mod config;
pub mod fetch;
pub mod lifecycle;
pub mod observability;
pub mod resilience;

pub use config::FetchConfig;
pub use fetch::{FetchController, FetchDriver, FetchError, FetchState, ResourceId};
pub use lifecycle::Shutdown;
pub use resilience::{CircuitBreaker, CircuitState};
