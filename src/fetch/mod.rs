//! Fetch subsystem.
//!
//! # Data Flow
//! ```text
//! desired id (watch channel)
//!     → driver.rs (reactive re-request)
//!     → controller.rs (cache → breaker → single-flight remote call)
//!     → remote.rs (transport) / cache.rs (hits) / resilience (gating)
//!     → observable FetchState (watch channel)
//! ```

pub mod cache;
pub mod controller;
pub mod driver;
pub mod remote;
pub mod types;

pub use controller::FetchController;
pub use driver::FetchDriver;
pub use remote::{HttpResourceFetcher, ResourceFetcher};
pub use types::{FetchError, FetchResult, FetchState, ResourceId};
