//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Shutdown (shutdown.rs):
//!     ctrl-c / quit command → trigger broadcast → driver and reporter loops exit
//! ```

pub mod shutdown;

pub use shutdown::Shutdown;
