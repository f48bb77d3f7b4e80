//! Fetch-layer types and error definitions.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Resource identifier, for strong typing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ResourceId(pub u64);

impl From<u64> for ResourceId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

impl From<ResourceId> for u64 {
    fn from(id: ResourceId) -> Self {
        id.0
    }
}

impl std::fmt::Display for ResourceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Errors that can occur while fetching a resource.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    /// The call was superseded and cooperatively cancelled. Swallowed
    /// internally: never surfaced as the observable error, never reported
    /// to the breaker.
    #[error("request cancelled")]
    Cancelled,

    /// The remote service failed (transport error or non-success status).
    #[error("remote service error: {0}")]
    Service(String),

    /// The circuit breaker refused the call; no network attempt was made.
    #[error("service temporarily unavailable (circuit open)")]
    CircuitOpen,
}

impl FetchError {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, FetchError::Cancelled)
    }
}

/// Result type for fetch operations.
pub type FetchResult<T> = Result<T, FetchError>;

/// Observable snapshot of the controller's most recent attempt.
#[derive(Debug, Clone)]
pub struct FetchState<T> {
    /// Id the snapshot belongs to.
    pub id: Option<ResourceId>,
    /// Most recently resolved value; kept across later attempts until overwritten.
    pub value: Option<T>,
    /// True while a remote call is in flight.
    pub loading: bool,
    /// Terminal error of the most recent attempt, if any.
    pub error: Option<FetchError>,
}

impl<T> Default for FetchState<T> {
    fn default() -> Self {
        Self {
            id: None,
            value: None,
            loading: false,
            error: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resource_id_conversion() {
        let id = ResourceId::from(42u64);
        assert_eq!(id.0, 42);
        assert_eq!(u64::from(id), 42);
        assert_eq!(id.to_string(), "42");
    }

    #[test]
    fn test_error_display() {
        let err = FetchError::Service("connection refused".to_string());
        assert_eq!(err.to_string(), "remote service error: connection refused");
        assert!(!err.is_cancelled());

        assert!(FetchError::Cancelled.is_cancelled());
        assert!(FetchError::CircuitOpen.to_string().contains("unavailable"));
    }

    #[test]
    fn test_default_state_is_idle() {
        let state: FetchState<u64> = FetchState::default();
        assert!(state.id.is_none());
        assert!(state.value.is_none());
        assert!(!state.loading);
        assert!(state.error.is_none());
    }
}
