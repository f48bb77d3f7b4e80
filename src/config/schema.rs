//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the fetch
//! service. All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

/// Root configuration for the resilient fetch service.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct FetchConfig {
    /// Circuit breaker tuning.
    pub breaker: BreakerConfig,

    /// Remote resource endpoint.
    pub remote: RemoteConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Circuit breaker tuning.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct BreakerConfig {
    /// Consecutive failures before the circuit opens.
    pub failure_threshold: u32,

    /// Cooldown after opening before a recovery probe is allowed, in milliseconds.
    pub cooldown_ms: u64,
}

impl Default for BreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 3,
            cooldown_ms: 60_000,
        }
    }
}

/// Remote resource endpoint configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RemoteConfig {
    /// Base URL of the resource service (e.g., "https://example.com").
    pub base_url: String,

    /// Path prefix the resource id is appended to (e.g., "/users").
    pub resource_path: String,
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            base_url: "https://jsonplaceholder.typicode.com".to_string(),
            resource_path: "/users".to_string(),
        }
    }
}

/// Observability settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Enable the Prometheus metrics endpoint.
    pub metrics_enabled: bool,

    /// Address for the metrics endpoint.
    pub metrics_address: String,

    /// Default log filter applied when RUST_LOG is unset.
    pub log_filter: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            metrics_enabled: false,
            metrics_address: "127.0.0.1:9090".to_string(),
            log_filter: "resilient_fetch=info".to_string(),
        }
    }
}
