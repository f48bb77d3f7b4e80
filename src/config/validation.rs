//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (threshold and cooldown non-zero)
//! - Check the remote endpoint is well-formed before anything dials it
//!
//! # Design Decisions
//! - Returns all validation errors, not just the first
//! - Validation is a pure function: FetchConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::net::SocketAddr;

use crate::config::schema::FetchConfig;

/// A single semantic validation failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Dotted path of the offending field.
    pub field: &'static str,
    /// Human-readable description of the problem.
    pub message: String,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Validate a configuration, collecting every error found.
pub fn validate_config(config: &FetchConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.breaker.failure_threshold == 0 {
        errors.push(ValidationError {
            field: "breaker.failure_threshold",
            message: "must be at least 1".to_string(),
        });
    }

    if config.breaker.cooldown_ms == 0 {
        errors.push(ValidationError {
            field: "breaker.cooldown_ms",
            message: "must be greater than zero".to_string(),
        });
    }

    if let Err(e) = url::Url::parse(&config.remote.base_url) {
        errors.push(ValidationError {
            field: "remote.base_url",
            message: format!("'{}' is not a valid URL: {}", config.remote.base_url, e),
        });
    }

    if !config.remote.resource_path.starts_with('/') {
        errors.push(ValidationError {
            field: "remote.resource_path",
            message: format!("'{}' must start with '/'", config.remote.resource_path),
        });
    }

    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError {
            field: "observability.metrics_address",
            message: format!(
                "'{}' is not a valid socket address",
                config.observability.metrics_address
            ),
        });
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
