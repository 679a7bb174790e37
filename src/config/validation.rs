//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (timeouts > 0, limits > 0, addresses parse)
//! - Detect conflicting paths (executor endpoint vs relayed prefix)
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: BrokerConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::net::SocketAddr;
use thiserror::Error;

use crate::config::schema::BrokerConfig;

/// A single semantic problem found in a configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{field}: {message}")]
pub struct ValidationError {
    pub field: &'static str,
    pub message: String,
}

impl ValidationError {
    fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

/// Paths are mounted as axum routes; the root belongs to the status
/// document and route syntax characters would be parsed as captures.
fn check_route_path(field: &'static str, path: &str, errors: &mut Vec<ValidationError>) {
    if !path.starts_with('/') {
        errors.push(ValidationError::new(field, "must start with '/'"));
    } else if path.trim_end_matches('/').is_empty() {
        errors.push(ValidationError::new(
            field,
            "must not be the root path (reserved for the status document)",
        ));
    }
    if path.contains(['{', '}', '*']) {
        errors.push(ValidationError::new(field, "must not contain '{', '}' or '*'"));
    }
}

/// Check a parsed configuration for values the broker cannot run with.
pub fn validate_config(config: &BrokerConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::new(
            "listener.bind_address",
            format!("'{}' is not a socket address", config.listener.bind_address),
        ));
    }

    let relay = &config.relay;
    if relay.request_timeout_secs == 0 {
        errors.push(ValidationError::new("relay.request_timeout_secs", "must be greater than 0"));
    }
    if relay.probe_interval_secs == 0 {
        errors.push(ValidationError::new("relay.probe_interval_secs", "must be greater than 0"));
    }
    if relay.max_frame_bytes == 0 {
        errors.push(ValidationError::new("relay.max_frame_bytes", "must be greater than 0"));
    }
    if relay.max_body_bytes == 0 {
        errors.push(ValidationError::new("relay.max_body_bytes", "must be greater than 0"));
    }
    check_route_path("relay.executor_path", &relay.executor_path, &mut errors);
    check_route_path("relay.route_prefix", &relay.route_prefix, &mut errors);
    if relay.route_prefix.trim_end_matches('/') == relay.executor_path.trim_end_matches('/') {
        errors.push(ValidationError::new(
            "relay.route_prefix",
            "must differ from relay.executor_path",
        ));
    }

    let observability = &config.observability;
    if observability.metrics_enabled && observability.metrics_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::new(
            "observability.metrics_address",
            format!("'{}' is not a socket address", observability.metrics_address),
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
