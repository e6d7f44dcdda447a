//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (timeouts > 0, rates > 0, addresses parse)
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: GatewayConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::net::SocketAddr;

use thiserror::Error;

use crate::config::schema::GatewayConfig;

/// A single semantic problem with a configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{field}: {reason}")]
pub struct ValidationError {
    pub field: &'static str,
    pub reason: String,
}

impl ValidationError {
    fn new(field: &'static str, reason: impl Into<String>) -> Self {
        Self {
            field,
            reason: reason.into(),
        }
    }
}

/// Check a configuration for values that deserialize but cannot run.
pub fn validate_config(config: &GatewayConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::new(
            "listener.bind_address",
            format!("'{}' is not a socket address", config.listener.bind_address),
        ));
    }
    if !config.listener.ws_path.starts_with('/') {
        errors.push(ValidationError::new("listener.ws_path", "must start with '/'"));
    }

    if config.session.handshake_timeout_ms == 0 {
        errors.push(ValidationError::new("session.handshake_timeout_ms", "must be > 0"));
    }
    if config.session.dial_timeout_secs == 0 {
        errors.push(ValidationError::new("session.dial_timeout_secs", "must be > 0"));
    }
    if config.session.keepalive_interval_secs == 0 {
        errors.push(ValidationError::new("session.keepalive_interval_secs", "must be > 0"));
    }
    if config.session.max_control_message_bytes == 0 {
        errors.push(ValidationError::new("session.max_control_message_bytes", "must be > 0"));
    }

    let rate = config.admission.source_rate_per_sec;
    if rate.is_nan() || rate <= 0.0 {
        errors.push(ValidationError::new("admission.source_rate_per_sec", "must be > 0"));
    }
    if config.admission.source_burst == 0 {
        errors.push(ValidationError::new("admission.source_burst", "must be >= 1"));
    }
    if config.admission.max_tracked_sources == 0 {
        errors.push(ValidationError::new("admission.max_tracked_sources", "must be >= 1"));
    }

    if config.throttle.rate_bytes_per_sec == 0 {
        errors.push(ValidationError::new("throttle.rate_bytes_per_sec", "must be > 0"));
    }
    if config.throttle.burst_bytes == 0 {
        errors.push(ValidationError::new("throttle.burst_bytes", "must be >= 1"));
    }

    if config.static_files.dir.is_some() {
        let mount = &config.static_files.mount;
        if !mount.starts_with('/') || mount == "/" {
            errors.push(ValidationError::new(
                "static.mount",
                "must start with '/' and not be the root",
            ));
        } else if mount.trim_end_matches('/') == config.listener.ws_path.trim_end_matches('/') {
            errors.push(ValidationError::new("static.mount", "collides with listener.ws_path"));
        }
    }

    if config.shutdown.drain_poll_ms == 0 {
        errors.push(ValidationError::new("shutdown.drain_poll_ms", "must be > 0"));
    }

    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::new(
            "observability.metrics_address",
            format!("'{}' is not a socket address", config.observability.metrics_address),
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
