//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (port, buffer size, intervals)
//! - Check addresses parse before anything binds
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: ProxyConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::net::{IpAddr, SocketAddr};
use thiserror::Error;

use crate::config::schema::ProxyConfig;

/// A single semantic problem with the configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("http.port must be non-zero")]
    ZeroHttpPort,

    #[error("stream.bind_host {0:?} is not an IP address")]
    InvalidBindHost(String),

    #[error("stream.read_buffer_bytes must be non-zero")]
    ZeroReadBuffer,

    #[error("stream.idle_ms must be non-zero")]
    ZeroIdleInterval,

    #[error("invoker.timeout_secs must be non-zero")]
    ZeroInvokeTimeout,

    #[error("observability.metrics_address {0:?} is not a socket address")]
    InvalidMetricsAddress(String),
}

/// Validate a configuration, collecting every problem found.
pub fn validate_config(config: &ProxyConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.http.port == 0 {
        errors.push(ValidationError::ZeroHttpPort);
    }
    if config.stream.bind_host.parse::<IpAddr>().is_err() {
        errors.push(ValidationError::InvalidBindHost(config.stream.bind_host.clone()));
    }
    if config.stream.read_buffer_bytes == 0 {
        errors.push(ValidationError::ZeroReadBuffer);
    }
    if config.stream.idle_ms == 0 {
        errors.push(ValidationError::ZeroIdleInterval);
    }
    if config.invoker.timeout_secs == 0 {
        errors.push(ValidationError::ZeroInvokeTimeout);
    }
    if let Some(addr) = &config.observability.metrics_address {
        if addr.parse::<SocketAddr>().is_err() {
            errors.push(ValidationError::InvalidMetricsAddress(addr.clone()));
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
