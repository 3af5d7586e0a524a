//! Configuration loading from disk and environment.

use std::fs;
use std::path::Path;
use std::str::FromStr;
use thiserror::Error;

use crate::config::schema::ProxyConfig;
use crate::config::validation::{validate_config, ValidationError};
use crate::invoke::target::ensure_protocol_scheme;

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid value for {key}: {value:?}")]
    Env { key: &'static str, value: String },

    #[error("Validation failed: {}", join_errors(.0))]
    Validation(Vec<ValidationError>),
}

fn join_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Load configuration: optional TOML file, then environment overrides, then validation.
pub fn load_config(path: Option<&Path>) -> Result<ProxyConfig, ConfigError> {
    let mut config = match path {
        Some(path) => {
            let content = fs::read_to_string(path)?;
            toml::from_str(&content)?
        }
        None => ProxyConfig::default(),
    };

    apply_env_overrides(&mut config, |key| std::env::var(key).ok())?;
    validate_config(&config).map_err(ConfigError::Validation)?;

    Ok(config)
}

/// Apply environment variables on top of `config`.
///
/// `lookup` abstracts the environment so tests don't mutate process state.
/// Empty values are treated as unset.
pub fn apply_env_overrides<F>(config: &mut ProxyConfig, lookup: F) -> Result<(), ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let var = |key: &str| lookup(key).filter(|v| !v.is_empty());

    if let Some(port) = var("HTTP_SERVER_PORT") {
        config.http.port = parse("HTTP_SERVER_PORT", port)?;
    }
    if let Some(host) = var("STREAMING_PROXY_ADDR") {
        config.stream.bind_host = host;
    }
    if let Some(host) = var("STREAM_HOST_OVERRIDE") {
        config.stream.advertised_host = Some(host);
    }
    if let Some(size) = var("STREAM_READ_BUFFER") {
        config.stream.read_buffer_bytes = parse("STREAM_READ_BUFFER", size)?;
    }
    if let Some(ms) = var("STREAM_IDLE_MS") {
        config.stream.idle_ms = parse("STREAM_IDLE_MS", ms)?;
    }
    if let Some(host) = var("OW_APIHOST") {
        config.invoker.api_host = host;
    }
    if let Some(secs) = var("INVOKE_TIMEOUT_SECS") {
        config.invoker.timeout_secs = parse("INVOKE_TIMEOUT_SECS", secs)?;
    }
    if let Some(enabled) = var("CORS_ENABLED") {
        config.cors.enabled = enabled == "1" || enabled == "true";
    }
    if let Some(origin) = var("CORS_ALLOW_ORIGIN") {
        config.cors.allow_origin = origin;
    }
    if let Some(methods) = var("CORS_ALLOW_METHODS") {
        config.cors.allow_methods = methods;
    }
    if let Some(headers) = var("CORS_ALLOW_HEADERS") {
        config.cors.allow_headers = headers;
    }
    if let Some(addr) = var("METRICS_ADDRESS") {
        config.observability.metrics_address = Some(addr);
    }

    config.invoker.api_host = ensure_protocol_scheme(&config.invoker.api_host);
    Ok(())
}

fn parse<T: FromStr>(key: &'static str, value: String) -> Result<T, ConfigError> {
    value.parse().map_err(|_| ConfigError::Env { key, value })
}
