//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the proxy.
//! All types derive Serde traits so a TOML file can provide any subset of
//! fields; environment variables are layered on top by the loader.

use serde::{Deserialize, Serialize};

/// Package used when a route omits the package segment.
pub const DEFAULT_PACKAGE: &str = "default";

/// Root configuration for the streaming proxy.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ProxyConfig {
    /// HTTP listener configuration.
    pub http: HttpConfig,

    /// Rendezvous (per-request TCP) listener configuration.
    pub stream: StreamConfig,

    /// Invocation Service settings.
    pub invoker: InvokerConfig,

    /// CORS policy.
    pub cors: CorsConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// HTTP listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct HttpConfig {
    /// Port the HTTP server binds on all interfaces.
    pub port: u16,

    /// Maximum accepted request body in bytes.
    pub max_body_bytes: usize,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            port: 80,
            max_body_bytes: 2 * 1024 * 1024, // 2MB
        }
    }
}

impl HttpConfig {
    /// Socket address string for the HTTP listener.
    pub fn bind_address(&self) -> String {
        format!("0.0.0.0:{}", self.port)
    }
}

/// Rendezvous listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct StreamConfig {
    /// Host the per-request listeners bind to (port is always OS-assigned).
    pub bind_host: String,

    /// Host advertised to the workload in `STREAM_HOST`.
    /// Falls back to the bound address when unset.
    pub advertised_host: Option<String>,

    /// Read buffer size for the accepted connection.
    pub read_buffer_bytes: usize,

    /// Idle deadline applied to each read, in milliseconds.
    pub idle_ms: u64,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            bind_host: "0.0.0.0".to_string(),
            advertised_host: None,
            read_buffer_bytes: 2048,
            idle_ms: 100,
        }
    }
}

/// Invocation Service configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct InvokerConfig {
    /// Base URL of the Invocation Service (e.g. "https://openwhisk.example.com").
    pub api_host: String,

    /// Timeout for the invocation HTTP call in seconds.
    pub timeout_secs: u64,
}

impl Default for InvokerConfig {
    fn default() -> Self {
        Self {
            api_host: String::new(),
            timeout_secs: 30,
        }
    }
}

/// CORS policy applied to every response when enabled.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CorsConfig {
    pub enabled: bool,
    pub allow_origin: String,
    pub allow_methods: String,
    pub allow_headers: String,
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            allow_origin: "*".to_string(),
            allow_methods: "GET, POST, OPTIONS".to_string(),
            allow_headers: "*".to_string(),
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Default log filter, used when `RUST_LOG` is not set.
    pub log_filter: String,

    /// Prometheus scrape endpoint bind address. Disabled when unset.
    pub metrics_address: Option<String>,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_filter: "streaming_proxy=info,tower_http=info".to_string(),
            metrics_address: None,
        }
    }
}
