//! Streaming proxy
//!
//! # Architecture Overview
//!
//! ```text
//!   HTTP client                 streaming-proxy                    Invocation Service
//!   ───────────                 ───────────────                    ──────────────────
//!   POST /web/ns/act ──▶ handlers ──▶ listener::open (port P)
//!                               │     inject STREAM_HOST/PORT ───▶ invoke action
//!                               │                                       │
//!                               │                               action connects
//!                               │                                 to host:P
//!                               ▼                                       │
//!   ◀── chunked body ─── StreamRelay ◀── handoff ◀── ConnectionReader ◀─┘
//! ```

use clap::Parser;
use std::net::SocketAddr;
use std::path::PathBuf;
use tokio::net::TcpListener;

use streaming_proxy::config::load_config;
use streaming_proxy::lifecycle::signals::spawn_signal_handler;
use streaming_proxy::observability::{logging, metrics};
use streaming_proxy::{HttpServer, Shutdown};

#[derive(Parser)]
#[command(name = "streaming-proxy")]
#[command(about = "Streams serverless action output back over HTTP", long_about = None)]
struct Cli {
    /// Optional TOML config file; environment variables override it.
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let config = load_config(cli.config.as_deref())?;

    logging::init(&config.observability.log_filter);
    tracing::info!("streaming-proxy v{} starting", env!("CARGO_PKG_VERSION"));

    tracing::info!(
        http_port = config.http.port,
        stream_bind_host = %config.stream.bind_host,
        api_host = %config.invoker.api_host,
        cors_enabled = config.cors.enabled,
        "Configuration loaded"
    );
    if config.invoker.api_host.is_empty() {
        tracing::warn!("OW_APIHOST is not set; invocations will fail");
    }

    if let Some(addr) = &config.observability.metrics_address {
        // Validated by load_config.
        if let Ok(addr) = addr.parse::<SocketAddr>() {
            metrics::init_metrics(addr);
        }
    }

    let shutdown = Shutdown::new();
    spawn_signal_handler(shutdown.clone());

    let listener = TcpListener::bind(config.http.bind_address()).await?;
    let server = HttpServer::new(config, &shutdown)?;
    server.run(listener).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
