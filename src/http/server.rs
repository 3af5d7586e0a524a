//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create Axum Router with all handlers
//! - Wire up middleware (request ID, tracing, body limit, optional CORS)
//! - Bind server to listener
//! - Stop accepting and cancel in-flight streams on shutdown
//!
//! No request timeout layer: a stream lasts as long as the workload writes.

use axum::{
    extract::DefaultBodyLimit,
    middleware,
    routing::get,
    Router,
};
use std::sync::Arc;
use thiserror::Error;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::{
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};

use crate::config::ProxyConfig;
use crate::http::cors::cors_middleware;
use crate::http::handlers::{action_stream_handler, liveness, web_action_stream_handler};
use crate::http::request::make_request_span;
use crate::invoke::InvocationClient;
use crate::lifecycle::Shutdown;
use crate::net::{ListenerSettings, StreamTracker};

/// Errors building the server from configuration.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("invalid stream bind host: {0}")]
    BindHost(#[from] std::net::AddrParseError),

    #[error("cannot build invocation client: {0}")]
    Client(#[from] reqwest::Error),
}

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub invoker: InvocationClient,
    pub listener: ListenerSettings,
    pub streams: StreamTracker,
    /// Parent of every request scope.
    pub shutdown: CancellationToken,
}

/// HTTP server for the streaming proxy.
pub struct HttpServer {
    router: Router,
    config: Arc<ProxyConfig>,
    streams: StreamTracker,
    shutdown: CancellationToken,
}

impl HttpServer {
    /// Create a new HTTP server with the given configuration.
    pub fn new(config: ProxyConfig, shutdown: &Shutdown) -> Result<Self, ServerError> {
        let streams = StreamTracker::new();
        let state = AppState {
            invoker: InvocationClient::new(&config.invoker)?,
            listener: ListenerSettings::from_config(&config.stream)?,
            streams: streams.clone(),
            shutdown: shutdown.token(),
        };

        let router = Self::build_router(&config, state);
        Ok(Self {
            router,
            config: Arc::new(config),
            streams,
            shutdown: shutdown.token(),
        })
    }

    /// Build the Axum router with all middleware layers.
    pub fn build_router(config: &ProxyConfig, state: AppState) -> Router {
        let router = Router::new()
            .route("/", get(liveness))
            .route(
                "/web/{ns}/{action}",
                get(web_action_stream_handler).post(web_action_stream_handler),
            )
            .route(
                "/web/{ns}/{pkg}/{action}",
                get(web_action_stream_handler).post(web_action_stream_handler),
            )
            .route(
                "/action/{ns}/{action}",
                get(action_stream_handler).post(action_stream_handler),
            )
            .route(
                "/action/{ns}/{pkg}/{action}",
                get(action_stream_handler).post(action_stream_handler),
            )
            .with_state(state)
            .layer(DefaultBodyLimit::max(config.http.max_body_bytes))
            .layer(PropagateRequestIdLayer::x_request_id())
            .layer(TraceLayer::new_for_http().make_span_with(make_request_span))
            .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid));

        if config.cors.enabled {
            let cors = Arc::new(config.cors.clone());
            router.layer(middleware::from_fn_with_state(cors, cors_middleware))
        } else {
            router
        }
    }

    /// Run the server, accepting connections on the given listener, until
    /// shutdown is triggered.
    pub async fn run(self, listener: TcpListener) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(
            address = %addr,
            cors_enabled = self.config.cors.enabled,
            "HTTP server starting"
        );

        let shutdown = self.shutdown.clone();
        axum::serve(listener, self.router)
            .with_graceful_shutdown(async move { shutdown.cancelled().await })
            .await?;

        tracing::info!(
            remaining_streams = self.streams.active_count(),
            "HTTP server stopped"
        );
        Ok(())
    }

    /// Streams currently holding a rendezvous scope.
    pub fn streams(&self) -> &StreamTracker {
        &self.streams
    }
}
