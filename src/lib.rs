//! Streaming reverse proxy for serverless invocations.
//!
//! A client asks for `/{web,action}/{ns}[/{pkg}]/{action}`; the proxy opens a
//! one-shot TCP rendezvous port, passes its coordinates to the invoked action
//! as `STREAM_HOST`/`STREAM_PORT`, and relays whatever the action writes to
//! that port back to the client as a chunked HTTP response.

pub mod config;
pub mod http;
pub mod invoke;
pub mod lifecycle;
pub mod net;
pub mod observability;

pub use config::schema::ProxyConfig;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
