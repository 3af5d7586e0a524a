//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! HTTP request
//!     → server.rs (Axum setup, middleware)
//!     → request.rs (request ID, tracing span)
//!     → cors.rs (optional CORS headers / preflight)
//!     → handlers.rs (resolve target, open rendezvous, invoke)
//!     → stream.rs (relay chunks as the response body)
//!     → Send to client
//! ```

pub mod cors;
pub mod error;
pub mod handlers;
pub mod request;
pub mod server;
pub mod stream;

pub use error::StreamError;
pub use request::X_REQUEST_ID;
pub use server::{AppState, HttpServer, ServerError};
pub use stream::{RelayEvent, StreamRelay};
