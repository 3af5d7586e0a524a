//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → Shutdown::trigger
//!
//! Shutdown (shutdown.rs):
//!     trigger → HTTP server stops accepting
//!             → every request scope (a child token) is cancelled
//!             → rendezvous listeners and readers tear down
//! ```

pub mod shutdown;
pub mod signals;

pub use shutdown::Shutdown;
