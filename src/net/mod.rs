//! Rendezvous networking: the TCP side of the streaming bridge.
//!
//! # Data Flow
//! ```text
//! HTTP request
//!     → scope.rs (request-scoped cancellation)
//!     → listener.rs (bind ephemeral port, accept one connection)
//!     → reader.rs (read loop on the accepted connection)
//!     → handoff.rs (rendezvous queue, acknowledged per chunk)
//!     → Hand off to http::stream
//! ```
//!
//! # Design Decisions
//! - Nothing here is shared between requests
//! - Every socket and queue has exactly one owner; closing is done by drop
//! - Cancellation wins every race: observers stop rather than error

pub mod connection;
pub mod handoff;
pub mod listener;
pub mod reader;
pub mod scope;

pub use connection::{StreamGuard, StreamId, StreamTracker};
pub use handoff::{handoff, ChunkReceiver, ChunkSender};
pub use listener::{ListenerError, ListenerSettings, RendezvousEndpoint};
pub use reader::{ConnectionReader, ReadOutcome, ReaderSettings};
pub use scope::{RequestScope, ScopeGuard};
