//! Per-request rendezvous listener.
//!
//! # Responsibilities
//! - Bind an OS-assigned port on the configured stream host
//! - Report the host/port the workload must connect back to
//! - Accept exactly one connection and hand it to a `ConnectionReader`
//! - Close the listening socket on first accept or on scope cancellation
//!
//! # Tasks
//! ```text
//! open()
//!   ├─ accept loop   (owns the listener; drops it on accept or cancel)
//!   │     └─ read loop (spawned on accept; owns conn + queue sender)
//!   └─ cleanup waiter (waits for cancel, joins both, aborts stragglers)
//! ```
//!
//! # Design Decisions
//! - Single connection per listener: one invocation, one output stream
//! - Transient accept errors are retried while the scope is live
//! - An aborted task drops its socket, so teardown never depends on a task
//!   noticing cancellation on its own

use std::io;
use std::net::{IpAddr, SocketAddr};
use std::time::Duration;
use thiserror::Error;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

use crate::config::StreamConfig;
use crate::net::connection::StreamId;
use crate::net::handoff::{handoff, ChunkReceiver, ChunkSender};
use crate::net::reader::{ConnectionReader, ReadOutcome, ReaderSettings};
use crate::net::scope::RequestScope;

/// Pause between retries of a failed accept.
const ACCEPT_RETRY_DELAY: Duration = Duration::from_millis(10);

/// Error type for listener operations.
#[derive(Debug, Error)]
pub enum ListenerError {
    /// Failed to bind the rendezvous socket.
    #[error("cannot start rendezvous listener: {0}")]
    Bind(#[source] io::Error),
}

/// How rendezvous listeners are opened.
#[derive(Debug, Clone)]
pub struct ListenerSettings {
    /// Address the listener binds to (port is always 0).
    pub bind_host: IpAddr,
    /// Host reported to the workload instead of the bound IP.
    pub advertised_host: Option<String>,
    pub reader: ReaderSettings,
}

impl ListenerSettings {
    /// Build settings from validated stream configuration.
    pub fn from_config(config: &StreamConfig) -> Result<Self, std::net::AddrParseError> {
        Ok(Self {
            bind_host: config.bind_host.parse()?,
            advertised_host: config.advertised_host.clone(),
            reader: ReaderSettings {
                buffer_size: config.read_buffer_bytes,
                idle_deadline: Duration::from_millis(config.idle_ms),
            },
        })
    }
}

impl Default for ListenerSettings {
    fn default() -> Self {
        Self {
            bind_host: IpAddr::from([127, 0, 0, 1]),
            advertised_host: None,
            reader: ReaderSettings::default(),
        }
    }
}

/// The open end of a rendezvous: where to connect, and where the bytes come out.
#[derive(Debug)]
pub struct RendezvousEndpoint {
    /// Host to inject as `STREAM_HOST`.
    pub host: String,
    /// Port to inject as `STREAM_PORT`.
    pub port: String,
    /// Address the listener is actually bound to.
    pub local_addr: SocketAddr,
    /// Chunks read from the accepted connection.
    pub chunks: ChunkReceiver,
}

/// Open a rendezvous listener bound to `scope`.
///
/// Background tasks are started before returning; all of them exit once the
/// scope is cancelled.
pub async fn open(
    id: StreamId,
    scope: RequestScope,
    settings: &ListenerSettings,
) -> Result<RendezvousEndpoint, ListenerError> {
    let listener = TcpListener::bind(SocketAddr::new(settings.bind_host, 0))
        .await
        .map_err(ListenerError::Bind)?;
    let local_addr = listener.local_addr().map_err(ListenerError::Bind)?;

    let host = settings
        .advertised_host
        .clone()
        .unwrap_or_else(|| local_addr.ip().to_string());
    let port = local_addr.port().to_string();

    let (tx, chunks) = handoff();

    let accept = tokio::spawn(accept_loop(id, listener, tx, scope.clone(), settings.reader));
    tokio::spawn(cleanup_waiter(
        id,
        local_addr,
        scope,
        accept,
        settings.reader.idle_deadline,
    ));

    tracing::info!(stream_id = %id, address = %local_addr, "Rendezvous listener bound");

    Ok(RendezvousEndpoint {
        host,
        port,
        local_addr,
        chunks,
    })
}

/// Accept one connection, then stop listening and spawn its reader.
async fn accept_loop(
    id: StreamId,
    listener: TcpListener,
    chunks: ChunkSender,
    scope: RequestScope,
    reader: ReaderSettings,
) -> Option<JoinHandle<ReadOutcome>> {
    loop {
        let accepted = tokio::select! {
            biased;
            _ = scope.cancelled() => return None,
            accepted = listener.accept() => accepted,
        };

        match accepted {
            Ok((conn, peer)) => {
                drop(listener);
                tracing::info!(stream_id = %id, peer_addr = %peer, "Accepted rendezvous connection");
                let reader = ConnectionReader::new(id, conn, chunks, scope, reader);
                return Some(tokio::spawn(reader.run()));
            }
            Err(e) => {
                if scope.is_cancelled() {
                    return None;
                }
                tracing::warn!(stream_id = %id, error = %e, "Accept error, retrying");
                tokio::select! {
                    biased;
                    _ = scope.cancelled() => return None,
                    _ = tokio::time::sleep(ACCEPT_RETRY_DELAY) => {}
                }
            }
        }
    }
}

/// Wait for the scope to end, then make sure nothing outlives it.
async fn cleanup_waiter(
    id: StreamId,
    local_addr: SocketAddr,
    scope: RequestScope,
    mut accept: JoinHandle<Option<JoinHandle<ReadOutcome>>>,
    grace: Duration,
) {
    scope.cancelled().await;

    let reader = match tokio::time::timeout(grace, &mut accept).await {
        Ok(Ok(reader)) => reader,
        Ok(Err(e)) => {
            tracing::error!(stream_id = %id, error = %e, "Accept task failed");
            None
        }
        Err(_) => {
            tracing::warn!(stream_id = %id, "Accept task slow to stop, aborting");
            accept.abort();
            None
        }
    };

    if let Some(mut reader) = reader {
        if tokio::time::timeout(grace, &mut reader).await.is_err() {
            tracing::warn!(stream_id = %id, "Read loop slow to stop, aborting");
            reader.abort();
        }
    }

    tracing::info!(stream_id = %id, address = %local_addr, "Stopped listening");
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use tokio::io::AsyncWriteExt;
    use tokio::net::TcpStream;

    fn settings() -> ListenerSettings {
        ListenerSettings {
            reader: ReaderSettings {
                buffer_size: 2048,
                idle_deadline: Duration::from_millis(20),
            },
            ..ListenerSettings::default()
        }
    }

    #[tokio::test]
    async fn relays_single_connection() {
        let (scope, _guard) = RequestScope::detached();
        let mut endpoint = open(StreamId::new(), scope, &settings()).await.unwrap();
        assert_eq!(endpoint.host, "127.0.0.1");
        assert_eq!(endpoint.port, endpoint.local_addr.port().to_string());

        let mut conn = TcpStream::connect(endpoint.local_addr).await.unwrap();
        conn.write_all(b"hello").await.unwrap();
        assert_eq!(endpoint.chunks.recv().await.unwrap(), Bytes::from_static(b"hello"));

        drop(conn);
        assert_eq!(endpoint.chunks.recv().await, None);
    }

    #[tokio::test]
    async fn accepts_at_most_one_connection() {
        let (scope, _guard) = RequestScope::detached();
        let mut endpoint = open(StreamId::new(), scope, &settings()).await.unwrap();

        let mut first = TcpStream::connect(endpoint.local_addr).await.unwrap();
        first.write_all(b"1").await.unwrap();
        assert_eq!(endpoint.chunks.recv().await.unwrap(), Bytes::from_static(b"1"));

        // The listener was dropped on accept.
        assert!(TcpStream::connect(endpoint.local_addr).await.is_err());
    }

    #[tokio::test]
    async fn cancellation_unbinds_unused_listener() {
        let (scope, guard) = RequestScope::detached();
        let mut endpoint = open(StreamId::new(), scope, &settings()).await.unwrap();

        guard.cancel();
        tokio::time::sleep(Duration::from_millis(50)).await;

        assert!(TcpStream::connect(endpoint.local_addr).await.is_err());
        assert_eq!(endpoint.chunks.recv().await, None);
    }

    #[tokio::test]
    async fn cancellation_ends_active_stream() {
        let (scope, guard) = RequestScope::detached();
        let mut endpoint = open(StreamId::new(), scope, &settings()).await.unwrap();

        let mut conn = TcpStream::connect(endpoint.local_addr).await.unwrap();
        conn.write_all(b"partial").await.unwrap();
        assert_eq!(endpoint.chunks.recv().await.unwrap(), Bytes::from_static(b"partial"));

        guard.cancel();
        let closed = tokio::time::timeout(Duration::from_millis(100), endpoint.chunks.recv())
            .await
            .expect("queue should close within one idle interval");
        assert_eq!(closed, None);
    }

    #[tokio::test]
    async fn advertised_host_overrides_bound_ip() {
        let (scope, _guard) = RequestScope::detached();
        let settings = ListenerSettings {
            advertised_host: Some("proxy.internal".into()),
            ..settings()
        };
        let endpoint = open(StreamId::new(), scope, &settings).await.unwrap();
        assert_eq!(endpoint.host, "proxy.internal");
    }

    #[tokio::test]
    async fn bind_failure_is_reported() {
        let (scope, _guard) = RequestScope::detached();
        let settings = ListenerSettings {
            // TEST-NET-3, never assigned to a local interface.
            bind_host: IpAddr::from([203, 0, 113, 1]),
            ..settings()
        };
        let err = open(StreamId::new(), scope, &settings).await.unwrap_err();
        assert!(err.to_string().starts_with("cannot start rendezvous listener"));
    }
}
