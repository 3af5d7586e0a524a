//! Read loop for the accepted rendezvous connection.
//!
//! # Responsibilities
//! - Read the workload's output in fixed-size chunks
//! - Push each non-empty read onto the handoff queue, in order
//! - Stop on end-of-stream, read error, consumer loss or scope cancellation
//!
//! # State Machine
//! ```text
//! Reading ──data──▶ Handing off ──taken──▶ Reading
//!    │  └─idle deadline─▶ Reading (re-check scope)
//!    ├──EOF──────────▶ Done(Eof)
//!    ├──error────────▶ Done(Failed)
//!    └──cancelled────▶ Done(Cancelled)   (also while handing off)
//! ```
//!
//! The reader owns both the connection and the only queue sender, so leaving
//! `run` closes the socket and the queue exactly once, whatever the exit.

use bytes::Bytes;
use std::io;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt};

use crate::net::connection::StreamId;
use crate::net::handoff::ChunkSender;
use crate::net::scope::RequestScope;
use crate::observability::metrics;

/// Read-loop tuning.
#[derive(Debug, Clone, Copy)]
pub struct ReaderSettings {
    pub buffer_size: usize,
    pub idle_deadline: Duration,
}

impl Default for ReaderSettings {
    fn default() -> Self {
        Self {
            buffer_size: 2048,
            idle_deadline: Duration::from_millis(100),
        }
    }
}

/// Why the read loop stopped.
#[derive(Debug)]
pub enum ReadOutcome {
    /// The workload closed its end.
    Eof,
    /// The request scope was cancelled.
    Cancelled,
    /// The response writer dropped the queue.
    ConsumerGone,
    /// The connection failed.
    Failed(io::Error),
}

/// Consumes an accepted connection and feeds the handoff queue.
pub struct ConnectionReader<S> {
    id: StreamId,
    conn: S,
    chunks: ChunkSender,
    scope: RequestScope,
    settings: ReaderSettings,
}

impl<S> ConnectionReader<S>
where
    S: AsyncRead + Unpin,
{
    pub fn new(
        id: StreamId,
        conn: S,
        chunks: ChunkSender,
        scope: RequestScope,
        settings: ReaderSettings,
    ) -> Self {
        Self {
            id,
            conn,
            chunks,
            scope,
            settings,
        }
    }

    /// Run until the stream ends. Dropping `self` on return closes the
    /// connection and the queue.
    pub async fn run(mut self) -> ReadOutcome {
        let outcome = self.read_loop().await;
        match &outcome {
            ReadOutcome::Eof => tracing::debug!(stream_id = %self.id, "Workload closed connection"),
            ReadOutcome::Cancelled => tracing::debug!(stream_id = %self.id, "Read loop cancelled"),
            ReadOutcome::ConsumerGone => {
                tracing::debug!(stream_id = %self.id, "Response writer gone, stopping read loop")
            }
            ReadOutcome::Failed(e) => {
                tracing::warn!(stream_id = %self.id, error = %e, "Error reading from rendezvous connection")
            }
        }
        outcome
    }

    async fn read_loop(&mut self) -> ReadOutcome {
        let mut buf = vec![0u8; self.settings.buffer_size];

        loop {
            if self.scope.is_cancelled() {
                return ReadOutcome::Cancelled;
            }

            let read = tokio::select! {
                biased;
                _ = self.scope.cancelled() => return ReadOutcome::Cancelled,
                read = tokio::time::timeout(self.settings.idle_deadline, self.conn.read(&mut buf)) => read,
            };

            let n = match read {
                // Idle deadline expired; loop to re-check the scope.
                Err(_) => continue,
                Ok(Ok(0)) => return ReadOutcome::Eof,
                Ok(Ok(n)) => n,
                Ok(Err(e)) if is_transient(&e) => continue,
                Ok(Err(e)) => return ReadOutcome::Failed(e),
            };

            let chunk = Bytes::copy_from_slice(&buf[..n]);
            tokio::select! {
                biased;
                _ = self.scope.cancelled() => return ReadOutcome::Cancelled,
                sent = self.chunks.send(chunk) => {
                    if sent.is_err() {
                        return ReadOutcome::ConsumerGone;
                    }
                }
            }
            metrics::record_bytes_read(n);
        }
    }
}

fn is_transient(e: &io::Error) -> bool {
    matches!(
        e.kind(),
        io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock | io::ErrorKind::Interrupted
    )
}
