//! Streaming response writer.
//!
//! # Responsibilities
//! - Wait on the handoff queue, the web-action error conduit and the request
//!   scope, whichever fires first
//! - Commit the HTTP status only once the first event is known, so failures
//!   before the first byte still become a 500
//! - After that, emit one body frame per chunk (newline-delimited) and
//!   never buffer more than the chunk in hand
//!
//! # Data Flow
//! ```text
//! ChunkReceiver ─┐
//! error conduit ─┼─▶ next_event() ─▶ first event ─▶ Response (status)
//! RequestScope ──┘                        └──────▶ Body stream (frames)
//! ```
//!
//! # Design Decisions
//! - hyper polls the body only when it can write, so the body stream is the
//!   backpressure point: a slow client leaves the next chunk in the queue
//! - hyper drops the body when the client disconnects or a write fails;
//!   dropping the relay drops the `ScopeGuard`, which cancels the scope and
//!   tears down the listener and reader
//! - Cancellation is checked before the error conduit, and the conduit before
//!   the queue

use axum::{
    body::Body,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
};
use bytes::{Bytes, BytesMut};
use std::convert::Infallible;
use tokio::sync::oneshot;

use crate::http::error::StreamError;
use crate::invoke::InvokeError;
use crate::net::{ChunkReceiver, RequestScope, ScopeGuard, StreamGuard, StreamId};
use crate::observability::metrics;

/// Appended after every relayed chunk.
const CHUNK_DELIMITER: &[u8] = b"\n";

/// What the writer loop woke up for.
#[derive(Debug)]
pub enum RelayEvent {
    /// Next chunk from the workload.
    Chunk(Bytes),
    /// The reader stopped; no more data.
    Closed,
    /// The background invocation failed.
    Failed(InvokeError),
    /// The request scope ended.
    Cancelled,
}

/// Moves chunks from the handoff queue into an HTTP response.
#[derive(Debug)]
pub struct StreamRelay {
    id: StreamId,
    scope: RequestScope,
    guard: ScopeGuard,
    chunks: ChunkReceiver,
    failures: Option<oneshot::Receiver<InvokeError>>,
    bytes_sent: u64,
    finished: bool,
    _tracked: StreamGuard,
}

impl StreamRelay {
    pub fn new(
        tracked: StreamGuard,
        scope: RequestScope,
        guard: ScopeGuard,
        chunks: ChunkReceiver,
    ) -> Self {
        Self {
            id: tracked.id(),
            scope,
            guard,
            chunks,
            failures: None,
            bytes_sent: 0,
            finished: false,
            _tracked: tracked,
        }
    }

    /// Also watch an error conduit from a background invocation.
    pub fn with_failures(mut self, failures: oneshot::Receiver<InvokeError>) -> Self {
        self.failures = Some(failures);
        self
    }

    /// Wait for the next thing that matters to the writer.
    pub async fn next_event(&mut self) -> RelayEvent {
        let Self {
            scope,
            chunks,
            failures,
            ..
        } = self;

        loop {
            let failure = async {
                match failures.as_mut() {
                    Some(rx) => rx.await,
                    None => std::future::pending().await,
                }
            };

            tokio::select! {
                biased;
                _ = scope.cancelled() => return RelayEvent::Cancelled,
                failure = failure => match failure {
                    Ok(e) => return RelayEvent::Failed(e),
                    // Sender dropped: the call was accepted.
                    Err(_) => *failures = None,
                },
                chunk = chunks.recv() => {
                    return match chunk {
                        Some(chunk) => RelayEvent::Chunk(chunk),
                        None => RelayEvent::Closed,
                    };
                }
            }
        }
    }

    /// Wait for the first event and turn it into a response.
    ///
    /// Errors before the first byte become error responses; after it, the
    /// status is committed and later errors are only logged.
    pub async fn respond(mut self) -> Response {
        match self.next_event().await {
            RelayEvent::Chunk(first) => {
                tracing::debug!(stream_id = %self.id, "First chunk received, streaming response");
                Response::builder()
                    .status(StatusCode::OK)
                    .header(header::CONTENT_TYPE, "text/plain; charset=utf-8")
                    .header(header::CACHE_CONTROL, "no-cache")
                    .header("X-Accel-Buffering", "no")
                    .body(self.into_body(first))
                    .unwrap_or_else(|_| StatusCode::INTERNAL_SERVER_ERROR.into_response())
            }
            RelayEvent::Closed => {
                self.finish();
                StatusCode::OK.into_response()
            }
            RelayEvent::Failed(e) => {
                tracing::error!(stream_id = %self.id, error = %e, "Invocation failed before streaming started");
                self.finish();
                StreamError::Invoke(e).into_response()
            }
            RelayEvent::Cancelled => {
                tracing::info!(stream_id = %self.id, "Stream cancelled before first chunk");
                self.finish();
                StreamError::Cancelled.into_response()
            }
        }
    }

    fn into_body(self, first: Bytes) -> Body {
        let frames = futures_util::stream::unfold((Some(first), self), |(pending, mut relay)| async move {
            let chunk = match pending {
                Some(chunk) => chunk,
                None => match relay.next_event().await {
                    RelayEvent::Chunk(chunk) => chunk,
                    RelayEvent::Closed => {
                        relay.finish();
                        return None;
                    }
                    RelayEvent::Failed(e) => {
                        tracing::warn!(stream_id = %relay.id, error = %e, "Invocation failed mid-stream");
                        relay.finish();
                        return None;
                    }
                    RelayEvent::Cancelled => {
                        tracing::info!(stream_id = %relay.id, "Stream cancelled");
                        relay.finish();
                        return None;
                    }
                },
            };
            let frame = relay.frame(chunk);
            Some((Ok::<_, Infallible>(frame), (None, relay)))
        });

        Body::from_stream(frames)
    }

    fn frame(&mut self, chunk: Bytes) -> Bytes {
        let mut framed = BytesMut::with_capacity(chunk.len() + CHUNK_DELIMITER.len());
        framed.extend_from_slice(&chunk);
        framed.extend_from_slice(CHUNK_DELIMITER);
        self.bytes_sent += framed.len() as u64;
        metrics::record_bytes_relayed(framed.len());
        framed.freeze()
    }

    fn finish(&mut self) {
        self.finished = true;
        self.guard.cancel();
        tracing::debug!(stream_id = %self.id, bytes_sent = self.bytes_sent, "Stream finished");
    }
}

impl Drop for StreamRelay {
    fn drop(&mut self) {
        if !self.finished {
            tracing::info!(
                stream_id = %self.id,
                bytes_sent = self.bytes_sent,
                "HTTP client closed connection"
            );
        }
    }
}
