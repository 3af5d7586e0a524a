//! Rendezvous handoff between the connection reader and the response writer.
//!
//! A send completes only once the consumer has taken the chunk, so at most
//! one chunk is ever in flight and a slow HTTP client throttles the TCP read
//! loop instead of growing a buffer.
//!
//! The queue closes when the sender is dropped. The reader owns the only
//! sender, so "closed" is the single end-of-stream signal and can only
//! happen once.

use bytes::Bytes;
use tokio::sync::{mpsc, oneshot};

/// A chunk plus the acknowledgement the consumer fires on receipt.
type Handoff = (Bytes, oneshot::Sender<()>);

/// Create a connected sender/receiver pair.
pub fn handoff() -> (ChunkSender, ChunkReceiver) {
    let (tx, rx) = mpsc::channel(1);
    (ChunkSender { tx }, ChunkReceiver { rx })
}

/// Producer half, owned by the connection reader.
#[derive(Debug)]
pub struct ChunkSender {
    tx: mpsc::Sender<Handoff>,
}

/// The consumer went away before the chunk was taken.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("handoff queue receiver dropped")]
pub struct ReceiverGone;

impl ChunkSender {
    /// Hand one chunk to the consumer and wait until it has been taken.
    pub async fn send(&self, chunk: Bytes) -> Result<(), ReceiverGone> {
        let (ack, taken) = oneshot::channel();
        self.tx.send((chunk, ack)).await.map_err(|_| ReceiverGone)?;
        taken.await.map_err(|_| ReceiverGone)
    }
}

/// Consumer half, owned by the response writer.
#[derive(Debug)]
pub struct ChunkReceiver {
    rx: mpsc::Receiver<Handoff>,
}

impl ChunkReceiver {
    /// Next chunk, or `None` once the reader has stopped.
    ///
    /// Cancel-safe: the producer is released in the same poll that yields
    /// the chunk.
    pub async fn recv(&mut self) -> Option<Bytes> {
        let (chunk, ack) = self.rx.recv().await?;
        let _ = ack.send(());
        Some(chunk)
    }
}
