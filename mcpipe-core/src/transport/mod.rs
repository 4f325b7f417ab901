//! Transport abstraction
//!
//! A transport carries frames, one message per line, to and from the peer.
//! It is split into a writer half, shared by every caller behind a mutex, and
//! a reader half owned by the session's reader task, so a blocked `receive`
//! never holds up a `send`.

use crate::Result;
use async_trait::async_trait;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

pub mod stdio;

pub use stdio::{ServerParameters, StdioTransport};

/// Outgoing half of a transport
#[async_trait]
pub trait FrameWriter: Send {
    /// Write one complete frame.
    ///
    /// The frame is written and flushed before this returns; concurrent
    /// callers must serialize access so frames never interleave.
    async fn send(&mut self, frame: &str) -> Result<()>;

    /// Close the outgoing stream and release the peer (reaping a spawned
    /// process). Safe to call more than once.
    async fn close(&mut self) -> Result<()>;

    /// Check if the writer can still send
    fn is_connected(&self) -> bool;
}

/// Incoming half of a transport
#[async_trait]
pub trait FrameReader: Send {
    /// Wait for the next complete frame.
    ///
    /// Fails with [`crate::Error::ConnectionClosed`] once the peer stream
    /// ends.
    async fn receive(&mut self) -> Result<String>;
}

/// Control over the peer that does not go through the writer
///
/// A send blocked on a peer that stopped reading holds the writer, so
/// teardown needs another way to bring the peer down.
#[async_trait]
pub trait PeerHandle: Send + Sync {
    /// Kill the peer now. Does nothing once it has exited.
    async fn kill(&self) -> Result<()>;
}

/// Transport abstraction
pub trait Transport: Send {
    /// Get the transport type name
    fn transport_type(&self) -> &'static str;

    /// Separate the transport into its writer and reader halves
    fn into_split(self: Box<Self>) -> (Box<dyn FrameWriter>, Box<dyn FrameReader>);

    /// Shared counters for this transport
    fn stats(&self) -> Arc<TransportStats>;

    /// Handle for killing the peer, when the transport owns one
    fn peer_handle(&self) -> Option<Arc<dyn PeerHandle>> {
        None
    }
}

/// Transport statistics, shared by both halves
#[derive(Debug, Default)]
pub struct TransportStats {
    messages_sent: AtomicU64,
    messages_received: AtomicU64,
    bytes_sent: AtomicU64,
    bytes_received: AtomicU64,
}

/// Point-in-time copy of [`TransportStats`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TransportStatsSnapshot {
    /// Number of frames sent
    pub messages_sent: u64,
    /// Number of frames received
    pub messages_received: u64,
    /// Number of bytes sent, including delimiters
    pub bytes_sent: u64,
    /// Number of bytes received, including delimiters
    pub bytes_received: u64,
}

impl TransportStats {
    pub(crate) fn record_sent(&self, bytes: usize) {
        self.messages_sent.fetch_add(1, Ordering::Relaxed);
        self.bytes_sent.fetch_add(bytes as u64, Ordering::Relaxed);
    }

    pub(crate) fn record_received(&self, bytes: usize) {
        self.messages_received.fetch_add(1, Ordering::Relaxed);
        self.bytes_received.fetch_add(bytes as u64, Ordering::Relaxed);
    }

    /// Read all counters
    pub fn snapshot(&self) -> TransportStatsSnapshot {
        TransportStatsSnapshot {
            messages_sent: self.messages_sent.load(Ordering::Relaxed),
            messages_received: self.messages_received.load(Ordering::Relaxed),
            bytes_sent: self.bytes_sent.load(Ordering::Relaxed),
            bytes_received: self.bytes_received.load(Ordering::Relaxed),
        }
    }
}
