//! Transport seam between the connection registry and the wire.
//!
//! The registry owns liveness supervision and write serialization; it only
//! needs a frame-level sink/stream pair. The axum WebSocket adapter lives in
//! `crate::websocket`; tests inject in-memory implementations.

pub mod memory;

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;

/// A single frame on the wire.
#[derive(Debug, Clone, PartialEq)]
pub enum Frame {
    /// Application payload
    Text(Bytes),
    /// Liveness probe sent by the server
    Ping,
    /// Liveness reply from the client
    Pong,
    /// Close control frame
    Close { code: u16, reason: String },
}

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("transport is closed")]
    Closed,

    #[error("write did not complete within {0:?}")]
    WriteTimeout(Duration),

    #[error("transport error: {0}")]
    Io(String),
}

/// Write half of a transport. One sink exists per connection and all writes
/// to it are serialized by the owning [`crate::registry::Connection`].
#[async_trait]
pub trait TransportSink: Send {
    async fn send(&mut self, frame: Frame) -> Result<(), TransportError>;

    /// Release the underlying transport. Must be safe to call more than once.
    async fn close(&mut self);
}

/// Read half of a transport.
#[async_trait]
pub trait TransportStream: Send {
    /// Wait for the next inbound frame. Returns an error when the remote is
    /// gone or the transport has been released.
    async fn next_frame(&mut self) -> Result<Frame, TransportError>;
}
