//! In-memory transport, the test/dev counterpart of the axum adapter.
//!
//! The remote end exposes what the server wrote, injects inbound frames, and
//! can flip writes into failure to exercise partial-delivery paths.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::mpsc;

use super::{Frame, TransportError, TransportSink, TransportStream};

/// Create a connected transport pair: the sink/stream halves handed to the
/// registry, and the remote end held by the test or tool.
pub fn pair() -> (InMemorySink, InMemoryStream, RemoteEnd) {
    let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
    let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();
    let fail_writes = Arc::new(AtomicBool::new(false));

    let sink = InMemorySink {
        outbound: outbound_tx,
        fail_writes: fail_writes.clone(),
        closed: false,
    };
    let stream = InMemoryStream {
        inbound: inbound_rx,
    };
    let remote = RemoteEnd {
        outbound: outbound_rx,
        inbound: inbound_tx,
        fail_writes,
    };

    (sink, stream, remote)
}

pub struct InMemorySink {
    outbound: mpsc::UnboundedSender<Frame>,
    fail_writes: Arc<AtomicBool>,
    closed: bool,
}

#[async_trait]
impl TransportSink for InMemorySink {
    async fn send(&mut self, frame: Frame) -> Result<(), TransportError> {
        if self.closed {
            return Err(TransportError::Closed);
        }
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(TransportError::Io("injected write failure".to_string()));
        }
        self.outbound
            .send(frame)
            .map_err(|_| TransportError::Closed)
    }

    async fn close(&mut self) {
        self.closed = true;
    }
}

pub struct InMemoryStream {
    inbound: mpsc::UnboundedReceiver<Frame>,
}

#[async_trait]
impl TransportStream for InMemoryStream {
    async fn next_frame(&mut self) -> Result<Frame, TransportError> {
        self.inbound.recv().await.ok_or(TransportError::Closed)
    }
}

/// The far side of an in-memory transport.
pub struct RemoteEnd {
    outbound: mpsc::UnboundedReceiver<Frame>,
    inbound: mpsc::UnboundedSender<Frame>,
    fail_writes: Arc<AtomicBool>,
}

impl RemoteEnd {
    /// Next frame the server wrote, or `None` once the sink is gone.
    pub async fn next_sent(&mut self) -> Option<Frame> {
        self.outbound.recv().await
    }

    /// Non-blocking variant of [`next_sent`](Self::next_sent).
    pub fn try_next_sent(&mut self) -> Option<Frame> {
        self.outbound.try_recv().ok()
    }

    /// Inject an inbound frame as if the client had sent it.
    pub fn inject(&self, frame: Frame) {
        let _ = self.inbound.send(frame);
    }

    /// Make every subsequent server write fail.
    pub fn fail_writes(&self) {
        self.fail_writes.store(true, Ordering::SeqCst);
    }

    /// Simulate the client going away: the read loop sees a transport error.
    pub fn disconnect(self) {
        drop(self.inbound);
    }
}
