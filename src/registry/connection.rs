//! A single live client session: serialized writes plus a one-shot close
//! signal that any number of waiters can observe.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use bytes::Bytes;
use chrono::{DateTime, Utc};
use tokio::sync::{watch, Mutex};
use uuid::Uuid;

use crate::transport::{Frame, TransportError, TransportSink};

/// Connection metadata for logging and identification. Ordered so diagnostic
/// output renders deterministically.
pub type Metadata = BTreeMap<String, Vec<String>>;

/// One-shot close notification. Fires at most once; every waiter past and
/// future observes the fired state.
pub(crate) struct CloseSignal {
    fired: AtomicBool,
    tx: watch::Sender<bool>,
}

impl CloseSignal {
    fn new() -> Self {
        let (tx, _) = watch::channel(false);
        Self {
            fired: AtomicBool::new(false),
            tx,
        }
    }

    /// Returns true only for the caller that actually fired the signal.
    fn fire(&self) -> bool {
        if self.fired.swap(true, Ordering::SeqCst) {
            return false;
        }
        let _ = self.tx.send(true);
        true
    }

    fn is_fired(&self) -> bool {
        self.fired.load(Ordering::SeqCst)
    }

    async fn wait(&self) {
        let mut rx = self.tx.subscribe();
        if *rx.borrow() {
            return;
        }
        while rx.changed().await.is_ok() {
            if *rx.borrow() {
                return;
            }
        }
    }
}

pub struct Connection {
    pub id: Uuid,
    pub metadata: Metadata,
    pub connected_at: DateTime<Utc>,
    writer: Mutex<Box<dyn TransportSink>>,
    write_wait: Duration,
    close: CloseSignal,
}

impl Connection {
    pub(crate) fn new(metadata: Metadata, sink: Box<dyn TransportSink>, write_wait: Duration) -> Self {
        Self {
            id: Uuid::new_v4(),
            metadata,
            connected_at: Utc::now(),
            writer: Mutex::new(sink),
            write_wait,
            close: CloseSignal::new(),
        }
    }

    /// Send an application payload. Writes across callers are serialized;
    /// a closed connection refuses the write outright.
    pub async fn send(&self, payload: Bytes) -> Result<(), TransportError> {
        self.send_frame(Frame::Text(payload)).await
    }

    pub(crate) async fn send_frame(&self, frame: Frame) -> Result<(), TransportError> {
        if self.close.is_fired() {
            return Err(TransportError::Closed);
        }

        let mut writer = self.writer.lock().await;
        match tokio::time::timeout(self.write_wait, writer.send(frame)).await {
            Ok(result) => result,
            Err(_) => Err(TransportError::WriteTimeout(self.write_wait)),
        }
    }

    /// Close the connection and release the transport. Idempotent: the close
    /// signal fires exactly once no matter how many callers race here.
    pub async fn close(&self) {
        if !self.close.fire() {
            return;
        }
        let mut writer = self.writer.lock().await;
        writer.close().await;
    }

    pub fn is_closed(&self) -> bool {
        self.close.is_fired()
    }

    /// Resolve once the connection has closed. Safe to call from any number
    /// of tasks, before or after the close actually happens.
    pub async fn closed(&self) {
        self.close.wait().await
    }

    /// Metadata rendered for log fields and failure reports.
    pub fn metadata_label(&self) -> String {
        serde_json::to_string(&self.metadata).unwrap_or_else(|_| "{}".to_string())
    }
}
