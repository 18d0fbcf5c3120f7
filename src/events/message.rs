use std::collections::HashMap;

use bytes::Bytes;
use chrono::{DateTime, Utc};

/// One delivery from the upstream change bus, as handed to the pipeline.
/// Ephemeral: it exists only for the duration of one pipeline pass.
#[derive(Debug, Clone)]
pub struct BusMessage {
    /// Upstream message identity, also the dedup key
    pub key: String,
    /// Raw payload bytes, decoded by the handler's converter
    pub payload: Bytes,
    /// Header mapping carried from the bus record
    pub headers: HashMap<String, Vec<String>>,
    pub timestamp: DateTime<Utc>,
}

impl BusMessage {
    pub fn new(key: impl Into<String>, payload: impl Into<Bytes>) -> Self {
        Self {
            key: key.into(),
            payload: payload.into(),
            headers: HashMap::new(),
            timestamp: Utc::now(),
        }
    }

    pub fn with_headers(mut self, headers: HashMap<String, Vec<String>>) -> Self {
        self.headers = headers;
        self
    }
}

/// A bus message after conversion: same identity and envelope, typed value.
/// Immutable once constructed.
#[derive(Debug, Clone)]
pub struct EventMessage<T> {
    pub key: String,
    pub value: T,
    pub headers: HashMap<String, Vec<String>>,
    pub timestamp: DateTime<Utc>,
}

impl<T> EventMessage<T> {
    pub(crate) fn from_bus(msg: &BusMessage, value: T) -> Self {
        Self {
            key: msg.key.clone(),
            value,
            headers: msg.headers.clone(),
            timestamp: msg.timestamp,
        }
    }
}
