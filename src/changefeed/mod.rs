//! Change-data-capture envelope for chat persistence events, and the
//! message handler that dispatches them.
//!
//! The envelope is the Debezium change-stream output format: an operation
//! code plus optional before/after states, each an embedded encoded document
//! of the business entity.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::chat::ChatMessage;
use crate::events::{ConvertError, EventMessage, MessageHandler};
use crate::forwarding::ChatForwarder;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChangeKind {
    #[serde(rename = "c")]
    Create,
    #[serde(rename = "u")]
    Update,
    #[serde(rename = "d")]
    Delete,
}

impl ChangeKind {
    pub fn as_label(&self) -> &'static str {
        match self {
            ChangeKind::Create => "c",
            ChangeKind::Update => "u",
            ChangeKind::Delete => "d",
        }
    }
}

/// Raw change envelope as it arrives on the bus.
#[derive(Debug, Deserialize)]
pub struct RawChangePayload {
    pub before: Option<String>,
    pub after: Option<String>,
    #[serde(rename = "op")]
    pub kind: ChangeKind,
    #[serde(rename = "ts_ms", default)]
    pub timestamp_ms: i64,
}

/// A decoded chat persistence change.
#[derive(Debug, Clone)]
pub struct ChatChangeEvent {
    pub kind: ChangeKind,
    pub message: ChatMessage,
}

/// Handler for chat persistence change events.
///
/// Creates are forwarded to the WebSocket relay and notification services;
/// updates and deletes are accepted but not acted on yet.
pub struct ChatChangeHandler {
    forwarder: Arc<dyn ChatForwarder>,
}

impl ChatChangeHandler {
    pub fn new(forwarder: Arc<dyn ChatForwarder>) -> Self {
        Self { forwarder }
    }
}

#[async_trait]
impl MessageHandler for ChatChangeHandler {
    type Value = ChatChangeEvent;

    fn convert(&self, raw: &[u8]) -> Result<ChatChangeEvent, ConvertError> {
        let payload: RawChangePayload = serde_json::from_slice(raw)?;

        // The change stream emits the full document in "after"; an envelope
        // without it carries nothing we can relay.
        let after = payload.after.ok_or(ConvertError::MissingField("after"))?;
        let message: ChatMessage = serde_json::from_str(&after)?;

        Ok(ChatChangeEvent {
            kind: payload.kind,
            message,
        })
    }

    fn event_kind(&self, msg: &EventMessage<ChatChangeEvent>) -> String {
        msg.value.kind.as_label().to_string()
    }

    async fn handle(&self, msg: &EventMessage<ChatChangeEvent>) -> anyhow::Result<()> {
        match msg.value.kind {
            ChangeKind::Create => {
                self.forwarder.forward(&msg.value.message).await?;
                Ok(())
            }
            // Message update and delete can be supported here accordingly
            ChangeKind::Update | ChangeKind::Delete => Ok(()),
        }
    }
}
