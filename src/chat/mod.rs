//! Chat business model and stream identity.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::registry::Metadata;

/// A chat message as persisted and relayed to subscribers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub message_id: String,
    pub content: String,
    pub created_at: DateTime<Utc>,

    #[serde(flatten)]
    pub metadata: ChatMetadata,
}

/// Routing information for chat messages, reused as WebSocket subscription
/// metadata. Subscription endpoints receive these as query parameters because
/// WebSocket upgrade requests cannot carry a body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMetadata {
    pub stream_id: String,
    pub sender_id: String,
    pub receiver_id: String,
}

impl ChatMetadata {
    pub fn to_connection_metadata(&self) -> Metadata {
        let mut metadata = Metadata::new();
        metadata.insert("stream_id".to_string(), vec![self.stream_id.clone()]);
        metadata.insert("sender_id".to_string(), vec![self.sender_id.clone()]);
        metadata.insert("receiver_id".to_string(), vec![self.receiver_id.clone()]);
        metadata
    }
}

/// Deterministic stream id for a conversation between two users. The result
/// is the same regardless of argument order, so both participants always
/// compute the same id.
pub fn compute_stream_id(user_id_1: &str, user_id_2: &str) -> String {
    let (first, second) = if user_id_1 <= user_id_2 {
        (user_id_1, user_id_2)
    } else {
        (user_id_2, user_id_1)
    };

    let mut hasher = Sha256::new();
    hasher.update(first.as_bytes());
    hasher.update(second.as_bytes());
    let digest = format!("{:x}", hasher.finalize());

    digest[..16].to_string()
}
