//! TTL-bounded idempotency store for bus-delivered events.
//!
//! A record's presence means "already successfully processed". The guarantee
//! is approximate: records expire after the configured retention window, so
//! a redelivery outside the window is processed again.

mod memory;
mod redis_store;

use async_trait::async_trait;

pub use memory::MemoryEventStore;
pub use redis_store::RedisEventStore;

#[derive(Debug, thiserror::Error)]
pub enum EventStoreError {
    #[error("redis error: {0}")]
    Redis(#[from] redis::RedisError),
}

#[async_trait]
pub trait EventStore: Send + Sync {
    /// Whether `key` was already processed within the retention window.
    ///
    /// Fails open: a backend error is treated as "not a duplicate" so a
    /// broken store never silently drops legitimate events.
    async fn should_drop(&self, key: &str) -> bool;

    /// Record `key` as processed. Called only after the business handler has
    /// succeeded. Concurrent commits for the same key are harmless.
    async fn commit(&self, key: &str) -> Result<(), EventStoreError>;
}

/// Store that never drops and never records. Used when deduplication is not
/// wired up for a pipeline.
pub struct NoOpEventStore;

#[async_trait]
impl EventStore for NoOpEventStore {
    async fn should_drop(&self, _key: &str) -> bool {
        false
    }

    async fn commit(&self, _key: &str) -> Result<(), EventStoreError> {
        Ok(())
    }
}

/// Dedup record key: `eventstore:<namespace>:<message identity>`.
pub(crate) fn record_key(prefix: &str, key: &str) -> String {
    format!("eventstore:{}:{}", prefix, key)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn noop_store_never_drops() {
        let store = NoOpEventStore;
        assert!(!store.should_drop("m1").await);
        store.commit("m1").await.unwrap();
        assert!(!store.should_drop("m1").await);
    }

    #[test]
    fn record_key_format() {
        assert_eq!(record_key("chat-messages", "m1:s1"), "eventstore:chat-messages:m1:s1");
    }
}
