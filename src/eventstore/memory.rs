//! In-memory idempotency store for tests and single-process development.

use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use tokio::time::Instant;

use super::{EventStore, EventStoreError};

/// TTL-aware in-memory dedup store. Entries are checked lazily on read, so
/// expiry needs no background task. Uses `tokio::time::Instant`, which
/// respects paused test clocks.
pub struct MemoryEventStore {
    records: DashMap<String, Instant>,
    ttl: Duration,
}

impl MemoryEventStore {
    pub fn new(ttl: Duration) -> Self {
        Self {
            records: DashMap::new(),
            ttl,
        }
    }

    /// Whether a live (unexpired) record exists for `key`.
    pub fn contains(&self, key: &str) -> bool {
        self.records
            .get(key)
            .map(|expiry| Instant::now() < *expiry)
            .unwrap_or(false)
    }
}

#[async_trait]
impl EventStore for MemoryEventStore {
    async fn should_drop(&self, key: &str) -> bool {
        if let Some(expiry) = self.records.get(key) {
            if Instant::now() < *expiry {
                return true;
            }
        }
        self.records.remove_if(key, |_, expiry| Instant::now() >= *expiry);
        false
    }

    async fn commit(&self, key: &str) -> Result<(), EventStoreError> {
        self.records.insert(key.to_string(), Instant::now() + self.ttl);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn commit_then_drop() {
        let store = MemoryEventStore::new(Duration::from_secs(60));
        assert!(!store.should_drop("m1").await);
        store.commit("m1").await.unwrap();
        assert!(store.should_drop("m1").await);
        // Other keys are unaffected
        assert!(!store.should_drop("m2").await);
    }

    #[tokio::test(start_paused = true)]
    async fn records_expire_after_the_ttl() {
        let store = MemoryEventStore::new(Duration::from_secs(60));
        store.commit("m1").await.unwrap();
        assert!(store.should_drop("m1").await);

        tokio::time::advance(Duration::from_secs(61)).await;
        assert!(!store.should_drop("m1").await);
    }

    #[tokio::test]
    async fn duplicate_commits_are_idempotent() {
        let store = MemoryEventStore::new(Duration::from_secs(60));
        store.commit("m1").await.unwrap();
        store.commit("m1").await.unwrap();
        assert!(store.should_drop("m1").await);
    }
}
