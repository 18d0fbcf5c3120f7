//! Redis-backed idempotency store.

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;

use crate::config::EventStoreConfig;

use super::{record_key, EventStore, EventStoreError};

/// Dedup store backed by Redis `SET ... EX` presence markers. The backing
/// state is shared across every pipeline instance in the fleet; two instances
/// may race between check and commit for the same identity.
pub struct RedisEventStore {
    connection: ConnectionManager,
    config: EventStoreConfig,
}

impl RedisEventStore {
    pub fn new(connection: ConnectionManager, config: EventStoreConfig) -> Self {
        Self { connection, config }
    }

    /// Open a managed connection to the given Redis URL.
    pub async fn connect(url: &str, config: EventStoreConfig) -> Result<Self, EventStoreError> {
        let client = redis::Client::open(url)?;
        let connection = ConnectionManager::new(client).await?;
        Ok(Self::new(connection, config))
    }

    fn key(&self, key: &str) -> String {
        record_key(&self.config.key_prefix, key)
    }
}

#[async_trait]
impl EventStore for RedisEventStore {
    async fn should_drop(&self, key: &str) -> bool {
        let record = self.key(key);
        let mut conn = self.connection.clone();

        match conn.exists::<_, bool>(&record).await {
            Ok(exists) => exists,
            Err(err) => {
                // On error, allow processing rather than dropping the event
                tracing::error!(
                    key = %record,
                    error = %err,
                    "failed to check deduplication key in Redis"
                );
                false
            }
        }
    }

    async fn commit(&self, key: &str) -> Result<(), EventStoreError> {
        let record = self.key(key);
        let mut conn = self.connection.clone();

        conn.set_ex::<_, _, ()>(&record, "1", self.config.dedup_ttl_seconds)
            .await?;
        Ok(())
    }
}
