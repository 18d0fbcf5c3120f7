//! Concurrent fan-out of one payload to every connection under a key.

use bytes::Bytes;
use uuid::Uuid;

use crate::concurrent;
use crate::metrics::{BROADCASTS_TOTAL, BROADCAST_DELIVERED_TOTAL, BROADCAST_FAILED_TOTAL};
use crate::transport::TransportError;

use super::registry::ConnectionRegistry;

/// One connection that did not receive the payload.
#[derive(Debug)]
pub struct SendFailure {
    pub connection_id: Uuid,
    pub metadata: String,
    pub error: TransportError,
}

/// Aggregate result of a partially or fully failed broadcast.
#[derive(Debug, thiserror::Error)]
#[error("failed to deliver to {} of {} connections", .failures.len(), .total)]
pub struct BroadcastError {
    /// Connections that were targeted
    pub total: usize,
    /// Connections that did not receive the payload, with reasons
    pub failures: Vec<SendFailure>,
}

impl ConnectionRegistry {
    /// Write `payload` to every connection under `key` concurrently.
    ///
    /// Returns the number of connections that received the payload and, when
    /// at least one write failed, an aggregate error describing the rest.
    /// Zero subscribers is not an error: `(0, None)`.
    ///
    /// Writes to different connections run in parallel with no ordering
    /// between them; writes to the same connection stay serialized through
    /// its write lock.
    pub async fn broadcast(&self, key: &str, payload: Bytes) -> (usize, Option<BroadcastError>) {
        let conns = self.connections_for(key);
        if conns.is_empty() {
            tracing::debug!(key = %key, "no connections found for key");
            return (0, None);
        }

        BROADCASTS_TOTAL.inc();
        let total = conns.len();

        let outcomes = concurrent::run_all(conns.into_iter().map(|conn| {
            let payload = payload.clone();
            async move {
                conn.send(payload).await.map_err(|error| SendFailure {
                    connection_id: conn.id,
                    metadata: conn.metadata_label(),
                    error,
                })
            }
        }))
        .await;

        let failures: Vec<SendFailure> = outcomes.into_iter().filter_map(Result::err).collect();
        let delivered = total - failures.len();
        BROADCAST_DELIVERED_TOTAL.inc_by(delivered as u64);

        if failures.is_empty() {
            return (delivered, None);
        }

        BROADCAST_FAILED_TOTAL.inc_by(failures.len() as u64);
        tracing::warn!(
            key = %key,
            delivered = delivered,
            failed = failures.len(),
            "broadcast delivered to only part of its subscribers"
        );
        (delivered, Some(BroadcastError { total, failures }))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::config::WebSocketConfig;
    use crate::registry::Metadata;
    use crate::transport::{memory, Frame};

    fn test_registry() -> Arc<ConnectionRegistry> {
        Arc::new(ConnectionRegistry::new(WebSocketConfig {
            ping_interval: 30,
            pong_wait: 40,
            write_wait: 1,
        }))
    }

    #[tokio::test]
    async fn zero_subscribers_is_success_with_zero_delivered() {
        let registry = test_registry();
        let (delivered, err) = registry.broadcast("nobody", Bytes::from_static(b"x")).await;
        assert_eq!(delivered, 0);
        assert!(err.is_none());
    }

    #[tokio::test]
    async fn delivers_to_every_subscriber_of_the_key() {
        let registry = test_registry();

        let (sink_a, stream_a, mut remote_a) = memory::pair();
        let (sink_b, stream_b, mut remote_b) = memory::pair();
        registry.register("k1", Metadata::new(), Box::new(sink_a), Box::new(stream_a));
        registry.register("k1", Metadata::new(), Box::new(sink_b), Box::new(stream_b));

        let (delivered, err) = registry.broadcast("k1", Bytes::from_static(b"hello")).await;

        assert_eq!(delivered, 2);
        assert!(err.is_none());
        assert_eq!(
            remote_a.next_sent().await,
            Some(Frame::Text(Bytes::from_static(b"hello")))
        );
        assert_eq!(
            remote_b.next_sent().await,
            Some(Frame::Text(Bytes::from_static(b"hello")))
        );
    }

    #[tokio::test]
    async fn partial_failure_reports_delivered_count_and_error() {
        let registry = test_registry();

        let (sink_a, stream_a, remote_a) = memory::pair();
        let (sink_b, stream_b, mut remote_b) = memory::pair();
        let conn_a = registry.register("k1", Metadata::new(), Box::new(sink_a), Box::new(stream_a));
        registry.register("k1", Metadata::new(), Box::new(sink_b), Box::new(stream_b));

        remote_a.fail_writes();

        let (delivered, err) = registry.broadcast("k1", Bytes::from_static(b"hello")).await;

        assert_eq!(delivered, 1);
        let err = err.expect("one failed write should surface an error");
        assert_eq!(err.total, 2);
        assert_eq!(err.failures.len(), 1);
        assert_eq!(err.failures[0].connection_id, conn_a.id);
        assert_eq!(
            remote_b.next_sent().await,
            Some(Frame::Text(Bytes::from_static(b"hello")))
        );
    }

    #[tokio::test]
    async fn total_failure_reports_zero_delivered() {
        let registry = test_registry();

        let (sink, stream, remote) = memory::pair();
        registry.register("k1", Metadata::new(), Box::new(sink), Box::new(stream));
        remote.fail_writes();

        let (delivered, err) = registry.broadcast("k1", Bytes::from_static(b"hello")).await;

        assert_eq!(delivered, 0);
        assert!(err.is_some());
    }
}
