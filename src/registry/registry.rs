use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;

use crate::config::WebSocketConfig;
use crate::metrics::CONNECTIONS_ACTIVE;
use crate::transport::{Frame, TransportSink, TransportStream};

use super::connection::{Connection, Metadata};

/// Keyed multi-map of live connections.
///
/// The grouping key is the logical subscription (stream id, room id, user
/// id). Multiple connections may share a key for multi-device fan-out. List
/// mutation goes through DashMap's entry API so concurrent registrations
/// under the same key never lose each other.
pub struct ConnectionRegistry {
    connections: DashMap<String, Vec<Arc<Connection>>>,
    config: WebSocketConfig,
}

impl ConnectionRegistry {
    pub fn new(config: WebSocketConfig) -> Self {
        Self {
            connections: DashMap::new(),
            config,
        }
    }

    /// Register a new connection under `key` and start its liveness
    /// supervision. Returns immediately; the read loop and ping timer run as
    /// background tasks owned by the connection.
    pub fn register(
        self: &Arc<Self>,
        key: &str,
        metadata: Metadata,
        sink: Box<dyn TransportSink>,
        stream: Box<dyn TransportStream>,
    ) -> Arc<Connection> {
        let conn = Arc::new(Connection::new(metadata, sink, self.config.write_wait()));

        self.connections
            .entry(key.to_string())
            .or_default()
            .push(conn.clone());
        CONNECTIONS_ACTIVE.inc();

        tracing::info!(
            key = %key,
            connection_id = %conn.id,
            metadata = %conn.metadata_label(),
            connected_at = %conn.connected_at,
            "WebSocket connection registered"
        );

        tokio::spawn(Self::read_loop(
            self.clone(),
            key.to_string(),
            conn.clone(),
            stream,
            self.config.pong_wait(),
        ));
        tokio::spawn(Self::ping_loop(conn.clone(), self.config.ping_interval()));

        conn
    }

    /// Remove and close every connection under `key` matching the predicate.
    /// The key itself is removed once its list is empty.
    pub async fn unregister<P>(&self, key: &str, predicate: P)
    where
        P: Fn(&Connection) -> bool,
    {
        let removed = {
            let Some(mut entry) = self.connections.get_mut(key) else {
                return;
            };
            let (matched, kept): (Vec<_>, Vec<_>) =
                entry.drain(..).partition(|c| predicate(c.as_ref()));
            *entry.value_mut() = kept;
            matched
        };
        self.connections.remove_if(key, |_, conns| conns.is_empty());

        for conn in removed {
            conn.close().await;
            tracing::info!(
                key = %key,
                connection_id = %conn.id,
                metadata = %conn.metadata_label(),
                "WebSocket connection unregistered"
            );
        }
    }

    /// Send a close frame to every connection across every key, close them
    /// all, and clear the registry. Used only at process shutdown.
    pub async fn close_all(&self, code: u16, reason: &str) {
        tracing::info!(code = code, reason = %reason, "closing all WebSocket connections");

        let all: Vec<Arc<Connection>> = self
            .connections
            .iter()
            .flat_map(|entry| entry.value().clone())
            .collect();
        self.connections.clear();

        for conn in all {
            let _ = conn
                .send_frame(Frame::Close {
                    code,
                    reason: reason.to_string(),
                })
                .await;
            conn.close().await;
        }
    }

    /// Number of live connections currently registered under `key`.
    pub fn subscriber_count(&self, key: &str) -> usize {
        self.connections
            .get(key)
            .map(|entry| entry.len())
            .unwrap_or(0)
    }

    pub(super) fn connections_for(&self, key: &str) -> Vec<Arc<Connection>> {
        self.connections
            .get(key)
            .map(|entry| entry.value().clone())
            .unwrap_or_default()
    }

    /// Drop closed connections from the key's list, removing the key when the
    /// list empties.
    fn prune_closed(&self, key: &str) {
        if let Some(mut entry) = self.connections.get_mut(key) {
            entry.retain(|c| !c.is_closed());
        }
        self.connections.remove_if(key, |_, conns| conns.is_empty());
    }

    /// Read loop for one connection. Any read error means the remote is gone;
    /// a silent transport trips the read deadline. Every inbound frame resets
    /// the deadline. The loop owns connection teardown: whichever way it
    /// exits, the connection ends up closed and pruned from the registry.
    async fn read_loop(
        registry: Arc<Self>,
        key: String,
        conn: Arc<Connection>,
        mut stream: Box<dyn TransportStream>,
        pong_wait: Duration,
    ) {
        loop {
            tokio::select! {
                _ = conn.closed() => break,
                read = tokio::time::timeout(pong_wait, stream.next_frame()) => {
                    match read {
                        Err(_) => {
                            tracing::info!(
                                connection_id = %conn.id,
                                metadata = %conn.metadata_label(),
                                pong_wait = ?pong_wait,
                                "read deadline elapsed, closing connection"
                            );
                            break;
                        }
                        Ok(Err(err)) => {
                            tracing::info!(
                                connection_id = %conn.id,
                                metadata = %conn.metadata_label(),
                                error = %err,
                                "WebSocket read error, closing connection"
                            );
                            break;
                        }
                        Ok(Ok(Frame::Close { code, reason })) => {
                            tracing::debug!(
                                connection_id = %conn.id,
                                code = code,
                                reason = %reason,
                                "received close frame"
                            );
                            break;
                        }
                        Ok(Ok(_)) => {}
                    }
                }
            }
        }

        conn.close().await;
        registry.prune_closed(&key);
        CONNECTIONS_ACTIVE.dec();
    }

    /// Ping timer for one connection. A failed ping write means the
    /// connection is dead.
    async fn ping_loop(conn: Arc<Connection>, ping_interval: Duration) {
        let mut ticker = tokio::time::interval(ping_interval);
        // Skip immediate first tick
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = conn.closed() => return,
                _ = ticker.tick() => {
                    if let Err(err) = conn.send_frame(Frame::Ping).await {
                        tracing::info!(
                            connection_id = %conn.id,
                            metadata = %conn.metadata_label(),
                            error = %err,
                            "failed to send ping, closing connection"
                        );
                        conn.close().await;
                        return;
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::memory;
    use bytes::Bytes;

    fn test_config() -> WebSocketConfig {
        WebSocketConfig {
            ping_interval: 30,
            pong_wait: 40,
            write_wait: 1,
        }
    }

    fn metadata(sender: &str) -> Metadata {
        let mut m = Metadata::new();
        m.insert("sender_id".to_string(), vec![sender.to_string()]);
        m
    }

    #[tokio::test]
    async fn register_appends_under_the_key() {
        let registry = Arc::new(ConnectionRegistry::new(test_config()));

        let (sink_a, stream_a, _remote_a) = memory::pair();
        let (sink_b, stream_b, _remote_b) = memory::pair();
        registry.register("k1", metadata("a"), Box::new(sink_a), Box::new(stream_a));
        registry.register("k1", metadata("b"), Box::new(sink_b), Box::new(stream_b));

        assert_eq!(registry.subscriber_count("k1"), 2);
        assert_eq!(registry.subscriber_count("other"), 0);
    }

    #[tokio::test]
    async fn unregister_by_predicate_removes_and_closes() {
        let registry = Arc::new(ConnectionRegistry::new(test_config()));

        let (sink_a, stream_a, _remote_a) = memory::pair();
        let (sink_b, stream_b, _remote_b) = memory::pair();
        let conn_a = registry.register("k1", metadata("a"), Box::new(sink_a), Box::new(stream_a));
        let conn_b = registry.register("k1", metadata("b"), Box::new(sink_b), Box::new(stream_b));

        let target = conn_a.id;
        registry.unregister("k1", |c| c.id == target).await;

        assert!(conn_a.is_closed());
        assert!(!conn_b.is_closed());
        assert_eq!(registry.subscriber_count("k1"), 1);
    }

    #[tokio::test]
    async fn unregister_last_connection_removes_the_key() {
        let registry = Arc::new(ConnectionRegistry::new(test_config()));

        let (sink, stream, _remote) = memory::pair();
        registry.register("k1", metadata("a"), Box::new(sink), Box::new(stream));

        registry.unregister("k1", |_| true).await;

        assert_eq!(registry.subscriber_count("k1"), 0);
        assert!(registry.connections.get("k1").is_none());
    }

    #[tokio::test]
    async fn close_all_clears_the_registry_and_sends_close_frames() {
        let registry = Arc::new(ConnectionRegistry::new(test_config()));

        let (sink, stream, mut remote) = memory::pair();
        let conn = registry.register("k1", metadata("a"), Box::new(sink), Box::new(stream));

        registry.close_all(1001, "shutting down").await;

        assert!(conn.is_closed());
        assert!(registry.connections.is_empty());
        assert_eq!(
            remote.next_sent().await,
            Some(Frame::Close {
                code: 1001,
                reason: "shutting down".to_string()
            })
        );
    }

    #[tokio::test]
    async fn remote_disconnect_prunes_the_connection() {
        let registry = Arc::new(ConnectionRegistry::new(test_config()));

        let (sink, stream, remote) = memory::pair();
        let conn = registry.register("k1", metadata("a"), Box::new(sink), Box::new(stream));

        remote.disconnect();
        conn.closed().await;

        // The read loop prunes after closing; give it a beat to finish
        tokio::time::timeout(std::time::Duration::from_secs(1), async {
            while registry.subscriber_count("k1") > 0 {
                tokio::time::sleep(std::time::Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("closed connection should be pruned");
    }

    #[tokio::test]
    async fn send_on_registered_connection_reaches_remote() {
        let registry = Arc::new(ConnectionRegistry::new(test_config()));

        let (sink, stream, mut remote) = memory::pair();
        let conn = registry.register("k1", metadata("a"), Box::new(sink), Box::new(stream));

        conn.send(Bytes::from_static(b"payload")).await.unwrap();
        assert_eq!(
            remote.next_sent().await,
            Some(Frame::Text(Bytes::from_static(b"payload")))
        );
    }
}
