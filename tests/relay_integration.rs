//! End-to-end exercises of the connection registry over the in-memory
//! transport: fan-out, partial failure, lifecycle, and liveness.

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;

use chat_relay_service::config::WebSocketConfig;
use chat_relay_service::registry::{ConnectionRegistry, Metadata};
use chat_relay_service::transport::memory::{pair, RemoteEnd};
use chat_relay_service::transport::Frame;

fn test_config() -> WebSocketConfig {
    WebSocketConfig {
        ping_interval: 30,
        pong_wait: 40,
        write_wait: 10,
    }
}

fn subscribe(registry: &Arc<ConnectionRegistry>, key: &str) -> RemoteEnd {
    let (sink, stream, remote) = pair();
    registry.register(key, Metadata::new(), Box::new(sink), Box::new(stream));
    remote
}

fn text_of(frame: Frame) -> Bytes {
    match frame {
        Frame::Text(data) => data,
        other => panic!("expected text frame, got {other:?}"),
    }
}

#[tokio::test]
async fn broadcast_reaches_every_subscriber_of_the_key() {
    let registry = Arc::new(ConnectionRegistry::new(test_config()));
    let mut a = subscribe(&registry, "k1");
    let mut b = subscribe(&registry, "k1");
    let mut other = subscribe(&registry, "k2");

    let (delivered, failure) = registry.broadcast("k1", Bytes::from_static(b"hello")).await;

    assert_eq!(delivered, 2);
    assert!(failure.is_none());
    assert_eq!(text_of(a.next_sent().await.unwrap()), "hello");
    assert_eq!(text_of(b.next_sent().await.unwrap()), "hello");
    assert!(other.try_next_sent().is_none());
}

#[tokio::test]
async fn broadcast_to_an_unknown_key_is_a_clean_no_op() {
    let registry = Arc::new(ConnectionRegistry::new(test_config()));

    let (delivered, failure) = registry.broadcast("nobody", Bytes::from_static(b"x")).await;

    assert_eq!(delivered, 0);
    assert!(failure.is_none());
}

#[tokio::test]
async fn one_failing_subscriber_does_not_block_the_rest() {
    let registry = Arc::new(ConnectionRegistry::new(test_config()));
    let a = subscribe(&registry, "k1");
    let mut b = subscribe(&registry, "k1");

    a.fail_writes();

    let (delivered, failure) = registry.broadcast("k1", Bytes::from_static(b"hello")).await;

    assert_eq!(delivered, 1);
    let err = failure.expect("partial failure should be reported");
    assert_eq!(err.total, 2);
    assert_eq!(err.failures.len(), 1);
    assert_eq!(text_of(b.next_sent().await.unwrap()), "hello");
}

#[tokio::test]
async fn unregistered_connections_stop_receiving() {
    let registry = Arc::new(ConnectionRegistry::new(test_config()));
    let mut a = subscribe(&registry, "k1");

    assert_eq!(registry.subscriber_count("k1"), 1);
    registry.unregister("k1", |_| true).await;
    assert_eq!(registry.subscriber_count("k1"), 0);

    let (delivered, _) = registry.broadcast("k1", Bytes::from_static(b"late")).await;
    assert_eq!(delivered, 0);

    assert!(a.try_next_sent().is_none(), "nothing reaches a removed connection");
}

#[tokio::test]
async fn silent_connections_are_reaped_after_the_pong_deadline() {
    let config = WebSocketConfig {
        ping_interval: 30,
        pong_wait: 1,
        write_wait: 10,
    };
    let registry = Arc::new(ConnectionRegistry::new(config));
    let _remote = subscribe(&registry, "k1");

    assert_eq!(registry.subscriber_count("k1"), 1);

    tokio::time::sleep(Duration::from_millis(1300)).await;
    assert_eq!(registry.subscriber_count("k1"), 0);
}

#[tokio::test]
async fn inbound_frames_keep_a_connection_alive() {
    let config = WebSocketConfig {
        ping_interval: 30,
        pong_wait: 1,
        write_wait: 10,
    };
    let registry = Arc::new(ConnectionRegistry::new(config));
    let remote = subscribe(&registry, "k1");

    // Keep answering within the deadline; the connection must survive well
    // past a single pong_wait.
    for _ in 0..4 {
        tokio::time::sleep(Duration::from_millis(400)).await;
        remote.inject(Frame::Pong);
    }

    assert_eq!(registry.subscriber_count("k1"), 1);
}

#[tokio::test]
async fn server_pings_are_sent_on_the_configured_interval() {
    let config = WebSocketConfig {
        ping_interval: 1,
        pong_wait: 40,
        write_wait: 10,
    };
    let registry = Arc::new(ConnectionRegistry::new(config));
    let mut remote = subscribe(&registry, "k1");

    let frame = tokio::time::timeout(Duration::from_millis(1500), remote.next_sent())
        .await
        .expect("ping should arrive within one interval")
        .expect("transport should still be open");
    assert!(matches!(frame, Frame::Ping));
}

#[tokio::test]
async fn client_disconnect_prunes_the_registry() {
    let registry = Arc::new(ConnectionRegistry::new(test_config()));
    let remote = subscribe(&registry, "k1");

    remote.disconnect();

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(registry.subscriber_count("k1"), 0);
}

#[tokio::test]
async fn close_all_releases_tasks_parked_on_the_close_signal() {
    let registry = Arc::new(ConnectionRegistry::new(test_config()));

    // The upgrade handler parks on closed() for the life of the connection;
    // shutdown must be able to release it even when the client stays healthy.
    let (sink, stream, remote) = pair();
    let conn = registry.register("k1", Metadata::new(), Box::new(sink), Box::new(stream));
    remote.inject(Frame::Pong);

    let handler = tokio::spawn(async move { conn.closed().await });

    registry.close_all(1001, "server shutting down").await;

    tokio::time::timeout(Duration::from_secs(1), handler)
        .await
        .expect("close_all should unblock the waiting task")
        .unwrap();
}

#[tokio::test]
async fn close_all_notifies_every_connection_and_empties_the_registry() {
    let registry = Arc::new(ConnectionRegistry::new(test_config()));
    let mut a = subscribe(&registry, "k1");
    let mut b = subscribe(&registry, "k2");

    registry.close_all(1001, "server shutting down").await;

    assert_eq!(registry.subscriber_count("k1"), 0);
    assert_eq!(registry.subscriber_count("k2"), 0);

    for remote in [&mut a, &mut b] {
        let mut saw_close = false;
        while let Some(frame) = remote.try_next_sent() {
            if let Frame::Close { code, .. } = frame {
                assert_eq!(code, 1001);
                saw_close = true;
            }
        }
        assert!(saw_close, "remote should observe the close frame");
    }

    let (delivered, _) = registry.broadcast("k1", Bytes::from_static(b"late")).await;
    assert_eq!(delivered, 0);
}
