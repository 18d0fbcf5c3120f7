//! Prometheus metrics for the chat relay service.
//!
//! Covers the two core subsystems:
//! - Event pipeline counters (success/retry by event type, drops by reason)
//! - Connection registry and broadcast counters

use lazy_static::lazy_static;
use prometheus::{
    register_int_counter, register_int_counter_vec, register_int_gauge, Encoder, IntCounter,
    IntCounterVec, IntGauge, TextEncoder,
};

/// Prefix for all metrics
const METRIC_PREFIX: &str = "chat_relay";

/// Drop-reason label for structurally unusable events
pub const DROP_REASON_INVALID_FORMAT: &str = "invalid_format";

/// Drop-reason label for events rejected by the dedup event store
pub const DROP_REASON_EVENT_STORE: &str = "dropped_from_event_store_validation";

lazy_static! {
    // ============================================================================
    // Event Pipeline Metrics
    // ============================================================================

    /// Successfully handled events, labeled by pipeline and event kind
    pub static ref EVENT_SUCCESS_TOTAL: IntCounterVec = register_int_counter_vec!(
        format!("{}_success_event_total", METRIC_PREFIX),
        "Events handled successfully",
        &["pipeline", "event_type"]
    ).unwrap();

    /// Events whose handler failed; the bus layer is expected to redeliver
    pub static ref EVENT_RETRY_TOTAL: IntCounterVec = register_int_counter_vec!(
        format!("{}_failed_event_total", METRIC_PREFIX),
        "Events whose handler failed and were returned for redelivery",
        &["pipeline", "event_type"]
    ).unwrap();

    /// Events dropped before dispatch, labeled by drop reason
    pub static ref EVENT_DROPPED_TOTAL: IntCounterVec = register_int_counter_vec!(
        format!("{}_dropped_event_total", METRIC_PREFIX),
        "Events dropped before dispatch",
        &["pipeline", "reason"]
    ).unwrap();

    /// Dedup-record writes that failed after a successful handler run
    pub static ref EVENT_STORE_WRITE_FAILURES: IntCounter = register_int_counter!(
        format!("{}_event_store_write_failures_total", METRIC_PREFIX),
        "Dedup record writes that failed after successful handling"
    ).unwrap();

    // ============================================================================
    // Connection Metrics
    // ============================================================================

    /// Currently registered WebSocket connections
    pub static ref CONNECTIONS_ACTIVE: IntGauge = register_int_gauge!(
        format!("{}_connections_active", METRIC_PREFIX),
        "Currently registered WebSocket connections"
    ).unwrap();

    /// WebSocket connections opened since start
    pub static ref WS_CONNECTIONS_OPENED: IntCounter = register_int_counter!(
        format!("{}_ws_connections_opened_total", METRIC_PREFIX),
        "Total WebSocket connections opened"
    ).unwrap();

    /// WebSocket connections closed since start
    pub static ref WS_CONNECTIONS_CLOSED: IntCounter = register_int_counter!(
        format!("{}_ws_connections_closed_total", METRIC_PREFIX),
        "Total WebSocket connections closed"
    ).unwrap();

    // ============================================================================
    // Broadcast Metrics
    // ============================================================================

    /// Broadcast calls made against the registry
    pub static ref BROADCASTS_TOTAL: IntCounter = register_int_counter!(
        format!("{}_broadcasts_total", METRIC_PREFIX),
        "Total broadcast calls"
    ).unwrap();

    /// Per-connection payload writes that succeeded
    pub static ref BROADCAST_DELIVERED_TOTAL: IntCounter = register_int_counter!(
        format!("{}_broadcast_delivered_total", METRIC_PREFIX),
        "Payloads delivered to individual connections"
    ).unwrap();

    /// Per-connection payload writes that failed
    pub static ref BROADCAST_FAILED_TOTAL: IntCounter = register_int_counter!(
        format!("{}_broadcast_failed_total", METRIC_PREFIX),
        "Payload writes to individual connections that failed"
    ).unwrap();
}

/// Encode all registered metrics in the Prometheus text format.
pub fn encode_metrics() -> Result<String, prometheus::Error> {
    let encoder = TextEncoder::new();
    let families = prometheus::gather();
    let mut buffer = Vec::new();
    encoder.encode(&families, &mut buffer)?;
    String::from_utf8(buffer)
        .map_err(|e| prometheus::Error::Msg(format!("metrics are not valid utf-8: {}", e)))
}
