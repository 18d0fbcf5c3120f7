use crate::metrics::{
    DROP_REASON_EVENT_STORE, DROP_REASON_INVALID_FORMAT, EVENT_DROPPED_TOTAL, EVENT_RETRY_TOTAL,
    EVENT_STORE_WRITE_FAILURES, EVENT_SUCCESS_TOTAL,
};

/// Outcome recorder for one named pipeline. The name becomes the `pipeline`
/// label on every counter so multiple pipelines share one metric family.
#[derive(Clone)]
pub struct EventMetrics {
    name: String,
}

impl EventMetrics {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn record_success(&self, event_type: &str) {
        EVENT_SUCCESS_TOTAL
            .with_label_values(&[&self.name, event_type])
            .inc();
    }

    pub fn record_retry(&self, event_type: &str) {
        EVENT_RETRY_TOTAL
            .with_label_values(&[&self.name, event_type])
            .inc();
    }

    pub fn record_dropped_invalid(&self) {
        tracing::warn!(
            pipeline = %self.name,
            reason = DROP_REASON_INVALID_FORMAT,
            "event dropped"
        );
        EVENT_DROPPED_TOTAL
            .with_label_values(&[&self.name, DROP_REASON_INVALID_FORMAT])
            .inc();
    }

    pub fn record_dropped_by_store(&self) {
        tracing::warn!(
            pipeline = %self.name,
            reason = DROP_REASON_EVENT_STORE,
            "event dropped"
        );
        EVENT_DROPPED_TOTAL
            .with_label_values(&[&self.name, DROP_REASON_EVENT_STORE])
            .inc();
    }

    pub fn record_dropped_custom(&self, reason: &str) {
        tracing::warn!(pipeline = %self.name, reason = %reason, "event dropped");
        EVENT_DROPPED_TOTAL
            .with_label_values(&[&self.name, reason])
            .inc();
    }

    pub fn record_store_write_failure(&self) {
        EVENT_STORE_WRITE_FAILURES.inc();
    }

    /// Current counter values, for assertions in tests.
    pub fn success_count(&self, event_type: &str) -> u64 {
        EVENT_SUCCESS_TOTAL
            .with_label_values(&[&self.name, event_type])
            .get()
    }

    pub fn retry_count(&self, event_type: &str) -> u64 {
        EVENT_RETRY_TOTAL
            .with_label_values(&[&self.name, event_type])
            .get()
    }

    pub fn dropped_count(&self, reason: &str) -> u64 {
        EVENT_DROPPED_TOTAL
            .with_label_values(&[&self.name, reason])
            .get()
    }
}
