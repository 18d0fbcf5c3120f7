use std::sync::Arc;

use async_trait::async_trait;

use crate::eventstore::EventStore;

use super::message::{BusMessage, EventMessage};
use super::metrics::EventMetrics;

/// Why a raw payload could not become a typed event. Either way the message
/// is dropped, never retried.
#[derive(Debug, thiserror::Error)]
pub enum ConvertError {
    #[error("malformed payload: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("missing required field: {0}")]
    MissingField(&'static str),
}

#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// The business handler failed; the bus layer should redeliver.
    #[error("handle message failed: {0}")]
    HandlerFailed(#[source] anyhow::Error),
}

/// Conversion and dispatch for one concrete event type.
#[async_trait]
pub trait MessageHandler: Send + Sync {
    type Value: Send + Sync;

    /// Decode the raw bus payload into the typed value.
    fn convert(&self, raw: &[u8]) -> Result<Self::Value, ConvertError>;

    /// Event-kind label attached to success/retry metrics.
    fn event_kind(&self, msg: &EventMessage<Self::Value>) -> String;

    /// Act on the event. Kinds the system is not wired to act on should
    /// return `Ok(())` rather than an error.
    async fn handle(&self, msg: &EventMessage<Self::Value>) -> anyhow::Result<()>;
}

/// Per-message state machine over bus deliveries:
/// receive → convert → dedup check → dispatch → outcome.
///
/// The pipeline never retries. A handler failure propagates to the caller so
/// the bus-consumption layer can redeliver; every drop is deliberate and
/// counted under its reason.
pub struct EventPipeline<H: MessageHandler> {
    handler: H,
    store: Arc<dyn EventStore>,
    metrics: EventMetrics,
}

impl<H: MessageHandler> EventPipeline<H> {
    /// Pair with [`crate::eventstore::NoOpEventStore`] for a pipeline without
    /// deduplication.
    pub fn with_store(
        name: impl Into<String>,
        handler: H,
        store: Arc<dyn EventStore>,
    ) -> Self {
        Self {
            handler,
            store,
            metrics: EventMetrics::new(name),
        }
    }

    pub fn metrics(&self) -> &EventMetrics {
        &self.metrics
    }

    /// Process one bus delivery.
    ///
    /// `Ok(())` means the message is settled: handled, dropped as invalid, or
    /// dropped as a duplicate. `Err` means the handler failed and the message
    /// should be redelivered.
    pub async fn process(&self, msg: BusMessage) -> Result<(), PipelineError> {
        if msg.key.is_empty() {
            self.metrics.record_dropped_invalid();
            return Ok(());
        }

        let value = match self.handler.convert(&msg.payload) {
            Ok(value) => value,
            Err(err) => {
                tracing::warn!(key = %msg.key, error = %err, "failed to convert message");
                self.metrics.record_dropped_invalid();
                return Ok(());
            }
        };
        let message = EventMessage::from_bus(&msg, value);

        if self.store.should_drop(&message.key).await {
            self.metrics.record_dropped_by_store();
            return Ok(());
        }

        let kind = self.handler.event_kind(&message);
        if let Err(err) = self.handler.handle(&message).await {
            tracing::error!(key = %message.key, event_type = %kind, error = %err, "handle message failed");
            self.metrics.record_retry(&kind);
            return Err(PipelineError::HandlerFailed(err));
        }

        // The handler's side effect already happened, so a failed dedup write
        // must not fail the pass. Redelivery within the TTL window may then
        // reprocess this identity: accepted durability gap.
        if let Err(err) = self.store.commit(&message.key).await {
            tracing::warn!(
                key = %message.key,
                error = %err,
                "unable to write event store record after successful handling"
            );
            self.metrics.record_store_write_failure();
        }

        self.metrics.record_success(&kind);
        Ok(())
    }
}
