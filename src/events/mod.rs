//! Event-consumption pipeline: converts raw bus messages into typed change
//! events, filters duplicates through the event store, dispatches to the
//! business handler, and records an outcome metric at every decision point.

mod message;
mod metrics;
mod pipeline;

pub use message::{BusMessage, EventMessage};
pub use metrics::EventMetrics;
pub use pipeline::{ConvertError, EventPipeline, MessageHandler, PipelineError};
