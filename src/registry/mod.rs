//! WebSocket connection registry: the keyed multi-map of live connections,
//! their liveness supervision, and the concurrent broadcast engine.

mod broadcast;
mod connection;
#[allow(clippy::module_inception)]
mod registry;

pub use broadcast::{BroadcastError, SendFailure};
pub use connection::{Connection, Metadata};
pub use registry::ConnectionRegistry;
