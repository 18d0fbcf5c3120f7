//! API layer - HTTP endpoint handlers organized by domain.

mod chat;
mod health;
mod metrics;
mod routes;

pub use chat::{forward_to_websocket, RelayResponse};
pub use health::health;
pub use metrics::prometheus_metrics;
pub use routes::api_routes;
