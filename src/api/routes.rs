use axum::{
    routing::{get, post},
    Router,
};

use crate::server::AppState;
use crate::websocket::ws_handler;

use super::chat::forward_to_websocket;
use super::health::health;
use super::metrics::prometheus_metrics;

pub fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(health))
        .route("/metrics", get(prometheus_metrics))
        .route("/chat/subscribe-websocket", get(ws_handler))
        .route("/chat/forward-to-websocket", post(forward_to_websocket))
}
