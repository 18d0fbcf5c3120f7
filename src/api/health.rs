//! Health check endpoint.

use axum::Json;
use serde::Serialize;

use crate::metrics::CONNECTIONS_ACTIVE;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub active_connections: i64,
}

pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        active_connections: CONNECTIONS_ACTIVE.get(),
    })
}
