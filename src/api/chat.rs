//! Chat relay endpoint: accepts a created chat message and fans it out to
//! every WebSocket subscriber of its stream.

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use bytes::Bytes;
use serde::Serialize;

use crate::chat::ChatMessage;
use crate::error::AppError;
use crate::server::AppState;

#[derive(Debug, Serialize)]
pub struct RelayResponse {
    pub delivered: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stream_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// POST /chat/forward-to-websocket
///
/// 200 means every reachable subscriber got the message (including the
/// zero-subscriber case), 206 means some deliveries failed, 500 means none
/// did.
#[tracing::instrument(
    name = "chat.relay",
    skip(state, message),
    fields(message_id = %message.message_id, stream_id = %message.metadata.stream_id)
)]
pub async fn forward_to_websocket(
    State(state): State<AppState>,
    Json(message): Json<ChatMessage>,
) -> Result<Response, AppError> {
    let payload = Bytes::from(serde_json::to_vec(&message)?);
    let stream_id = &message.metadata.stream_id;

    let (delivered, failure) = state.registry.broadcast(stream_id, payload).await;

    let response = match failure {
        None => (
            StatusCode::OK,
            Json(RelayResponse {
                delivered,
                stream_id: Some(stream_id.clone()),
                error: None,
            }),
        )
            .into_response(),
        Some(err) => {
            let status = if delivered > 0 {
                StatusCode::PARTIAL_CONTENT
            } else {
                StatusCode::INTERNAL_SERVER_ERROR
            };
            tracing::warn!(
                stream_id = %stream_id,
                delivered = delivered,
                error = %err,
                "broadcast delivery failed for some connections"
            );
            (
                status,
                Json(RelayResponse {
                    delivered,
                    stream_id: Some(stream_id.clone()),
                    error: Some(err.to_string()),
                }),
            )
                .into_response()
        }
    };

    Ok(response)
}
