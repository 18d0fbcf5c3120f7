use axum::{
    extract::{ws::WebSocket, Query, State, WebSocketUpgrade},
    response::{IntoResponse, Response},
};

use crate::chat::ChatMetadata;
use crate::error::AppError;
use crate::metrics::{WS_CONNECTIONS_CLOSED, WS_CONNECTIONS_OPENED};
use crate::server::AppState;

use super::transport;

/// WebSocket upgrade handler. Subscribers identify the conversation stream
/// and both participants through query parameters.
#[tracing::instrument(
    name = "ws.upgrade",
    skip(ws, state, params),
    fields(stream_id = %params.stream_id)
)]
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
    Query(params): Query<ChatMetadata>,
) -> Response {
    if let Err(e) = validate_params(&params) {
        tracing::warn!(error = %e, "rejecting WebSocket upgrade");
        return e.into_response();
    }

    ws.on_upgrade(move |socket| handle_socket(socket, state, params))
}

fn validate_params(params: &ChatMetadata) -> Result<(), AppError> {
    for (name, value) in [
        ("stream_id", &params.stream_id),
        ("sender_id", &params.sender_id),
        ("receiver_id", &params.receiver_id),
    ] {
        if value.is_empty() {
            return Err(AppError::Validation(format!("{name} must not be empty")));
        }
    }
    Ok(())
}

/// Hands the socket to the registry and waits for the connection to close.
/// The registry owns liveness from registration onward.
#[tracing::instrument(
    name = "ws.connection",
    skip(socket, state, params),
    fields(stream_id = %params.stream_id, sender_id = %params.sender_id)
)]
async fn handle_socket(socket: WebSocket, state: AppState, params: ChatMetadata) {
    let (sink, stream) = transport::split(socket);
    let conn = state.registry.register(
        &params.stream_id,
        params.to_connection_metadata(),
        Box::new(sink),
        Box::new(stream),
    );

    WS_CONNECTIONS_OPENED.inc();
    tracing::info!(
        connection_id = %conn.id,
        stream_id = %params.stream_id,
        "WebSocket connection established"
    );

    conn.closed().await;

    WS_CONNECTIONS_CLOSED.inc();
    tracing::info!(connection_id = %conn.id, "WebSocket connection closed");
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(stream: &str, sender: &str, receiver: &str) -> ChatMetadata {
        ChatMetadata {
            stream_id: stream.to_string(),
            sender_id: sender.to_string(),
            receiver_id: receiver.to_string(),
        }
    }

    #[test]
    fn accepts_complete_params() {
        assert!(validate_params(&params("s1", "u1", "u2")).is_ok());
    }

    #[test]
    fn rejects_any_empty_param() {
        assert!(validate_params(&params("", "u1", "u2")).is_err());
        assert!(validate_params(&params("s1", "", "u2")).is_err());
        assert!(validate_params(&params("s1", "u1", "")).is_err());
    }
}
