//! Fan-out of created chat messages to downstream HTTP services.

use async_trait::async_trait;
use futures::future::BoxFuture;
use reqwest::StatusCode;
use serde::Deserialize;
use thiserror::Error;
use tracing::debug;

use crate::chat::ChatMessage;
use crate::concurrent;
use crate::config::ForwardingConfig;

#[derive(Debug, Error)]
pub enum ForwardingError {
    #[error("request to {service} failed: {source}")]
    Request {
        service: &'static str,
        #[source]
        source: reqwest::Error,
    },

    /// The relay accepted the message but could not deliver it to every
    /// subscriber.
    #[error("relay delivered to only {delivered} subscribers: {detail}")]
    PartialDelivery { delivered: usize, detail: String },

    #[error("{service} responded with status {status}")]
    Status {
        service: &'static str,
        status: StatusCode,
    },

    #[error("{failed} of {total} downstream deliveries failed: {}", .reasons.join("; "))]
    Fanout {
        failed: usize,
        total: usize,
        reasons: Vec<String>,
    },
}

/// Delivers a created chat message to whatever sits downstream.
#[async_trait]
pub trait ChatForwarder: Send + Sync {
    async fn forward(&self, message: &ChatMessage) -> Result<(), ForwardingError>;
}

#[derive(Debug, Deserialize)]
struct RelayResponse {
    #[serde(default)]
    delivered: usize,
    #[serde(default)]
    error: Option<String>,
}

/// HTTP fan-out to the WebSocket relay and the notification service.
pub struct HttpChatForwarder {
    client: reqwest::Client,
    config: ForwardingConfig,
}

impl HttpChatForwarder {
    pub fn new(config: ForwardingConfig) -> Result<Self, ForwardingError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|source| ForwardingError::Request {
                service: "client",
                source,
            })?;

        Ok(Self { client, config })
    }

    #[cfg(test)]
    fn with_client(client: reqwest::Client, config: ForwardingConfig) -> Self {
        Self { client, config }
    }

    async fn forward_to_relay(&self, message: &ChatMessage) -> Result<(), ForwardingError> {
        let url = format!("{}/chat/forward-to-websocket", self.config.relay_host);
        let response = self
            .client
            .post(&url)
            .json(message)
            .send()
            .await
            .map_err(|source| ForwardingError::Request {
                service: "relay",
                source,
            })?;

        interpret_relay_status(response).await
    }

    async fn forward_to_notifications(&self, message: &ChatMessage) -> Result<(), ForwardingError> {
        let url = format!("{}/noti/chat", self.config.notifications_host);
        let response = self
            .client
            .post(&url)
            .json(message)
            .send()
            .await
            .map_err(|source| ForwardingError::Request {
                service: "notifications",
                source,
            })?;

        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            Err(ForwardingError::Status {
                service: "notifications",
                status,
            })
        }
    }
}

/// Maps the relay's response contract onto a result: 2xx other than 206 is
/// full delivery, 206 means some subscribers were missed, anything else is
/// a hard failure.
async fn interpret_relay_status(response: reqwest::Response) -> Result<(), ForwardingError> {
    let status = response.status();
    if status == StatusCode::PARTIAL_CONTENT {
        let body: RelayResponse = response.json().await.unwrap_or(RelayResponse {
            delivered: 0,
            error: None,
        });
        return Err(ForwardingError::PartialDelivery {
            delivered: body.delivered,
            detail: body.error.unwrap_or_default(),
        });
    }
    if !status.is_success() {
        return Err(ForwardingError::Status {
            service: "relay",
            status,
        });
    }
    Ok(())
}

#[async_trait]
impl ChatForwarder for HttpChatForwarder {
    async fn forward(&self, message: &ChatMessage) -> Result<(), ForwardingError> {
        let deliveries: Vec<BoxFuture<'_, Result<(), ForwardingError>>> = vec![
            Box::pin(self.forward_to_relay(message)),
            Box::pin(self.forward_to_notifications(message)),
        ];
        let total = deliveries.len();

        let results = concurrent::run_all(deliveries).await;
        let reasons: Vec<String> = results
            .into_iter()
            .filter_map(|r| r.err().map(|e| e.to_string()))
            .collect();

        if reasons.is_empty() {
            debug!(message_id = %message.message_id, "chat message forwarded downstream");
            Ok(())
        } else {
            Err(ForwardingError::Fanout {
                failed: reasons.len(),
                total,
                reasons,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[test]
    fn fanout_error_reports_each_reason() {
        let err = ForwardingError::Fanout {
            failed: 2,
            total: 2,
            reasons: vec!["relay down".to_string(), "noti down".to_string()],
        };

        let rendered = err.to_string();
        assert!(rendered.contains("2 of 2"));
        assert!(rendered.contains("relay down"));
        assert!(rendered.contains("noti down"));
    }

    #[test]
    fn partial_delivery_error_carries_the_count() {
        let err = ForwardingError::PartialDelivery {
            delivered: 3,
            detail: "failed to deliver to 1 of 4 connections".to_string(),
        };

        assert!(err.to_string().contains("only 3 subscribers"));
    }

    #[tokio::test]
    async fn unreachable_hosts_surface_as_a_fanout_error() {
        // Reserved TEST-NET addresses, nothing listens there.
        let config = ForwardingConfig {
            relay_host: "http://192.0.2.1:9".to_string(),
            notifications_host: "http://192.0.2.2:9".to_string(),
            timeout_seconds: 1,
        };
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(200))
            .build()
            .unwrap();
        let forwarder = HttpChatForwarder::with_client(client, config);

        let message: ChatMessage = serde_json::from_value(serde_json::json!({
            "message_id": "m1",
            "content": "hello",
            "created_at": "2026-01-01T00:00:00Z",
            "stream_id": "s1",
            "sender_id": "u1",
            "receiver_id": "u2"
        }))
        .unwrap();

        match forwarder.forward(&message).await {
            Err(ForwardingError::Fanout { failed, total, .. }) => {
                assert_eq!(failed, 2);
                assert_eq!(total, 2);
            }
            other => panic!("expected fanout error, got {other:?}"),
        }
    }
}
