//! Adapters from an axum WebSocket to the transport traits the registry
//! supervises.

use async_trait::async_trait;
use axum::extract::ws::{CloseFrame, Message, WebSocket};
use bytes::Bytes;
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};

use crate::transport::{Frame, TransportError, TransportSink, TransportStream};

pub struct AxumSink {
    sender: SplitSink<WebSocket, Message>,
}

pub struct AxumStream {
    receiver: SplitStream<WebSocket>,
}

/// Splits an upgraded socket into the sink/stream pair the registry takes
/// ownership of.
pub fn split(socket: WebSocket) -> (AxumSink, AxumStream) {
    let (sender, receiver) = socket.split();
    (AxumSink { sender }, AxumStream { receiver })
}

fn to_message(frame: Frame) -> Result<Message, TransportError> {
    match frame {
        Frame::Text(data) => {
            let text = String::from_utf8(data.to_vec())
                .map_err(|e| TransportError::Io(e.to_string()))?;
            Ok(Message::Text(text.into()))
        }
        Frame::Ping => Ok(Message::Ping(Bytes::new())),
        Frame::Pong => Ok(Message::Pong(Bytes::new())),
        Frame::Close { code, reason } => Ok(Message::Close(Some(CloseFrame {
            code,
            reason: reason.into(),
        }))),
    }
}

#[async_trait]
impl TransportSink for AxumSink {
    async fn send(&mut self, frame: Frame) -> Result<(), TransportError> {
        let message = to_message(frame)?;
        self.sender
            .send(message)
            .await
            .map_err(|e| TransportError::Io(e.to_string()))
    }

    async fn close(&mut self) {
        let _ = self.sender.close().await;
    }
}

#[async_trait]
impl TransportStream for AxumStream {
    async fn next_frame(&mut self) -> Result<Frame, TransportError> {
        match self.receiver.next().await {
            None => Err(TransportError::Closed),
            Some(Err(e)) => Err(TransportError::Io(e.to_string())),
            Some(Ok(message)) => Ok(match message {
                Message::Text(text) => Frame::Text(Bytes::from(text.as_str().to_owned())),
                Message::Binary(data) => Frame::Text(data),
                Message::Ping(_) => Frame::Ping,
                Message::Pong(_) => Frame::Pong,
                Message::Close(frame) => {
                    let (code, reason) = frame
                        .map(|f| (f.code, f.reason.as_str().to_owned()))
                        .unwrap_or((1000, String::new()));
                    Frame::Close { code, reason }
                }
            }),
        }
    }
}
