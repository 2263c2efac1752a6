//! Per-call WebSocket transport
//!
//! Each `send` runs the full lifecycle on a new connection:
//! connect, write one text frame, read the first data frame, close.
//! The whole round trip is bounded by `request_timeout`; when it expires the
//! connection is dropped, which closes the socket.

use std::time::Duration;

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use tokio_tungstenite::{connect_async, tungstenite::protocol::Message};
use tracing::{debug, warn};

use super::Transport;
use crate::protocol::{Envelope, Reply};
use crate::types::{Error, Result};

/// Configuration for the WebSocket transport
#[derive(Debug, Clone)]
pub struct WsTransportConfig {
    /// Backend endpoint (`ws://` or `wss://`)
    pub url: String,
    /// Deadline for connect + send + receive
    pub request_timeout: Duration,
}

impl Default for WsTransportConfig {
    fn default() -> Self {
        Self {
            url: "ws://localhost:8765".to_string(),
            request_timeout: Duration::from_millis(5_000),
        }
    }
}

/// Opens one WebSocket connection per request
#[derive(Debug, Clone)]
pub struct WsTransport {
    config: WsTransportConfig,
}

impl WsTransport {
    pub fn new(config: WsTransportConfig) -> Self {
        Self { config }
    }

    async fn round_trip(&self, payload: String) -> Result<Reply> {
        let (mut ws, _) = connect_async(self.config.url.as_str())
            .await
            .map_err(|e| Error::Transport(format!("WebSocket connect failed: {e}")))?;

        ws.send(Message::Text(payload))
            .await
            .map_err(|e| Error::Transport(format!("Failed to send: {e}")))?;

        let reply = loop {
            match ws.next().await {
                Some(Ok(Message::Text(text))) => break Ok(Reply::parse(text)),
                Some(Ok(Message::Binary(data))) => {
                    break Ok(Reply::parse(String::from_utf8_lossy(&data).into_owned()))
                }
                Some(Ok(Message::Close(frame))) => {
                    break Err(Error::Transport(format!(
                        "Connection closed before a response arrived: {frame:?}"
                    )))
                }
                // Ping/pong handled by tungstenite
                Some(Ok(_)) => continue,
                Some(Err(e)) => break Err(Error::Transport(format!("WebSocket error: {e}"))),
                None => {
                    break Err(Error::Transport(
                        "Connection ended before a response arrived".into(),
                    ))
                }
            }
        };

        if let Err(e) = ws.close(None).await {
            debug!(error = %e, "Close after response failed");
        }

        reply
    }
}

#[async_trait]
impl Transport for WsTransport {
    async fn send(&self, envelope: &Envelope) -> Result<Reply> {
        let payload = envelope.to_json()?;

        debug!(op = %envelope.op(), url = %self.config.url, "Sending operation");

        match tokio::time::timeout(self.config.request_timeout, self.round_trip(payload)).await {
            Ok(result) => {
                if let Err(ref e) = result {
                    warn!(op = %envelope.op(), error = %e, "Operation transport failed");
                }
                result
            }
            Err(_) => {
                warn!(
                    op = %envelope.op(),
                    timeout_ms = self.config.request_timeout.as_millis() as u64,
                    "Operation timed out"
                );
                Err(Error::Timeout(self.config.request_timeout))
            }
        }
    }
}
