//! Transport seam between the relay session and the network.
//!
//! [`WebSocketTransport`] is the production implementation. Tests plug in
//! scripted transports to drive the session without a network.

use crate::error::{ClientError, Result};
use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::time::timeout;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async, tungstenite::Message};
use tracing::debug;
use url::Url;

/// Opens connections to relays.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Dial `url` and return a connected socket.
    async fn connect(&self, url: &str) -> Result<Box<dyn RelaySocket>>;
}

/// One open, text-framed duplex connection to a relay.
#[async_trait]
pub trait RelaySocket: Send {
    /// Send one text frame.
    async fn send(&mut self, text: String) -> Result<()>;

    /// Receive the next text frame. `Ok(None)` means the peer closed the
    /// connection.
    async fn recv(&mut self) -> Result<Option<String>>;

    /// Close the connection.
    async fn close(&mut self) -> Result<()>;
}

/// Validate that `url` is a `ws://` or `wss://` URL.
pub fn validate_relay_url(url: &str) -> Result<Url> {
    let url = Url::parse(url)?;
    if url.scheme() != "ws" && url.scheme() != "wss" {
        return Err(ClientError::InvalidUrl(format!(
            "URL must use ws:// or wss:// scheme, got: {}",
            url.scheme()
        )));
    }
    Ok(url)
}

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// WebSocket transport built on `tokio-tungstenite`.
#[derive(Debug, Clone)]
pub struct WebSocketTransport {
    connect_timeout: Duration,
}

impl WebSocketTransport {
    pub fn new(connect_timeout: Duration) -> Self {
        Self { connect_timeout }
    }
}

#[async_trait]
impl Transport for WebSocketTransport {
    async fn connect(&self, url: &str) -> Result<Box<dyn RelaySocket>> {
        let url = validate_relay_url(url)?;

        let stream = match timeout(self.connect_timeout, connect_async(url.as_str())).await {
            Ok(Ok((stream, _response))) => stream,
            Ok(Err(e)) => return Err(ClientError::WebSocket(e.to_string())),
            Err(_) => {
                return Err(ClientError::Timeout(format!(
                    "Connection timeout after {:?}",
                    self.connect_timeout
                )));
            }
        };

        Ok(Box::new(WebSocketSocket { url, stream }))
    }
}

struct WebSocketSocket {
    url: Url,
    stream: WsStream,
}

#[async_trait]
impl RelaySocket for WebSocketSocket {
    async fn send(&mut self, text: String) -> Result<()> {
        debug!("Sending to {}: {}", self.url, text);
        self.stream
            .send(Message::text(text))
            .await
            .map_err(|e| ClientError::WebSocket(e.to_string()))
    }

    async fn recv(&mut self) -> Result<Option<String>> {
        loop {
            match self.stream.next().await {
                Some(Ok(Message::Text(text))) => return Ok(Some(text.as_str().to_owned())),
                Some(Ok(Message::Ping(data))) => {
                    self.stream
                        .send(Message::Pong(data))
                        .await
                        .map_err(|e| ClientError::WebSocket(e.to_string()))?;
                }
                Some(Ok(Message::Close(_))) | None => {
                    debug!("Relay closed connection: {}", self.url);
                    return Ok(None);
                }
                // Binary, pong and raw frames carry nothing for NIP-01.
                Some(Ok(_)) => {}
                Some(Err(e)) => return Err(ClientError::WebSocket(e.to_string())),
            }
        }
    }

    async fn close(&mut self) -> Result<()> {
        self.stream
            .close(None)
            .await
            .map_err(|e| ClientError::WebSocket(e.to_string()))
    }
}
