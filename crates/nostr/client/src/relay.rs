//! Single relay session management
//!
//! [`RelayClient::stream`] keeps one subscription alive against one relay:
//! dial, send `REQ`, read frames, and on any transport failure wait a fixed
//! backoff and start over with a new subscription id. Only cancellation ends
//! it. [`RelayClient::publish`] is a one-shot `EVENT`/`OK` exchange on a
//! dedicated connection.
//!
//! Each call owns its connection; a `RelayClient` only carries configuration
//! and the transport, so clones are cheap and independent.

use crate::error::{ClientError, Result};
use crate::message::{ClientMessage, Filter, RelayMessage, parse_ok_message};
use crate::subscription::{SubscriptionStream, generate_subscription_id};
use crate::transport::{RelaySocket, Transport, WebSocketTransport};
use nostr::Event;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::time::{Instant, sleep, timeout, timeout_at};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Upper bound on best-effort writes during teardown (CLOSE frame, socket close).
const CLOSE_GRACE: Duration = Duration::from_secs(1);

/// Relay session configuration
#[derive(Debug, Clone)]
pub struct RelayConfig {
    /// Connection timeout
    pub connect_timeout: Duration,
    /// Maximum silence on a subscription before the connection is considered
    /// dead; also the default wait for a publish acknowledgement
    pub read_timeout: Duration,
    /// Fixed delay between reconnection attempts
    pub reconnect_delay: Duration,
    /// Capacity of the event channel handed to stream consumers
    pub event_buffer: usize,
    /// Capacity of the error channel handed to stream consumers
    pub error_buffer: usize,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(10),
            read_timeout: Duration::from_secs(30),
            reconnect_delay: Duration::from_secs(3),
            event_buffer: 64,
            error_buffer: 16,
        }
    }
}

/// Client for streaming from and publishing to relays.
#[derive(Clone)]
pub struct RelayClient {
    config: RelayConfig,
    transport: Arc<dyn Transport>,
}

impl Default for RelayClient {
    fn default() -> Self {
        Self::new()
    }
}

impl RelayClient {
    /// Create a client with default configuration over WebSockets.
    pub fn new() -> Self {
        Self::with_config(RelayConfig::default())
    }

    /// Create a client with custom config over WebSockets.
    pub fn with_config(config: RelayConfig) -> Self {
        let transport = Arc::new(WebSocketTransport::new(config.connect_timeout));
        Self::with_transport(config, transport)
    }

    /// Create a client over an arbitrary transport.
    pub fn with_transport(config: RelayConfig, transport: Arc<dyn Transport>) -> Self {
        Self { config, transport }
    }

    pub fn config(&self) -> &RelayConfig {
        &self.config
    }

    /// Subscribe to `relay` with `filter` and stream verified events until
    /// `cancel` fires.
    ///
    /// `filter.since` is replaced with the current time on every (re)subscribe,
    /// so only events created after the subscription starts are delivered.
    /// Must be called from within a tokio runtime.
    pub fn stream(
        &self,
        relay: &str,
        filter: Filter,
        cancel: CancellationToken,
    ) -> SubscriptionStream {
        let (events_tx, events_rx) = mpsc::channel(self.config.event_buffer.max(1));
        let (errors_tx, errors_rx) = mpsc::channel(self.config.error_buffer.max(1));

        let session = StreamSession {
            relay: relay.to_string(),
            filter,
            config: self.config.clone(),
            transport: Arc::clone(&self.transport),
            cancel,
            events: events_tx,
            errors: errors_tx,
        };
        tokio::spawn(session.run());

        SubscriptionStream::new(events_rx, errors_rx)
    }

    /// Publish a signed event and wait up to `read_timeout` for the relay's
    /// acknowledgement.
    pub async fn publish(&self, relay: &str, event: &Event) -> Result<()> {
        let deadline = Instant::now() + self.config.read_timeout;
        self.publish_with_deadline(relay, event, deadline).await
    }

    /// Publish a signed event and wait until `deadline` for the relay's
    /// acknowledgement.
    ///
    /// Single attempt: no retry on any failure.
    pub async fn publish_with_deadline(
        &self,
        relay: &str,
        event: &Event,
        deadline: Instant,
    ) -> Result<()> {
        if event.id.is_empty() || event.sig.is_empty() {
            return Err(ClientError::InvalidEvent(
                "event must be signed before publishing".to_string(),
            ));
        }

        let mut socket = match timeout_at(deadline, self.transport.connect(relay)).await {
            Ok(Ok(socket)) => socket,
            Ok(Err(e)) => return Err(ClientError::Connection(format!("dial {}: {}", relay, e))),
            Err(_) => {
                return Err(ClientError::Timeout(format!(
                    "dial {} for event {}",
                    relay,
                    event.short_id()
                )));
            }
        };

        let result = await_ack(relay, event, socket.as_mut(), deadline).await;
        let _ = timeout(CLOSE_GRACE, socket.close()).await;

        if result.is_ok() {
            info!(relay = %relay, id = %event.id, "published event");
        }
        result
    }
}

async fn await_ack(
    relay: &str,
    event: &Event,
    socket: &mut dyn RelaySocket,
    deadline: Instant,
) -> Result<()> {
    let frame = ClientMessage::Event(event.clone()).to_json()?;
    match timeout_at(deadline, socket.send(frame)).await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => {
            return Err(ClientError::WebSocket(format!(
                "write EVENT to {}: {}",
                relay, e
            )));
        }
        Err(_) => {
            return Err(ClientError::Timeout(format!(
                "write EVENT {} to {}",
                event.short_id(),
                relay
            )));
        }
    }

    let reply = match timeout_at(deadline, socket.recv()).await {
        Ok(Ok(Some(reply))) => reply,
        Ok(Ok(None)) => {
            return Err(ClientError::Connection(format!(
                "{} closed the connection before OK for {}",
                relay,
                event.short_id()
            )));
        }
        Ok(Err(e)) => {
            return Err(ClientError::Connection(format!("read OK from {}: {}", relay, e)));
        }
        Err(_) => {
            return Err(ClientError::Timeout(format!(
                "no OK from {} for event {}",
                relay,
                event.short_id()
            )));
        }
    };

    let ack = parse_ok_message(&reply).map_err(|source| ClientError::InvalidAckFormat {
        relay: relay.to_string(),
        source,
    })?;

    if !ack.accepted {
        let event_id = if ack.event_id.is_empty() {
            event.id.clone()
        } else {
            ack.event_id
        };
        return Err(ClientError::Rejected {
            relay: relay.to_string(),
            event_id,
            message: ack.message,
        });
    }

    if !ack.event_id.is_empty() && !ack.event_id.eq_ignore_ascii_case(&event.id) {
        return Err(ClientError::AckMismatch {
            relay: relay.to_string(),
            expected: event.id.clone(),
            got: ack.event_id,
        });
    }

    Ok(())
}

/// How one connection attempt ended.
enum SessionEnd {
    Cancelled,
    Failed(ClientError),
}

/// What to do with one inbound frame.
enum Dispatch {
    Deliver(Event),
    Closed(String),
    Skip,
}

/// Background task state for one `stream` call.
struct StreamSession {
    relay: String,
    filter: Filter,
    config: RelayConfig,
    transport: Arc<dyn Transport>,
    cancel: CancellationToken,
    events: mpsc::Sender<Event>,
    errors: mpsc::Sender<ClientError>,
}

impl StreamSession {
    /// Dial/subscribe/read until cancelled. Dropping `self` at the end closes
    /// both consumer channels.
    async fn run(self) {
        loop {
            if self.events.is_closed() {
                debug!(relay = %self.relay, "event receiver dropped, stopping stream");
                break;
            }

            let connected = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => break,
                result = self.transport.connect(&self.relay) => result,
            };

            let mut socket = match connected {
                Ok(socket) => socket,
                Err(e) => {
                    self.emit_error(ClientError::Connection(format!(
                        "dial {}: {}",
                        self.relay, e
                    )));
                    if self.backoff().await {
                        continue;
                    }
                    break;
                }
            };

            info!(relay = %self.relay, "connected to relay");
            let end = self.subscribe(socket.as_mut()).await;
            let _ = timeout(CLOSE_GRACE, socket.close()).await;

            match end {
                SessionEnd::Cancelled => break,
                SessionEnd::Failed(e) => {
                    self.emit_error(e);
                    if !self.backoff().await {
                        break;
                    }
                }
            }
        }

        debug!(relay = %self.relay, "stream closed");
    }

    async fn subscribe(&self, socket: &mut dyn RelaySocket) -> SessionEnd {
        let subscription_id = generate_subscription_id();
        let mut filter = self.filter.clone();
        filter.since = Some(unix_now());

        let request = ClientMessage::Req {
            subscription_id: subscription_id.clone(),
            filters: vec![filter],
        };
        let text = match request.to_json() {
            Ok(text) => text,
            Err(e) => return SessionEnd::Failed(e.into()),
        };

        let sent = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => return SessionEnd::Cancelled,
            result = socket.send(text) => result,
        };
        if let Err(e) = sent {
            return SessionEnd::Failed(ClientError::Connection(format!(
                "relay {}: write REQ: {}",
                self.relay, e
            )));
        }
        debug!(relay = %self.relay, subscription_id = %subscription_id, "subscribed");

        loop {
            let received = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => None,
                _ = self.events.closed() => {
                    debug!(relay = %self.relay, "event receiver dropped, stopping stream");
                    None
                }
                result = timeout(self.config.read_timeout, socket.recv()) => Some(result),
            };
            let Some(received) = received else {
                self.close_subscription(socket, &subscription_id).await;
                return SessionEnd::Cancelled;
            };

            let text = match received {
                Ok(Ok(Some(text))) => text,
                Ok(Ok(None)) => {
                    return SessionEnd::Failed(ClientError::Connection(format!(
                        "relay {} closed the connection",
                        self.relay
                    )));
                }
                Ok(Err(e)) => {
                    return SessionEnd::Failed(ClientError::Connection(format!(
                        "relay {}: {}",
                        self.relay, e
                    )));
                }
                Err(_) => {
                    return SessionEnd::Failed(ClientError::Timeout(format!(
                        "relay {}: no message within {:?}",
                        self.relay, self.config.read_timeout
                    )));
                }
            };

            match self.dispatch(&subscription_id, &text) {
                Dispatch::Deliver(event) => {
                    let delivered = tokio::select! {
                        biased;
                        _ = self.cancel.cancelled() => false,
                        result = self.events.send(event) => result.is_ok(),
                    };
                    if !delivered {
                        if !self.cancel.is_cancelled() {
                            debug!(relay = %self.relay, "event receiver dropped, stopping stream");
                        }
                        self.close_subscription(socket, &subscription_id).await;
                        return SessionEnd::Cancelled;
                    }
                }
                Dispatch::Closed(message) => {
                    return SessionEnd::Failed(ClientError::SubscriptionClosed {
                        relay: self.relay.clone(),
                        subscription_id,
                        message,
                    });
                }
                Dispatch::Skip => {}
            }
        }
    }

    fn dispatch(&self, subscription_id: &str, text: &str) -> Dispatch {
        match RelayMessage::from_json(text) {
            Ok(RelayMessage::Event {
                subscription_id: sid,
                mut event,
            }) if sid == subscription_id => {
                // Relays are untrusted: bad events are dropped, never surfaced.
                if let Err(e) = event.verify() {
                    debug!(relay = %self.relay, id = %event.id, error = %e, "ignoring invalid event");
                    return Dispatch::Skip;
                }
                event.origin = Some(self.relay.clone());
                Dispatch::Deliver(event)
            }
            Ok(RelayMessage::Eose { subscription_id: sid }) => {
                debug!(relay = %self.relay, subscription_id = %sid, "end of stored events");
                Dispatch::Skip
            }
            Ok(RelayMessage::Notice { message }) => {
                warn!(relay = %self.relay, notice = %message, "relay notice");
                Dispatch::Skip
            }
            Ok(RelayMessage::Closed {
                subscription_id: sid,
                message,
            }) if sid == subscription_id => Dispatch::Closed(message),
            Ok(_) => Dispatch::Skip,
            Err(e) => {
                debug!(relay = %self.relay, error = %e, "ignoring malformed frame");
                Dispatch::Skip
            }
        }
    }

    async fn close_subscription(&self, socket: &mut dyn RelaySocket, subscription_id: &str) {
        let close = ClientMessage::Close {
            subscription_id: subscription_id.to_string(),
        };
        let Ok(text) = close.to_json() else {
            return;
        };
        match timeout(CLOSE_GRACE, socket.send(text)).await {
            Ok(Ok(())) => debug!(relay = %self.relay, subscription_id, "sent CLOSE"),
            Ok(Err(e)) => debug!(relay = %self.relay, error = %e, "failed to send CLOSE"),
            Err(_) => debug!(relay = %self.relay, "timed out sending CLOSE"),
        }
    }

    /// Non-blocking: a full error buffer drops the error rather than stalling
    /// the session.
    fn emit_error(&self, error: ClientError) {
        debug!(relay = %self.relay, error = %error, "stream error");
        match self.errors.try_send(error) {
            Ok(()) | Err(TrySendError::Closed(_)) => {}
            Err(TrySendError::Full(error)) => {
                warn!(relay = %self.relay, error = %error, "error buffer full, dropping error");
            }
        }
    }

    /// Wait one reconnect interval. Returns false if cancelled first.
    async fn backoff(&self) -> bool {
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => false,
            _ = sleep(self.config.reconnect_delay) => true,
        }
    }
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default()
}
