//! Nostr relay WebSocket client.
//!
//! This crate provides:
//! - Long-lived subscriptions that survive disconnects (fixed-interval reconnect)
//! - Signature verification of every streamed event
//! - One-shot publishing with strict `OK` acknowledgement handling
//! - Message parsing (NIP-01 relay protocol)
//!
//! # Example
//!
//! ```rust,no_run
//! use nostr_client::{Filter, RelayClient, StreamItem};
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main]
//! async fn main() {
//!     let client = RelayClient::new();
//!     let cancel = CancellationToken::new();
//!
//!     // Subscribe to kind 1 (text notes) created from now on
//!     let filter = Filter::new().kinds(vec![1]);
//!     let mut stream = client.stream("wss://relay.damus.io", filter, cancel.clone());
//!
//!     while let Some(item) = stream.next().await {
//!         match item {
//!             StreamItem::Event(event) => println!("Received event: {}", event.id),
//!             StreamItem::Error(err) => eprintln!("stream error: {}", err),
//!         }
//!     }
//! }
//! ```

mod error;
mod message;
mod relay;
mod subscription;
mod transport;

// Re-export main types
pub use error::{ClientError, Result};
pub use message::{ClientMessage, Filter, MessageError, OkResult, RelayMessage, parse_ok_message};
pub use relay::{RelayClient, RelayConfig};
pub use subscription::{StreamItem, SubscriptionStream, generate_subscription_id};
pub use transport::{RelaySocket, Transport, WebSocketTransport, validate_relay_url};
