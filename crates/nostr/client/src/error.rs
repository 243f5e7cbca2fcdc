//! Client error types

use crate::message::MessageError;
use thiserror::Error;

/// Client error type
#[derive(Error, Debug)]
pub enum ClientError {
    /// WebSocket error
    #[error("WebSocket error: {0}")]
    WebSocket(String),

    /// Connection error (dial failure, peer closed the connection)
    #[error("Connection error: {0}")]
    Connection(String),

    /// Invalid URL
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// URL parse error
    #[error("URL parse error: {0}")]
    UrlParse(#[from] url::ParseError),

    /// Malformed outbound frame
    #[error("Message error: {0}")]
    Message(#[from] MessageError),

    /// Timeout error
    #[error("Timeout error: {0}")]
    Timeout(String),

    /// Relay ended our subscription with a CLOSED frame
    #[error("relay {relay} closed subscription {subscription_id}: {message}")]
    SubscriptionClosed {
        relay: String,
        subscription_id: String,
        message: String,
    },

    /// Publish reply was not a well-formed `["OK", id, bool, message]`
    #[error("invalid OK message from {relay}: {source}")]
    InvalidAckFormat {
        relay: String,
        #[source]
        source: MessageError,
    },

    /// Relay answered `OK false`
    #[error("relay {relay} rejected event {event_id}: {message}")]
    Rejected {
        relay: String,
        event_id: String,
        message: String,
    },

    /// Relay acknowledged a different event id
    #[error("relay {relay} returned mismatched id: expected {expected}, got {got}")]
    AckMismatch {
        relay: String,
        expected: String,
        got: String,
    },

    /// Invalid event
    #[error("Invalid event: {0}")]
    InvalidEvent(String),
}

/// Client result type
pub type Result<T> = std::result::Result<T, ClientError>;
