//! Subscription identifiers and the consumer side of a relay stream.

use crate::error::ClientError;
use nostr::Event;
use rand::RngCore;
use tokio::sync::mpsc;

/// Generate a fresh subscription ID: 8 random bytes, hex encoded.
pub fn generate_subscription_id() -> String {
    let mut buf = [0u8; 8];
    rand::rng().fill_bytes(&mut buf);
    hex::encode(buf)
}

/// One item from a [`SubscriptionStream`].
#[derive(Debug)]
pub enum StreamItem {
    /// A verified event from the relay
    Event(Event),
    /// An advisory error; the stream keeps running
    Error(ClientError),
}

/// Receiving half of a relay subscription.
///
/// Both channels are closed together when the session task stops, which
/// only happens after its cancellation token fires (or every receiver is
/// dropped). Errors are advisory and never end the stream by themselves.
#[derive(Debug)]
pub struct SubscriptionStream {
    events: mpsc::Receiver<Event>,
    errors: mpsc::Receiver<ClientError>,
    events_closed: bool,
    errors_closed: bool,
}

impl SubscriptionStream {
    /// Assemble a stream from raw receivers.
    pub fn new(events: mpsc::Receiver<Event>, errors: mpsc::Receiver<ClientError>) -> Self {
        Self {
            events,
            errors,
            events_closed: false,
            errors_closed: false,
        }
    }

    /// Wait for the next event or error.
    ///
    /// Returns `None` once both channels are closed.
    pub async fn next(&mut self) -> Option<StreamItem> {
        loop {
            if self.events_closed && self.errors_closed {
                return None;
            }

            tokio::select! {
                event = self.events.recv(), if !self.events_closed => match event {
                    Some(event) => return Some(StreamItem::Event(event)),
                    None => self.events_closed = true,
                },
                error = self.errors.recv(), if !self.errors_closed => match error {
                    Some(error) => return Some(StreamItem::Error(error)),
                    None => self.errors_closed = true,
                },
            }
        }
    }

    /// Split into the raw event and error receivers.
    pub fn into_parts(self) -> (mpsc::Receiver<Event>, mpsc::Receiver<ClientError>) {
        (self.events, self.errors)
    }
}
