//! `timeline`: stream text notes from one relay and print one line per event.

use chrono::{Local, TimeZone};
use nostr::{Event, KIND_SHORT_TEXT_NOTE};
use nostr_client::{Filter, RelayClient, StreamItem, SubscriptionStream};
use std::fmt::Display;
use std::io::{self, Write};
use std::time::Duration;
use thiserror::Error;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// How long to wait for the stream to unsubscribe after cancellation.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(1);

/// The relay operation the timeline service needs.
pub trait Streamer {
    fn stream(&self, relay: &str, filter: Filter, cancel: CancellationToken) -> SubscriptionStream;
}

impl Streamer for RelayClient {
    fn stream(&self, relay: &str, filter: Filter, cancel: CancellationToken) -> SubscriptionStream {
        RelayClient::stream(self, relay, filter, cancel)
    }
}

#[derive(Debug, Error)]
pub enum TimelineError {
    #[error("relay is required (--relay or NOSCLI_RELAY)")]
    MissingRelay,

    #[error("write output: {0}")]
    Io(#[from] io::Error),
}

pub struct TimelineService<S> {
    streamer: S,
}

impl<S: Streamer> TimelineService<S> {
    pub fn new(streamer: S) -> Self {
        Self { streamer }
    }

    /// Render events to `out` until `cancel` fires or the stream ends.
    ///
    /// Stream errors are logged and never stop the timeline. After `cancel`
    /// fires the stream is drained, for at most `SHUTDOWN_GRACE`, so the
    /// relay session can send CLOSE before the caller exits.
    pub async fn run<W: Write>(
        &self,
        relay: &str,
        cancel: CancellationToken,
        out: &mut W,
    ) -> Result<(), TimelineError> {
        let relay = relay.trim();
        if relay.is_empty() {
            return Err(TimelineError::MissingRelay);
        }

        let filter = Filter::new().kinds(vec![KIND_SHORT_TEXT_NOTE]);
        let mut stream = self.streamer.stream(relay, filter, cancel.clone());

        loop {
            let item = tokio::select! {
                biased;
                _ = cancel.cancelled() => None,
                item = stream.next() => Some(item),
            };
            let Some(item) = item else {
                if timeout(SHUTDOWN_GRACE, drain(&mut stream)).await.is_err() {
                    debug!(relay = %relay, "stream still open after shutdown grace");
                }
                return Ok(());
            };

            match item {
                Some(StreamItem::Event(event)) => {
                    writeln!(out, "{}", render_event(&event))?;
                    out.flush()?;
                }
                Some(StreamItem::Error(e)) => {
                    warn!(relay = %relay, error = %e, "timeline stream error");
                }
                None => return Ok(()),
            }
        }
    }
}

async fn drain(stream: &mut SubscriptionStream) {
    while stream.next().await.is_some() {}
}

/// One-line summary of `event` in local time.
pub fn render_event(event: &Event) -> String {
    render_event_in(event, &Local)
}

/// `[YYYY-MM-DD HH:MM:SS] abcdef...wxyz: content (id:12345678 relay:wss://...)`
pub fn render_event_in<Tz>(event: &Event, tz: &Tz) -> String
where
    Tz: TimeZone,
    Tz::Offset: Display,
{
    let timestamp = i64::try_from(event.created_at)
        .ok()
        .and_then(|secs| tz.timestamp_opt(secs, 0).single())
        .map(|time| time.format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_else(|| event.created_at.to_string());

    format!(
        "[{}] {}: {} (id:{} relay:{})",
        timestamp,
        abbreviate_pubkey(&event.pubkey),
        summarize_content(&event.content),
        event.short_id(),
        event.origin.as_deref().unwrap_or_default()
    )
}

fn abbreviate_pubkey(pubkey: &str) -> String {
    if pubkey.len() <= 12 {
        return pubkey.to_string();
    }
    match (pubkey.get(..6), pubkey.get(pubkey.len() - 4..)) {
        (Some(head), Some(tail)) => format!("{}...{}", head, tail),
        _ => pubkey.to_string(),
    }
}

fn summarize_content(content: &str) -> String {
    let trimmed = content.trim();
    if trimmed.is_empty() {
        return "(no content)".to_string();
    }
    trimmed.replace(['\n', '\r'], " ")
}
