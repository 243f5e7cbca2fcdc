//! `post`: sign a kind-1 text note and publish it to one relay.

use crate::config::{ConfigError, load_secret_key};
use async_trait::async_trait;
use nostr::{Event, EventTemplate, KIND_SHORT_TEXT_NOTE, Nip01Error, finalize_event};
use nostr_client::{ClientError, RelayClient};
use std::io::{self, Write};
use std::time::{SystemTime, UNIX_EPOCH};
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt};
use tracing::debug;

/// The relay operation the post service needs.
#[async_trait]
pub trait Publisher: Send + Sync {
    async fn publish(&self, relay: &str, event: &Event) -> Result<(), ClientError>;
}

#[async_trait]
impl Publisher for RelayClient {
    async fn publish(&self, relay: &str, event: &Event) -> Result<(), ClientError> {
        RelayClient::publish(self, relay, event).await
    }
}

#[derive(Debug, Error)]
pub enum PostError {
    #[error("relay is required (--relay or NOSCLI_RELAY)")]
    MissingRelay,

    #[error("content is empty (pass -m or pipe it on stdin)")]
    EmptyContent,

    #[error(transparent)]
    Key(#[from] ConfigError),

    #[error("sign event: {0}")]
    Sign(#[from] Nip01Error),

    #[error(transparent)]
    Publish(#[from] ClientError),

    #[error("write output: {0}")]
    Io(#[from] io::Error),
}

#[derive(Debug, Clone, Default)]
pub struct PostRequest {
    pub relay: String,
    pub content: String,
    /// Event id to reply to; adds an `e` tag
    pub reply_to: Option<String>,
}

type KeyLoader = Box<dyn Fn() -> Result<[u8; 32], ConfigError> + Send + Sync>;

pub struct PostService<P> {
    publisher: P,
    load_key: KeyLoader,
}

impl<P: Publisher> PostService<P> {
    /// Service that reads the signing key from `NOSTR_NSEC`.
    pub fn new(publisher: P) -> Self {
        Self::with_key_loader(publisher, load_secret_key)
    }

    pub fn with_key_loader<F>(publisher: P, load_key: F) -> Self
    where
        F: Fn() -> Result<[u8; 32], ConfigError> + Send + Sync + 'static,
    {
        Self {
            publisher,
            load_key: Box::new(load_key),
        }
    }

    /// Validate, sign, publish, and write one confirmation line to `out`.
    ///
    /// Inputs are checked in order (relay, content, key) before any I/O.
    pub async fn run<W: Write>(
        &self,
        request: &PostRequest,
        out: &mut W,
    ) -> Result<Event, PostError> {
        let relay = request.relay.trim();
        if relay.is_empty() {
            return Err(PostError::MissingRelay);
        }
        let content = request.content.trim();
        if content.is_empty() {
            return Err(PostError::EmptyContent);
        }
        let secret_key = (self.load_key)()?;

        let mut tags = Vec::new();
        if let Some(reply_to) = request
            .reply_to
            .as_deref()
            .map(str::trim)
            .filter(|id| !id.is_empty())
        {
            tags.push(vec!["e".to_string(), reply_to.to_string()]);
        }

        let template = EventTemplate {
            created_at: unix_now(),
            kind: KIND_SHORT_TEXT_NOTE,
            tags,
            content: content.to_string(),
        };
        let event = finalize_event(&template, &secret_key)?;
        debug!(id = %event.id, relay = %relay, "signed text note");

        self.publisher.publish(relay, &event).await?;

        writeln!(out, "published: id:{} relay:{}", event.short_id(), relay)?;
        Ok(event)
    }
}

/// Message text from `-m`, or all of `stdin` when the flag is absent or blank.
pub async fn read_content<R>(message: Option<String>, mut stdin: R) -> io::Result<String>
where
    R: AsyncRead + Unpin,
{
    if let Some(message) = message {
        let trimmed = message.trim();
        if !trimmed.is_empty() {
            return Ok(trimmed.to_string());
        }
    }

    let mut buf = String::new();
    stdin.read_to_string(&mut buf).await?;
    Ok(buf.trim().to_string())
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default()
}
