//! Runtime configuration from the environment.

use nostr::{Nip19Error, nsec_to_private_key};
use thiserror::Error;

/// Relay used when neither `--relay` nor `NOSCLI_RELAY` is given.
pub const DEFAULT_RELAY: &str = "wss://relay-jp.nostr.wirednet.jp";

pub const RELAY_ENV: &str = "NOSCLI_RELAY";
pub const SECRET_KEY_ENV: &str = "NOSTR_NSEC";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("NOSTR_NSEC is not set")]
    MissingSecretKey,

    #[error("decode NOSTR_NSEC: {0}")]
    InvalidSecretKey(#[from] Nip19Error),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Relay for commands run without `--relay`
    pub relay: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            relay: DEFAULT_RELAY.to_string(),
        }
    }
}

impl Config {
    /// Load `.env` (if present) and read `NOSCLI_RELAY`.
    pub fn load() -> Self {
        let _ = dotenvy::dotenv();
        Self::from_relay_var(std::env::var(RELAY_ENV).ok())
    }

    fn from_relay_var(value: Option<String>) -> Self {
        match value.as_deref().map(str::trim) {
            Some(relay) if !relay.is_empty() => Self {
                relay: relay.to_string(),
            },
            _ => Self::default(),
        }
    }

    /// The `--relay` flag wins when given and non-blank.
    pub fn resolve_relay(&self, flag: Option<&str>) -> String {
        match flag.map(str::trim) {
            Some(relay) if !relay.is_empty() => relay.to_string(),
            _ => self.relay.clone(),
        }
    }
}

/// Read and decode the `NOSTR_NSEC` secret key.
pub fn load_secret_key() -> Result<[u8; 32], ConfigError> {
    parse_secret_key(std::env::var(SECRET_KEY_ENV).ok())
}

fn parse_secret_key(value: Option<String>) -> Result<[u8; 32], ConfigError> {
    let nsec = value.unwrap_or_default();
    let nsec = nsec.trim();
    if nsec.is_empty() {
        return Err(ConfigError::MissingSecretKey);
    }
    Ok(nsec_to_private_key(nsec)?)
}
