//! NIP-01: Basic protocol flow description.
//!
//! This module implements the core Nostr event structure and operations:
//! - Event structure (id, pubkey, created_at, kind, tags, content, sig)
//! - Canonical event serialization for hashing
//! - Event signing with BIP-340 Schnorr signatures
//! - Event verification
//!
//! The id of an event is the SHA-256 of the compact JSON array
//! `[0,<pubkey>,<created_at>,<kind>,<tags>,<content>]`. Every byte of that
//! serialization is fixed by the protocol, so it is produced by serializing a
//! tuple with `serde_json` and nothing else.

use bitcoin::hashes::{Hash, sha256};
use bitcoin::key::Secp256k1;
use bitcoin::secp256k1::{Keypair, Message, SecretKey, XOnlyPublicKey, schnorr};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors that can occur during NIP-01 operations.
///
/// Verification reports the first layer that is corrupt, in this order:
/// id, public key, signature encoding, signature validity.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum Nip01Error {
    #[error("invalid private key length: {0}")]
    InvalidKeyLength(usize),

    #[error("invalid secret key: {0}")]
    InvalidSecretKey(String),

    #[error("pubkey {pubkey} does not match the signing key")]
    PubkeyMismatch { pubkey: String },

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("event id mismatch: computed {computed}, event has {id}")]
    IdMismatch { computed: String, id: String },

    #[error("invalid pubkey: {0}")]
    InvalidPubkey(String),

    #[error("invalid signature: {0}")]
    InvalidSignature(String),

    #[error("signature verification failed")]
    SignatureVerificationFailed,
}

/// A Nostr event.
///
/// An event built by a caller starts with empty `id` and `sig`; [`sign_event`]
/// fills both. Events received from a relay carry the relay URL in `origin`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    /// 32-bytes lowercase hex-encoded sha256 of the serialized event data
    pub id: String,
    /// 32-bytes lowercase hex-encoded public key of the event creator
    pub pubkey: String,
    /// Unix timestamp in seconds
    pub created_at: u64,
    /// Event kind (integer between 0 and 65535)
    pub kind: u16,
    /// Array of arrays of strings (tags)
    pub tags: Vec<Vec<String>>,
    /// Arbitrary string content
    pub content: String,
    /// 64-bytes lowercase hex signature
    pub sig: String,
    /// Relay this event was received from. Not part of the signed payload.
    #[serde(skip)]
    pub origin: Option<String>,
}

/// An unsigned event (before signing).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnsignedEvent {
    /// 32-bytes lowercase hex-encoded public key of the event creator
    pub pubkey: String,
    /// Unix timestamp in seconds
    pub created_at: u64,
    /// Event kind
    pub kind: u16,
    /// Array of arrays of strings (tags)
    pub tags: Vec<Vec<String>>,
    /// Arbitrary string content
    pub content: String,
}

/// A template for creating events (without pubkey, which comes from the signing key).
///
/// ```
/// use nostr::{EventTemplate, KIND_SHORT_TEXT_NOTE, finalize_event};
///
/// let template = EventTemplate {
///     created_at: 1_700_000_000,
///     kind: KIND_SHORT_TEXT_NOTE,
///     tags: vec![vec!["t".to_string(), "nostr".to_string()]],
///     content: "hello nostr".to_string(),
/// };
///
/// let event = finalize_event(&template, &[0x01; 32]).unwrap();
/// assert!(event.verify().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventTemplate {
    /// Unix timestamp in seconds
    pub created_at: u64,
    /// Event kind
    pub kind: u16,
    /// Array of arrays of strings (tags)
    pub tags: Vec<Vec<String>>,
    /// Arbitrary string content
    pub content: String,
}

pub const KIND_SHORT_TEXT_NOTE: u16 = 1;

impl Event {
    /// SHA-256 of the canonical serialization of this event.
    pub fn hash(&self) -> Result<[u8; 32], Nip01Error> {
        let serialized = canonical_json(
            &self.pubkey,
            self.created_at,
            self.kind,
            &self.tags,
            &self.content,
        )?;
        Ok(sha256::Hash::hash(serialized.as_bytes()).to_byte_array())
    }

    /// Check the id and signature of this event. See [`verify_event`].
    pub fn verify(&self) -> Result<(), Nip01Error> {
        verify_event(self)
    }

    /// First eight characters of the id, for log lines and terminal output.
    pub fn short_id(&self) -> &str {
        self.id.get(..8).unwrap_or(self.id.as_str())
    }
}

/// Generate a random 32-byte secret key.
pub fn generate_secret_key() -> [u8; 32] {
    let mut key = [0u8; 32];
    rand::rng().fill_bytes(&mut key);
    key
}

/// Get the public key (x-only, 32 bytes) from a secret key.
pub fn get_public_key(secret_key: &[u8; 32]) -> Result<[u8; 32], Nip01Error> {
    let secp = Secp256k1::new();
    let sk = SecretKey::from_slice(secret_key)
        .map_err(|e| Nip01Error::InvalidSecretKey(e.to_string()))?;
    let (xonly, _parity) = sk.x_only_public_key(&secp);
    Ok(xonly.serialize())
}

/// Get the public key as a hex string from a secret key.
pub fn get_public_key_hex(secret_key: &[u8; 32]) -> Result<String, Nip01Error> {
    Ok(hex::encode(get_public_key(secret_key)?))
}

/// Serialize an unsigned event for hashing.
///
/// Format: `[0,<pubkey>,<created_at>,<kind>,<tags>,<content>]`
pub fn serialize_event(event: &UnsignedEvent) -> Result<String, Nip01Error> {
    canonical_json(
        &event.pubkey,
        event.created_at,
        event.kind,
        &event.tags,
        &event.content,
    )
}

/// Get the event hash (id) from an unsigned event.
pub fn get_event_hash(event: &UnsignedEvent) -> Result<String, Nip01Error> {
    let serialized = serialize_event(event)?;
    let hash = sha256::Hash::hash(serialized.as_bytes());
    Ok(hex::encode(hash.to_byte_array()))
}

fn canonical_json(
    pubkey: &str,
    created_at: u64,
    kind: u16,
    tags: &[Vec<String>],
    content: &str,
) -> Result<String, Nip01Error> {
    serde_json::to_string(&(0, pubkey, created_at, kind, tags, content))
        .map_err(|e| Nip01Error::Serialization(e.to_string()))
}

/// Sign an event in place.
///
/// `secret_key` must be exactly 32 bytes. An empty `pubkey` is filled with the
/// key derived from `secret_key`; a non-empty one must match it. On success
/// `id` and `sig` are set and the event verifies.
pub fn sign_event(event: &mut Event, secret_key: &[u8]) -> Result<(), Nip01Error> {
    let secret_key: &[u8; 32] = secret_key
        .try_into()
        .map_err(|_| Nip01Error::InvalidKeyLength(secret_key.len()))?;

    let secp = Secp256k1::new();
    let sk = SecretKey::from_slice(secret_key)
        .map_err(|e| Nip01Error::InvalidSecretKey(e.to_string()))?;
    let keypair = Keypair::from_secret_key(&secp, &sk);
    let (xonly_pk, _parity) = keypair.x_only_public_key();
    let pubkey = hex::encode(xonly_pk.serialize());

    if event.pubkey.is_empty() {
        event.pubkey = pubkey;
    } else if !event.pubkey.eq_ignore_ascii_case(&pubkey) {
        return Err(Nip01Error::PubkeyMismatch {
            pubkey: event.pubkey.clone(),
        });
    }

    let hash = event.hash()?;
    let message = Message::from_digest(hash);
    let sig = secp.sign_schnorr_no_aux_rand(&message, &keypair);

    event.id = hex::encode(hash);
    event.sig = hex::encode(sig.serialize());
    Ok(())
}

/// Sign an event template with a secret key, producing a complete signed event.
pub fn finalize_event(
    template: &EventTemplate,
    secret_key: &[u8; 32],
) -> Result<Event, Nip01Error> {
    let mut event = Event {
        created_at: template.created_at,
        kind: template.kind,
        tags: template.tags.clone(),
        content: template.content.clone(),
        ..Default::default()
    };
    sign_event(&mut event, secret_key)?;
    Ok(event)
}

/// Verify an event's id and signature.
pub fn verify_event(event: &Event) -> Result<(), Nip01Error> {
    let hash = event.hash()?;
    let computed = hex::encode(hash);
    if !computed.eq_ignore_ascii_case(&event.id) {
        return Err(Nip01Error::IdMismatch {
            computed,
            id: event.id.clone(),
        });
    }

    let pubkey_bytes = hex::decode(&event.pubkey)
        .map_err(|e| Nip01Error::InvalidPubkey(format!("pubkey decode: {}", e)))?;
    if pubkey_bytes.len() != 32 {
        return Err(Nip01Error::InvalidPubkey(format!(
            "invalid pubkey length: {}",
            pubkey_bytes.len()
        )));
    }
    let pubkey = XOnlyPublicKey::from_slice(&pubkey_bytes)
        .map_err(|e| Nip01Error::InvalidPubkey(format!("pubkey parse: {}", e)))?;

    let sig_bytes = hex::decode(&event.sig)
        .map_err(|e| Nip01Error::InvalidSignature(format!("signature decode: {}", e)))?;
    let sig = schnorr::Signature::from_slice(&sig_bytes)
        .map_err(|e| Nip01Error::InvalidSignature(format!("signature parse: {}", e)))?;

    let secp = Secp256k1::verification_only();
    secp.verify_schnorr(&sig, &Message::from_digest(hash), &pubkey)
        .map_err(|_| Nip01Error::SignatureVerificationFailed)
}
