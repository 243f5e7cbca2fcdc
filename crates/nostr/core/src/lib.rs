//! Nostr protocol primitives.
//!
//! This crate provides:
//! - NIP-01: event structure, canonical hashing, Schnorr signing and verification
//! - NIP-19: bech32 `nsec`/`npub` key encoding
//!
//! Relay I/O lives in the `nostr-client` crate.

mod nip01;
mod nip19;

#[cfg(test)]
mod tests;

// NIP-01: Basic protocol
pub use nip01::{
    Event, EventTemplate, KIND_SHORT_TEXT_NOTE, Nip01Error, UnsignedEvent, finalize_event,
    generate_secret_key, get_event_hash, get_public_key, get_public_key_hex, serialize_event,
    sign_event, verify_event,
};

// NIP-19: bech32-encoded keys
pub use nip19::{
    Nip19Error, npub_to_public_key, nsec_to_private_key, private_key_to_nsec, public_key_to_npub,
};
