//! NIP-19: bech32-encoded keys.
//!
//! Only the bare key entities are supported: `nsec` for secret keys and
//! `npub` for public keys. TLV entities (`nprofile`, `nevent`, ...) are not.

use bech32::{Bech32, Hrp};
use thiserror::Error;

/// Human-readable part for nsec (private key)
const NSEC_HRP: &str = "nsec";

/// Human-readable part for npub (public key)
const NPUB_HRP: &str = "npub";

/// Errors that can occur during NIP-19 operations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum Nip19Error {
    #[error("bech32 encoding error: {0}")]
    Bech32Encode(String),

    #[error("bech32 decoding error: {0}")]
    Bech32Decode(String),

    #[error("invalid HRP: expected {expected}, got {got}")]
    InvalidHrp { expected: String, got: String },

    #[error("invalid key length: expected 32 bytes, got {0}")]
    InvalidKeyLength(usize),
}

/// Encode a 32-byte private key as an nsec bech32 string.
pub fn private_key_to_nsec(private_key: &[u8; 32]) -> Result<String, Nip19Error> {
    encode_bech32(NSEC_HRP, private_key)
}

/// Encode a 32-byte public key as an npub bech32 string.
pub fn public_key_to_npub(public_key: &[u8; 32]) -> Result<String, Nip19Error> {
    encode_bech32(NPUB_HRP, public_key)
}

/// Decode an nsec bech32 string to a 32-byte private key.
pub fn nsec_to_private_key(nsec: &str) -> Result<[u8; 32], Nip19Error> {
    decode_bech32(NSEC_HRP, nsec)
}

/// Decode an npub bech32 string to a 32-byte public key.
pub fn npub_to_public_key(npub: &str) -> Result<[u8; 32], Nip19Error> {
    decode_bech32(NPUB_HRP, npub)
}

fn encode_bech32(hrp: &str, data: &[u8; 32]) -> Result<String, Nip19Error> {
    let hrp = Hrp::parse(hrp).map_err(|e| Nip19Error::Bech32Encode(e.to_string()))?;

    bech32::encode::<Bech32>(hrp, data).map_err(|e| Nip19Error::Bech32Encode(e.to_string()))
}

fn decode_bech32(expected_hrp: &str, encoded: &str) -> Result<[u8; 32], Nip19Error> {
    let expected =
        Hrp::parse(expected_hrp).map_err(|e| Nip19Error::Bech32Decode(e.to_string()))?;

    let (hrp, data) =
        bech32::decode(encoded.trim()).map_err(|e| Nip19Error::Bech32Decode(e.to_string()))?;

    if hrp != expected {
        return Err(Nip19Error::InvalidHrp {
            expected: expected_hrp.to_string(),
            got: hrp.to_string(),
        });
    }

    data.as_slice()
        .try_into()
        .map_err(|_| Nip19Error::InvalidKeyLength(data.len()))
}
