//! Cross-module tests for the nostr crate.
