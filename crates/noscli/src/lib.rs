//! noscli: a small Nostr client for the terminal.
//!
//! The binary wires these services to [`nostr_client::RelayClient`]; they
//! take the relay side as a trait so they can be exercised without a network.

pub mod config;
pub mod post;
pub mod timeline;
