//! Hashchat wire codec and data model.
//!
//! Everything that crosses the transport is text. Four payload kinds share
//! one channel and are told apart by shape alone:
//!
//! ```text
//! {"type":"history",...}          control packet (relay, plaintext JSON)
//! <tag>:presence:<ciphertext>     presence event (authenticated)
//! <tag>:<ciphertext>              chained chat message (authenticated)
//! <ciphertext>                    legacy message (no tag)
//! ```
//!
//! [`classify`] turns a raw payload into a closed [`WirePayload`] variant; it
//! never performs cryptography. Decrypted plaintexts are JSON and decode into
//! [`MessageBlock`] or [`PresenceEvent`].
//!
//! # Invariants
//!
//! - A block's identity is the SHA-256 of [`MessageBlock::canonical_bytes`].
//!   Canonical bytes are compact JSON with the field order `content`,
//!   `timestamp`, `sender`, `username`, `previousHash`, `nonce`, so every
//!   conforming implementation hashes byte-identical input.
//! - [`Digest`] text is exactly 64 lowercase hex characters; anything else is
//!   rejected so a parsed block re-serialises to the sender's bytes.

#![forbid(unsafe_code)]
#![deny(missing_docs)]

mod block;
mod control;
mod digest;
mod error;
pub mod limits;
mod presence;
mod wire;

pub use block::MessageBlock;
pub use control::{ClientInfo, ControlPacket, HistoryEnvelope, UserEntry};
pub use digest::Digest;
pub use error::{ProtocolError, Result};
pub use presence::{PresenceAction, PresenceEvent};
pub use wire::{WirePayload, classify, encode_authenticated, encode_presence};
