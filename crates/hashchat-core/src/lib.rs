//! Hashchat session core.
//!
//! Sans-IO logic for an end-to-end encrypted room whose messages form a
//! per-client hash chain. Callers feed transport payloads into a [`Session`]
//! and act on the returned [`Inbound`] outcome; nothing here touches a
//! socket, the clock or the OS RNG directly.
//!
//! # Components
//!
//! - [`Authenticator`]: HMAC tag and verify; decrypts only after the tag
//!   checks out.
//! - [`ChainValidator`] and [`Chain`]: acceptance, duplicate rejection,
//!   orphan flagging and head selection for chained blocks.
//! - [`HistoryReconciler`]: rebuilds chain state from the relay's replay.
//! - [`PresenceTracker`]: who is in the room.
//!
//! Every failure is local to the payload that caused it. See [`ChatError`]
//! for the taxonomy.

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod auth;
pub mod chain;
pub mod config;
pub mod env;
pub mod error;
pub mod history;
pub mod presence;
pub mod session;

pub use auth::Authenticator;
pub use chain::{Chain, ChainValidator, Verdict, block_digest};
pub use config::{OrphanPolicy, SessionConfig};
pub use env::Environment;
pub use error::ChatError;
pub use history::{Continuity, HistoryEntry, HistoryReconciler, HistoryReport};
pub use presence::{OnlineUser, PresenceChange, PresenceTracker};
pub use session::{Identity, Inbound, Outgoing, Session};
