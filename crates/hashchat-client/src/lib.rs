//! Client
//!
//! Action-based client state machine for hashchat rooms. Owns one
//! [`hashchat_core::Session`] and turns relay payloads and user intents into
//! display actions.
//!
//! # Architecture
//!
//! The client follows the same Sans-IO and Action-Based patterns as
//! [`hashchat_core`]. It receives events ([`ClientEvent`]), processes them
//! through pure state machine logic, and returns actions ([`ClientAction`])
//! for the caller to execute.
//!
//! # Components
//!
//! - [`Client`]: Top-level state machine for one room
//! - [`SystemEnv`]: Wall-clock time and OS randomness
//! - [`ClientEvent`]: Events fed into the client
//! - [`ClientAction`]: Actions produced by the client
//!
//! # Transport (optional)
//!
//! With the `transport` feature enabled, this crate also provides:
//! - [`transport::ConnectedClient`]: Channels bridged to a relay WebSocket
//! - [`transport::connect`]: Connect to a relay

#![forbid(unsafe_code)]
#![deny(missing_docs)]

mod client;
mod error;
mod event;
mod system_env;

#[cfg(feature = "transport")]
pub mod transport;

pub use client::{
    CONNECTED_NOTICE, Client, DISCONNECTED_NOTICE, EMPTY_HISTORY_NOTICE, TAMPER_NOTICE,
};
pub use error::ClientError;
pub use event::{
    ChatMessage, ClientAction, ClientEvent, HistorySummary, MessageOrigin, Notice, NoticeLevel,
};
pub use hashchat_core::{Environment, Identity, OnlineUser, SessionConfig};
pub use system_env::SystemEnv;
