//! Client errors.
//!
//! Only caller misuse surfaces here. Problems with inbound payloads are
//! never errors to the caller; they become notices and log events.

use thiserror::Error;

/// Errors from [`crate::Client::handle`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ClientError {
    /// Message sent while the transport is down.
    #[error("not connected")]
    NotConnected,

    /// Message text is empty after trimming.
    #[error("message is empty")]
    EmptyMessage,
}
