//! Error taxonomy for inbound processing.
//!
//! None of these end a session. Every variant is logged and, where a user
//! should know, surfaced as a notice in the chat stream. [`ChatError::is_warning`]
//! separates conditions where the message is still shown from those where it
//! is dropped.

use hashchat_crypto::CryptoError;
use hashchat_proto::{Digest, ProtocolError};
use thiserror::Error;

/// Conditions raised while processing a payload.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ChatError {
    /// Payload matches no wire grammar.
    #[error("malformed wire payload: {reason}")]
    MalformedWire {
        /// Why classification failed
        reason: String,
    },

    /// HMAC tag did not match the ciphertext.
    #[error("{kind} payload failed authentication")]
    AuthenticationFailure {
        /// Wire kind that failed (`message`, `presence`, ...)
        kind: &'static str,
    },

    /// Cipher rejected the ciphertext or produced undecodable plaintext.
    #[error("decryption failed: {reason}")]
    DecryptionFailure {
        /// Underlying failure
        reason: String,
    },

    /// Decrypted plaintext is missing a required field or has the wrong shape.
    #[error("structurally invalid payload: {reason}")]
    StructuralInvalid {
        /// What was wrong
        reason: String,
    },

    /// Block digest already accepted. A replay, not a fault.
    #[error("duplicate message {digest}")]
    DuplicateMessage {
        /// Digest of the replayed block
        digest: Digest,
    },

    /// Block links to a digest this client has never seen. Still accepted.
    #[error("message {digest} references unknown previous hash {previous}")]
    OrphanReference {
        /// Digest of the accepted block
        digest: Digest,
        /// Unknown `previousHash`
        previous: Digest,
    },

    /// Orphan refused because the session runs with a strict chain policy.
    #[error("message {digest} rejected: unknown previous hash {previous}")]
    OrphanRejected {
        /// Digest of the refused block
        digest: Digest,
        /// Unknown `previousHash`
        previous: Digest,
    },

    /// History replay link mismatch. The message is still shown.
    #[error("chain discontinuity at {digest}: expected previous {expected:?}, found {found:?}")]
    ChainDiscontinuity {
        /// Digest of the annotated block
        digest: Digest,
        /// Rolling expectation at this point in the replay
        expected: Option<Digest>,
        /// The block's own `previousHash`
        found: Option<Digest>,
    },
}

impl ChatError {
    /// Returns true if the message concerned is still accepted and shown.
    pub fn is_warning(&self) -> bool {
        matches!(
            self,
            Self::DuplicateMessage { .. }
                | Self::OrphanReference { .. }
                | Self::ChainDiscontinuity { .. }
        )
    }

    /// Returns true if the condition suggests an active attacker or a peer
    /// with a different key, rather than loss or reordering.
    pub fn is_tamper_signal(&self) -> bool {
        matches!(self, Self::AuthenticationFailure { .. })
    }
}

impl From<ProtocolError> for ChatError {
    fn from(err: ProtocolError) -> Self {
        if err.is_wire_error() {
            Self::MalformedWire { reason: err.to_string() }
        } else {
            Self::StructuralInvalid { reason: err.to_string() }
        }
    }
}

impl From<CryptoError> for ChatError {
    fn from(err: CryptoError) -> Self {
        Self::DecryptionFailure { reason: err.to_string() }
    }
}
