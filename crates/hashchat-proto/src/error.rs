//! Protocol error types.

use thiserror::Error;

/// Result alias for protocol operations.
pub type Result<T> = std::result::Result<T, ProtocolError>;

/// Errors from wire classification and plaintext decoding.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    /// Payload does not match any wire grammar.
    #[error("malformed wire payload: {reason}")]
    MalformedWire {
        /// What was wrong with the payload
        reason: String,
    },

    /// Payload exceeds [`crate::limits::MAX_PAYLOAD_SIZE`].
    #[error("payload too large: {size} bytes (max {max})")]
    PayloadTooLarge {
        /// Actual size in bytes
        size: usize,
        /// Configured maximum
        max: usize,
    },

    /// Plaintext is not JSON at all.
    #[error("plaintext is not JSON: {reason}")]
    NotJson {
        /// Parser message
        reason: String,
    },

    /// Required field absent from a decoded object.
    #[error("missing field `{field}`")]
    MissingField {
        /// Field name as it appears on the wire
        field: &'static str,
    },

    /// Required field present but empty or zero.
    #[error("field `{field}` must not be empty")]
    EmptyField {
        /// Field name as it appears on the wire
        field: &'static str,
    },

    /// JSON value has the wrong shape or field types.
    #[error("invalid structure: {reason}")]
    InvalidStructure {
        /// Parser message
        reason: String,
    },

    /// Digest text is not 64 lowercase hex characters.
    #[error("invalid digest: {reason}")]
    InvalidDigest {
        /// What was wrong with the digest text
        reason: String,
    },
}

impl ProtocolError {
    /// Returns true if the error concerns the wire envelope rather than the
    /// decrypted content.
    pub fn is_wire_error(&self) -> bool {
        matches!(self, Self::MalformedWire { .. } | Self::PayloadTooLarge { .. })
    }
}
