//! Crypto error types.

use thiserror::Error;

/// Errors from hashchat cryptographic operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CryptoError {
    /// Passphrase was empty.
    #[error("passphrase must not be empty")]
    EmptyPassphrase,

    /// Key derivation parameters were rejected or hashing failed.
    #[error("key derivation failed: {reason}")]
    KeyDerivation {
        /// Why derivation failed
        reason: String,
    },

    /// Ciphertext could not be decoded or failed authentication.
    ///
    /// Bad encodings, truncated input and AEAD failures are deliberately
    /// indistinguishable to callers.
    #[error("decryption failed: {reason}")]
    DecryptionFailed {
        /// Why decryption failed
        reason: String,
    },
}
