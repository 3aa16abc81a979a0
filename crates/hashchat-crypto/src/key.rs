//! Session key derivation from a shared passphrase.

use std::fmt;

use argon2::{Algorithm, Argon2, Params, Version};
use zeroize::Zeroize;

use crate::{
    error::CryptoError,
    hash::{sha256, sha256_hex},
};

/// Size of the session key in bytes.
pub const KEY_SIZE: usize = 32;

/// Domain label mixed into the salt.
///
/// Every participant must derive the same key, so the salt depends only on the
/// passphrase.
const SALT_LABEL: &[u8] = b"hashchat room salt v1";

/// Argon2id cost parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KdfParams {
    /// Memory cost in KiB.
    pub memory_kib: u32,
    /// Number of passes.
    pub iterations: u32,
    /// Degree of parallelism.
    pub parallelism: u32,
}

impl Default for KdfParams {
    fn default() -> Self {
        Self { memory_kib: 19 * 1024, iterations: 2, parallelism: 1 }
    }
}

/// Symmetric key shared by everyone in a room.
///
/// Used both as the AEAD key and as the HMAC key. Zeroized on drop.
#[derive(Clone, PartialEq, Eq)]
pub struct SessionKey {
    bytes: [u8; KEY_SIZE],
}

impl SessionKey {
    /// Wrap raw key bytes.
    pub fn from_bytes(bytes: [u8; KEY_SIZE]) -> Self {
        Self { bytes }
    }

    /// Raw key bytes.
    pub fn as_bytes(&self) -> &[u8; KEY_SIZE] {
        &self.bytes
    }
}

impl fmt::Debug for SessionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionKey").field("bytes", &"[REDACTED]").finish()
    }
}

impl Drop for SessionKey {
    fn drop(&mut self) {
        self.bytes.zeroize();
    }
}

/// Derive the room session key from a passphrase.
///
/// Deterministic: the same passphrase and parameters always produce the same
/// key, which is what lets participants meet without any key exchange.
///
/// # Errors
///
/// - `EmptyPassphrase` for an empty phrase
/// - `KeyDerivation` if the Argon2 parameters are out of range
pub fn derive_key(passphrase: &str, params: &KdfParams) -> Result<SessionKey, CryptoError> {
    if passphrase.is_empty() {
        return Err(CryptoError::EmptyPassphrase);
    }

    let argon_params =
        Params::new(params.memory_kib, params.iterations, params.parallelism, Some(KEY_SIZE))
            .map_err(|e| CryptoError::KeyDerivation { reason: e.to_string() })?;
    let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, argon_params);

    let mut salt_input = Vec::with_capacity(SALT_LABEL.len() + passphrase.len());
    salt_input.extend_from_slice(SALT_LABEL);
    salt_input.extend_from_slice(passphrase.as_bytes());
    let salt = sha256(&salt_input);
    salt_input.zeroize();

    let mut output = [0u8; KEY_SIZE];
    argon2
        .hash_password_into(passphrase.as_bytes(), &salt, &mut output)
        .map_err(|e| CryptoError::KeyDerivation { reason: e.to_string() })?;

    let key = SessionKey::from_bytes(output);
    output.zeroize();
    Ok(key)
}

/// Relay-visible room identifier for a key.
///
/// SHA-256 over the lowercase hex form of the key, rendered as lowercase hex.
pub fn topic_id(key: &SessionKey) -> String {
    let mut key_hex = hex::encode(key.as_bytes());
    let topic = sha256_hex(key_hex.as_bytes());
    key_hex.zeroize();
    topic
}
