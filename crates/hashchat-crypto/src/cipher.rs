//! Payload encryption using `XChaCha20-Poly1305`
//!
//! All functions are pure - the nonce must be provided by the caller.
//! Ciphertext travels as text, so the output is standard base64 of
//! `nonce || ciphertext || tag`. The base64 alphabet has no `:`, which keeps
//! ciphertext clear of the wire separator.

use base64::{Engine, engine::general_purpose::STANDARD};
use chacha20poly1305::{
    XChaCha20Poly1305, XNonce,
    aead::{Aead, KeyInit},
};

use crate::{error::CryptoError, key::SessionKey};

/// Size of the `XChaCha20` nonce (24 bytes)
pub const NONCE_SIZE: usize = 24;

/// Poly1305 tag size (16 bytes)
const POLY1305_TAG_SIZE: usize = 16;

/// Encrypt `plaintext` under the session key.
///
/// # Security
///
/// - Caller MUST provide a fresh, cryptographically random nonce in
///   production; 24 bytes make random collisions negligible
/// - Authenticated encryption prevents tampering
pub fn encrypt(plaintext: &[u8], key: &SessionKey, nonce: [u8; NONCE_SIZE]) -> String {
    let cipher = XChaCha20Poly1305::new(key.as_bytes().into());

    let Ok(ciphertext) = cipher.encrypt(XNonce::from_slice(&nonce), plaintext) else {
        unreachable!("XChaCha20-Poly1305 encryption cannot fail with valid inputs");
    };

    let mut sealed = Vec::with_capacity(NONCE_SIZE + ciphertext.len());
    sealed.extend_from_slice(&nonce);
    sealed.extend_from_slice(&ciphertext);
    STANDARD.encode(sealed)
}

/// Decrypt text produced by [`encrypt`].
///
/// # Errors
///
/// - `DecryptionFailed`: not base64, too short, wrong key or tampered
pub fn decrypt(text: &str, key: &SessionKey) -> Result<Vec<u8>, CryptoError> {
    let sealed = STANDARD
        .decode(text.trim())
        .map_err(|e| CryptoError::DecryptionFailed { reason: format!("invalid base64: {e}") })?;

    if sealed.len() < NONCE_SIZE + POLY1305_TAG_SIZE {
        return Err(CryptoError::DecryptionFailed {
            reason: format!("ciphertext too short: {} bytes", sealed.len()),
        });
    }

    let (nonce, ciphertext) = sealed.split_at(NONCE_SIZE);
    let cipher = XChaCha20Poly1305::new(key.as_bytes().into());

    cipher.decrypt(XNonce::from_slice(nonce), ciphertext).map_err(|_| {
        CryptoError::DecryptionFailed { reason: "authentication failed".to_string() }
    })
}
