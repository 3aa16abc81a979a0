//! Ciphertext authentication.
//!
//! Every authenticated payload carries a hex HMAC-SHA256 tag over the
//! ciphertext text. [`Authenticator::open`] checks the tag before touching
//! the cipher; a payload that fails verification is never decrypted.

use hashchat_crypto::{NONCE_SIZE, SessionKey, TAG_SIZE, decrypt, encrypt, hmac, verify_hmac};

use crate::error::ChatError;

/// Tag and verify ciphertexts under the shared room key.
pub struct Authenticator;

impl Authenticator {
    /// Lowercase hex HMAC of the ciphertext text.
    pub fn tag(ciphertext: &str, key: &SessionKey) -> String {
        hex::encode(hmac(ciphertext.as_bytes(), key))
    }

    /// Constant-time check of a received hex tag.
    ///
    /// Tags that are not exactly 64 hex characters fail without comparison.
    pub fn verify(received_tag: &str, ciphertext: &str, key: &SessionKey) -> bool {
        let mut tag = [0u8; TAG_SIZE];
        if hex::decode_to_slice(received_tag, &mut tag).is_err() {
            return false;
        }
        verify_hmac(ciphertext.as_bytes(), key, &tag)
    }

    /// Encrypt a plaintext and tag the result. Returns `(tag, ciphertext)`.
    pub fn seal(plaintext: &[u8], key: &SessionKey, nonce: [u8; NONCE_SIZE]) -> (String, String) {
        let ciphertext = encrypt(plaintext, key, nonce);
        let tag = Self::tag(&ciphertext, key);
        (tag, ciphertext)
    }

    /// Verify then decrypt an authenticated payload.
    ///
    /// `kind` names the wire kind in the resulting error.
    pub fn open(
        received_tag: &str,
        ciphertext: &str,
        key: &SessionKey,
        kind: &'static str,
    ) -> Result<String, ChatError> {
        if !Self::verify(received_tag, ciphertext, key) {
            return Err(ChatError::AuthenticationFailure { kind });
        }
        Self::open_untagged(ciphertext, key)
    }

    /// Decrypt a legacy payload that carries no tag.
    pub fn open_untagged(ciphertext: &str, key: &SessionKey) -> Result<String, ChatError> {
        let plaintext = decrypt(ciphertext, key)?;
        String::from_utf8(plaintext).map_err(|_| ChatError::DecryptionFailure {
            reason: "plaintext is not UTF-8".to_string(),
        })
    }
}
