//! Hashchat Cryptographic Primitives
//!
//! Cryptographic building blocks for hashchat rooms. Pure functions with
//! deterministic outputs. Callers provide random bytes (nonces) so that the
//! protocol layers above remain deterministic under simulation.
//!
//! # Key Lifecycle
//!
//! Every participant who knows the room passphrase derives the same session
//! key. The key never leaves the client; the relay only ever sees the topic
//! identifier, which is a one-way hash of the key.
//!
//! ```text
//! Passphrase
//!     │
//!     ▼
//! Argon2id → Session Key ──► SHA-256 → Topic ID (sent to relay)
//!     │
//!     ├──► XChaCha20-Poly1305 → Ciphertext (base64)
//!     │
//!     └──► HMAC-SHA256(ciphertext) → Wire Tag (hex)
//! ```
//!
//! # Security
//!
//! Confidentiality and integrity:
//! - XChaCha20-Poly1305 AEAD with a 24-byte caller-supplied random nonce
//! - HMAC-SHA256 over the transmitted ciphertext, verified in constant time
//!   before any decryption is attempted
//!
//! Trust model:
//! - Anyone holding the passphrase can read and forge room traffic. The
//!   primitives here protect against outsiders (relay, network), not members.

#![forbid(unsafe_code)]
#![deny(missing_docs)]

mod cipher;
mod error;
mod hash;
mod key;
mod mac;

pub use cipher::{NONCE_SIZE, decrypt, encrypt};
pub use error::CryptoError;
pub use hash::{sha256, sha256_hex};
pub use key::{KEY_SIZE, KdfParams, SessionKey, derive_key, topic_id};
pub use mac::{TAG_SIZE, hmac, verify_hmac};
