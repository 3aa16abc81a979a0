//! HMAC-SHA256 message authentication.

use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::key::SessionKey;

type HmacSha256 = Hmac<Sha256>;

/// HMAC-SHA256 output size (32 bytes)
pub const TAG_SIZE: usize = 32;

/// Compute the HMAC-SHA256 of `bytes` under the session key.
pub fn hmac(bytes: &[u8], key: &SessionKey) -> [u8; TAG_SIZE] {
    let Ok(mut mac) = HmacSha256::new_from_slice(key.as_bytes()) else {
        unreachable!("HMAC-SHA256 accepts any key size");
    };
    mac.update(bytes);
    mac.finalize().into_bytes().into()
}

/// Check `tag` against the HMAC of `bytes` in constant time.
///
/// A tag of the wrong length is rejected outright.
pub fn verify_hmac(bytes: &[u8], key: &SessionKey, tag: &[u8]) -> bool {
    let Ok(mut mac) = HmacSha256::new_from_slice(key.as_bytes()) else {
        unreachable!("HMAC-SHA256 accepts any key size");
    };
    mac.update(bytes);
    mac.verify_slice(tag).is_ok()
}
