//! Block digests.

use std::{fmt, str::FromStr};

use serde::{Deserialize, Deserializer, Serialize, Serializer, de};

use crate::{error::ProtocolError, limits::DIGEST_HEX_LEN};

/// SHA-256 identity of a [`crate::MessageBlock`].
///
/// Text form is exactly 64 lowercase hex characters, both when displayed and
/// when (de)serialised as the `previousHash` field.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Digest([u8; 32]);

impl Digest {
    /// Digest size in bytes.
    pub const SIZE: usize = 32;

    /// Wrap raw digest bytes.
    pub const fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Raw digest bytes.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Lowercase hex form.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// First ten hex characters, for logs and notices.
    pub fn short(&self) -> String {
        let mut hex = self.to_hex();
        hex.truncate(10);
        hex
    }
}

impl fmt::Display for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Digest({})", self.short())
    }
}

impl From<[u8; 32]> for Digest {
    fn from(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }
}

impl FromStr for Digest {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.len() != DIGEST_HEX_LEN {
            return Err(ProtocolError::InvalidDigest {
                reason: format!("expected {DIGEST_HEX_LEN} hex characters, got {}", s.len()),
            });
        }

        // Uppercase would decode fine but re-encode differently.
        if !s.bytes().all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b)) {
            return Err(ProtocolError::InvalidDigest {
                reason: "digest must be lowercase hex".to_string(),
            });
        }

        let mut bytes = [0u8; 32];
        hex::decode_to_slice(s, &mut bytes)
            .map_err(|e| ProtocolError::InvalidDigest { reason: e.to_string() })?;
        Ok(Self(bytes))
    }
}

impl Serialize for Digest {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for Digest {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        text.parse().map_err(de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad";

    #[test]
    fn parse_display_roundtrip() {
        let digest: Digest = SAMPLE.parse().unwrap();
        assert_eq!(digest.to_string(), SAMPLE);
        assert_eq!(digest.short(), "ba7816bf8f");
    }

    #[test]
    fn uppercase_is_rejected() {
        let upper = SAMPLE.to_uppercase();
        assert!(matches!(upper.parse::<Digest>(), Err(ProtocolError::InvalidDigest { .. })));
    }

    #[test]
    fn wrong_length_is_rejected() {
        assert!("abcd".parse::<Digest>().is_err());
        assert!(format!("{SAMPLE}00").parse::<Digest>().is_err());
    }

    #[test]
    fn serde_uses_hex_string() {
        let digest: Digest = SAMPLE.parse().unwrap();
        let json = serde_json::to_string(&digest).unwrap();
        assert_eq!(json, format!("\"{SAMPLE}\""));
        let back: Digest = serde_json::from_str(&json).unwrap();
        assert_eq!(back, digest);
    }

    #[test]
    fn non_string_is_rejected() {
        assert!(serde_json::from_str::<Digest>("42").is_err());
    }
}
