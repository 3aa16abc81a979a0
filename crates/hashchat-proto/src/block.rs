//! Chained message blocks.

use serde::{Deserialize, Deserializer, Serialize};

use crate::{
    digest::Digest,
    error::{ProtocolError, Result},
};

/// The chained unit of chat content.
///
/// Field order is the canonical serialisation order; do not reorder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageBlock {
    /// Message text.
    pub content: String,
    /// Sender wall clock, epoch milliseconds.
    pub timestamp: u64,
    /// Opaque sender client identifier.
    pub sender: String,
    /// Sender display name.
    pub username: String,
    /// Digest of the block this one extends, `None` for the first block.
    pub previous_hash: Option<Digest>,
    /// Salt so identical content sent in the same millisecond hashes apart.
    pub nonce: u64,
}

/// Wire view of a block before structural checks.
///
/// Every field is optional so absence can be reported precisely.
/// `previous_hash` distinguishes a missing key (`None`) from an explicit
/// `null` (`Some(None)`).
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawBlock {
    content: Option<String>,
    timestamp: Option<u64>,
    sender: Option<String>,
    #[serde(default)]
    username: Option<String>,
    #[serde(default, deserialize_with = "explicit")]
    previous_hash: Option<Option<Digest>>,
    nonce: Option<u64>,
}

fn explicit<'de, D>(deserializer: D) -> std::result::Result<Option<Option<Digest>>, D::Error>
where
    D: Deserializer<'de>,
{
    Option::<Digest>::deserialize(deserializer).map(Some)
}

impl MessageBlock {
    /// Canonical bytes hashed to form the block's identity.
    ///
    /// Compact JSON, fields in declaration order, strings escaped the way
    /// `JSON.stringify` escapes them.
    pub fn canonical_bytes(&self) -> Vec<u8> {
        let Ok(bytes) = serde_json::to_vec(self) else {
            unreachable!("MessageBlock has only string, integer and digest fields");
        };
        bytes
    }

    /// Decode and structurally validate a decrypted plaintext.
    ///
    /// Requires non-empty `content` and `sender`, a non-zero `timestamp`, and
    /// an explicit `previousHash` (which may be `null`). A missing `username`
    /// decodes as the empty string and a missing `nonce` as zero, so blocks
    /// from clients that never salt still chain.
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        let raw: RawBlock = serde_json::from_slice(bytes).map_err(json_error)?;

        let content = raw.content.ok_or(ProtocolError::MissingField { field: "content" })?;
        if content.is_empty() {
            return Err(ProtocolError::EmptyField { field: "content" });
        }

        let timestamp = raw.timestamp.ok_or(ProtocolError::MissingField { field: "timestamp" })?;
        if timestamp == 0 {
            return Err(ProtocolError::EmptyField { field: "timestamp" });
        }

        let sender = raw.sender.ok_or(ProtocolError::MissingField { field: "sender" })?;
        if sender.is_empty() {
            return Err(ProtocolError::EmptyField { field: "sender" });
        }

        let previous_hash =
            raw.previous_hash.ok_or(ProtocolError::MissingField { field: "previousHash" })?;

        Ok(Self {
            content,
            timestamp,
            sender,
            username: raw.username.unwrap_or_default(),
            previous_hash,
            nonce: raw.nonce.unwrap_or_default(),
        })
    }
}

/// Map a `serde_json` failure onto the protocol taxonomy.
pub(crate) fn json_error(err: serde_json::Error) -> ProtocolError {
    use serde_json::error::Category;

    match err.classify() {
        Category::Syntax | Category::Eof | Category::Io => {
            ProtocolError::NotJson { reason: err.to_string() }
        },
        Category::Data => ProtocolError::InvalidStructure { reason: err.to_string() },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PREV: &str = "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad";

    fn sample() -> MessageBlock {
        MessageBlock {
            content: "hi".to_string(),
            timestamp: 1_700_000_000_000,
            sender: "client-a".to_string(),
            username: "alice".to_string(),
            previous_hash: None,
            nonce: 42,
        }
    }

    #[test]
    fn canonical_field_order() {
        let bytes = sample().canonical_bytes();
        assert_eq!(
            String::from_utf8(bytes).unwrap(),
            r#"{"content":"hi","timestamp":1700000000000,"sender":"client-a","username":"alice","previousHash":null,"nonce":42}"#
        );
    }

    #[test]
    fn canonical_with_previous_hash() {
        let block = MessageBlock { previous_hash: Some(PREV.parse().unwrap()), ..sample() };
        let text = String::from_utf8(block.canonical_bytes()).unwrap();
        assert!(text.contains(&format!(r#""previousHash":"{PREV}""#)));
    }

    #[test]
    fn decode_ignores_key_order() {
        let json = format!(
            r#"{{"nonce":7,"previousHash":"{PREV}","username":"bob","sender":"b","timestamp":5,"content":"yo"}}"#
        );
        let block = MessageBlock::decode(json.as_bytes()).unwrap();
        assert_eq!(block.nonce, 7);
        assert_eq!(block.previous_hash, Some(PREV.parse().unwrap()));
        assert_eq!(block.username, "bob");
    }

    #[test]
    fn decode_then_canonical_reproduces_sender_bytes() {
        let original = sample().canonical_bytes();
        let decoded = MessageBlock::decode(&original).unwrap();
        assert_eq!(decoded.canonical_bytes(), original);
    }

    #[test]
    fn explicit_null_is_first_in_chain() {
        let json = r#"{"content":"a","timestamp":1,"sender":"s","previousHash":null,"nonce":1}"#;
        let block = MessageBlock::decode(json.as_bytes()).unwrap();
        assert_eq!(block.previous_hash, None);
        assert_eq!(block.username, "");
    }

    #[test]
    fn absent_previous_hash_is_structural_error() {
        let json = r#"{"content":"a","timestamp":1,"sender":"s","nonce":1}"#;
        assert_eq!(
            MessageBlock::decode(json.as_bytes()),
            Err(ProtocolError::MissingField { field: "previousHash" })
        );
    }

    #[test]
    fn empty_required_fields_rejected() {
        let empty_content = r#"{"content":"","timestamp":1,"sender":"s","previousHash":null,"nonce":1}"#;
        assert_eq!(
            MessageBlock::decode(empty_content.as_bytes()),
            Err(ProtocolError::EmptyField { field: "content" })
        );

        let zero_time = r#"{"content":"a","timestamp":0,"sender":"s","previousHash":null,"nonce":1}"#;
        assert_eq!(
            MessageBlock::decode(zero_time.as_bytes()),
            Err(ProtocolError::EmptyField { field: "timestamp" })
        );

        let no_sender = r#"{"content":"a","timestamp":1,"previousHash":null,"nonce":1}"#;
        assert_eq!(
            MessageBlock::decode(no_sender.as_bytes()),
            Err(ProtocolError::MissingField { field: "sender" })
        );
    }

    #[test]
    fn missing_nonce_is_zero() {
        let json = r#"{"content":"hi","timestamp":5,"sender":"s","username":"u","previousHash":null}"#;
        let block = MessageBlock::decode(json.as_bytes()).unwrap();
        assert_eq!(block.nonce, 0);
        assert_eq!(
            String::from_utf8(block.canonical_bytes()).unwrap(),
            r#"{"content":"hi","timestamp":5,"sender":"s","username":"u","previousHash":null,"nonce":0}"#
        );
    }

    #[test]
    fn not_json_and_wrong_types_are_distinguished() {
        assert!(matches!(MessageBlock::decode(b"hello there"), Err(ProtocolError::NotJson { .. })));
        assert!(matches!(
            MessageBlock::decode(br#"{"content":5}"#),
            Err(ProtocolError::InvalidStructure { .. })
        ));
        assert!(matches!(
            MessageBlock::decode(br#"{"content":"a","timestamp":1,"sender":"s","previousHash":"ABC","nonce":1}"#),
            Err(ProtocolError::InvalidStructure { .. })
        ));
    }

    #[test]
    fn unknown_fields_are_ignored() {
        let json = r#"{"content":"a","timestamp":1,"sender":"s","previousHash":null,"nonce":1,"extra":true}"#;
        assert!(MessageBlock::decode(json.as_bytes()).is_ok());
    }

    #[test]
    fn unicode_is_preserved() {
        let block = MessageBlock { content: "héllo \u{1F600} \"quoted\"".to_string(), ..sample() };
        let decoded = MessageBlock::decode(&block.canonical_bytes()).unwrap();
        assert_eq!(decoded, block);
    }
}
