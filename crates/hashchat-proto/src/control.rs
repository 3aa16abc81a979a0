//! Relay control packets and handshake messages.
//!
//! Control packets are plaintext JSON produced by the relay, never by peers.
//! They carry no secrets: history entries are still authenticated
//! ciphertexts and the user list is the relay's own membership view.

use serde::{Deserialize, Deserializer, Serialize};

use crate::{Result, block::json_error};

/// One stored payload replayed by the relay.
///
/// `content` holds the original wire text (`tag:ciphertext` or a legacy
/// ciphertext). Older relays send bare strings instead of objects; both
/// forms decode. A `timestamp` hint that is not an unsigned integer is
/// dropped. An element that is neither form decodes with empty `content`,
/// which no wire grammar accepts, so one bad entry never fails the packet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "EnvelopeRepr")]
pub struct HistoryEnvelope {
    /// Raw wire payload.
    pub content: String,
    /// Coarse ordering hint from the relay, if it keeps one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<u64>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum EnvelopeRepr {
    Bare(String),
    Wrapped {
        content: String,
        #[serde(default)]
        timestamp: serde_json::Value,
    },
    Unreadable(serde_json::Value),
}

impl From<EnvelopeRepr> for HistoryEnvelope {
    fn from(repr: EnvelopeRepr) -> Self {
        match repr {
            EnvelopeRepr::Bare(content) => Self { content, timestamp: None },
            EnvelopeRepr::Wrapped { content, timestamp } => {
                Self { content, timestamp: timestamp.as_u64() }
            },
            EnvelopeRepr::Unreadable(_) => Self { content: String::new(), timestamp: None },
        }
    }
}

impl HistoryEnvelope {
    /// Envelope without a timestamp hint.
    pub fn new(content: impl Into<String>) -> Self {
        Self { content: content.into(), timestamp: None }
    }
}

/// Membership entry in a `userlist` packet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserEntry {
    /// Client identifier.
    #[serde(default)]
    pub client_id: String,
    /// Display name.
    #[serde(default)]
    pub username: String,
}

/// Plaintext JSON packet from the relay, discriminated by `type`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ControlPacket {
    /// Stored payloads for the room, oldest first as the relay saw them.
    History {
        /// Replayed payloads.
        #[serde(default, deserialize_with = "null_as_empty")]
        messages: Vec<HistoryEnvelope>,
    },
    /// Authoritative snapshot of who is in the room.
    Userlist {
        /// Current members.
        #[serde(default, deserialize_with = "null_as_empty")]
        users: Vec<UserEntry>,
    },
}

impl ControlPacket {
    /// Serialise for the transport.
    pub fn encode(&self) -> String {
        let Ok(text) = serde_json::to_string(self) else {
            unreachable!("ControlPacket has only string and integer fields");
        };
        text
    }
}

// Go relays marshal an empty slice as `null`.
fn null_as_empty<'de, D, T>(deserializer: D) -> std::result::Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Ok(Option::<Vec<T>>::deserialize(deserializer)?.unwrap_or_default())
}

/// Identity announced to the relay right after the room topic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientInfo {
    /// Client identifier.
    #[serde(default)]
    pub client_id: String,
    /// Display name.
    #[serde(default)]
    pub username: String,
}

impl ClientInfo {
    /// Serialise for the transport.
    pub fn encode(&self) -> String {
        let Ok(text) = serde_json::to_string(self) else {
            unreachable!("ClientInfo has only string fields");
        };
        text
    }

    /// Parse the relay-side handshake message. Missing fields are empty.
    pub fn decode(text: &str) -> Result<Self> {
        serde_json::from_str(text).map_err(json_error)
    }
}
