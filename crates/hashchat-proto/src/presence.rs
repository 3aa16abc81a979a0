//! Presence events.
//!
//! Presence is a transient membership signal. It is authenticated like a
//! chat message but never chained or stored.

use serde::{Deserialize, Serialize};

use crate::{
    block::json_error,
    error::{ProtocolError, Result},
};

/// Join or leave.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PresenceAction {
    /// Client entered the room.
    Join,
    /// Client left the room.
    Leave,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
enum PresenceTag {
    Presence,
}

/// Decrypted presence payload: `{type:"presence", action, clientId, username, timestamp}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PresenceEvent {
    #[serde(rename = "type")]
    kind: PresenceTag,
    /// Join or leave.
    pub action: PresenceAction,
    /// Client the event is about.
    pub client_id: String,
    /// Display name of that client.
    #[serde(default)]
    pub username: String,
    /// Sender wall clock, epoch milliseconds.
    #[serde(default)]
    pub timestamp: u64,
}

impl PresenceEvent {
    /// Build a presence event.
    pub fn new(
        action: PresenceAction,
        client_id: impl Into<String>,
        username: impl Into<String>,
        timestamp: u64,
    ) -> Self {
        Self {
            kind: PresenceTag::Presence,
            action,
            client_id: client_id.into(),
            username: username.into(),
            timestamp,
        }
    }

    /// JSON plaintext ready for encryption.
    pub fn encode(&self) -> Vec<u8> {
        let Ok(bytes) = serde_json::to_vec(self) else {
            unreachable!("PresenceEvent has only string, integer and enum fields");
        };
        bytes
    }

    /// Decode a decrypted presence plaintext. `clientId` must be non-empty.
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        let event: Self = serde_json::from_slice(bytes).map_err(json_error)?;
        if event.client_id.is_empty() {
            return Err(ProtocolError::EmptyField { field: "clientId" });
        }
        Ok(event)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encodes_wire_shape() {
        let event = PresenceEvent::new(PresenceAction::Join, "c1", "alice", 10);
        let text = String::from_utf8(event.encode()).unwrap();
        assert_eq!(
            text,
            r#"{"type":"presence","action":"join","clientId":"c1","username":"alice","timestamp":10}"#
        );
    }

    #[test]
    fn decode_roundtrip() {
        let event = PresenceEvent::new(PresenceAction::Leave, "c2", "bob", 99);
        assert_eq!(PresenceEvent::decode(&event.encode()).unwrap(), event);
    }

    #[test]
    fn wrong_type_tag_rejected() {
        let json = br#"{"type":"chat","action":"join","clientId":"c1","username":"a","timestamp":1}"#;
        assert!(matches!(PresenceEvent::decode(json), Err(ProtocolError::InvalidStructure { .. })));
    }

    #[test]
    fn unknown_action_rejected() {
        let json = br#"{"type":"presence","action":"wave","clientId":"c1"}"#;
        assert!(PresenceEvent::decode(json).is_err());
    }

    #[test]
    fn empty_client_id_rejected() {
        let json = br#"{"type":"presence","action":"join","clientId":""}"#;
        assert_eq!(PresenceEvent::decode(json), Err(ProtocolError::EmptyField { field: "clientId" }));
    }
}
