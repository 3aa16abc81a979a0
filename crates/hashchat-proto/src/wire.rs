//! Wire payload classification and encoding.

use crate::{
    control::ControlPacket,
    error::{ProtocolError, Result},
    limits::{MAX_PAYLOAD_SIZE, PRESENCE_MARKER, SEPARATOR},
};

/// A transport payload sorted into one of the four wire kinds.
///
/// Borrowed segments point into the original payload; nothing has been
/// authenticated or decrypted yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WirePayload<'a> {
    /// Plaintext relay packet.
    Control(ControlPacket),
    /// `<tag>:presence:<ciphertext>`
    Presence {
        /// Hex HMAC over `ciphertext`
        tag: &'a str,
        /// Encrypted [`crate::PresenceEvent`]
        ciphertext: &'a str,
    },
    /// `<tag>:<ciphertext>`
    Authenticated {
        /// Hex HMAC over `ciphertext`
        tag: &'a str,
        /// Encrypted [`crate::MessageBlock`]
        ciphertext: &'a str,
    },
    /// `<ciphertext>` from the older untagged format.
    Legacy {
        /// Encrypted plaintext
        ciphertext: &'a str,
    },
}

impl WirePayload<'_> {
    /// Short name for logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Control(ControlPacket::History { .. }) => "history",
            Self::Control(ControlPacket::Userlist { .. }) => "userlist",
            Self::Presence { .. } => "presence",
            Self::Authenticated { .. } => "authenticated",
            Self::Legacy { .. } => "legacy",
        }
    }
}

/// Classify a raw transport payload.
///
/// Decode order: structured control packet, then the separator grammar, then
/// the legacy form. Ciphertext and tags never start with `{`, so a payload
/// that does but is not a recognised control packet is malformed.
pub fn classify(payload: &str) -> Result<WirePayload<'_>> {
    if payload.len() > MAX_PAYLOAD_SIZE {
        return Err(ProtocolError::PayloadTooLarge { size: payload.len(), max: MAX_PAYLOAD_SIZE });
    }

    let payload = payload.trim();
    if payload.is_empty() {
        return Err(malformed("empty payload"));
    }

    if payload.starts_with('{') {
        return serde_json::from_str::<ControlPacket>(payload)
            .map(WirePayload::Control)
            .map_err(|e| ProtocolError::MalformedWire {
                reason: format!("unrecognised control packet: {e}"),
            });
    }

    let mut fields = payload.split(SEPARATOR);
    let first = fields.next().unwrap_or_default();
    let second = fields.next();
    let third = fields.next();
    if fields.next().is_some() {
        return Err(malformed("too many separators"));
    }

    match (second, third) {
        (None, _) => Ok(WirePayload::Legacy { ciphertext: first }),
        (Some(ciphertext), None) => {
            if first.is_empty() {
                return Err(malformed("missing tag segment"));
            }
            if ciphertext.is_empty() {
                return Err(malformed("missing ciphertext segment"));
            }
            Ok(WirePayload::Authenticated { tag: first, ciphertext })
        },
        (Some(marker), Some(ciphertext)) => {
            if marker != PRESENCE_MARKER {
                return Err(malformed("three segments without presence marker"));
            }
            if first.is_empty() {
                return Err(malformed("missing tag segment"));
            }
            if ciphertext.is_empty() {
                return Err(malformed("missing ciphertext segment"));
            }
            Ok(WirePayload::Presence { tag: first, ciphertext })
        },
    }
}

/// `tag:ciphertext`
pub fn encode_authenticated(tag: &str, ciphertext: &str) -> String {
    format!("{tag}{SEPARATOR}{ciphertext}")
}

/// `tag:presence:ciphertext`
pub fn encode_presence(tag: &str, ciphertext: &str) -> String {
    format!("{tag}{SEPARATOR}{PRESENCE_MARKER}{SEPARATOR}{ciphertext}")
}

fn malformed(reason: &str) -> ProtocolError {
    ProtocolError::MalformedWire { reason: reason.to_string() }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::control::{HistoryEnvelope, UserEntry};

    #[test]
    fn classifies_authenticated() {
        assert_eq!(
            classify("abc123:Q2lwaGVy").unwrap(),
            WirePayload::Authenticated { tag: "abc123", ciphertext: "Q2lwaGVy" }
        );
    }

    #[test]
    fn classifies_presence() {
        assert_eq!(
            classify("abc123:presence:Q2lwaGVy").unwrap(),
            WirePayload::Presence { tag: "abc123", ciphertext: "Q2lwaGVy" }
        );
    }

    #[test]
    fn classifies_legacy() {
        assert_eq!(classify("abcd").unwrap(), WirePayload::Legacy { ciphertext: "abcd" });
    }

    #[test]
    fn classifies_control_packets() {
        let history = r#"{"type":"history","messages":[{"content":"t:c"}]}"#;
        assert_eq!(
            classify(history).unwrap(),
            WirePayload::Control(ControlPacket::History {
                messages: vec![HistoryEnvelope::new("t:c")]
            })
        );

        let users = r#"{"type":"userlist","users":[{"clientId":"a","username":"b"}]}"#;
        assert_eq!(
            classify(users).unwrap(),
            WirePayload::Control(ControlPacket::Userlist {
                users: vec![UserEntry { client_id: "a".into(), username: "b".into() }]
            })
        );
    }

    #[test]
    fn unknown_json_is_malformed() {
        assert!(matches!(classify(r#"{"type":"other"}"#), Err(ProtocolError::MalformedWire { .. })));
        assert!(matches!(classify("{not json"), Err(ProtocolError::MalformedWire { .. })));
    }

    #[test]
    fn missing_segments_are_malformed() {
        for payload in ["abc:", ":abc", "abc:presence:", ":presence:abc", "a:b:c", "a:b:c:d", "", "  "] {
            assert!(
                matches!(classify(payload), Err(ProtocolError::MalformedWire { .. })),
                "{payload:?} should be malformed"
            );
        }
    }

    #[test]
    fn oversize_payload_rejected() {
        let big = "a".repeat(MAX_PAYLOAD_SIZE + 1);
        assert!(matches!(classify(&big), Err(ProtocolError::PayloadTooLarge { .. })));
    }

    #[test]
    fn encoders_match_grammar() {
        let auth = encode_authenticated("t", "c");
        assert_eq!(auth, "t:c");
        assert_eq!(classify(&auth).unwrap(), WirePayload::Authenticated { tag: "t", ciphertext: "c" });

        let presence = encode_presence("t", "c");
        assert_eq!(presence, "t:presence:c");
        assert_eq!(classify(&presence).unwrap(), WirePayload::Presence { tag: "t", ciphertext: "c" });
    }

    #[test]
    fn surrounding_whitespace_is_ignored() {
        assert_eq!(
            classify("  t:c\n").unwrap(),
            WirePayload::Authenticated { tag: "t", ciphertext: "c" }
        );
    }
}
