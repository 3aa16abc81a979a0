//! Per-room session context.
//!
//! A [`Session`] owns everything scoped to one derived key: the identity
//! this client presents, the chain and its head, and the membership view.
//! It runs the inbound pipeline
//!
//! ```text
//! classify -> authenticate -> decrypt -> decode -> chain | history | presence
//! ```
//!
//! and builds outbound payloads. It performs no I/O; time and randomness
//! come from an [`Environment`].

use hashchat_crypto::{NONCE_SIZE, SessionKey, topic_id};
use hashchat_proto::{
    ControlPacket, Digest, MessageBlock, PresenceAction, PresenceEvent, ProtocolError,
    WirePayload, classify, encode_authenticated, encode_presence, limits::MAX_SAFE_INTEGER,
};

use crate::{
    auth::Authenticator,
    chain::{Chain, ChainValidator, Verdict},
    config::SessionConfig,
    env::Environment,
    error::ChatError,
    history::{HistoryReconciler, HistoryReport},
    presence::{PresenceChange, PresenceTracker},
};

/// Who this client is in the room.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    /// Opaque client identifier, stamped as `sender` on every block.
    pub client_id: String,
    /// Display name.
    pub username: String,
}

impl Identity {
    /// Identity from id and display name.
    pub fn new(client_id: impl Into<String>, username: impl Into<String>) -> Self {
        Self { client_id: client_id.into(), username: username.into() }
    }
}

/// A composed message, ready for the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outgoing {
    /// The block as sent.
    pub block: MessageBlock,
    /// Its digest, the next head once committed.
    pub digest: Digest,
    /// Wire text (`tag:ciphertext`).
    pub wire: String,
}

/// Result of processing one inbound payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Inbound {
    /// Chained message accepted into the chain.
    Message {
        /// Block digest
        digest: Digest,
        /// The block
        block: MessageBlock,
        /// Unknown `previousHash`, if the block is an orphan
        orphan: Option<Digest>,
    },
    /// Block already in the chain.
    Duplicate {
        /// Block digest
        digest: Digest,
    },
    /// Decrypted text that is not JSON, from clients predating the chain.
    PlainText {
        /// Decrypted text
        text: String,
    },
    /// Membership changed.
    Presence(PresenceChange),
    /// Membership replaced by the relay's snapshot.
    Userlist,
    /// History packet reconciled.
    History(HistoryReport),
    /// Valid payload with no effect, such as a repeated join.
    Ignored,
    /// Payload dropped.
    Rejected(ChatError),
}

/// State for one active room.
pub struct Session {
    identity: Identity,
    key: SessionKey,
    topic: String,
    config: SessionConfig,
    validator: ChainValidator,
    reconciler: HistoryReconciler,
    chain: Chain,
    presence: PresenceTracker,
}

impl Session {
    /// Fresh session: empty chain, no head, nobody online.
    pub fn new(identity: Identity, key: SessionKey, config: SessionConfig) -> Self {
        let topic = topic_id(&key);
        let presence = PresenceTracker::new(identity.client_id.clone());
        Self {
            validator: ChainValidator::new(config.orphan_policy),
            reconciler: HistoryReconciler::new(config.max_history_entries),
            identity,
            key,
            topic,
            config,
            chain: Chain::new(),
            presence,
        }
    }

    /// Local identity.
    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    /// Room topic announced to the relay.
    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// Session configuration.
    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Accepted blocks and head.
    pub fn chain(&self) -> &Chain {
        &self.chain
    }

    /// Membership view.
    pub fn presence(&self) -> &PresenceTracker {
        &self.presence
    }

    /// Add this client to its own membership view.
    pub fn mark_self_present(&mut self) {
        self.presence.insert_self(self.identity.username.clone());
    }

    /// Build, encrypt and tag the next message. Does not touch the chain.
    pub fn compose<E: Environment>(&self, content: &str, env: &E) -> Outgoing {
        let timestamp = env.wall_clock_millis();
        let nonce = env.random_u64() & MAX_SAFE_INTEGER;
        let (block, digest) =
            self.validator.build_outgoing(content, &self.identity, self.chain.head(), timestamp, nonce);

        let (tag, ciphertext) = Authenticator::seal(&block.canonical_bytes(), &self.key, aead_nonce(env));
        let wire = encode_authenticated(&tag, &ciphertext);

        Outgoing { block, digest, wire }
    }

    /// Record a message handed to the transport and make it the head.
    pub fn commit(&mut self, outgoing: Outgoing) {
        tracing::debug!(digest = %outgoing.digest, "message sent");
        self.validator.commit_outgoing(outgoing.block, outgoing.digest, &mut self.chain);
    }

    /// Encrypted, tagged presence payload for this client.
    pub fn presence_wire<E: Environment>(&self, action: PresenceAction, env: &E) -> String {
        let event = PresenceEvent::new(
            action,
            self.identity.client_id.clone(),
            self.identity.username.clone(),
            env.wall_clock_millis(),
        );
        let (tag, ciphertext) = Authenticator::seal(&event.encode(), &self.key, aead_nonce(env));
        encode_presence(&tag, &ciphertext)
    }

    /// Run one transport payload through the inbound pipeline.
    pub fn receive(&mut self, payload: &str) -> Inbound {
        let wire = match classify(payload) {
            Ok(wire) => wire,
            Err(e) => return reject(e.into()),
        };

        match wire {
            WirePayload::Control(ControlPacket::History { messages }) => {
                Inbound::History(self.reconciler.reconcile(&messages, &self.key, &mut self.chain))
            },
            WirePayload::Control(ControlPacket::Userlist { users }) => {
                self.presence.replace_all(&users);
                tracing::debug!(online = self.presence.len(), "user list replaced");
                Inbound::Userlist
            },
            WirePayload::Presence { tag, ciphertext } => {
                match Authenticator::open(tag, ciphertext, &self.key, "presence") {
                    Ok(text) => self.receive_presence(&text),
                    Err(e) => reject(e),
                }
            },
            WirePayload::Authenticated { tag, ciphertext } => {
                match Authenticator::open(tag, ciphertext, &self.key, "message") {
                    Ok(text) => self.receive_plaintext(text),
                    Err(e) => reject(e),
                }
            },
            WirePayload::Legacy { ciphertext } => {
                match Authenticator::open_untagged(ciphertext, &self.key) {
                    Ok(text) => self.receive_plaintext(text),
                    Err(e) => reject(e),
                }
            },
        }
    }

    fn receive_presence(&mut self, text: &str) -> Inbound {
        match PresenceEvent::decode(text.as_bytes()) {
            Ok(event) => match self.presence.on_presence(&event) {
                Some(change) => Inbound::Presence(change),
                None => Inbound::Ignored,
            },
            Err(e) => reject(e.into()),
        }
    }

    fn receive_plaintext(&mut self, text: String) -> Inbound {
        let block = match MessageBlock::decode(text.as_bytes()) {
            Ok(block) => block,
            Err(ProtocolError::NotJson { .. }) => return Inbound::PlainText { text },
            Err(e) => return reject(e.into()),
        };

        match self.validator.accept_inbound(&block, &mut self.chain) {
            Verdict::Accepted { digest, orphan, .. } => {
                match orphan {
                    Some(previous) => {
                        tracing::warn!(%digest, %previous, "accepted message with unknown previous hash");
                    },
                    None => tracing::debug!(%digest, "message accepted"),
                }
                Inbound::Message { digest, block, orphan }
            },
            Verdict::Duplicate { digest } => {
                tracing::debug!(%digest, "duplicate message ignored");
                Inbound::Duplicate { digest }
            },
            Verdict::StructurallyInvalid { reason } => {
                reject(ChatError::StructuralInvalid { reason })
            },
            Verdict::OrphanRejected { digest, previous } => {
                reject(ChatError::OrphanRejected { digest, previous })
            },
        }
    }
}

fn aead_nonce<E: Environment>(env: &E) -> [u8; NONCE_SIZE] {
    let mut nonce = [0u8; NONCE_SIZE];
    env.random_bytes(&mut nonce);
    nonce
}

fn reject(err: ChatError) -> Inbound {
    if logged_as_warning(&err) {
        tracing::warn!(reason = %err, "payload rejected");
    } else {
        tracing::debug!(reason = %err, "payload dropped");
    }
    Inbound::Rejected(err)
}

/// Rejections worth an operator's attention. Decryption failures are routine
/// noise from legacy peers and stay at debug.
fn logged_as_warning(err: &ChatError) -> bool {
    matches!(
        err,
        ChatError::AuthenticationFailure { .. }
            | ChatError::OrphanRejected { .. }
            | ChatError::MalformedWire { .. }
    )
}

#[cfg(test)]
mod tests {
    use std::sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    };

    use hashchat_crypto::KEY_SIZE;
    use hashchat_proto::{HistoryEnvelope, UserEntry};

    use super::*;
    use crate::config::OrphanPolicy;

    /// Counter-driven environment; the harness has the seeded one.
    #[derive(Clone, Default)]
    struct CountingEnv {
        counter: Arc<AtomicU64>,
    }

    impl Environment for CountingEnv {
        fn wall_clock_millis(&self) -> u64 {
            1_000 + self.counter.fetch_add(1, Ordering::SeqCst)
        }

        fn random_bytes(&self, buffer: &mut [u8]) {
            let n = self.counter.fetch_add(1, Ordering::SeqCst);
            for (i, b) in buffer.iter_mut().enumerate() {
                *b = (n as u8).wrapping_add(i as u8);
            }
        }
    }

    fn session(id: &str) -> Session {
        Session::new(
            Identity::new(id, id.to_uppercase()),
            SessionKey::from_bytes([1; KEY_SIZE]),
            SessionConfig::default(),
        )
    }

    #[test]
    fn sent_message_is_accepted_by_peer_with_same_digest() {
        let env = CountingEnv::default();
        let mut alice = session("alice");
        let mut bob = session("bob");

        let out = alice.compose("hello", &env);
        let wire = out.wire.clone();
        let digest = out.digest;
        alice.commit(out);

        match bob.receive(&wire) {
            Inbound::Message { digest: got, block, orphan } => {
                assert_eq!(got, digest);
                assert_eq!(block.content, "hello");
                assert_eq!(orphan, None);
            },
            other => panic!("expected message, got {other:?}"),
        }
        assert_eq!(bob.chain().head(), Some(digest));
        assert_eq!(alice.chain().head(), Some(digest));
    }

    #[test]
    fn own_echo_is_duplicate() {
        let env = CountingEnv::default();
        let mut alice = session("alice");
        let out = alice.compose("hello", &env);
        let wire = out.wire.clone();
        alice.commit(out);
        assert!(matches!(alice.receive(&wire), Inbound::Duplicate { .. }));
    }

    #[test]
    fn replay_is_duplicate() {
        let env = CountingEnv::default();
        let alice = session("alice");
        let mut bob = session("bob");
        let out = alice.compose("hello", &env);

        assert!(matches!(bob.receive(&out.wire), Inbound::Message { .. }));
        assert!(matches!(bob.receive(&out.wire), Inbound::Duplicate { .. }));
        assert_eq!(bob.chain().len(), 1);
    }

    #[test]
    fn tampered_ciphertext_fails_authentication() {
        let env = CountingEnv::default();
        let alice = session("alice");
        let mut bob = session("bob");
        let out = alice.compose("hello", &env);

        let (tag, ct) = out.wire.split_once(':').unwrap();
        let mut ct = ct.to_string();
        let flipped = if ct.starts_with('A') { "B" } else { "A" };
        ct.replace_range(0..1, flipped);
        let tampered = format!("{tag}:{ct}");

        assert_eq!(
            bob.receive(&tampered),
            Inbound::Rejected(ChatError::AuthenticationFailure { kind: "message" })
        );
        assert!(bob.chain().is_empty());
    }

    #[test]
    fn different_room_key_fails_authentication() {
        let env = CountingEnv::default();
        let alice = session("alice");
        let mut eve = Session::new(
            Identity::new("eve", "eve"),
            SessionKey::from_bytes([2; KEY_SIZE]),
            SessionConfig::default(),
        );
        let out = alice.compose("hello", &env);
        assert!(matches!(eve.receive(&out.wire), Inbound::Rejected(ChatError::AuthenticationFailure { .. })));
    }

    #[test]
    fn legacy_garbage_is_decryption_failure() {
        let mut bob = session("bob");
        assert!(matches!(bob.receive("abcd"), Inbound::Rejected(ChatError::DecryptionFailure { .. })));
        assert!(bob.chain().is_empty());
    }

    #[test]
    fn malformed_wire_is_logged_as_warning() {
        assert!(logged_as_warning(&ChatError::MalformedWire { reason: "x".into() }));
        assert!(logged_as_warning(&ChatError::AuthenticationFailure { kind: "message" }));
        assert!(!logged_as_warning(&ChatError::DecryptionFailure { reason: "x".into() }));

        let mut bob = session("bob");
        assert!(matches!(bob.receive("a:b:c:d"), Inbound::Rejected(ChatError::MalformedWire { .. })));
    }

    #[test]
    fn legacy_plaintext_is_delivered_unchained() {
        let key = SessionKey::from_bytes([1; KEY_SIZE]);
        let ct = hashchat_crypto::encrypt(b"old style hello", &key, [9; NONCE_SIZE]);
        let mut bob = session("bob");
        assert_eq!(bob.receive(&ct), Inbound::PlainText { text: "old style hello".into() });
        assert!(bob.chain().is_empty());
    }

    #[test]
    fn structurally_invalid_plaintext_rejected() {
        let key = SessionKey::from_bytes([1; KEY_SIZE]);
        let plaintext = br#"{"content":"hi","timestamp":1,"sender":"s","nonce":1}"#;
        let (tag, ct) = Authenticator::seal(plaintext, &key, [9; NONCE_SIZE]);
        let mut bob = session("bob");
        assert!(matches!(
            bob.receive(&encode_authenticated(&tag, &ct)),
            Inbound::Rejected(ChatError::StructuralInvalid { .. })
        ));
    }

    #[test]
    fn presence_join_and_leave() {
        let env = CountingEnv::default();
        let alice = session("alice");
        let mut bob = session("bob");

        let join = alice.presence_wire(PresenceAction::Join, &env);
        match bob.receive(&join) {
            Inbound::Presence(change) => {
                assert_eq!(change.action, PresenceAction::Join);
                assert_eq!(change.username, "ALICE");
                assert!(!change.is_self);
            },
            other => panic!("expected presence, got {other:?}"),
        }
        assert_eq!(bob.receive(&join), Inbound::Ignored);

        let leave = alice.presence_wire(PresenceAction::Leave, &env);
        assert!(matches!(bob.receive(&leave), Inbound::Presence(_)));
        assert!(!bob.presence().contains("alice"));
    }

    #[test]
    fn strict_session_rejects_orphans() {
        let env = CountingEnv::default();
        let mut alice = session("alice");
        let first = alice.compose("first", &env);
        alice.commit(first);
        let second = alice.compose("second", &env);

        let mut bob = Session::new(
            Identity::new("bob", "bob"),
            SessionKey::from_bytes([1; KEY_SIZE]),
            SessionConfig { orphan_policy: OrphanPolicy::Strict, ..SessionConfig::default() },
        );
        assert!(matches!(
            bob.receive(&second.wire),
            Inbound::Rejected(ChatError::OrphanRejected { .. })
        ));
    }

    #[test]
    fn lenient_session_accepts_orphans() {
        let env = CountingEnv::default();
        let mut alice = session("alice");
        let first = alice.compose("first", &env);
        let first_digest = first.digest;
        alice.commit(first);
        let second = alice.compose("second", &env);

        let mut bob = session("bob");
        match bob.receive(&second.wire) {
            Inbound::Message { orphan, .. } => assert_eq!(orphan, Some(first_digest)),
            other => panic!("expected message, got {other:?}"),
        }
    }

    #[test]
    fn history_packet_is_reconciled() {
        let env = CountingEnv::default();
        let alice = session("alice");
        let out = alice.compose("old news", &env);
        let packet = ControlPacket::History { messages: vec![HistoryEnvelope::new(out.wire)] };

        let mut bob = session("bob");
        match bob.receive(&packet.encode()) {
            Inbound::History(report) => {
                assert_eq!(report.decrypted, 1);
                assert_eq!(report.failed, 0);
            },
            other => panic!("expected history, got {other:?}"),
        }
        assert_eq!(bob.chain().head(), Some(out.digest));
    }

    #[test]
    fn bad_history_entry_is_counted_not_fatal() {
        let env = CountingEnv::default();
        let alice = session("alice");
        let out = alice.compose("still here", &env);
        let packet = format!(
            r#"{{"type":"history","messages":[{{"content":"{}","timestamp":"2024-01-01T00:00:00Z"}},{{"content":7}}]}}"#,
            out.wire
        );

        let mut bob = session("bob");
        match bob.receive(&packet) {
            Inbound::History(report) => {
                assert_eq!(report.received, 2);
                assert_eq!(report.decrypted, 1);
                assert_eq!(report.failed, 1);
            },
            other => panic!("expected history, got {other:?}"),
        }
        assert_eq!(bob.chain().head(), Some(out.digest));
    }

    #[test]
    fn userlist_replaces_presence() {
        let mut bob = session("bob");
        let packet = ControlPacket::Userlist {
            users: vec![UserEntry { client_id: "a".into(), username: "alice".into() }],
        };
        assert_eq!(bob.receive(&packet.encode()), Inbound::Userlist);
        assert!(bob.presence().contains("a"));
    }

    #[test]
    fn malformed_wire_is_rejected() {
        let mut bob = session("bob");
        assert!(matches!(bob.receive("abc:"), Inbound::Rejected(ChatError::MalformedWire { .. })));
    }
}
