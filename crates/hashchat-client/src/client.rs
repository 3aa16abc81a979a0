//! Client state machine.
//!
//! The `Client` drives one [`Session`] from transport and user events and
//! turns session outcomes into display actions. It owns the connection flag
//! and nothing else; all chain and membership state lives in the session.

use hashchat_core::{
    ChatError, Environment, HistoryReport, Identity, Inbound, PresenceChange, Session,
    SessionConfig,
};
use hashchat_crypto::SessionKey;
use hashchat_proto::{ClientInfo, PresenceAction};

use crate::{
    error::ClientError,
    event::{ChatMessage, ClientAction, ClientEvent, HistorySummary, MessageOrigin, Notice},
};

/// Notice shown once the relay handshake is sent.
pub const CONNECTED_NOTICE: &str = "Connected to chat. Messages are end-to-end encrypted.";

/// Notice shown when the transport closes.
pub const DISCONNECTED_NOTICE: &str = "Disconnected from chat.";

/// Notice shown for an empty history replay.
pub const EMPTY_HISTORY_NOTICE: &str = "No previous messages in this room.";

/// Notice shown when a live message fails its tag check.
pub const TAMPER_NOTICE: &str = "Received a message that failed authentication (possible tampering)";

/// Client for one hashchat room.
pub struct Client<E: Environment> {
    /// Environment for randomness and wall-clock time.
    env: E,

    /// Chain, membership and key for the room.
    session: Session,

    /// Whether the transport is currently up.
    connected: bool,
}

impl<E: Environment> Client<E> {
    /// Create a client for the room keyed by `key`.
    pub fn new(env: E, identity: Identity, key: SessionKey, config: SessionConfig) -> Self {
        Self { env, session: Session::new(identity, key, config), connected: false }
    }

    /// Underlying session.
    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Whether the transport is up.
    pub fn is_connected(&self) -> bool {
        self.connected
    }

    /// Process an event and return resulting actions.
    pub fn handle(&mut self, event: ClientEvent) -> Result<Vec<ClientAction>, ClientError> {
        match event {
            ClientEvent::Connected => Ok(self.handle_connected()),
            ClientEvent::PayloadReceived(payload) => Ok(self.handle_payload(&payload)),
            ClientEvent::SendMessage { text } => self.handle_send_message(&text),
            ClientEvent::Leave => Ok(self.handle_leave()),
            ClientEvent::Disconnected => Ok(self.handle_disconnected()),
        }
    }

    /// Relay handshake: topic, then client info, then an authenticated join.
    fn handle_connected(&mut self) -> Vec<ClientAction> {
        self.connected = true;
        self.session.mark_self_present();

        let identity = self.session.identity();
        let info = ClientInfo {
            client_id: identity.client_id.clone(),
            username: identity.username.clone(),
        };
        tracing::info!(topic = %short(self.session.topic()), client_id = %info.client_id, "connected");

        vec![
            ClientAction::Send(self.session.topic().to_string()),
            ClientAction::Send(info.encode()),
            ClientAction::Send(self.session.presence_wire(PresenceAction::Join, &self.env)),
            ClientAction::Notice(Notice::info(CONNECTED_NOTICE)),
            ClientAction::OnlineUsers(self.session.presence().users()),
        ]
    }

    fn handle_send_message(&mut self, text: &str) -> Result<Vec<ClientAction>, ClientError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(ClientError::EmptyMessage);
        }
        if !self.connected {
            return Err(ClientError::NotConnected);
        }

        let outgoing = self.session.compose(text, &self.env);
        let message = ChatMessage {
            digest: Some(outgoing.digest),
            sender: outgoing.block.sender.clone(),
            username: outgoing.block.username.clone(),
            content: outgoing.block.content.clone(),
            timestamp: Some(outgoing.block.timestamp),
            origin: MessageOrigin::Local,
            flags: Vec::new(),
        };
        let wire = outgoing.wire.clone();

        // Head advances on hand-off, not on remote acknowledgement
        self.session.commit(outgoing);

        Ok(vec![ClientAction::Send(wire), ClientAction::Deliver(message)])
    }

    fn handle_leave(&mut self) -> Vec<ClientAction> {
        if !self.connected {
            return Vec::new();
        }
        vec![ClientAction::Send(self.session.presence_wire(PresenceAction::Leave, &self.env))]
    }

    fn handle_disconnected(&mut self) -> Vec<ClientAction> {
        if !self.connected {
            return Vec::new();
        }
        self.connected = false;
        tracing::info!("disconnected");
        vec![ClientAction::Notice(Notice::info(DISCONNECTED_NOTICE))]
    }

    fn handle_payload(&mut self, payload: &str) -> Vec<ClientAction> {
        match self.session.receive(payload) {
            Inbound::Message { digest, block, orphan } => {
                let flags = orphan
                    .map(|previous| ChatError::OrphanReference { digest, previous })
                    .into_iter()
                    .collect();
                vec![ClientAction::Deliver(ChatMessage {
                    digest: Some(digest),
                    sender: block.sender,
                    username: block.username,
                    content: block.content,
                    timestamp: Some(block.timestamp),
                    origin: MessageOrigin::Live,
                    flags,
                })]
            },
            Inbound::PlainText { text } => vec![ClientAction::Deliver(ChatMessage {
                digest: None,
                sender: String::new(),
                username: String::new(),
                content: text,
                timestamp: None,
                origin: MessageOrigin::Legacy,
                flags: Vec::new(),
            })],
            Inbound::Presence(change) => self.presence_actions(&change),
            Inbound::Userlist => vec![ClientAction::OnlineUsers(self.session.presence().users())],
            Inbound::History(report) => history_actions(report),
            Inbound::Duplicate { .. } | Inbound::Ignored => Vec::new(),
            Inbound::Rejected(err) => rejection_actions(&err),
        }
    }

    fn presence_actions(&self, change: &PresenceChange) -> Vec<ClientAction> {
        let mut actions = Vec::with_capacity(2);
        if !change.is_self {
            let name = if change.username.is_empty() { "Someone" } else { &change.username };
            let text = match change.action {
                PresenceAction::Join => format!("{name} joined the chat"),
                PresenceAction::Leave => format!("{name} left the chat"),
            };
            actions.push(ClientAction::Notice(Notice::info(text)));
        }
        actions.push(ClientAction::OnlineUsers(self.session.presence().users()));
        actions
    }
}

fn history_actions(report: HistoryReport) -> Vec<ClientAction> {
    let summary = HistorySummary::from(&report);
    if report.received == 0 {
        return vec![
            ClientAction::Notice(Notice::info(EMPTY_HISTORY_NOTICE)),
            ClientAction::HistoryLoaded(summary),
        ];
    }

    let mut actions: Vec<ClientAction> = Vec::with_capacity(report.entries.len() + 3);
    for entry in report.entries.into_iter().filter(|e| !e.known) {
        let flags = entry.discontinuity().into_iter().collect();
        actions.push(ClientAction::Deliver(ChatMessage {
            digest: Some(entry.digest),
            sender: entry.block.sender,
            username: entry.block.username,
            content: entry.block.content,
            timestamp: Some(entry.block.timestamp),
            origin: MessageOrigin::History,
            flags,
        }));
    }

    if summary.failed > 0 {
        actions.push(ClientAction::Notice(Notice::warning(format!(
            "{} previous messages could not be decrypted or verified",
            summary.failed
        ))));
    }
    if summary.discontinuities > 0 {
        actions.push(ClientAction::Notice(Notice::warning(format!(
            "{} previous messages do not link to the message before them",
            summary.discontinuities
        ))));
    }
    actions.push(ClientAction::Notice(Notice::info(format!(
        "Loaded {} previous messages",
        summary.decrypted
    ))));
    actions.push(ClientAction::HistoryLoaded(summary));
    actions
}

fn rejection_actions(err: &ChatError) -> Vec<ClientAction> {
    match err {
        ChatError::AuthenticationFailure { kind: "message" } => {
            vec![ClientAction::Notice(Notice::warning(TAMPER_NOTICE))]
        },
        ChatError::OrphanRejected { previous, .. } => {
            vec![ClientAction::Notice(Notice::warning(format!(
                "Rejected a message that follows unknown message {}",
                previous.short()
            )))]
        },
        _ => Vec::new(),
    }
}

fn short(topic: &str) -> &str {
    topic.get(..10).unwrap_or(topic)
}
