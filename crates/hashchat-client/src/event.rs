//! Client events and actions.

use hashchat_core::{ChatError, HistoryReport, OnlineUser};
use hashchat_proto::Digest;

/// Events the caller feeds into the client.
///
/// The caller is responsible for:
/// - Opening the transport and reporting when it is up or down
/// - Forwarding every text payload the transport receives
/// - Forwarding user intents (send a message, leave)
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientEvent {
    /// Transport connection established.
    Connected,

    /// Text payload received from the relay.
    PayloadReceived(String),

    /// User wants to send a message.
    SendMessage {
        /// Message text, trimmed before sending.
        text: String,
    },

    /// User is leaving the room. Announces departure while still connected.
    Leave,

    /// Transport connection closed.
    Disconnected,
}

/// Where a delivered message came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageOrigin {
    /// Sent by this client.
    Local,
    /// Received live from a peer.
    Live,
    /// Replayed by the relay at join time.
    History,
    /// Old unchained plaintext format.
    Legacy,
}

/// A message ready for display.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatMessage {
    /// Block digest. `None` for legacy plaintext.
    pub digest: Option<Digest>,
    /// Sender client id, empty for legacy plaintext.
    pub sender: String,
    /// Sender display name as sent, possibly empty.
    pub username: String,
    /// Message text.
    pub content: String,
    /// Sender timestamp in epoch milliseconds, if known.
    pub timestamp: Option<u64>,
    /// Origin of the message.
    pub origin: MessageOrigin,
    /// Warnings attached to an accepted message (orphan, discontinuity).
    pub flags: Vec<ChatError>,
}

impl ChatMessage {
    /// Name to show next to the message.
    pub fn display_name(&self) -> &str {
        if self.username.is_empty() { "Anonymous" } else { &self.username }
    }

    /// True if this client sent the message.
    pub fn is_outgoing(&self) -> bool {
        self.origin == MessageOrigin::Local
    }
}

/// Severity of a system notice.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    /// Informational.
    Info,
    /// Something looks wrong (tampering, rejected message).
    Warning,
}

/// System line shown in the chat stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    /// Severity.
    pub level: NoticeLevel,
    /// Text to show.
    pub text: String,
}

impl Notice {
    /// Informational notice.
    pub fn info(text: impl Into<String>) -> Self {
        Self { level: NoticeLevel::Info, text: text.into() }
    }

    /// Warning notice.
    pub fn warning(text: impl Into<String>) -> Self {
        Self { level: NoticeLevel::Warning, text: text.into() }
    }
}

/// Counts from a history reconciliation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HistorySummary {
    /// Envelopes in the packet.
    pub received: usize,
    /// Unique blocks recovered.
    pub decrypted: usize,
    /// Envelopes that could not be used.
    pub failed: usize,
    /// Blocks annotated as chain discontinuities.
    pub discontinuities: usize,
}

impl From<&HistoryReport> for HistorySummary {
    fn from(report: &HistoryReport) -> Self {
        Self {
            received: report.received,
            decrypted: report.decrypted,
            failed: report.failed,
            discontinuities: report.discontinuities,
        }
    }
}

/// Actions the client produces for the caller to execute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientAction {
    /// Send a text payload to the relay.
    Send(String),

    /// Show a message.
    Deliver(ChatMessage),

    /// Show a system notice.
    Notice(Notice),

    /// Membership changed; here is the full list.
    OnlineUsers(Vec<OnlineUser>),

    /// History replay finished.
    HistoryLoaded(HistorySummary),
}
