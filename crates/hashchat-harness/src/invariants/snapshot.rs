//! Observable state snapshots for invariant checking.
//!
//! Snapshots capture the observable state of the system at a point in time.
//! Invariants operate on snapshots rather than live state to ensure
//! consistent, atomic checks.

use hashchat_core::Session;
use hashchat_proto::{Digest, MessageBlock};

/// Snapshot of every participant in a simulated room.
#[derive(Debug, Clone, Default)]
pub struct SystemSnapshot {
    /// Per-client state snapshots.
    pub clients: Vec<ClientSnapshot>,
}

impl SystemSnapshot {
    /// Create an empty snapshot (no clients).
    pub fn empty() -> Self {
        Self::default()
    }

    /// Create a snapshot from multiple clients.
    pub fn from_clients(clients: Vec<ClientSnapshot>) -> Self {
        Self { clients }
    }

    /// Add a client snapshot.
    pub fn add_client(&mut self, client: ClientSnapshot) {
        self.clients.push(client);
    }
}

/// Snapshot of a single client's chain and what it has shown the user.
#[derive(Debug, Clone, Default)]
pub struct ClientSnapshot {
    /// Client identifier.
    pub client_id: String,
    /// Chain contents as stored (`key`, block).
    pub entries: Vec<(Digest, MessageBlock)>,
    /// Chain head.
    pub head: Option<Digest>,
    /// Digests of every message delivered for display, in order.
    pub delivered: Vec<Digest>,
}

impl ClientSnapshot {
    /// Capture a session plus its delivery log.
    pub fn capture(session: &Session, delivered: impl IntoIterator<Item = Digest>) -> Self {
        let mut entries: Vec<_> =
            session.chain().iter().map(|(digest, block)| (*digest, block.clone())).collect();
        entries.sort_by_key(|(digest, _)| *digest);
        Self {
            client_id: session.identity().client_id.clone(),
            entries,
            head: session.chain().head(),
            delivered: delivered.into_iter().collect(),
        }
    }

    /// Whether the chain holds `digest`.
    pub fn contains(&self, digest: &Digest) -> bool {
        self.entries.binary_search_by_key(digest, |(d, _)| *d).is_ok()
    }
}
