//! Session configuration.

/// How the chain validator treats a block whose `previousHash` is unknown.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OrphanPolicy {
    /// Accept and flag. A client that missed earlier messages keeps
    /// receiving later ones.
    #[default]
    Lenient,
    /// Refuse the block.
    Strict,
}

/// Per-session tuning knobs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    /// Orphan reference handling.
    pub orphan_policy: OrphanPolicy,
    /// Most envelopes processed from one history packet. The excess is
    /// counted as failed.
    pub max_history_entries: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self { orphan_policy: OrphanPolicy::Lenient, max_history_entries: 10_000 }
    }
}
