//! History reconciliation at join time.
//!
//! The relay replays stored payloads when a client joins. They are opened
//! exactly like live traffic, deduplicated by block digest, ordered by
//! timestamp and replayed through a rolling link check before being merged
//! into the live chain.
//!
//! Ordering is by timestamp, not by chain position: a partial history window
//! can lack the links needed to order by position. A block whose
//! `previousHash` does not match the block before it is still returned for
//! display, annotated as a discontinuity, and the expectation moves on to
//! that block so one gap does not taint everything after it.

use std::collections::HashSet;

use hashchat_crypto::SessionKey;
use hashchat_proto::{Digest, HistoryEnvelope, MessageBlock, WirePayload, classify};

use crate::{
    auth::Authenticator,
    chain::{Chain, block_digest},
    error::ChatError,
};

/// How a replayed block relates to the one before it in timestamp order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Continuity {
    /// `previousHash` matches the rolling expectation.
    Linked,
    /// `previousHash` does not match. The block is still shown.
    Discontinuity {
        /// Digest the replay expected
        expected: Option<Digest>,
        /// Digest the block names
        found: Option<Digest>,
    },
}

/// One surviving block, in replay order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryEntry {
    /// Block digest.
    pub digest: Digest,
    /// The block.
    pub block: MessageBlock,
    /// Link check result.
    pub continuity: Continuity,
    /// Already in the chain before this batch, e.g. seen live.
    pub known: bool,
}

impl HistoryEntry {
    /// The discontinuity as a chat error, if there is one.
    pub fn discontinuity(&self) -> Option<ChatError> {
        match self.continuity {
            Continuity::Linked => None,
            Continuity::Discontinuity { expected, found } => {
                Some(ChatError::ChainDiscontinuity { digest: self.digest, expected, found })
            },
        }
    }
}

/// Summary of one reconciliation pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HistoryReport {
    /// Surviving blocks in replay order.
    pub entries: Vec<HistoryEntry>,
    /// Envelopes in the packet.
    pub received: usize,
    /// Unique blocks that opened and decoded.
    pub decrypted: usize,
    /// Envelopes that failed any step, plus any beyond the configured cap.
    pub failed: usize,
    /// Envelopes whose block appeared earlier in the same batch.
    pub duplicates: usize,
    /// Entries annotated as discontinuities.
    pub discontinuities: usize,
    /// Whether the chain head moved to the latest replayed block.
    pub head_advanced: bool,
}

impl HistoryReport {
    /// Entries not already in the chain before this batch.
    pub fn new_entries(&self) -> impl Iterator<Item = &HistoryEntry> {
        self.entries.iter().filter(|e| !e.known)
    }
}

/// Rebuilds pre-join chain state from a history packet.
#[derive(Debug, Clone, Copy)]
pub struct HistoryReconciler {
    max_entries: usize,
}

impl HistoryReconciler {
    /// Reconciler that processes at most `max_entries` envelopes per batch.
    pub fn new(max_entries: usize) -> Self {
        Self { max_entries }
    }

    /// Open, deduplicate, order, link-check and merge a history batch.
    ///
    /// Never fails as a whole: every per-envelope problem is counted in the
    /// report. Running the same batch twice leaves the chain and its head as
    /// the first run left them.
    pub fn reconcile(
        &self,
        envelopes: &[HistoryEnvelope],
        key: &SessionKey,
        chain: &mut Chain,
    ) -> HistoryReport {
        let mut report = HistoryReport { received: envelopes.len(), ..HistoryReport::default() };

        let (window, overflow) = envelopes.split_at(envelopes.len().min(self.max_entries));
        if !overflow.is_empty() {
            tracing::warn!(dropped = overflow.len(), "history batch exceeds cap");
            report.failed += overflow.len();
        }

        let mut seen = HashSet::new();
        let mut survivors = Vec::with_capacity(window.len());
        for (index, envelope) in window.iter().enumerate() {
            match open_envelope(envelope, key) {
                Ok(block) => {
                    let digest = block_digest(&block);
                    if seen.insert(digest) {
                        survivors.push((digest, block));
                    } else {
                        report.duplicates += 1;
                    }
                },
                Err(e) => {
                    tracing::debug!(index, reason = %e, "skipping history entry");
                    report.failed += 1;
                },
            }
        }
        report.decrypted = survivors.len();

        // Stable: equal timestamps keep relay order
        survivors.sort_by_key(|(_, block)| block.timestamp);

        let mut expected = survivors.first().and_then(|(_, block)| block.previous_hash);
        for (digest, block) in survivors {
            let found = block.previous_hash;
            let continuity = if found == expected {
                Continuity::Linked
            } else {
                tracing::warn!(%digest, ?expected, ?found, "history chain discontinuity");
                report.discontinuities += 1;
                Continuity::Discontinuity { expected, found }
            };
            expected = Some(digest);

            let known = !chain.insert(digest, block.clone());
            report.entries.push(HistoryEntry { digest, block, continuity, known });
        }

        if let Some(latest) = report.entries.last() {
            report.head_advanced = chain.advance_head(latest.digest);
        }

        tracing::info!(
            received = report.received,
            decrypted = report.decrypted,
            failed = report.failed,
            discontinuities = report.discontinuities,
            "history reconciled"
        );

        report
    }
}

fn open_envelope(envelope: &HistoryEnvelope, key: &SessionKey) -> Result<MessageBlock, ChatError> {
    let plaintext = match classify(&envelope.content)? {
        WirePayload::Authenticated { tag, ciphertext } => {
            Authenticator::open(tag, ciphertext, key, "history")?
        },
        WirePayload::Legacy { ciphertext } => Authenticator::open_untagged(ciphertext, key)?,
        other => {
            return Err(ChatError::MalformedWire {
                reason: format!("{} payload in history", other.kind()),
            });
        },
    };
    Ok(MessageBlock::decode(plaintext.as_bytes())?)
}

#[cfg(test)]
mod tests {
    use hashchat_crypto::{KEY_SIZE, NONCE_SIZE};
    use hashchat_proto::encode_authenticated;

    use super::*;
    use crate::{chain::ChainValidator, session::Identity};

    fn key() -> SessionKey {
        SessionKey::from_bytes([5; KEY_SIZE])
    }

    fn envelope(block: &MessageBlock, key: &SessionKey) -> HistoryEnvelope {
        let (tag, ct) = Authenticator::seal(&block.canonical_bytes(), key, [3; NONCE_SIZE]);
        HistoryEnvelope::new(encode_authenticated(&tag, &ct))
    }

    fn block(content: &str, timestamp: u64, previous: Option<Digest>) -> (MessageBlock, Digest) {
        ChainValidator::default().build_outgoing(
            content,
            &Identity::new("c1", "alice"),
            previous,
            timestamp,
            timestamp,
        )
    }

    #[test]
    fn empty_batch_changes_nothing() {
        let mut chain = Chain::new();
        let report = HistoryReconciler::new(10).reconcile(&[], &key(), &mut chain);
        assert_eq!(report, HistoryReport::default());
        assert!(chain.is_empty());
        assert_eq!(chain.head(), None);
    }

    #[test]
    fn sorts_by_timestamp_and_sets_head() {
        let (b1, d1) = block("one", 100, None);
        let (b2, d2) = block("two", 200, Some(d1));
        let batch = [envelope(&b2, &key()), envelope(&b1, &key())];

        let mut chain = Chain::new();
        let report = HistoryReconciler::new(10).reconcile(&batch, &key(), &mut chain);

        assert_eq!(report.decrypted, 2);
        assert_eq!(report.discontinuities, 0);
        assert_eq!(report.entries[0].digest, d1);
        assert_eq!(report.entries[1].digest, d2);
        assert_eq!(chain.head(), Some(d2));
    }

    #[test]
    fn bad_entries_are_counted_not_fatal() {
        let (b1, d1) = block("one", 100, None);
        let good = envelope(&b1, &key());
        let wrong_key = envelope(&b1, &SessionKey::from_bytes([6; KEY_SIZE]));
        let batch = [
            HistoryEnvelope::new("abcd"),
            HistoryEnvelope::new("zz:presence:abc"),
            HistoryEnvelope::new(""),
            wrong_key,
            good,
        ];

        let mut chain = Chain::new();
        let report = HistoryReconciler::new(10).reconcile(&batch, &key(), &mut chain);
        assert_eq!(report.failed, 4);
        assert_eq!(report.decrypted, 1);
        assert_eq!(chain.head(), Some(d1));
    }

    #[test]
    fn duplicates_within_batch_collapse() {
        let (b1, _) = block("one", 100, None);
        let batch = [envelope(&b1, &key()), envelope(&b1, &key())];

        let mut chain = Chain::new();
        let report = HistoryReconciler::new(10).reconcile(&batch, &key(), &mut chain);
        assert_eq!(report.decrypted, 1);
        assert_eq!(report.duplicates, 1);
        assert_eq!(chain.len(), 1);
    }

    #[test]
    fn skipped_link_is_annotated_but_kept() {
        let (b100, d100) = block("one", 100, None);
        let (b200, d200) = block("two", 200, Some(d100));
        let (b300, d300) = block("three", 300, Some(d100));
        let batch = [envelope(&b300, &key()), envelope(&b100, &key()), envelope(&b200, &key())];

        let mut chain = Chain::new();
        let report = HistoryReconciler::new(10).reconcile(&batch, &key(), &mut chain);

        assert_eq!(report.entries.len(), 3);
        assert_eq!(report.discontinuities, 1);
        assert_eq!(
            report.entries[2].continuity,
            Continuity::Discontinuity { expected: Some(d200), found: Some(d100) }
        );
        assert_eq!(chain.head(), Some(d300));
    }

    #[test]
    fn gap_does_not_cascade() {
        let stray = Digest::from_bytes([7; 32]);
        let (b1, d1) = block("one", 100, None);
        let (b2, d2) = block("two", 200, Some(stray));
        let (b3, _) = block("three", 300, Some(d2));
        let batch = [envelope(&b1, &key()), envelope(&b2, &key()), envelope(&b3, &key())];

        let mut chain = Chain::new();
        let report = HistoryReconciler::new(10).reconcile(&batch, &key(), &mut chain);
        assert_eq!(report.discontinuities, 1);
        assert_eq!(
            report.entries[1].continuity,
            Continuity::Discontinuity { expected: Some(d1), found: Some(stray) }
        );
        assert_eq!(report.entries[2].continuity, Continuity::Linked);
    }

    #[test]
    fn live_head_newer_than_history_is_kept() {
        let (old, _) = block("old", 100, None);
        let (live, live_digest) = block("live", 500, None);

        let mut chain = Chain::new();
        ChainValidator::default().accept_inbound(&live, &mut chain);

        let report = HistoryReconciler::new(10).reconcile(&[envelope(&old, &key())], &key(), &mut chain);
        assert!(!report.head_advanced);
        assert_eq!(chain.head(), Some(live_digest));
        assert_eq!(chain.len(), 2);
    }

    #[test]
    fn block_seen_live_is_marked_known() {
        let (b1, _) = block("one", 100, None);
        let mut chain = Chain::new();
        ChainValidator::default().accept_inbound(&b1, &mut chain);

        let report = HistoryReconciler::new(10).reconcile(&[envelope(&b1, &key())], &key(), &mut chain);
        assert!(report.entries[0].known);
        assert_eq!(report.new_entries().count(), 0);
        assert_eq!(chain.len(), 1);
    }

    #[test]
    fn cap_counts_overflow_as_failed() {
        let (b1, _) = block("one", 100, None);
        let (b2, _) = block("two", 200, None);
        let batch = [envelope(&b1, &key()), envelope(&b2, &key())];

        let mut chain = Chain::new();
        let report = HistoryReconciler::new(1).reconcile(&batch, &key(), &mut chain);
        assert_eq!(report.decrypted, 1);
        assert_eq!(report.failed, 1);
    }

    #[test]
    fn reconciling_twice_is_idempotent() {
        let (b1, d1) = block("one", 100, None);
        let (b2, _) = block("two", 200, Some(d1));
        let batch = [envelope(&b1, &key()), envelope(&b2, &key())];

        let mut chain = Chain::new();
        let reconciler = HistoryReconciler::new(10);
        reconciler.reconcile(&batch, &key(), &mut chain);
        let head = chain.head();
        let len = chain.len();

        let second = reconciler.reconcile(&batch, &key(), &mut chain);
        assert_eq!(chain.head(), head);
        assert_eq!(chain.len(), len);
        assert!(!second.head_advanced);
    }
}
