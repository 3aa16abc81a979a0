//! Hash-linked message chain.
//!
//! Every block names the digest of the block its author saw last. Blocks
//! arrive out of order, twice, or not at all, so the chain is a digest-keyed
//! map plus a head pointer rather than a list.
//!
//! # Invariants
//!
//! - Every key in [`Chain`] equals the digest of its block.
//! - `head`, when set, names a block present in the chain.
//! - The head only moves to a block with a strictly later timestamp than the
//!   current head block, except when this client sends (optimistic hand-off).

use std::collections::HashMap;

use hashchat_crypto::sha256;
use hashchat_proto::{Digest, MessageBlock};

use crate::{config::OrphanPolicy, session::Identity};

/// Digest of a block's canonical serialisation.
pub fn block_digest(block: &MessageBlock) -> Digest {
    Digest::from_bytes(sha256(&block.canonical_bytes()))
}

/// Every block this client has accepted, plus the head the next outgoing
/// block will link to.
#[derive(Debug, Clone, Default)]
pub struct Chain {
    blocks: HashMap<Digest, MessageBlock>,
    head: Option<Digest>,
}

impl Chain {
    /// Empty chain with no head.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of accepted blocks.
    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    /// True if no block has been accepted.
    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    /// True if the digest has been accepted.
    pub fn contains(&self, digest: &Digest) -> bool {
        self.blocks.contains_key(digest)
    }

    /// Block by digest.
    pub fn get(&self, digest: &Digest) -> Option<&MessageBlock> {
        self.blocks.get(digest)
    }

    /// Digest the next outgoing block will reference.
    pub fn head(&self) -> Option<Digest> {
        self.head
    }

    /// Timestamp of the head block, 0 when there is none.
    pub fn head_timestamp(&self) -> u64 {
        self.head.and_then(|d| self.blocks.get(&d)).map_or(0, |b| b.timestamp)
    }

    /// All accepted blocks, in no particular order.
    pub fn iter(&self) -> impl Iterator<Item = (&Digest, &MessageBlock)> {
        self.blocks.iter()
    }

    /// Insert unless present. Returns true if the block is new.
    pub(crate) fn insert(&mut self, digest: Digest, block: MessageBlock) -> bool {
        debug_assert_eq!(block_digest(&block), digest);
        if self.blocks.contains_key(&digest) {
            return false;
        }
        self.blocks.insert(digest, block);
        true
    }

    /// Move the head to `digest` if its block is strictly newer than the
    /// current head block. Returns true if the head moved.
    pub(crate) fn advance_head(&mut self, digest: Digest) -> bool {
        let Some(candidate) = self.blocks.get(&digest) else {
            return false;
        };
        if self.head.is_some() && candidate.timestamp <= self.head_timestamp() {
            return false;
        }
        self.head = Some(digest);
        true
    }

    /// Point the head at a block unconditionally.
    pub(crate) fn set_head(&mut self, digest: Digest) {
        debug_assert!(self.blocks.contains_key(&digest));
        self.head = Some(digest);
    }
}

/// Outcome of [`ChainValidator::accept_inbound`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    /// Block inserted.
    Accepted {
        /// Digest of the block
        digest: Digest,
        /// `previousHash`, if it names a block this chain has never seen
        orphan: Option<Digest>,
        /// Whether the head moved to this block
        head_advanced: bool,
    },
    /// Digest already present; nothing changed.
    Duplicate {
        /// Digest of the replayed block
        digest: Digest,
    },
    /// Block fails the structural check.
    StructurallyInvalid {
        /// What was wrong
        reason: String,
    },
    /// Orphan refused under [`OrphanPolicy::Strict`].
    OrphanRejected {
        /// Digest of the block
        digest: Digest,
        /// Unknown `previousHash`
        previous: Digest,
    },
}

/// Decides acceptance of inbound blocks and builds outgoing ones.
#[derive(Debug, Clone, Copy, Default)]
pub struct ChainValidator {
    orphan_policy: OrphanPolicy,
}

impl ChainValidator {
    /// Validator with the given orphan policy.
    pub fn new(orphan_policy: OrphanPolicy) -> Self {
        Self { orphan_policy }
    }

    /// Configured orphan policy.
    pub fn orphan_policy(&self) -> OrphanPolicy {
        self.orphan_policy
    }

    /// Build the next outgoing block and its digest.
    ///
    /// Pure: the caller inserts the block and moves the head with
    /// [`ChainValidator::commit_outgoing`] once the transport has taken the
    /// payload.
    pub fn build_outgoing(
        &self,
        content: &str,
        identity: &Identity,
        head: Option<Digest>,
        timestamp: u64,
        nonce: u64,
    ) -> (MessageBlock, Digest) {
        let block = MessageBlock {
            content: content.to_string(),
            timestamp,
            sender: identity.client_id.clone(),
            username: identity.username.clone(),
            previous_hash: head,
            nonce,
        };
        let digest = block_digest(&block);
        (block, digest)
    }

    /// Record a block this client sent and make it the head.
    pub fn commit_outgoing(&self, block: MessageBlock, digest: Digest, chain: &mut Chain) {
        chain.insert(digest, block);
        chain.set_head(digest);
    }

    /// Run an inbound block through the chain checks.
    pub fn accept_inbound(&self, block: &MessageBlock, chain: &mut Chain) -> Verdict {
        if let Some(reason) = structural_fault(block) {
            return Verdict::StructurallyInvalid { reason: reason.to_string() };
        }

        let digest = block_digest(block);
        if chain.contains(&digest) {
            return Verdict::Duplicate { digest };
        }

        let orphan = block.previous_hash.filter(|prev| !chain.contains(prev));
        if let (Some(previous), OrphanPolicy::Strict) = (orphan, self.orphan_policy) {
            return Verdict::OrphanRejected { digest, previous };
        }

        chain.insert(digest, block.clone());
        let head_advanced = chain.advance_head(digest);

        Verdict::Accepted { digest, orphan, head_advanced }
    }
}

fn structural_fault(block: &MessageBlock) -> Option<&'static str> {
    if block.content.is_empty() {
        return Some("content is empty");
    }
    if block.timestamp == 0 {
        return Some("timestamp is zero");
    }
    if block.sender.is_empty() {
        return Some("sender is empty");
    }
    None
}
