//! Standard invariant checks.
//!
//! These invariants capture behavioral properties that must always hold.
//! They verify WHAT must be true, not specific test scenarios.

use std::collections::HashSet;

use hashchat_core::block_digest;

use super::{Invariant, InvariantResult, SystemSnapshot, Violation};

/// Every chain key is the digest of the block stored under it.
///
/// A mismatch would let a peer reference a block by a hash that nobody else
/// computes for it.
pub struct KeysMatchDigests;

impl Invariant for KeysMatchDigests {
    fn name(&self) -> &'static str {
        "keys_match_digests"
    }

    fn check(&self, state: &SystemSnapshot) -> InvariantResult {
        for client in &state.clients {
            for (key, block) in &client.entries {
                let actual = block_digest(block);
                if actual != *key {
                    return Err(Violation {
                        invariant: self.name(),
                        message: format!(
                            "client {}: block stored under {} hashes to {}",
                            client.client_id,
                            key.short(),
                            actual.short()
                        ),
                    });
                }
            }
        }
        Ok(())
    }
}

/// The head, when set, names a block in the chain.
pub struct HeadInChain;

impl Invariant for HeadInChain {
    fn name(&self) -> &'static str {
        "head_in_chain"
    }

    fn check(&self, state: &SystemSnapshot) -> InvariantResult {
        for client in &state.clients {
            if let Some(head) = client.head.filter(|head| !client.contains(head)) {
                return Err(Violation {
                    invariant: self.name(),
                    message: format!(
                        "client {}: head {} not among {} entries",
                        client.client_id,
                        head.short(),
                        client.entries.len()
                    ),
                });
            }
        }
        Ok(())
    }
}

/// No message is shown to the user twice.
///
/// Replays, relay duplicates, and history overlapping live traffic must all
/// collapse to one delivery per digest.
pub struct NoDuplicateDeliveries;

impl Invariant for NoDuplicateDeliveries {
    fn name(&self) -> &'static str {
        "no_duplicate_deliveries"
    }

    fn check(&self, state: &SystemSnapshot) -> InvariantResult {
        for client in &state.clients {
            let mut seen = HashSet::with_capacity(client.delivered.len());
            for digest in &client.delivered {
                if !seen.insert(digest) {
                    return Err(Violation {
                        invariant: self.name(),
                        message: format!(
                            "client {}: message {} delivered more than once",
                            client.client_id,
                            digest.short()
                        ),
                    });
                }
            }
        }
        Ok(())
    }
}
