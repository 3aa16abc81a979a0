//! Chain invariants checked against a room snapshot.
//!
//! A [`SystemSnapshot`] copies every participant's chain, head and delivered
//! digests out of a [`crate::SimRoom`]; checks run on the copy so they can
//! follow any number of relay steps, including chaotic ones.

mod checks;
mod snapshot;

use std::fmt;

pub use checks::{HeadInChain, KeysMatchDigests, NoDuplicateDeliveries};
pub use snapshot::{ClientSnapshot, SystemSnapshot};

/// Outcome of one check.
pub type InvariantResult = Result<(), Violation>;

/// A participant whose chain or delivery log breaks a check.
#[derive(Debug, Clone)]
pub struct Violation {
    /// Check that failed.
    pub invariant: &'static str,
    /// Offending client and digest.
    pub message: String,
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.invariant, self.message)
    }
}

impl std::error::Error for Violation {}

/// A property every participant's chain must keep after any delivery order.
pub trait Invariant: Send + Sync {
    /// Name shown in violations.
    fn name(&self) -> &'static str;

    /// First participant that breaks the property, if any.
    fn check(&self, state: &SystemSnapshot) -> InvariantResult;
}

/// Set of chain checks run together over one snapshot.
pub struct InvariantRegistry {
    invariants: Vec<Box<dyn Invariant>>,
}

impl Default for InvariantRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl InvariantRegistry {
    /// No checks.
    pub fn new() -> Self {
        Self { invariants: Vec::new() }
    }

    /// The three chain checks:
    /// - [`KeysMatchDigests`]: every chain key is its block's digest
    /// - [`HeadInChain`]: the head names a stored block
    /// - [`NoDuplicateDeliveries`]: each message is shown at most once
    pub fn standard() -> Self {
        let mut registry = Self::new();
        registry.add(KeysMatchDigests);
        registry.add(HeadInChain);
        registry.add(NoDuplicateDeliveries);
        registry
    }

    /// Register a room-specific check.
    pub fn add<I: Invariant + 'static>(&mut self, invariant: I) {
        self.invariants.push(Box::new(invariant));
    }

    /// Every violation across all checks.
    pub fn check_all(&self, state: &SystemSnapshot) -> Result<(), Vec<Violation>> {
        let violations: Vec<_> =
            self.invariants.iter().filter_map(|inv| inv.check(state).err()).collect();

        if violations.is_empty() { Ok(()) } else { Err(violations) }
    }

    /// Panic listing every violation, labelled with `context`.
    #[allow(clippy::panic)]
    pub fn assert_all(&self, state: &SystemSnapshot, context: &str) {
        if let Err(violations) = self.check_all(state) {
            let messages: Vec<_> = violations.iter().map(ToString::to_string).collect();
            panic!("chain invariant broken ({context}):\n  {}", messages.join("\n  "));
        }
    }

    /// Number of checks.
    pub fn len(&self) -> usize {
        self.invariants.len()
    }

    /// True if no checks are registered.
    pub fn is_empty(&self) -> bool {
        self.invariants.is_empty()
    }
}
