//! Deterministic simulation harness for hashchat rooms.
//!
//! Everything here is in-memory and seeded: one `u64` reproduces a whole run,
//! including message timestamps, nonces and every fault the network injects.
//!
//! # Components
//!
//! - [`SimEnv`]: seeded RNG and a hand-advanced wall clock
//! - [`SimRelay`]: the fan-out relay, minus sockets
//! - [`ChaoticDelivery`]: seeded drop, duplicate and reorder
//! - [`SimRoom`]: clients, relay and network wired together
//!
//! # Invariant Testing
//!
//! The `invariants` module provides behavioral testing through invariant
//! checks. Invariants verify WHAT must be true across all execution paths, not
//! specific scenarios. Use [`InvariantRegistry::standard()`] for the chain
//! invariants.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod chaos;
pub mod invariants;
pub mod room;
pub mod sim_env;
pub mod sim_relay;

pub use chaos::{ChaosConfig, ChaosStats, ChaoticDelivery};
pub use invariants::{
    ClientSnapshot, HeadInChain, Invariant, InvariantRegistry, InvariantResult, KeysMatchDigests,
    NoDuplicateDeliveries, SystemSnapshot, Violation,
};
pub use room::{Participant, SimRoom};
pub use sim_env::SimEnv;
pub use sim_relay::{ConnId, Delivery, SimRelay};
