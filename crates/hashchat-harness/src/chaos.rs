//! Seeded unreliable delivery.
//!
//! `ChaoticDelivery` sits between the relay and the clients. Every payload
//! pushed in may be dropped or duplicated, and payloads may come out in any
//! order. All choices come from one seeded RNG, so a failing seed replays
//! exactly.

use std::collections::VecDeque;

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha20Rng;

use crate::sim_relay::Delivery;

/// Fault rates for [`ChaoticDelivery`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChaosConfig {
    /// Probability that a payload is lost.
    pub drop_rate: f64,
    /// Probability that a payload is delivered twice.
    pub duplicate_rate: f64,
    /// Deliver queued payloads in random order instead of FIFO.
    pub reorder: bool,
}

impl ChaosConfig {
    /// In-order, exactly-once delivery.
    pub const fn reliable() -> Self {
        Self { drop_rate: 0.0, duplicate_rate: 0.0, reorder: false }
    }

    /// Duplicates and reordering, nothing lost.
    pub const fn lossless() -> Self {
        Self { drop_rate: 0.0, duplicate_rate: 0.2, reorder: true }
    }

    /// Every fault enabled.
    pub const fn hostile() -> Self {
        Self { drop_rate: 0.1, duplicate_rate: 0.2, reorder: true }
    }
}

impl Default for ChaosConfig {
    fn default() -> Self {
        Self::reliable()
    }
}

/// Counters for injected faults.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ChaosStats {
    /// Payloads accepted by [`ChaoticDelivery::push`].
    pub pushed: usize,
    /// Payloads discarded.
    pub dropped: usize,
    /// Extra copies queued.
    pub duplicated: usize,
}

/// Queue of in-flight payloads with seeded faults.
pub struct ChaoticDelivery {
    rng: ChaCha20Rng,
    config: ChaosConfig,
    queue: VecDeque<Delivery>,
    stats: ChaosStats,
}

impl ChaoticDelivery {
    /// Queue with the given seed and fault rates.
    pub fn new(seed: u64, config: ChaosConfig) -> Self {
        Self {
            rng: ChaCha20Rng::seed_from_u64(seed),
            config,
            queue: VecDeque::new(),
            stats: ChaosStats::default(),
        }
    }

    /// Queue that never misbehaves.
    pub fn reliable() -> Self {
        Self::new(0, ChaosConfig::reliable())
    }

    /// Offer a payload to the network.
    pub fn push(&mut self, delivery: Delivery) {
        self.stats.pushed += 1;

        if self.config.drop_rate > 0.0 && self.rng.gen_bool(self.config.drop_rate) {
            self.stats.dropped += 1;
            tracing::trace!(to = delivery.to, "dropped");
            return;
        }
        if self.config.duplicate_rate > 0.0 && self.rng.gen_bool(self.config.duplicate_rate) {
            self.stats.duplicated += 1;
            self.queue.push_back(delivery.clone());
        }
        self.queue.push_back(delivery);
    }

    /// Take the next payload to deliver.
    pub fn pop(&mut self) -> Option<Delivery> {
        if self.config.reorder && self.queue.len() > 1 {
            let index = self.rng.gen_range(0..self.queue.len());
            return self.queue.swap_remove_back(index);
        }
        self.queue.pop_front()
    }

    /// Payloads still in flight.
    pub fn len(&self) -> usize {
        self.queue.len()
    }

    /// Whether nothing is in flight.
    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// Fault counters so far.
    pub fn stats(&self) -> ChaosStats {
        self.stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn delivery(n: u64) -> Delivery {
        Delivery { to: n, payload: n.to_string() }
    }

    fn drain(chaos: &mut ChaoticDelivery) -> Vec<u64> {
        std::iter::from_fn(|| chaos.pop()).map(|d| d.to).collect()
    }

    #[test]
    fn reliable_is_fifo() {
        let mut chaos = ChaoticDelivery::reliable();
        for n in 0..10 {
            chaos.push(delivery(n));
        }
        assert_eq!(drain(&mut chaos), (0..10).collect::<Vec<_>>());
    }

    #[test]
    fn same_seed_same_schedule() {
        let run = |seed| {
            let mut chaos = ChaoticDelivery::new(seed, ChaosConfig::hostile());
            for n in 0..50 {
                chaos.push(delivery(n));
            }
            (drain(&mut chaos), chaos.stats())
        };
        assert_eq!(run(9), run(9));
    }

    #[test]
    fn lossless_keeps_every_payload() {
        let mut chaos = ChaoticDelivery::new(3, ChaosConfig::lossless());
        for n in 0..100 {
            chaos.push(delivery(n));
        }
        let mut seen = drain(&mut chaos);
        assert_eq!(seen.len(), 100 + chaos.stats().duplicated);
        seen.sort_unstable();
        seen.dedup();
        assert_eq!(seen, (0..100).collect::<Vec<_>>());
    }
}
