//! Seeded environment for deterministic simulation.

use std::sync::{
    Arc, Mutex, PoisonError,
    atomic::{AtomicU64, Ordering},
};

use hashchat_core::Environment;
use rand::{RngCore, SeedableRng};
use rand_chacha::ChaCha20Rng;

/// Wall-clock start for every simulation (2023-11-14T22:13:20Z).
pub const EPOCH_MILLIS: u64 = 1_700_000_000_000;

/// Deterministic environment.
///
/// Clones share the RNG stream and the clock, so a whole simulated room can
/// run from one seed. Each clock read advances time by one millisecond;
/// [`SimEnv::advance`] moves it further.
#[derive(Clone)]
pub struct SimEnv {
    rng: Arc<Mutex<ChaCha20Rng>>,
    clock: Arc<AtomicU64>,
}

impl Default for SimEnv {
    fn default() -> Self {
        Self::new()
    }
}

impl SimEnv {
    /// Environment seeded with zero.
    pub fn new() -> Self {
        Self::with_seed(0)
    }

    /// Environment seeded with `seed`.
    pub fn with_seed(seed: u64) -> Self {
        Self {
            rng: Arc::new(Mutex::new(ChaCha20Rng::seed_from_u64(seed))),
            clock: Arc::new(AtomicU64::new(EPOCH_MILLIS)),
        }
    }

    /// Move the clock forward.
    pub fn advance(&self, millis: u64) {
        self.clock.fetch_add(millis, Ordering::SeqCst);
    }

    /// Current clock value without advancing it.
    pub fn peek_millis(&self) -> u64 {
        self.clock.load(Ordering::SeqCst)
    }
}

impl Environment for SimEnv {
    fn wall_clock_millis(&self) -> u64 {
        self.clock.fetch_add(1, Ordering::SeqCst)
    }

    fn random_bytes(&self, buffer: &mut [u8]) {
        let mut rng = self.rng.lock().unwrap_or_else(PoisonError::into_inner);
        rng.fill_bytes(buffer);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_seed_same_stream() {
        let a = SimEnv::with_seed(7);
        let b = SimEnv::with_seed(7);
        assert_eq!(a.random_u64(), b.random_u64());
        assert_eq!(a.random_u64(), b.random_u64());
    }

    #[test]
    fn clones_share_state() {
        let a = SimEnv::with_seed(7);
        let b = a.clone();
        assert_ne!(a.random_u64(), b.random_u64());

        let t = a.wall_clock_millis();
        assert!(b.wall_clock_millis() > t);
    }

    #[test]
    fn advance_moves_clock() {
        let env = SimEnv::new();
        let before = env.peek_millis();
        env.advance(5_000);
        assert_eq!(env.wall_clock_millis(), before + 5_000);
    }
}
