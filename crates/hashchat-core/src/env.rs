//! Environment abstraction for deterministic testing.
//!
//! Session logic never reads the clock or the OS entropy source directly.
//! Production supplies a system environment; the simulation harness supplies
//! a seeded RNG and a clock it advances by hand.

/// Abstract environment providing wall-clock time and randomness.
///
/// # Invariants
///
/// - `random_bytes()` uses cryptographically secure entropy in production
/// - Given the same seed, a simulated environment yields the same sequence
pub trait Environment: Clone + Send + Sync + 'static {
    /// Current wall-clock time in milliseconds since the Unix epoch.
    ///
    /// Message timestamps come from here. Peers compare them across
    /// machines, so this is wall time rather than a monotonic instant.
    fn wall_clock_millis(&self) -> u64;

    /// Fills the provided buffer with random bytes.
    fn random_bytes(&self, buffer: &mut [u8]);

    /// Generates a random `u64`.
    fn random_u64(&self) -> u64 {
        let mut bytes = [0u8; 8];
        self.random_bytes(&mut bytes);
        u64::from_be_bytes(bytes)
    }
}
