//! Wire constants and limits.

/// Separator between wire fields.
pub const SEPARATOR: char = ':';

/// Middle segment marking a presence payload.
pub const PRESENCE_MARKER: &str = "presence";

/// Largest payload accepted from the transport (1 MiB).
pub const MAX_PAYLOAD_SIZE: usize = 1 << 20;

/// Length of a digest in its text form.
pub const DIGEST_HEX_LEN: usize = 64;

/// Largest integer a JSON peer can represent exactly (2^53 - 1).
///
/// Nonces above this would be rounded by JavaScript peers and hash
/// differently on each side.
pub const MAX_SAFE_INTEGER: u64 = (1 << 53) - 1;
