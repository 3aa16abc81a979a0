//! Client ids and default display names.

use hashchat_core::Environment;

const ADJECTIVES: [&str; 20] = [
    "Silly", "Jumpy", "Sneaky", "Fluffy", "Bouncy", "Jazzy", "Sparkly", "Wiggly", "Fuzzy", "Zippy",
    "Twinkly", "Bubbly", "Giggly", "Wobbly", "Quirky", "Squishy", "Zany", "Peppy", "Glittery",
    "Snazzy",
];

const ANIMALS: [&str; 20] = [
    "Panda", "Fox", "Narwhal", "Axolotl", "Sloth", "Platypus", "Penguin", "Raccoon", "Wombat",
    "Koala", "Otter", "Hedgehog", "Quokka", "Chameleon", "Capybara", "Lemur", "Dolphin", "Lynx",
    "Meerkat", "Armadillo",
];

const ID_ALPHABET: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";

/// Length of a generated client id.
pub const CLIENT_ID_LEN: usize = 26;

/// Random lowercase base-36 client id.
pub fn generate_client_id<E: Environment>(env: &E) -> String {
    let mut bytes = [0u8; CLIENT_ID_LEN];
    env.random_bytes(&mut bytes);
    bytes.iter().map(|b| char::from(ID_ALPHABET[usize::from(*b) % ID_ALPHABET.len()])).collect()
}

/// Display name derived from a client id, e.g. `FluffyOtter`.
///
/// Peers running the browser client derive the same name from the same id.
pub fn username_for(client_id: &str) -> String {
    // 32-bit string hash over UTF-16 code units: h = h * 31 + c
    let hash = client_id
        .encode_utf16()
        .fold(0i32, |h, c| h.wrapping_shl(5).wrapping_sub(h).wrapping_add(i32::from(c)));
    let hash = hash.unsigned_abs() as usize;

    let adjective = ADJECTIVES[hash % ADJECTIVES.len()];
    let animal = ANIMALS[(hash / ADJECTIVES.len()) % ANIMALS.len()];
    format!("{adjective}{animal}")
}
