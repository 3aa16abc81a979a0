//! Fuzz target for message block and presence decoding
//!
//! Decrypted bytes come from any key holder, so both decoders must reject
//! garbage with an error. A block that decodes must hash the same after a
//! canonical re-encode.

#![no_main]

use hashchat_core::block_digest;
use hashchat_proto::{MessageBlock, PresenceEvent};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(block) = MessageBlock::decode(data) {
        let canonical = block.canonical_bytes();
        let Ok(again) = MessageBlock::decode(&canonical) else {
            panic!("canonical bytes failed to decode");
        };
        assert_eq!(block_digest(&again), block_digest(&block));
    }

    let _ = PresenceEvent::decode(data);
});
