//! Fuzz target for wire payload classification
//!
//! Arbitrary relay text must classify or return an error. Never panics.
//! Whatever classifies as a control packet must survive a re-encode.

#![no_main]

use hashchat_proto::{ProtocolError, WirePayload, classify};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &str| {
    let Ok(wire) = classify(data) else {
        return;
    };
    let _ = wire.kind();

    if let WirePayload::Control(packet) = wire {
        let encoded = packet.encode();
        match classify(&encoded) {
            Ok(WirePayload::Control(again)) => assert_eq!(again, packet),
            // Bare envelopes grow when wrapped
            Err(ProtocolError::PayloadTooLarge { .. }) => {},
            other => panic!("re-encoded control packet no longer classifies: {other:?}"),
        }
    }
});
