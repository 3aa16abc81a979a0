//! Fuzz target for the full inbound pipeline
//!
//! Mixes genuine messages from a peer holding the room key with raw text,
//! bit-flipped payloads and history packets built from both.
//!
//! # Invariants
//!
//! - `Session::receive` never panics
//! - Every chain entry is stored under its own digest
//! - The head, when set, is in the chain
//! - Chain size never exceeds the genuine messages produced

#![no_main]

use arbitrary::Arbitrary;
use hashchat_core::{Identity, Session, SessionConfig, block_digest};
use hashchat_crypto::SessionKey;
use hashchat_harness::SimEnv;
use hashchat_proto::{ControlPacket, HistoryEnvelope};
use libfuzzer_sys::fuzz_target;

#[derive(Debug, Arbitrary)]
struct Scenario {
    seed: u64,
    inputs: Vec<Input>,
}

#[derive(Debug, Arbitrary)]
enum Input {
    Raw(String),
    Genuine(String),
    Flipped { text: String, position: u16, mask: u8 },
    History(Vec<HistoryItem>),
}

#[derive(Debug, Arbitrary)]
enum HistoryItem {
    Raw(String),
    Genuine(String),
}

fn speak(peer: &mut Session, env: &SimEnv, text: &str) -> String {
    let outgoing = peer.compose(text, env);
    let wire = outgoing.wire.clone();
    peer.commit(outgoing);
    wire
}

fuzz_target!(|scenario: Scenario| {
    let env = SimEnv::with_seed(scenario.seed);
    let key = SessionKey::from_bytes([7; 32]);
    let config = SessionConfig { max_history_entries: 64, ..SessionConfig::default() };

    let mut peer = Session::new(Identity::new("peer", "Peer"), key.clone(), config.clone());
    let mut local = Session::new(Identity::new("local", "Local"), key, config);
    let mut genuine = 0usize;

    for input in scenario.inputs.iter().take(64) {
        let payload = match input {
            Input::Raw(text) => text.clone(),
            Input::Genuine(text) => {
                genuine += 1;
                speak(&mut peer, &env, text)
            },
            Input::Flipped { text, position, mask } => {
                // A flip may leave the payload intact, so it counts as genuine
                genuine += 1;
                let mut bytes = speak(&mut peer, &env, text).into_bytes();
                let at = usize::from(*position) % bytes.len();
                bytes[at] ^= mask;
                String::from_utf8_lossy(&bytes).into_owned()
            },
            Input::History(items) => {
                let messages = items
                    .iter()
                    .take(64)
                    .map(|item| match item {
                        HistoryItem::Raw(text) => HistoryEnvelope::new(text.clone()),
                        HistoryItem::Genuine(text) => {
                            genuine += 1;
                            HistoryEnvelope::new(speak(&mut peer, &env, text))
                        },
                    })
                    .collect();
                ControlPacket::History { messages }.encode()
            },
        };

        let _ = local.receive(&payload);

        let chain = local.chain();
        for (digest, block) in chain.iter() {
            assert_eq!(&block_digest(block), digest, "block stored under a foreign digest");
        }
        if let Some(head) = chain.head() {
            assert!(chain.contains(&head), "head {head} is not in the chain");
        }
        assert!(chain.len() <= genuine, "chain holds blocks nobody with the key wrote");
    }
});
