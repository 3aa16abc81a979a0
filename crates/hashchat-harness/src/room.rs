//! Simulated chat room.
//!
//! `SimRoom` wires several [`Client`]s to one [`SimRelay`] and pumps payloads
//! between them through a [`ChaoticDelivery`] queue. Client-to-relay traffic
//! is reliable and ordered like a socket write; relay-to-client traffic is
//! where faults are injected.

use std::collections::HashMap;

use hashchat_client::{
    ChatMessage, Client, ClientAction, ClientError, ClientEvent, HistorySummary, Notice,
    OnlineUser,
};
use hashchat_core::{Environment, Identity, SessionConfig};
use hashchat_crypto::{KEY_SIZE, SessionKey};
use hashchat_proto::Digest;

use crate::{
    ChaoticDelivery, SimEnv,
    chaos::ChaosConfig,
    invariants::{ClientSnapshot, SystemSnapshot},
    sim_relay::{ConnId, Delivery, SimRelay},
};

/// Upper bound on deliveries processed by one [`SimRoom::run_until_quiet`].
const MAX_STEPS: usize = 100_000;

/// One client plus everything it has shown its user.
pub struct Participant {
    /// The client state machine.
    pub client: Client<SimEnv>,
    /// Relay connection while connected.
    pub conn: Option<ConnId>,
    /// Delivered messages, in display order.
    pub delivered: Vec<ChatMessage>,
    /// System notices, in display order.
    pub notices: Vec<Notice>,
    /// Latest online-user list.
    pub online: Vec<OnlineUser>,
    /// Completed history replays.
    pub histories: Vec<HistorySummary>,
}

impl Participant {
    /// Message texts in display order.
    pub fn contents(&self) -> Vec<&str> {
        self.delivered.iter().map(|m| m.content.as_str()).collect()
    }

    /// Notice texts in display order.
    pub fn notice_texts(&self) -> Vec<&str> {
        self.notices.iter().map(|n| n.text.as_str()).collect()
    }

    /// Chain head.
    pub fn head(&self) -> Option<Digest> {
        self.client.session().chain().head()
    }
}

/// Relay, clients and network between them.
pub struct SimRoom {
    env: SimEnv,
    key: SessionKey,
    config: SessionConfig,
    relay: SimRelay,
    network: ChaoticDelivery,
    participants: Vec<Participant>,
    owners: HashMap<ConnId, usize>,
}

impl SimRoom {
    /// Room with reliable delivery.
    pub fn new(seed: u64) -> Self {
        Self::with_chaos(seed, ChaosConfig::reliable())
    }

    /// Room whose relay-to-client traffic suffers `chaos`.
    pub fn with_chaos(seed: u64, chaos: ChaosConfig) -> Self {
        Self::with_config(seed, chaos, SessionConfig::default())
    }

    /// Room with explicit chaos and session settings.
    pub fn with_config(seed: u64, chaos: ChaosConfig, config: SessionConfig) -> Self {
        let env = SimEnv::with_seed(seed);
        let mut key = [0u8; KEY_SIZE];
        env.random_bytes(&mut key);
        Self {
            env,
            key: SessionKey::from_bytes(key),
            config,
            relay: SimRelay::new(),
            network: ChaoticDelivery::new(seed.wrapping_add(1), chaos),
            participants: Vec::new(),
            owners: HashMap::new(),
        }
    }

    /// Shared environment.
    pub fn env(&self) -> &SimEnv {
        &self.env
    }

    /// Room key.
    pub fn key(&self) -> &SessionKey {
        &self.key
    }

    /// The relay.
    pub fn relay(&self) -> &SimRelay {
        &self.relay
    }

    /// Mutable relay, for injecting stored history.
    pub fn relay_mut(&mut self) -> &mut SimRelay {
        &mut self.relay
    }

    /// Participant `index`.
    pub fn participant(&self, index: usize) -> &Participant {
        &self.participants[index]
    }

    /// All participants.
    pub fn participants(&self) -> &[Participant] {
        &self.participants
    }

    /// Room topic shared by every participant.
    pub fn topic(&self) -> String {
        hashchat_crypto::topic_id(&self.key)
    }

    /// Add a disconnected participant named `username`.
    pub fn add(&mut self, username: &str) -> usize {
        self.add_with_key(username, self.key.clone())
    }

    /// Add a participant that derived a different key.
    pub fn add_with_key(&mut self, username: &str, key: SessionKey) -> usize {
        let index = self.participants.len();
        let identity = Identity::new(format!("client-{index}"), username);
        self.participants.push(Participant {
            client: Client::new(self.env.clone(), identity, key, self.config.clone()),
            conn: None,
            delivered: Vec::new(),
            notices: Vec::new(),
            online: Vec::new(),
            histories: Vec::new(),
        });
        index
    }

    /// Open a relay connection for `index` and run the handshake.
    pub fn connect(&mut self, index: usize) {
        let conn = self.relay.connect();
        self.participants[index].conn = Some(conn);
        self.owners.insert(conn, index);
        self.feed(index, ClientEvent::Connected);
    }

    /// Have `index` send `text`.
    pub fn send(&mut self, index: usize, text: &str) -> Result<(), ClientError> {
        let actions =
            self.participants[index].client.handle(ClientEvent::SendMessage { text: text.to_string() })?;
        self.apply(index, actions);
        Ok(())
    }

    /// Announce departure, then close the connection.
    pub fn leave(&mut self, index: usize) {
        self.feed(index, ClientEvent::Leave);
        self.drop_connection(index);
    }

    /// Close the connection without announcing departure.
    pub fn drop_connection(&mut self, index: usize) {
        let Some(conn) = self.participants[index].conn.take() else {
            return;
        };
        self.owners.remove(&conn);
        for delivery in self.relay.disconnect(conn) {
            self.network.push(delivery);
        }
        self.feed(index, ClientEvent::Disconnected);
    }

    /// Hand `payload` to `index` as if the relay had sent it.
    pub fn deliver_raw(&mut self, index: usize, payload: impl Into<String>) {
        self.feed(index, ClientEvent::PayloadReceived(payload.into()));
    }

    /// Deliver up to `steps` in-flight payloads. Returns how many ran.
    pub fn step(&mut self, steps: usize) -> usize {
        let mut ran = 0;
        while ran < steps {
            let Some(Delivery { to, payload }) = self.network.pop() else {
                break;
            };
            ran += 1;
            // Payloads for closed connections vanish
            if let Some(&index) = self.owners.get(&to) {
                self.feed(index, ClientEvent::PayloadReceived(payload));
            }
        }
        ran
    }

    /// Deliver payloads until nothing is in flight.
    pub fn run_until_quiet(&mut self) {
        let ran = self.step(MAX_STEPS);
        debug_assert!(self.network.is_empty(), "room still busy after {ran} deliveries");
    }

    /// Snapshot for invariant checks.
    pub fn snapshot(&self) -> SystemSnapshot {
        SystemSnapshot::from_clients(
            self.participants
                .iter()
                .map(|p| {
                    ClientSnapshot::capture(p.client.session(), p.delivered.iter().filter_map(|m| m.digest))
                })
                .collect(),
        )
    }

    fn feed(&mut self, index: usize, event: ClientEvent) {
        // Only SendMessage can fail, and it is routed through `send`
        match self.participants[index].client.handle(event) {
            Ok(actions) => self.apply(index, actions),
            Err(e) => tracing::warn!(index, error = %e, "client rejected event"),
        }
    }

    fn apply(&mut self, index: usize, actions: Vec<ClientAction>) {
        for action in actions {
            let participant = &mut self.participants[index];
            match action {
                ClientAction::Send(payload) => {
                    if let Some(conn) = participant.conn {
                        for delivery in self.relay.receive(conn, &payload) {
                            self.network.push(delivery);
                        }
                    }
                },
                ClientAction::Deliver(message) => participant.delivered.push(message),
                ClientAction::Notice(notice) => participant.notices.push(notice),
                ClientAction::OnlineUsers(users) => participant.online = users,
                ClientAction::HistoryLoaded(summary) => participant.histories.push(summary),
            }
        }
    }
}
