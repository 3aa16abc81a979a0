//! In-memory room relay.
//!
//! `SimRelay` reproduces the observable behaviour of the fan-out service the
//! client talks to, without sockets:
//!
//! - The first payload on a connection is the room topic, the second is the
//!   `ClientInfo` JSON. Unparseable client info closes the connection.
//! - After the handshake the relay sends stored history (only when there is
//!   some), then the current user list, to the new connection only.
//! - Later payloads must have the shape `tag:rest` with both sides non-empty.
//!   Anything else is dropped. Well-formed payloads are broadcast to every
//!   other subscriber of the topic; those whose `rest` does not start with
//!   `presence:` are also appended to the topic history.
//! - When a subscriber leaves, the remaining subscribers get a fresh user
//!   list. History outlives the last subscriber.
//!
//! The relay never sees keys. Tests can inject arbitrary stored payloads via
//! [`SimRelay::seed_history`] to play a malicious or lossy relay.

use std::collections::{BTreeMap, HashMap};

use hashchat_proto::{ClientInfo, ControlPacket, HistoryEnvelope, UserEntry};

/// Connection handle.
pub type ConnId = u64;

/// Payload addressed to one connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivery {
    /// Destination connection.
    pub to: ConnId,
    /// Text frame content.
    pub payload: String,
}

/// Handshake progress of a connection.
#[derive(Debug, Clone)]
enum Stage {
    AwaitingTopic,
    AwaitingInfo { topic: String },
    Subscribed { topic: String, info: ClientInfo },
}

/// In-memory relay for any number of topics.
#[derive(Debug, Default)]
pub struct SimRelay {
    /// Live connections (`conn` → handshake stage).
    connections: BTreeMap<ConnId, Stage>,
    /// Subscribers per topic, in join order.
    subscribers: HashMap<String, Vec<ConnId>>,
    /// Stored payloads per topic, oldest first.
    history: HashMap<String, Vec<String>>,
    /// Next connection ID.
    next_conn: ConnId,
}

impl SimRelay {
    /// Relay with no connections and no history.
    pub fn new() -> Self {
        Self::default()
    }

    /// Accept a new connection.
    pub fn connect(&mut self) -> ConnId {
        self.next_conn += 1;
        let conn = self.next_conn;
        self.connections.insert(conn, Stage::AwaitingTopic);
        conn
    }

    /// Whether `conn` is still open.
    pub fn is_connected(&self, conn: ConnId) -> bool {
        self.connections.contains_key(&conn)
    }

    /// Number of subscribers of `topic`.
    pub fn subscriber_count(&self, topic: &str) -> usize {
        self.subscribers.get(topic).map_or(0, Vec::len)
    }

    /// Stored payloads for `topic`, oldest first.
    pub fn history(&self, topic: &str) -> &[String] {
        self.history.get(topic).map(Vec::as_slice).unwrap_or_default()
    }

    /// Append a payload to the stored history of `topic` as-is.
    pub fn seed_history(&mut self, topic: &str, payload: impl Into<String>) {
        self.history.entry(topic.to_string()).or_default().push(payload.into());
    }

    /// Replace the stored history of `topic`.
    pub fn set_history(&mut self, topic: &str, payloads: Vec<String>) {
        self.history.insert(topic.to_string(), payloads);
    }

    /// Handle a text frame from `conn`.
    pub fn receive(&mut self, conn: ConnId, payload: &str) -> Vec<Delivery> {
        let Some(stage) = self.connections.get(&conn).cloned() else {
            tracing::debug!(conn, "frame from closed connection");
            return Vec::new();
        };

        match stage {
            Stage::AwaitingTopic => {
                self.connections.insert(conn, Stage::AwaitingInfo { topic: payload.to_string() });
                Vec::new()
            },
            Stage::AwaitingInfo { topic } => match ClientInfo::decode(payload) {
                Ok(info) => self.subscribe(conn, topic, info),
                Err(e) => {
                    tracing::debug!(conn, error = %e, "bad client info");
                    self.disconnect(conn)
                },
            },
            Stage::Subscribed { topic, .. } => self.relay(conn, &topic, payload),
        }
    }

    /// Close `conn`. Remaining subscribers of its topic get a new user list.
    pub fn disconnect(&mut self, conn: ConnId) -> Vec<Delivery> {
        let topic = match self.connections.remove(&conn) {
            Some(Stage::Subscribed { topic, .. } | Stage::AwaitingInfo { topic }) => topic,
            Some(Stage::AwaitingTopic) | None => return Vec::new(),
        };

        if let Some(list) = self.subscribers.get_mut(&topic) {
            list.retain(|c| *c != conn);
            if list.is_empty() {
                self.subscribers.remove(&topic);
            }
        }

        let userlist = self.userlist(&topic);
        self.subscribers_of(&topic)
            .into_iter()
            .map(|to| Delivery { to, payload: userlist.clone() })
            .collect()
    }

    fn subscribe(&mut self, conn: ConnId, topic: String, info: ClientInfo) -> Vec<Delivery> {
        tracing::debug!(conn, client_id = %info.client_id, "subscribed");
        self.subscribers.entry(topic.clone()).or_default().push(conn);
        self.connections.insert(conn, Stage::Subscribed { topic: topic.clone(), info });

        let mut out = Vec::with_capacity(2);
        let stored = self.history(&topic);
        if !stored.is_empty() {
            let messages = stored.iter().map(HistoryEnvelope::new).collect();
            out.push(Delivery { to: conn, payload: ControlPacket::History { messages }.encode() });
        }
        out.push(Delivery { to: conn, payload: self.userlist(&topic) });
        out
    }

    fn relay(&mut self, from: ConnId, topic: &str, payload: &str) -> Vec<Delivery> {
        let Some((_, rest)) =
            payload.split_once(':').filter(|(tag, rest)| !tag.is_empty() && !rest.is_empty())
        else {
            tracing::debug!(conn = from, "dropping payload without tag");
            return Vec::new();
        };

        if !rest.starts_with("presence:") {
            self.seed_history(topic, payload);
        }

        self.subscribers_of(topic)
            .into_iter()
            .filter(|to| *to != from)
            .map(|to| Delivery { to, payload: payload.to_string() })
            .collect()
    }

    fn subscribers_of(&self, topic: &str) -> Vec<ConnId> {
        self.subscribers.get(topic).cloned().unwrap_or_default()
    }

    fn userlist(&self, topic: &str) -> String {
        let users = self
            .subscribers_of(topic)
            .into_iter()
            .filter_map(|conn| match self.connections.get(&conn) {
                Some(Stage::Subscribed { info, .. })
                    if !info.client_id.is_empty() && !info.username.is_empty() =>
                {
                    Some(UserEntry { client_id: info.client_id.clone(), username: info.username.clone() })
                },
                _ => None,
            })
            .collect();
        ControlPacket::Userlist { users }.encode()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn join(relay: &mut SimRelay, topic: &str, id: &str) -> (ConnId, Vec<Delivery>) {
        let conn = relay.connect();
        assert!(relay.receive(conn, topic).is_empty());
        let out = relay.receive(conn, &ClientInfo { client_id: id.into(), username: id.into() }.encode());
        (conn, out)
    }

    #[test]
    fn handshake_sends_only_userlist_when_no_history() {
        let mut relay = SimRelay::new();
        let (conn, out) = join(&mut relay, "t", "a");
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].to, conn);
        assert_eq!(out[0].payload, r#"{"type":"userlist","users":[{"clientId":"a","username":"a"}]}"#);
    }

    #[test]
    fn broadcast_excludes_sender_and_stores_non_presence() {
        let mut relay = SimRelay::new();
        let (a, _) = join(&mut relay, "t", "a");
        let (b, _) = join(&mut relay, "t", "b");

        let out = relay.receive(a, "tag:ct");
        assert_eq!(out, vec![Delivery { to: b, payload: "tag:ct".into() }]);

        let out = relay.receive(a, "tag:presence:ct");
        assert_eq!(out.len(), 1);
        assert_eq!(relay.history("t"), ["tag:ct".to_string()]);
    }

    #[test]
    fn malformed_payloads_are_dropped() {
        let mut relay = SimRelay::new();
        let (a, _) = join(&mut relay, "t", "a");
        join(&mut relay, "t", "b");

        for payload in ["legacy", ":ct", "tag:", ""] {
            assert!(relay.receive(a, payload).is_empty(), "{payload:?} was relayed");
        }
        assert!(relay.history("t").is_empty());
    }

    #[test]
    fn history_sent_before_userlist() {
        let mut relay = SimRelay::new();
        relay.seed_history("t", "x:1");
        let (_, out) = join(&mut relay, "t", "a");
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].payload, r#"{"type":"history","messages":[{"content":"x:1"}]}"#);
        assert!(out[1].payload.contains("userlist"));
    }

    #[test]
    fn leave_updates_remaining_and_keeps_history() {
        let mut relay = SimRelay::new();
        let (a, _) = join(&mut relay, "t", "a");
        let (b, _) = join(&mut relay, "t", "b");
        relay.receive(a, "tag:ct");

        let out = relay.disconnect(a);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].to, b);
        assert!(!out[0].payload.contains(r#""a""#));

        relay.disconnect(b);
        assert_eq!(relay.subscriber_count("t"), 0);
        assert_eq!(relay.history("t").len(), 1);
    }

    #[test]
    fn bad_client_info_closes_connection() {
        let mut relay = SimRelay::new();
        let conn = relay.connect();
        relay.receive(conn, "t");
        assert!(relay.receive(conn, "not json").is_empty());
        assert!(!relay.is_connected(conn));
    }

    #[test]
    fn topics_are_isolated() {
        let mut relay = SimRelay::new();
        let (a, _) = join(&mut relay, "t1", "a");
        join(&mut relay, "t2", "b");
        assert!(relay.receive(a, "tag:ct").is_empty());
        assert!(relay.history("t2").is_empty());
    }
}
