//! Room membership view.
//!
//! Driven by authenticated presence events and by the relay's user list
//! snapshots. Presence never touches the chain.

use std::collections::BTreeMap;

use hashchat_proto::{PresenceAction, PresenceEvent, UserEntry};

/// A member as shown in listings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OnlineUser {
    /// Client identifier.
    pub client_id: String,
    /// Display name.
    pub username: String,
}

/// Membership change caused by a presence event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PresenceChange {
    /// Join or leave.
    pub action: PresenceAction,
    /// Client concerned.
    pub client_id: String,
    /// Name to show: from the event on join, the tracked name on leave.
    pub username: String,
    /// Event is about this client. No notice is shown for it.
    pub is_self: bool,
}

/// Client id to display name, ordered for stable listings.
#[derive(Debug, Clone)]
pub struct PresenceTracker {
    own_client_id: String,
    users: BTreeMap<String, String>,
}

impl PresenceTracker {
    /// Empty tracker for the given local client.
    pub fn new(own_client_id: impl Into<String>) -> Self {
        Self { own_client_id: own_client_id.into(), users: BTreeMap::new() }
    }

    /// Apply a presence event. `None` when membership did not change.
    ///
    /// A join for a present client and a leave for an absent one are no-ops.
    pub fn on_presence(&mut self, event: &PresenceEvent) -> Option<PresenceChange> {
        let is_self = event.client_id == self.own_client_id;
        let username = match event.action {
            PresenceAction::Join => {
                if self.users.contains_key(&event.client_id) {
                    return None;
                }
                self.users.insert(event.client_id.clone(), event.username.clone());
                event.username.clone()
            },
            PresenceAction::Leave => self.users.remove(&event.client_id)?,
        };

        Some(PresenceChange {
            action: event.action,
            client_id: event.client_id.clone(),
            username,
            is_self,
        })
    }

    /// Replace the whole view with the relay's snapshot.
    ///
    /// Entries without an id or a name are skipped.
    pub fn replace_all(&mut self, users: &[UserEntry]) {
        self.users = users
            .iter()
            .filter(|u| !u.client_id.is_empty() && !u.username.is_empty())
            .map(|u| (u.client_id.clone(), u.username.clone()))
            .collect();
    }

    /// Record this client as present.
    pub fn insert_self(&mut self, username: impl Into<String>) {
        self.users.insert(self.own_client_id.clone(), username.into());
    }

    /// Tracked name for a client.
    pub fn display_name(&self, client_id: &str) -> Option<&str> {
        self.users.get(client_id).map(String::as_str)
    }

    /// True if the client is tracked.
    pub fn contains(&self, client_id: &str) -> bool {
        self.users.contains_key(client_id)
    }

    /// Number of tracked clients.
    pub fn len(&self) -> usize {
        self.users.len()
    }

    /// True if nobody is tracked.
    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }

    /// Current members ordered by client id.
    pub fn users(&self) -> Vec<OnlineUser> {
        self.users
            .iter()
            .map(|(id, name)| OnlineUser { client_id: id.clone(), username: name.clone() })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn join(id: &str, name: &str) -> PresenceEvent {
        PresenceEvent::new(PresenceAction::Join, id, name, 1)
    }

    fn leave(id: &str) -> PresenceEvent {
        PresenceEvent::new(PresenceAction::Leave, id, "", 2)
    }

    #[test]
    fn join_then_leave() {
        let mut tracker = PresenceTracker::new("me");
        let joined = tracker.on_presence(&join("X", "xavier")).unwrap();
        assert_eq!(joined.action, PresenceAction::Join);
        assert!(tracker.contains("X"));

        let left = tracker.on_presence(&leave("X")).unwrap();
        assert_eq!(left.username, "xavier");
        assert!(!tracker.contains("X"));
    }

    #[test]
    fn duplicate_join_is_noop() {
        let mut tracker = PresenceTracker::new("me");
        tracker.on_presence(&join("X", "xavier"));
        assert_eq!(tracker.on_presence(&join("X", "other")), None);
        assert_eq!(tracker.display_name("X"), Some("xavier"));
        assert_eq!(tracker.len(), 1);
    }

    #[test]
    fn leave_for_absent_is_noop() {
        let mut tracker = PresenceTracker::new("me");
        assert_eq!(tracker.on_presence(&leave("X")), None);
    }

    #[test]
    fn self_events_are_marked() {
        let mut tracker = PresenceTracker::new("me");
        let change = tracker.on_presence(&join("me", "myself")).unwrap();
        assert!(change.is_self);
        assert!(tracker.contains("me"));
    }

    #[test]
    fn snapshot_replaces_and_skips_blank_entries() {
        let mut tracker = PresenceTracker::new("me");
        tracker.on_presence(&join("old", "gone"));
        tracker.replace_all(&[
            UserEntry { client_id: "a".into(), username: "alice".into() },
            UserEntry { client_id: "".into(), username: "nobody".into() },
            UserEntry { client_id: "b".into(), username: "".into() },
        ]);
        assert_eq!(
            tracker.users(),
            vec![OnlineUser { client_id: "a".into(), username: "alice".into() }]
        );
    }
}
