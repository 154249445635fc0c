//! In-memory uid ↔ connection reconciliation.
//!
//! One entry per authenticated user: which connection currently speaks
//! for them, the outbound channel to reach them, and which rooms that
//! connection has entered. A second login for the same uid displaces
//! the first — the old entry is returned so the handler can notify and
//! close it.
//!
//! The tracker is a plain map owned by the composition root behind a
//! single async mutex; per-room ordering comes from the room actors,
//! not from here.

use std::collections::{HashMap, HashSet};

use triviarena_protocol::{ConnectionId, RoomId, ServerFrame, Uid};

/// Outbound channel for one connection.
pub type ConnectionSender = tokio::sync::mpsc::UnboundedSender<ServerFrame>;

/// One live authenticated connection.
#[derive(Debug, Clone)]
pub struct ConnectionEntry {
    pub conn_id: ConnectionId,
    pub sender: ConnectionSender,
    pub rooms: HashSet<RoomId>,
}

/// Tracks which connection currently represents each uid.
#[derive(Default)]
pub struct ConnectivityTracker {
    by_uid: HashMap<Uid, ConnectionEntry>,
}

impl ConnectivityTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers an authenticated connection for `uid`. If the uid was
    /// already connected elsewhere, the displaced entry is returned.
    pub fn connect(
        &mut self,
        uid: Uid,
        conn_id: ConnectionId,
        sender: ConnectionSender,
    ) -> Option<ConnectionEntry> {
        let displaced = self.by_uid.insert(
            uid.clone(),
            ConnectionEntry {
                conn_id,
                sender,
                rooms: HashSet::new(),
            },
        );
        if let Some(old) = &displaced {
            tracing::info!(%uid, old = %old.conn_id, new = %conn_id, "connection displaced");
        }
        displaced
    }

    /// Removes the entry for `conn_id` and returns the uid plus the
    /// rooms it was in, so the caller can notify each room actor.
    ///
    /// A stale disconnect (the uid has already been taken over by a
    /// newer connection) returns `None` and leaves the new entry alone.
    pub fn disconnect(&mut self, conn_id: ConnectionId) -> Option<(Uid, Vec<RoomId>)> {
        let uid = self
            .by_uid
            .iter()
            .find(|(_, entry)| entry.conn_id == conn_id)
            .map(|(uid, _)| uid.clone())?;
        let entry = self.by_uid.remove(&uid)?;
        Some((uid, entry.rooms.into_iter().collect()))
    }

    /// Records that `uid`'s connection entered a room.
    pub fn enter_room(&mut self, uid: &Uid, room_id: RoomId) {
        if let Some(entry) = self.by_uid.get_mut(uid) {
            entry.rooms.insert(room_id);
        }
    }

    /// Records that `uid`'s connection left a room.
    pub fn exit_room(&mut self, uid: &Uid, room_id: RoomId) {
        if let Some(entry) = self.by_uid.get_mut(uid) {
            entry.rooms.remove(&room_id);
        }
    }

    /// The outbound channel for `uid`, if they are connected.
    pub fn sender_for(&self, uid: &Uid) -> Option<ConnectionSender> {
        self.by_uid.get(uid).map(|entry| entry.sender.clone())
    }

    pub fn is_online(&self, uid: &Uid) -> bool {
        self.by_uid.contains_key(uid)
    }

    pub fn len(&self) -> usize {
        self.by_uid.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_uid.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn uid(s: &str) -> Uid {
        Uid::from(s)
    }

    fn sender() -> ConnectionSender {
        tokio::sync::mpsc::unbounded_channel().0
    }

    #[test]
    fn test_connect_then_sender_for() {
        let mut tracker = ConnectivityTracker::new();
        tracker.connect(uid("a"), ConnectionId::new(1), sender());
        assert!(tracker.is_online(&uid("a")));
        assert!(tracker.sender_for(&uid("a")).is_some());
        assert!(tracker.sender_for(&uid("b")).is_none());
    }

    #[test]
    fn test_second_login_displaces_first() {
        let mut tracker = ConnectivityTracker::new();
        tracker.connect(uid("a"), ConnectionId::new(1), sender());
        let displaced = tracker.connect(uid("a"), ConnectionId::new(2), sender());
        assert_eq!(displaced.unwrap().conn_id, ConnectionId::new(1));
        assert_eq!(tracker.len(), 1);
    }

    #[test]
    fn test_disconnect_returns_rooms() {
        let mut tracker = ConnectivityTracker::new();
        tracker.connect(uid("a"), ConnectionId::new(1), sender());
        tracker.enter_room(&uid("a"), RoomId(7));
        tracker.enter_room(&uid("a"), RoomId(9));
        tracker.exit_room(&uid("a"), RoomId(9));

        let (who, mut rooms) = tracker.disconnect(ConnectionId::new(1)).unwrap();
        rooms.sort_by_key(|r| r.0);
        assert_eq!(who, uid("a"));
        assert_eq!(rooms, vec![RoomId(7)]);
        assert!(!tracker.is_online(&uid("a")));
    }

    #[test]
    fn test_stale_disconnect_after_displacement_is_ignored() {
        // Connection 1 is displaced by connection 2, then 1's disconnect
        // arrives late. It must not evict the live entry.
        let mut tracker = ConnectivityTracker::new();
        tracker.connect(uid("a"), ConnectionId::new(1), sender());
        tracker.connect(uid("a"), ConnectionId::new(2), sender());

        assert!(tracker.disconnect(ConnectionId::new(1)).is_none());
        assert!(tracker.is_online(&uid("a")));
    }

    #[test]
    fn test_disconnect_unknown_connection_is_none() {
        let mut tracker = ConnectivityTracker::new();
        assert!(tracker.disconnect(ConnectionId::new(42)).is_none());
    }
}
