//! The connection table: every live connection, keyed by id.
//!
//! # Concurrency note
//!
//! `ConnectionTable` is a plain `HashMap` with no locking of its own. It is
//! always mutated together with the room registry, under the single lock
//! that guards both, so a connection's room-set and the rooms' member-sets
//! can never be observed half-updated.

use std::collections::{BTreeSet, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};

use roomcast_protocol::{ConnectionId, RoomId, ServerEvent};

use crate::{Connection, ConnectionError, OutboundSender};

/// Counter for generating connection ids. Shared by every table in the
/// process so ids stay unique even when several servers run side by side.
static NEXT_CONNECTION_ID: AtomicU64 = AtomicU64::new(1);

/// Tracks every live connection and the rooms it belongs to.
///
/// ```text
/// register() → attach/detach_room()* → take_rooms() → unregister()
/// ```
///
/// The last two steps are the disconnect path: the room registry evicts the
/// connection from all of its rooms first, then the entry is dropped, which
/// also drops its outbound queue and lets the writer task finish.
#[derive(Debug, Default)]
pub struct ConnectionTable {
    connections: HashMap<ConnectionId, Connection>,
}

impl ConnectionTable {
    /// Creates an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a new connection with an empty room-set and returns its
    /// freshly allocated id. Never fails.
    pub fn register(&mut self, outbound: OutboundSender) -> ConnectionId {
        let id =
            ConnectionId(NEXT_CONNECTION_ID.fetch_add(1, Ordering::Relaxed));
        self.connections.insert(id, Connection::new(id, outbound));
        id
    }

    /// Looks up a live connection.
    ///
    /// # Errors
    /// Returns [`ConnectionError::NotFound`] if `id` is not registered.
    pub fn lookup(
        &self,
        id: ConnectionId,
    ) -> Result<&Connection, ConnectionError> {
        self.connections.get(&id).ok_or(ConnectionError::NotFound(id))
    }

    /// Removes a connection, returning its entry if it was still present.
    ///
    /// The caller must already have evicted it from every room. Calling this
    /// twice for the same id is harmless; the second call returns `None`.
    pub fn unregister(&mut self, id: ConnectionId) -> Option<Connection> {
        let removed = self.connections.remove(&id)?;
        if !removed.rooms().is_empty() {
            tracing::warn!(
                conn_id = %id,
                rooms = removed.rooms().len(),
                "connection unregistered while still in rooms"
            );
        }
        Some(removed)
    }

    /// Queues `event` on a connection's outbound queue.
    ///
    /// # Errors
    /// [`ConnectionError::NotFound`] if the connection is gone,
    /// [`ConnectionError::Closed`] if its writer has exited.
    pub fn deliver(
        &self,
        id: ConnectionId,
        event: ServerEvent,
    ) -> Result<(), ConnectionError> {
        self.lookup(id)?.deliver(event)
    }

    /// Adds `room_id` to a connection's room-set. Returns `false` if it was
    /// already there.
    ///
    /// Only the room registry should call this, so both sides of the
    /// membership change together.
    pub fn attach_room(
        &mut self,
        id: ConnectionId,
        room_id: RoomId,
    ) -> Result<bool, ConnectionError> {
        let conn = self
            .connections
            .get_mut(&id)
            .ok_or(ConnectionError::NotFound(id))?;
        Ok(conn.rooms_mut().insert(room_id))
    }

    /// Removes `room_id` from a connection's room-set. Returns `false` if it
    /// wasn't there.
    ///
    /// Only the room registry should call this.
    pub fn detach_room(
        &mut self,
        id: ConnectionId,
        room_id: &RoomId,
    ) -> Result<bool, ConnectionError> {
        let conn = self
            .connections
            .get_mut(&id)
            .ok_or(ConnectionError::NotFound(id))?;
        Ok(conn.rooms_mut().remove(room_id))
    }

    /// Empties a connection's room-set and returns what it held. Unknown ids
    /// yield an empty set, so repeated disconnect cleanup is a no-op.
    pub fn take_rooms(&mut self, id: ConnectionId) -> BTreeSet<RoomId> {
        self.connections
            .get_mut(&id)
            .map(|conn| std::mem::take(conn.rooms_mut()))
            .unwrap_or_default()
    }

    /// Returns `true` if `id` is a live connection.
    pub fn contains(&self, id: ConnectionId) -> bool {
        self.connections.contains_key(&id)
    }

    /// Iterates over every live connection.
    pub fn iter(&self) -> impl Iterator<Item = &Connection> {
        self.connections.values()
    }

    /// Returns the number of live connections.
    pub fn len(&self) -> usize {
        self.connections.len()
    }

    /// Returns `true` if there are no live connections.
    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }
}

// =========================================================================
// Tests
// =========================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use roomcast_protocol::Payload;
    use tokio::sync::mpsc;
    use tokio::sync::mpsc::error::TryRecvError;

    use crate::OutboundReceiver;

    fn register(
        table: &mut ConnectionTable,
    ) -> (ConnectionId, OutboundReceiver) {
        let (tx, rx) = mpsc::unbounded_channel();
        (table.register(tx), rx)
    }

    fn room(name: &str) -> RoomId {
        RoomId::new(name)
    }

    // -- register ---------------------------------------------------------

    #[test]
    fn test_register_allocates_unique_ids() {
        let mut table = ConnectionTable::new();
        let (a, _rx_a) = register(&mut table);
        let (b, _rx_b) = register(&mut table);
        assert_ne!(a, b);
        assert_eq!(table.len(), 2);
    }

    #[test]
    fn test_register_ids_unique_across_tables() {
        let mut first = ConnectionTable::new();
        let mut second = ConnectionTable::new();
        let (a, _rx_a) = register(&mut first);
        let (b, _rx_b) = register(&mut second);
        assert_ne!(a, b);
    }

    #[test]
    fn test_register_starts_with_no_rooms() {
        let mut table = ConnectionTable::new();
        let (id, _rx) = register(&mut table);
        assert!(table.lookup(id).unwrap().rooms().is_empty());
    }

    // -- lookup / unregister ----------------------------------------------

    #[test]
    fn test_lookup_unknown_is_not_found() {
        let table = ConnectionTable::new();
        assert!(matches!(
            table.lookup(ConnectionId(u64::MAX)),
            Err(ConnectionError::NotFound(_))
        ));
    }

    #[test]
    fn test_unregister_removes_entry() {
        let mut table = ConnectionTable::new();
        let (id, _rx) = register(&mut table);

        let removed = table.unregister(id).expect("was registered");
        assert_eq!(removed.id(), id);
        assert!(!table.contains(id));
        assert!(table.is_empty());
    }

    #[test]
    fn test_unregister_twice_is_harmless() {
        let mut table = ConnectionTable::new();
        let (id, _rx) = register(&mut table);
        let (other, _rx_other) = register(&mut table);

        assert!(table.unregister(id).is_some());
        assert!(table.unregister(id).is_none());
        assert!(table.contains(other));
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn test_unregister_closes_outbound_queue() {
        let mut table = ConnectionTable::new();
        let (id, mut rx) = register(&mut table);
        drop(table.unregister(id));
        // The table held the only sender, so the writer sees end-of-stream.
        assert!(matches!(rx.try_recv(), Err(TryRecvError::Disconnected)));
    }

    // -- deliver -----------------------------------------------------------

    #[test]
    fn test_deliver_queues_event() {
        let mut table = ConnectionTable::new();
        let (id, mut rx) = register(&mut table);

        let event = ServerEvent::ReceiveMessage(Payload::from("hello"));
        table.deliver(id, event.clone()).unwrap();
        assert_eq!(rx.try_recv().unwrap(), event);
    }

    #[test]
    fn test_deliver_preserves_order() {
        let mut table = ConnectionTable::new();
        let (id, mut rx) = register(&mut table);

        for i in 0..5 {
            table
                .deliver(id, ServerEvent::ReceiveMessage(i.to_string().into()))
                .unwrap();
        }
        for i in 0..5 {
            assert_eq!(
                rx.try_recv().unwrap(),
                ServerEvent::ReceiveMessage(i.to_string().into())
            );
        }
    }

    #[test]
    fn test_deliver_to_dropped_receiver_is_closed() {
        let mut table = ConnectionTable::new();
        let (id, rx) = register(&mut table);
        drop(rx);

        let result =
            table.deliver(id, ServerEvent::UserTyping(Payload::null()));
        assert!(matches!(result, Err(ConnectionError::Closed(c)) if c == id));
    }

    #[test]
    fn test_deliver_to_unknown_is_not_found() {
        let table = ConnectionTable::new();
        let result = table.deliver(
            ConnectionId(u64::MAX),
            ServerEvent::UserTyping(Payload::null()),
        );
        assert!(matches!(result, Err(ConnectionError::NotFound(_))));
    }

    // -- room-set bookkeeping ---------------------------------------------

    #[test]
    fn test_attach_room_is_idempotent() {
        let mut table = ConnectionTable::new();
        let (id, _rx) = register(&mut table);

        assert!(table.attach_room(id, room("r1")).unwrap());
        assert!(!table.attach_room(id, room("r1")).unwrap());
        assert_eq!(table.lookup(id).unwrap().rooms().len(), 1);
        assert!(table.lookup(id).unwrap().is_in(&room("r1")));
    }

    #[test]
    fn test_detach_room_reports_presence() {
        let mut table = ConnectionTable::new();
        let (id, _rx) = register(&mut table);
        table.attach_room(id, room("r1")).unwrap();

        assert!(table.detach_room(id, &room("r1")).unwrap());
        assert!(!table.detach_room(id, &room("r1")).unwrap());
    }

    #[test]
    fn test_attach_room_unknown_connection_fails() {
        let mut table = ConnectionTable::new();
        let result = table.attach_room(ConnectionId(u64::MAX), room("r1"));
        assert!(result.is_err());
    }

    #[test]
    fn test_take_rooms_empties_room_set() {
        let mut table = ConnectionTable::new();
        let (id, _rx) = register(&mut table);
        table.attach_room(id, room("a")).unwrap();
        table.attach_room(id, room("b")).unwrap();

        let taken = table.take_rooms(id);
        assert_eq!(taken, BTreeSet::from([room("a"), room("b")]));
        assert!(table.lookup(id).unwrap().rooms().is_empty());
        assert!(table.take_rooms(id).is_empty());
    }

    #[test]
    fn test_take_rooms_unknown_connection_is_empty() {
        let mut table = ConnectionTable::new();
        assert!(table.take_rooms(ConnectionId(u64::MAX)).is_empty());
    }
}
