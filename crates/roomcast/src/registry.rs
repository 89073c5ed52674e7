//! The server-owned registry: connection table and room registry behind
//! one lock.

use std::collections::BTreeSet;
use std::sync::Arc;

use roomcast_connection::{ConnectionTable, OutboundSender};
use roomcast_protocol::{ConnectionId, RoomId, ServerEvent};
use roomcast_room::{RoomError, RoomLimits, RoomRegistry};
use tokio::sync::Mutex;

/// Handle shared by the relay, the lifecycle manager, and every
/// connection task of one server.
pub type SharedRegistry = Arc<Mutex<Registry>>;

/// All relay state of one server instance.
///
/// Both tables live behind the same [`Mutex`], so every join, leave, and
/// disconnect is applied atomically with respect to every fan-out, and a
/// fan-out always sees a consistent membership snapshot. Events are also
/// queued while the lock is held, so nothing can be queued for a
/// connection once its disconnect cleanup has begun.
#[derive(Debug, Default)]
pub struct Registry {
    connections: ConnectionTable,
    rooms: RoomRegistry,
}

impl Registry {
    /// Creates an empty registry.
    pub fn new(limits: RoomLimits) -> Self {
        Self {
            connections: ConnectionTable::new(),
            rooms: RoomRegistry::with_limits(limits),
        }
    }

    /// Creates an empty registry wrapped for sharing.
    pub fn shared(limits: RoomLimits) -> SharedRegistry {
        Arc::new(Mutex::new(Self::new(limits)))
    }

    /// The connection table.
    pub fn connections(&self) -> &ConnectionTable {
        &self.connections
    }

    /// The room registry.
    pub fn rooms(&self) -> &RoomRegistry {
        &self.rooms
    }

    /// Registers a connection whose events go to `outbound`.
    pub fn register(&mut self, outbound: OutboundSender) -> ConnectionId {
        self.connections.register(outbound)
    }

    /// Adds a connection to a room. See [`RoomRegistry::join`].
    pub fn join(
        &mut self,
        conn_id: ConnectionId,
        room_id: RoomId,
    ) -> Result<bool, RoomError> {
        self.rooms.join(&mut self.connections, conn_id, room_id)
    }

    /// Removes a connection from a room. See [`RoomRegistry::leave`].
    pub fn leave(
        &mut self,
        conn_id: ConnectionId,
        room_id: &RoomId,
    ) -> Result<bool, RoomError> {
        self.rooms.leave(&mut self.connections, conn_id, room_id)
    }

    /// Evicts a connection from every room, then unregisters it.
    ///
    /// Returns the rooms it was in. Idempotent: a second call for the same
    /// id finds nothing and returns an empty set.
    pub fn disconnect(&mut self, conn_id: ConnectionId) -> BTreeSet<RoomId> {
        let rooms = self.rooms.leave_all(&mut self.connections, conn_id);
        self.connections.unregister(conn_id);
        rooms
    }

    /// Queues `event` for one connection. Returns `true` if it was queued.
    pub fn deliver(&self, to: ConnectionId, event: ServerEvent) -> bool {
        match self.connections.deliver(to, event) {
            Ok(()) => true,
            Err(e) => {
                tracing::debug!(conn_id = %to, error = %e, "delivery skipped");
                false
            }
        }
    }

    /// Queues `event` for every member of `room_id` except `sender` and
    /// returns how many connections it was queued for.
    ///
    /// Each recipient has its own queue, so a slow reader never delays the
    /// others.
    pub fn fan_out(
        &self,
        room_id: &RoomId,
        sender: ConnectionId,
        event: ServerEvent,
    ) -> usize {
        let recipients = self.rooms.members_excluding(room_id, sender);
        let delivered = recipients
            .into_iter()
            .filter(|member| self.deliver(*member, event.clone()))
            .count();

        tracing::debug!(
            %room_id,
            %sender,
            event = event.name(),
            delivered,
            "fan-out"
        );
        delivered
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use roomcast_connection::OutboundReceiver;
    use roomcast_protocol::Payload;
    use tokio::sync::mpsc;

    fn connect(registry: &mut Registry) -> (ConnectionId, OutboundReceiver) {
        let (tx, rx) = mpsc::unbounded_channel();
        (registry.register(tx), rx)
    }

    #[test]
    fn test_fan_out_skips_sender_and_counts_deliveries() {
        let mut registry = Registry::default();
        let (a, mut rx_a) = connect(&mut registry);
        let (b, mut rx_b) = connect(&mut registry);
        registry.join(a, "r1".into()).unwrap();
        registry.join(b, "r1".into()).unwrap();

        let event = ServerEvent::ReceiveMessage(Payload::from("hi"));
        assert_eq!(registry.fan_out(&"r1".into(), a, event.clone()), 1);
        assert_eq!(rx_b.try_recv().unwrap(), event);
        assert!(rx_a.try_recv().is_err());
    }

    #[test]
    fn test_fan_out_skips_closed_queue() {
        let mut registry = Registry::default();
        let (a, _rx_a) = connect(&mut registry);
        let (b, rx_b) = connect(&mut registry);
        let (c, mut rx_c) = connect(&mut registry);
        for conn in [a, b, c] {
            registry.join(conn, "r1".into()).unwrap();
        }
        drop(rx_b);

        let event = ServerEvent::UserTyping(Payload::from("a is typing"));
        assert_eq!(registry.fan_out(&"r1".into(), a, event.clone()), 1);
        assert_eq!(rx_c.try_recv().unwrap(), event);
    }

    #[test]
    fn test_disconnect_is_idempotent() {
        let mut registry = Registry::default();
        let (a, _rx_a) = connect(&mut registry);
        let (b, _rx_b) = connect(&mut registry);
        registry.join(a, "r1".into()).unwrap();
        registry.join(b, "r1".into()).unwrap();

        assert_eq!(registry.disconnect(a).len(), 1);
        assert!(registry.disconnect(a).is_empty());
        assert_eq!(registry.rooms().member_count(&"r1".into()), 1);
        assert_eq!(registry.connections().len(), 1);
    }
}
