//! A single live connection as the relay sees it.

use std::collections::BTreeSet;

use roomcast_protocol::{ConnectionId, RoomId, ServerEvent};
use tokio::sync::mpsc;

use crate::ConnectionError;

/// Queue feeding a connection's writer task.
///
/// Unbounded so that enqueueing never waits: a peer that reads slowly
/// only grows its own queue and never holds up delivery to anyone else.
pub type OutboundSender = mpsc::UnboundedSender<ServerEvent>;

/// Receiving half of an [`OutboundSender`], drained by the writer task.
pub type OutboundReceiver = mpsc::UnboundedReceiver<ServerEvent>;

/// The table's record of one live connection.
#[derive(Debug)]
pub struct Connection {
    id: ConnectionId,

    /// Rooms this connection is in. Mirrors the room registry's member
    /// sets: `room ∈ rooms` iff `id ∈ members(room)`.
    rooms: BTreeSet<RoomId>,

    outbound: OutboundSender,
}

impl Connection {
    pub(crate) fn new(id: ConnectionId, outbound: OutboundSender) -> Self {
        Self {
            id,
            rooms: BTreeSet::new(),
            outbound,
        }
    }

    /// This connection's id.
    pub fn id(&self) -> ConnectionId {
        self.id
    }

    /// The rooms this connection has joined.
    pub fn rooms(&self) -> &BTreeSet<RoomId> {
        &self.rooms
    }

    /// Returns `true` if the connection has joined `room_id`.
    pub fn is_in(&self, room_id: &RoomId) -> bool {
        self.rooms.contains(room_id)
    }

    /// Queues an event for this connection's writer task.
    ///
    /// Never waits. Fails only when the writer has already gone away.
    pub fn deliver(&self, event: ServerEvent) -> Result<(), ConnectionError> {
        self.outbound
            .send(event)
            .map_err(|_| ConnectionError::Closed(self.id))
    }

    pub(crate) fn rooms_mut(&mut self) -> &mut BTreeSet<RoomId> {
        &mut self.rooms
    }
}
