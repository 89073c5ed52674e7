//! A single room: a name and the connections currently in it.

use std::collections::BTreeSet;

use roomcast_protocol::{ConnectionId, RoomId};

/// One room's membership.
///
/// Only the [`RoomRegistry`](crate::RoomRegistry) mutates a room, and it
/// drops the room as soon as the member set becomes empty, so a `Room`
/// observed through the registry always has at least one member.
#[derive(Debug, Clone)]
pub struct Room {
    id: RoomId,
    members: BTreeSet<ConnectionId>,
}

impl Room {
    pub(crate) fn new(id: RoomId) -> Self {
        Self {
            id,
            members: BTreeSet::new(),
        }
    }

    /// The room's name.
    pub fn id(&self) -> &RoomId {
        &self.id
    }

    /// The connections currently in the room.
    pub fn members(&self) -> &BTreeSet<ConnectionId> {
        &self.members
    }

    /// Returns `true` if `conn_id` is a member.
    pub fn contains(&self, conn_id: ConnectionId) -> bool {
        self.members.contains(&conn_id)
    }

    /// Number of members.
    pub fn len(&self) -> usize {
        self.members.len()
    }

    /// Returns `true` if nobody is in the room.
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub(crate) fn insert(&mut self, conn_id: ConnectionId) -> bool {
        self.members.insert(conn_id)
    }

    pub(crate) fn remove(&mut self, conn_id: ConnectionId) -> bool {
        self.members.remove(&conn_id)
    }
}
