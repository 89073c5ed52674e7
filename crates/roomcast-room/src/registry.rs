//! Room registry: lazily created rooms and their member sets.

use std::collections::{BTreeSet, HashMap};

use roomcast_connection::ConnectionTable;
use roomcast_protocol::{ConnectionId, RoomId};

use crate::{Room, RoomError, RoomLimits};

/// Tracks every non-empty room and who is in it.
///
/// Membership is recorded on both sides: in the room's member set here and
/// in the connection's room-set in the [`ConnectionTable`]. Every mutating
/// method takes the table and updates both, so for any connection `c` and
/// room `r`, `c ∈ members(r)` iff `r ∈ rooms(c)`. Callers keep the two
/// behind one lock so that holds at every observable point.
#[derive(Debug, Default)]
pub struct RoomRegistry {
    /// Non-empty rooms, keyed by name.
    rooms: HashMap<RoomId, Room>,

    limits: RoomLimits,
}

impl RoomRegistry {
    /// Creates an empty registry with no limits.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty registry enforcing `limits` on join.
    pub fn with_limits(limits: RoomLimits) -> Self {
        Self {
            rooms: HashMap::new(),
            limits,
        }
    }

    /// Adds a connection to a room, creating the room if needed.
    ///
    /// Returns `Ok(false)` if the connection was already a member; joining
    /// twice never produces a duplicate membership.
    ///
    /// # Errors
    /// - [`RoomError::Connection`] if the connection isn't registered
    /// - [`RoomError::RoomFull`] / [`RoomError::TooManyRooms`] if a
    ///   configured limit would be exceeded; nothing changes in that case
    pub fn join(
        &mut self,
        connections: &mut ConnectionTable,
        conn_id: ConnectionId,
        room_id: RoomId,
    ) -> Result<bool, RoomError> {
        let conn = connections.lookup(conn_id)?;
        if conn.is_in(&room_id) {
            return Ok(false);
        }

        if let Some(max) = self.limits.max_rooms_per_connection {
            if conn.rooms().len() >= max {
                return Err(RoomError::TooManyRooms(conn_id, max));
            }
        }
        if let Some(max) = self.limits.max_members {
            let members = self.rooms.get(&room_id).map_or(0, Room::len);
            if members >= max {
                return Err(RoomError::RoomFull(room_id, max));
            }
        }

        connections.attach_room(conn_id, room_id.clone())?;
        let room = self.rooms.entry(room_id).or_insert_with_key(|id| {
            tracing::debug!(room_id = %id, "room created");
            Room::new(id.clone())
        });
        room.insert(conn_id);

        tracing::info!(
            %conn_id,
            room_id = %room.id(),
            members = room.len(),
            "joined room"
        );
        Ok(true)
    }

    /// Removes a connection from a room. The room is dropped once empty.
    ///
    /// Returns `Ok(false)` if the connection wasn't a member.
    ///
    /// # Errors
    /// Returns [`RoomError::Connection`] if the connection isn't registered.
    pub fn leave(
        &mut self,
        connections: &mut ConnectionTable,
        conn_id: ConnectionId,
        room_id: &RoomId,
    ) -> Result<bool, RoomError> {
        let was_member = connections.detach_room(conn_id, room_id)?;
        self.evict(conn_id, room_id);
        if was_member {
            tracing::info!(%conn_id, %room_id, "left room");
        }
        Ok(was_member)
    }

    /// Removes a connection from every room it is in, in one step, and
    /// returns the rooms it left.
    ///
    /// Used on disconnect. Unknown or already-cleaned-up connections
    /// yield an empty set, so running it twice is harmless.
    pub fn leave_all(
        &mut self,
        connections: &mut ConnectionTable,
        conn_id: ConnectionId,
    ) -> BTreeSet<RoomId> {
        let rooms = connections.take_rooms(conn_id);
        for room_id in &rooms {
            self.evict(conn_id, room_id);
        }
        if !rooms.is_empty() {
            tracing::debug!(%conn_id, rooms = rooms.len(), "left all rooms");
        }
        rooms
    }

    /// Returns the members of a room other than `exclude`, in id order.
    ///
    /// An unknown room, or one whose only member is `exclude`, yields an
    /// empty list.
    pub fn members_excluding(
        &self,
        room_id: &RoomId,
        exclude: ConnectionId,
    ) -> Vec<ConnectionId> {
        self.rooms
            .get(room_id)
            .map(|room| {
                room.members()
                    .iter()
                    .copied()
                    .filter(|member| *member != exclude)
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Looks up a room. Only non-empty rooms exist.
    pub fn get(&self, room_id: &RoomId) -> Option<&Room> {
        self.rooms.get(room_id)
    }

    /// Number of members in a room (0 for unknown rooms).
    pub fn member_count(&self, room_id: &RoomId) -> usize {
        self.rooms.get(room_id).map_or(0, Room::len)
    }

    /// Iterates over every room.
    pub fn rooms(&self) -> impl Iterator<Item = &Room> {
        self.rooms.values()
    }

    /// Returns the number of rooms.
    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }

    /// Removes `conn_id` from the room's member set and drops the room if
    /// that emptied it.
    fn evict(&mut self, conn_id: ConnectionId, room_id: &RoomId) {
        let Some(room) = self.rooms.get_mut(room_id) else {
            return;
        };
        room.remove(conn_id);
        if room.is_empty() {
            self.rooms.remove(room_id);
            tracing::debug!(%room_id, "room removed (empty)");
        }
    }
}

// =========================================================================
// Tests
// =========================================================================
