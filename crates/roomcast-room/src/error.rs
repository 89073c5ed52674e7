//! Error types for the room layer.

use roomcast_connection::ConnectionError;
use roomcast_protocol::{ConnectionId, RoomId};

/// Errors that can occur during room operations.
///
/// Addressing a room that doesn't exist is never an error: rooms appear on
/// first join, and broadcasting to an unknown room reaches nobody.
#[derive(Debug, thiserror::Error)]
pub enum RoomError {
    /// The connection is not registered (or was already cleaned up).
    #[error(transparent)]
    Connection(#[from] ConnectionError),

    /// The room already has the configured maximum number of members.
    #[error("room {0} is full ({1} members)")]
    RoomFull(RoomId, usize),

    /// The connection already belongs to the configured maximum number of
    /// rooms.
    #[error("connection {0} is already in {1} rooms")]
    TooManyRooms(ConnectionId, usize),
}

impl RoomError {
    /// Returns `true` for the errors caused by a configured limit.
    pub fn is_capacity_exceeded(&self) -> bool {
        matches!(self, Self::RoomFull(..) | Self::TooManyRooms(..))
    }
}
