//! Optional capacity limits for rooms.

/// Limits applied when a connection joins a room.
///
/// Every limit is `None` (unlimited) by default, so an unconfigured
/// registry accepts any number of rooms and members.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RoomLimits {
    /// Maximum members in a single room.
    pub max_members: Option<usize>,

    /// Maximum rooms a single connection may be in at once.
    pub max_rooms_per_connection: Option<usize>,
}
