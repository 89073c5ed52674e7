//! Room membership for Roomcast.
//!
//! Rooms are named broadcast groups with no lifecycle of their own: the
//! first join creates one, the last leave removes it.
//!
//! # Key types
//!
//! - [`RoomRegistry`] — joins, leaves, and member lookups, kept mutually
//!   consistent with the connection table's room-sets
//! - [`Room`] — one room's member set
//! - [`RoomLimits`] — optional capacity limits (unlimited by default)

mod config;
mod error;
mod registry;
mod room;

pub use config::RoomLimits;
pub use error::RoomError;
pub use registry::RoomRegistry;
pub use room::Room;
