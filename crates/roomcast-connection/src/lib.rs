//! Live connection tracking for Roomcast.
//!
//! The [`ConnectionTable`] owns one [`Connection`] entry per live transport
//! connection: its id, the rooms it has joined, and the queue its outbound
//! events are written to.
//!
//! # How it fits in the stack
//!
//! ```text
//! Room Registry (above)  ← keeps member-sets in step with room-sets here
//!     ↕
//! Connection Table (this crate)  ← ids, room-sets, outbound queues
//!     ↕
//! Protocol (below)  ← ConnectionId, RoomId, ServerEvent
//! ```

mod connection;
mod error;
mod table;

pub use connection::{Connection, OutboundReceiver, OutboundSender};
pub use error::ConnectionError;
pub use table::ConnectionTable;
