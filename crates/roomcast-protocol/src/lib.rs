//! Wire protocol for Roomcast.
//!
//! This crate defines what clients and the relay say to each other:
//!
//! - **Identities** ([`ConnectionId`], [`RoomId`])
//! - **Events** ([`ClientEvent`] inbound, [`ServerEvent`] outbound), both
//!   closed enums so every event kind is checked at compile time
//! - **Payloads** ([`Payload`]) — client content carried opaquely
//! - **Codec** ([`Codec`] trait, [`JsonCodec`])
//!
//! It knows nothing about connections or rooms; it only describes frames.
//!
//! ```text
//! Transport (bytes) → Protocol (events) → Relay (rooms, fan-out)
//! ```

mod codec;
mod error;
mod types;

pub use codec::{Codec, JsonCodec};
pub use error::ProtocolError;
pub use types::{ClientEvent, ConnectionId, Payload, RoomId, ServerEvent};
