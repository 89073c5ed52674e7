//! Unified error type for Roomcast.

use roomcast_protocol::ProtocolError;
use roomcast_room::RoomError;
use roomcast_transport::TransportError;

/// Top-level error that wraps all crate-specific errors.
///
/// The `#[from]` attributes let `?` convert sub-crate errors directly.
#[derive(Debug, thiserror::Error)]
pub enum RoomcastError {
    /// A transport-level error (bind, accept, send, recv).
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// A protocol-level error (encode, decode).
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// A room-level error (unknown connection, room limits).
    #[error(transparent)]
    Room(#[from] RoomError),

    /// The configured connection limit has been reached.
    #[error("connection limit reached ({0} live connections)")]
    CapacityExceeded(usize),

    /// A configuration value could not be parsed.
    #[error("invalid configuration: {0}")]
    Config(String),
}

impl RoomcastError {
    /// Returns `true` for errors caused by a configured capacity limit,
    /// whichever layer raised them.
    pub fn is_capacity_exceeded(&self) -> bool {
        match self {
            Self::CapacityExceeded(_) => true,
            Self::Room(e) => e.is_capacity_exceeded(),
            _ => false,
        }
    }
}
