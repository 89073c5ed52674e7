//! Transport abstraction layer for Roomcast.
//!
//! Provides the [`Transport`] and [`Connection`] traits that abstract over
//! the network protocol, plus the [`OriginPolicy`] applied to incoming
//! handshakes.
//!
//! Connections carry no identity of their own: ids are handed out by the
//! connection table once a connection has been accepted.
//!
//! # Feature Flags
//!
//! - `websocket` (default) — WebSocket transport via `tokio-tungstenite`

#![allow(async_fn_in_trait)]

mod error;
mod origin;
#[cfg(feature = "websocket")]
mod websocket;

pub use error::TransportError;
pub use origin::OriginPolicy;
#[cfg(feature = "websocket")]
pub use websocket::{
    IncomingWebSocket, WebSocketConnection, WebSocketTransport,
};

use std::net::SocketAddr;

/// Accepts new incoming connections.
///
/// Accepting and upgrading are separate steps: [`accept`](Transport::accept)
/// only takes a connection off the listener, and the protocol handshake runs
/// later in [`Incoming::upgrade`], typically on the connection's own task.
pub trait Transport: Send + Sync + 'static {
    /// The connection type produced by this transport.
    type Connection: Connection;
    /// An accepted connection that has not been upgraded yet.
    type Incoming: Incoming<
        Connection = Self::Connection,
        Error = Self::Error,
    >;
    /// The error type for transport operations.
    type Error: std::error::Error + Send + Sync;

    /// Waits for the next incoming connection.
    async fn accept(&mut self) -> Result<Self::Incoming, Self::Error>;

    /// Gracefully shuts down the transport, stopping new connections.
    async fn shutdown(&self) -> Result<(), Self::Error>;
}

/// An accepted connection whose handshake has not run yet.
pub trait Incoming: Send + 'static {
    /// The connection type produced by a successful upgrade.
    type Connection: Connection;
    /// The error type for a failed upgrade.
    type Error: std::error::Error + Send + Sync;

    /// Returns the address of the remote peer.
    fn peer_addr(&self) -> SocketAddr;

    /// Completes the protocol handshake.
    async fn upgrade(self) -> Result<Self::Connection, Self::Error>;
}

/// A single connection that can send and receive frames.
///
/// Sending and receiving may happen concurrently from different tasks:
/// a pending [`recv`](Connection::recv) must not hold up a
/// [`send`](Connection::send).
pub trait Connection: Send + Sync + 'static {
    /// The error type for connection operations.
    type Error: std::error::Error + Send + Sync;

    /// Sends one frame to the remote peer.
    async fn send(&self, data: &[u8]) -> Result<(), Self::Error>;

    /// Receives the next frame from the remote peer.
    ///
    /// Returns `Ok(None)` when the connection is cleanly closed.
    async fn recv(&self) -> Result<Option<Vec<u8>>, Self::Error>;

    /// Closes the connection.
    async fn close(&self) -> Result<(), Self::Error>;

    /// Returns the address of the remote peer.
    fn peer_addr(&self) -> SocketAddr;
}
