//! Error types for the connection table.

use roomcast_protocol::ConnectionId;

/// Errors that can occur when addressing a connection.
#[derive(Debug, thiserror::Error)]
pub enum ConnectionError {
    /// No live connection has this id: it was never registered, or it has
    /// already been unregistered.
    #[error("connection {0} not found")]
    NotFound(ConnectionId),

    /// The connection is still registered but its outbound queue is gone
    /// (the writer task has exited).
    #[error("connection {0} is closed")]
    Closed(ConnectionId),
}
