use std::net::SocketAddr;

/// Errors that can occur in the transport layer.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// Sending data failed.
    #[error("send failed: {0}")]
    SendFailed(#[source] std::io::Error),

    /// Receiving data failed.
    #[error("receive failed: {0}")]
    ReceiveFailed(#[source] std::io::Error),

    /// Binding or accepting connections failed.
    #[error("accept failed: {0}")]
    AcceptFailed(#[source] std::io::Error),

    /// The peer connected but the protocol handshake did not complete,
    /// including upgrades refused by the origin policy.
    #[error("handshake with {peer} failed: {reason}")]
    Handshake {
        /// Remote address of the rejected peer.
        peer: SocketAddr,
        /// Why the handshake failed.
        reason: String,
    },
}
