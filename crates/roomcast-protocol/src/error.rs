//! Error types for the protocol layer.

/// Errors that can occur while encoding or decoding frames.
///
/// Decode failures are expected in normal operation (a client sent
/// something that isn't a known event); callers log and skip the frame.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// Serialization failed (turning a Rust type into bytes).
    #[error("encode failed: {0}")]
    Encode(#[source] serde_json::Error),

    /// Deserialization failed: malformed JSON, an unknown `event` tag,
    /// or a missing `roomId`.
    #[error("decode failed: {0}")]
    Decode(#[source] serde_json::Error),
}
