//! Error types for the transport layer.

/// Socket-level failures. The relay treats every one of them as a close.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// Writing a frame (or the close frame) failed.
    #[error("send failed: {0}")]
    SendFailed(#[source] std::io::Error),

    /// Reading from the socket failed.
    #[error("receive failed: {0}")]
    ReceiveFailed(#[source] std::io::Error),

    /// The peer sent a binary frame that is not valid UTF-8.
    #[error("non-utf8 frame from peer")]
    InvalidText,

    /// Binding the listener or accepting a TCP peer failed.
    #[error("accept failed: {0}")]
    AcceptFailed(#[source] std::io::Error),

    /// The peer never completed the WebSocket upgrade, or completed it badly.
    #[error("handshake failed: {0}")]
    HandshakeFailed(#[source] std::io::Error),
}
