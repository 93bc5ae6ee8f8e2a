//! Error types for the session layer.

use roomrelay_transport::ConnectionId;

/// Errors that can occur while tracking connections.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SessionError {
    /// The connection is not registered, was evicted, or its writer has
    /// already shut down. Broadcasts skip such targets.
    #[error("connection {0} is gone")]
    ConnectionGone(ConnectionId),

    /// The connection's outbound queue was full. The connection has been
    /// evicted as a result.
    #[error("outbound queue of connection {0} overflowed")]
    QueueOverflow(ConnectionId),

    /// `register` was called twice for the same id.
    #[error("connection {0} is already registered")]
    AlreadyRegistered(ConnectionId),
}
