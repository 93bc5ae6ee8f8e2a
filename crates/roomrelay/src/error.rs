//! Unified error type for roomrelay.

use roomrelay_protocol::ProtocolError;
use roomrelay_room::RoomError;
use roomrelay_session::SessionError;
use roomrelay_transport::TransportError;

/// Top-level error that wraps the error of every layer.
///
/// `#[from]` on each variant lets `?` lift layer errors into this one.
#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    /// Listening, accepting, or socket I/O.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// Frame encoding or decoding.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// Connection registry bookkeeping.
    #[error(transparent)]
    Session(#[from] SessionError),

    /// A rejected room command.
    #[error(transparent)]
    Room(#[from] RoomError),

    /// The configured bind address could not be resolved.
    #[error("local address unavailable: {0}")]
    LocalAddr(#[source] std::io::Error),
}
