//! Error types for the room layer.

use roomrelay_protocol::{ErrorCode, ProtocolError, RoomId};

/// Why a command was rejected.
///
/// Every variant is reported to the sender as an `error` frame; none of
/// them closes the connection.
#[derive(Debug, thiserror::Error)]
pub enum RoomError {
    /// The frame could not be parsed.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// A command other than `roomHello` arrived first.
    #[error("send roomHello before {verb}")]
    NotHelloed { verb: &'static str },

    /// `room` was sent for a room the connection has not joined.
    #[error("not a member of room {0}")]
    NotInRoom(RoomId),
}

impl RoomError {
    /// The code carried in the error frame.
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::Protocol(_) => ErrorCode::MalformedFrame,
            Self::NotHelloed { .. } => ErrorCode::NotHelloed,
            Self::NotInRoom(_) => ErrorCode::NotInRoom,
        }
    }
}
