//! Core protocol types for the room wire format.
//!
//! Inbound frames look like `verb,roomId,{json}`. This module holds the
//! typed form of those frames ([`Command`]) and the identifiers they carry.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::ProtocolError;

// ---------------------------------------------------------------------------
// Identity types
// ---------------------------------------------------------------------------

/// The name of a room, as it appears in the second field of a frame.
///
/// Room ids are chosen by clients, so this wraps a `String` rather than
/// a counter. The newtype keeps room ids from being confused with user ids,
/// which are also strings on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoomId(String);

impl RoomId {
    /// Wraps a room name. No validation happens here; the parser rejects
    /// empty ids and ids containing commas before a `RoomId` is built.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Borrows the room name.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RoomId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The identity fields every inbound payload carries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserRef {
    /// Stable identifier of the user.
    pub user_id: String,
    /// Display name, used in notifications.
    pub username: String,
}

/// Protocol versions a client may negotiate in `roomHello`/`roomJoin`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u64", into = "u64")]
pub enum ProtocolVersion {
    V1,
    V2,
}

impl ProtocolVersion {
    /// Every version the server accepts, advertised in the `ack` frame.
    pub const SUPPORTED: [ProtocolVersion; 2] = [Self::V1, Self::V2];

    pub fn as_u64(self) -> u64 {
        match self {
            Self::V1 => 1,
            Self::V2 => 2,
        }
    }
}

impl TryFrom<u64> for ProtocolVersion {
    type Error = String;

    fn try_from(value: u64) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(Self::V1),
            2 => Ok(Self::V2),
            other => Err(format!("unsupported protocol version {other}")),
        }
    }
}

impl From<ProtocolVersion> for u64 {
    fn from(version: ProtocolVersion) -> Self {
        version.as_u64()
    }
}

impl fmt::Display for ProtocolVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "v{}", self.as_u64())
    }
}

// ---------------------------------------------------------------------------
// Verb
// ---------------------------------------------------------------------------

/// The first field of an inbound frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Verb {
    RoomHello,
    RoomGoodbye,
    RoomJoin,
    RoomPart,
    Room,
}

impl Verb {
    /// The wire spelling of the verb.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::RoomHello => "roomHello",
            Self::RoomGoodbye => "roomGoodbye",
            Self::RoomJoin => "roomJoin",
            Self::RoomPart => "roomPart",
            Self::Room => "room",
        }
    }
}

impl FromStr for Verb {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "roomHello" => Ok(Self::RoomHello),
            "roomGoodbye" => Ok(Self::RoomGoodbye),
            "roomJoin" => Ok(Self::RoomJoin),
            "roomPart" => Ok(Self::RoomPart),
            "room" => Ok(Self::Room),
            other => Err(ProtocolError::malformed(format!(
                "unknown verb `{other}`"
            ))),
        }
    }
}

impl fmt::Display for Verb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Command
// ---------------------------------------------------------------------------

/// A decoded inbound frame.
///
/// Produced by [`parse`](crate::parse) and consumed exactly once by the
/// session layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// `roomHello`: the connection introduces itself.
    Hello {
        room_id: RoomId,
        user: UserRef,
        version: ProtocolVersion,
    },
    /// `roomGoodbye`: the connection leaves every room it is in.
    Goodbye { room_id: RoomId, user: UserRef },
    /// `roomJoin`: the connection becomes a member of `room_id`.
    Join {
        room_id: RoomId,
        user: UserRef,
        version: ProtocolVersion,
    },
    /// `roomPart`: the connection stops being a member of `room_id`.
    Part { room_id: RoomId, user: UserRef },
    /// `room`: content for everyone in `room_id`.
    Message {
        room_id: RoomId,
        user: UserRef,
        content: String,
    },
}

impl Command {
    /// The verb this command was decoded from.
    pub fn verb(&self) -> Verb {
        match self {
            Self::Hello { .. } => Verb::RoomHello,
            Self::Goodbye { .. } => Verb::RoomGoodbye,
            Self::Join { .. } => Verb::RoomJoin,
            Self::Part { .. } => Verb::RoomPart,
            Self::Message { .. } => Verb::Room,
        }
    }

    /// The room named in the frame.
    pub fn room_id(&self) -> &RoomId {
        match self {
            Self::Hello { room_id, .. }
            | Self::Goodbye { room_id, .. }
            | Self::Join { room_id, .. }
            | Self::Part { room_id, .. }
            | Self::Message { room_id, .. } => room_id,
        }
    }

    /// The identity fields from the payload.
    pub fn user(&self) -> &UserRef {
        match self {
            Self::Hello { user, .. }
            | Self::Goodbye { user, .. }
            | Self::Join { user, .. }
            | Self::Part { user, .. }
            | Self::Message { user, .. } => user,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_room_id_serializes_as_plain_string() {
        let json = serde_json::to_string(&RoomId::new("lobby")).unwrap();
        assert_eq!(json, "\"lobby\"");
    }

    #[test]
    fn test_protocol_version_rejects_out_of_range() {
        assert_eq!(ProtocolVersion::try_from(2u64), Ok(ProtocolVersion::V2));
        assert!(ProtocolVersion::try_from(3u64).is_err());
        assert!(ProtocolVersion::try_from(0u64).is_err());
    }

    #[test]
    fn test_verb_round_trips_through_wire_spelling() {
        for verb in [
            Verb::RoomHello,
            Verb::RoomGoodbye,
            Verb::RoomJoin,
            Verb::RoomPart,
            Verb::Room,
        ] {
            assert_eq!(verb.as_str().parse::<Verb>().unwrap(), verb);
        }
    }

    #[test]
    fn test_verb_is_case_sensitive() {
        assert!("RoomHello".parse::<Verb>().is_err());
        assert!("ROOM".parse::<Verb>().is_err());
    }

    #[test]
    fn test_command_accessors() {
        let cmd = Command::Part {
            room_id: RoomId::new("cellar"),
            user: UserRef {
                user_id: "7".into(),
                username: "ann".into(),
            },
        };
        assert_eq!(cmd.verb(), Verb::RoomPart);
        assert_eq!(cmd.room_id().as_str(), "cellar");
        assert_eq!(cmd.user().username, "ann");
    }
}
