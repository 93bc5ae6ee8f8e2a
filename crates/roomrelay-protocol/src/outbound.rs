//! Frames the server sends to clients.
//!
//! Every outbound frame is `<target>[,<targetId>],{json}`. The target says
//! what kind of routing the client should apply:
//!
//! - `ack`: sent once when a connection opens, lists supported versions
//! - `player`: a location, event, or chat payload for one user or `*`
//! - `playerLocation`: tells one user they may leave through an exit
//! - `error`: a rejected command, addressed to the sender only

use std::collections::BTreeMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

use crate::{ProtocolError, ProtocolVersion, RoomId};

/// Target id meaning "everyone who receives this frame".
pub const ALL: &str = "*";

/// Process-wide counter behind every event/chat bookmark.
static NEXT_BOOKMARK: AtomicU64 = AtomicU64::new(1);

fn next_bookmark() -> String {
    format!("relay-{}", NEXT_BOOKMARK.fetch_add(1, Ordering::Relaxed))
}

/// The routing prefix of an outbound frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Target {
    Ack,
    Player,
    PlayerLocation,
    Error,
}

impl Target {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Ack => "ack",
            Self::Player => "player",
            Self::PlayerLocation => "playerLocation",
            Self::Error => "error",
        }
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why a command was rejected. Serialized in camelCase in error frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ErrorCode {
    MalformedFrame,
    NotHelloed,
    NotInRoom,
}

/// What a client sees when it looks at a room.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Location {
    pub name: String,
    pub full_name: String,
    pub description: String,
    /// Custom commands the room understands, keyed by the command word.
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub commands: BTreeMap<String, String>,
    /// Names of the things lying around in the room.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub room_inventory: Vec<String>,
}

/// JSON body of an outbound frame, tagged by `type`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Body {
    Ack {
        version: Vec<u64>,
    },
    Location(Location),
    /// Text keyed by recipient: `*` for everyone, or a user id for text
    /// only that user should display.
    Event {
        content: BTreeMap<String, String>,
        bookmark: String,
    },
    Chat {
        username: String,
        content: String,
        bookmark: String,
    },
    #[serde(rename_all = "camelCase")]
    Exit {
        content: String,
        exit_id: String,
    },
    Error {
        code: ErrorCode,
        message: String,
    },
}

/// One frame ready to be encoded and queued.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outbound {
    pub target: Target,
    /// Omitted from the encoded frame when `None`.
    pub target_id: Option<String>,
    pub body: Body,
}

impl Outbound {
    /// The greeting sent as soon as a connection opens.
    pub fn ack() -> Self {
        Self {
            target: Target::Ack,
            target_id: None,
            body: Body::Ack {
                version: ProtocolVersion::SUPPORTED
                    .iter()
                    .map(|v| v.as_u64())
                    .collect(),
            },
        }
    }

    /// A room description addressed to one user.
    pub fn location(user_id: &str, location: Location) -> Self {
        Self {
            target: Target::Player,
            target_id: Some(user_id.to_owned()),
            body: Body::Location(location),
        }
    }

    /// Event text only `user_id` should display.
    pub fn user_event(user_id: &str, text: impl Into<String>) -> Self {
        let mut content = BTreeMap::new();
        content.insert(user_id.to_owned(), text.into());
        Self {
            target: Target::Player,
            target_id: Some(user_id.to_owned()),
            body: Body::Event {
                content,
                bookmark: next_bookmark(),
            },
        }
    }

    /// Event text for everyone in the room.
    pub fn room_event(text: impl Into<String>) -> Self {
        Self::event(text, None::<(String, String)>)
    }

    /// Event text for everyone, plus per-user text that those users show
    /// in place of it.
    pub fn event<I, U, T>(all: impl Into<String>, users: I) -> Self
    where
        I: IntoIterator<Item = (U, T)>,
        U: Into<String>,
        T: Into<String>,
    {
        let mut content: BTreeMap<String, String> = users
            .into_iter()
            .map(|(user_id, text)| (user_id.into(), text.into()))
            .collect();
        content.insert(ALL.to_owned(), all.into());
        Self {
            target: Target::Player,
            target_id: Some(ALL.to_owned()),
            body: Body::Event {
                content,
                bookmark: next_bookmark(),
            },
        }
    }

    /// A chat line relayed to the whole room.
    pub fn chat(username: &str, content: &str) -> Self {
        Self {
            target: Target::Player,
            target_id: Some(ALL.to_owned()),
            body: Body::Chat {
                username: username.to_owned(),
                content: content.to_owned(),
                bookmark: next_bookmark(),
            },
        }
    }

    /// Permission for `user_id` to leave through `exit_id`.
    pub fn exit(user_id: &str, exit_id: &str, text: impl Into<String>) -> Self {
        Self {
            target: Target::PlayerLocation,
            target_id: Some(user_id.to_owned()),
            body: Body::Exit {
                content: text.into(),
                exit_id: exit_id.to_owned(),
            },
        }
    }

    /// A rejection sent back to the connection that issued a command.
    pub fn error(
        room_id: Option<&RoomId>,
        code: ErrorCode,
        message: impl Into<String>,
    ) -> Self {
        Self {
            target: Target::Error,
            target_id: room_id.map(|r| r.as_str().to_owned()),
            body: Body::Error {
                code,
                message: message.into(),
            },
        }
    }

    /// Renders the frame as `<target>[,<targetId>],{json}`.
    ///
    /// # Errors
    /// Returns [`ProtocolError::Encode`] if the body fails to serialize.
    pub fn encode(&self) -> Result<String, ProtocolError> {
        let json = serde_json::to_string(&self.body).map_err(ProtocolError::Encode)?;
        let mut frame = String::with_capacity(json.len() + 32);
        frame.push_str(self.target.as_str());
        frame.push(',');
        if let Some(id) = self.target_id.as_deref().filter(|id| !id.is_empty()) {
            frame.push_str(id);
            frame.push(',');
        }
        frame.push_str(&json);
        Ok(frame)
    }
}
