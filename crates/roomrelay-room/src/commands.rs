//! What the content of a `room` command asks for.
//!
//! Plain text is chat. Text whose first character is `/` is a command
//! addressed to the room itself. Most commands are answered to the sender
//! only; handling an item is seen by everyone present.

use std::fmt;

use crate::items::Item;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    North,
    South,
    East,
    West,
}

impl Direction {
    /// Accepts the long or one-letter form, case-insensitively.
    pub fn parse(word: &str) -> Option<Self> {
        match word.to_ascii_lowercase().as_str() {
            "n" | "north" => Some(Self::North),
            "s" | "south" => Some(Self::South),
            "e" | "east" => Some(Self::East),
            "w" | "west" => Some(Self::West),
            _ => None,
        }
    }

    /// Exit id carried in `playerLocation` frames.
    pub fn exit_id(self) -> &'static str {
        match self {
            Self::North => "n",
            Self::South => "s",
            Self::East => "e",
            Self::West => "w",
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::North => "north",
            Self::South => "south",
            Self::East => "east",
            Self::West => "west",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// The interpreted content of a `room` command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Intent<'a> {
    /// Relay to the whole room.
    Chat(&'a str),
    Command(RoomCommand<'a>),
}

impl Intent<'_> {
    pub fn is_chat(&self) -> bool {
        matches!(self, Self::Chat(_))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RoomCommand<'a> {
    /// `/look` or `/examine`, bare or naming the room.
    Look,
    /// `/look` at something the room has.
    Examine(Item),
    /// `/look` at anything else.
    LookAt(&'a str),
    Go(Direction),
    /// `/go` without a usable direction. Carries everything after `/go`.
    GoNowhere(Option<&'a str>),
    Use(Item),
    /// `/use` on nothing, or on nothing the room has.
    UseNothing(Option<&'a str>),
    /// `/about`, which the room acknowledges with silence.
    About,
    /// A `/` command this room does not know. Carries the whole content.
    Unknown(&'a str),
}

/// Only content whose very first character is `/` is a command.
pub fn interpret(content: &str) -> Intent<'_> {
    if !content.starts_with('/') {
        return Intent::Chat(content);
    }

    let trimmed = content.trim();
    let (word, argument) = match trimmed.split_once(char::is_whitespace) {
        Some((word, rest)) => (word, Some(rest.trim()).filter(|rest| !rest.is_empty())),
        None => (trimmed, None),
    };

    let command = match word.to_lowercase().as_str() {
        "/look" | "/examine" => match argument {
            None => RoomCommand::Look,
            Some(target) if target.to_lowercase().contains("room") => RoomCommand::Look,
            Some(target) => match Item::looked_at(target) {
                Some(item) => RoomCommand::Examine(item),
                None => RoomCommand::LookAt(target),
            },
        },
        "/go" => match argument.and_then(Direction::parse) {
            Some(direction) => RoomCommand::Go(direction),
            None => RoomCommand::GoNowhere(argument),
        },
        "/use" => match argument.and_then(Item::used) {
            Some(item) => RoomCommand::Use(item),
            None => RoomCommand::UseNothing(argument),
        },
        "/about" => RoomCommand::About,
        _ => RoomCommand::Unknown(content),
    };
    Intent::Command(command)
}
