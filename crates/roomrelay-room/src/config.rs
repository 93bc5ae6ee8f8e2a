//! How rooms describe themselves.

use std::collections::BTreeMap;

use roomrelay_protocol::{Location, RoomId};

use crate::items::Item;

/// Placeholder in [`RoomDescription::full_name_template`] replaced by the
/// room id.
pub const ROOM_PLACEHOLDER: &str = "{room}";

// ---------------------------------------------------------------------------
// RoomDescription
// ---------------------------------------------------------------------------

/// What every room tells a client that joins or looks around.
///
/// Rooms are created on demand, so they share one description; the room id
/// is spliced into the full name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoomDescription {
    /// Display name; `{room}` is replaced by the room id.
    pub full_name_template: String,

    pub description: String,

    /// Advertised commands, keyed by the command word.
    pub commands: BTreeMap<String, String>,

    /// Things in the room, by name. Listed [`Item`]s react to `/look` and
    /// `/use`; other names are scenery.
    pub inventory: Vec<String>,
}

impl Default for RoomDescription {
    fn default() -> Self {
        let mut commands = BTreeMap::new();
        commands.insert("/look".to_owned(), "Describe this room".to_owned());
        commands.insert(
            "/go".to_owned(),
            "Leave the room: /go north|south|east|west".to_owned(),
        );
        commands.insert(
            "/use".to_owned(),
            "Pick something up and do something with it: /use <item>".to_owned(),
        );
        Self {
            full_name_template: "Room {room}".to_owned(),
            description: "A cluttered old room. Everyone here can hear you.".to_owned(),
            commands,
            inventory: Item::ALL.iter().map(|item| item.name().to_owned()).collect(),
        }
    }
}

impl RoomDescription {
    /// Same defaults with a different description text.
    pub fn with_description(description: impl Into<String>) -> Self {
        Self {
            description: description.into(),
            ..Self::default()
        }
    }

    pub fn full_name(&self, room_id: &RoomId) -> String {
        self.full_name_template
            .replace(ROOM_PLACEHOLDER, room_id.as_str())
    }

    /// The `location` body for `room_id`.
    pub fn location(&self, room_id: &RoomId) -> Location {
        Location {
            name: room_id.as_str().to_owned(),
            full_name: self.full_name(room_id),
            description: self.description.clone(),
            commands: self.commands.clone(),
            room_inventory: self.inventory.clone(),
        }
    }

    pub fn stocks(&self, item: Item) -> bool {
        self.inventory.iter().any(|name| name == item.name())
    }
}
