//! Things lying around in a room, and what happens when someone looks at or
//! uses them.

use crate::commands::Direction;

/// An object a room can stock. Only stocked items react; see
/// [`RoomDescription::stocks`](crate::RoomDescription::stocks).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Item {
    TeddyBear,
    Mud,
    MoonDiagram,
    Bookshelf,
}

/// The outcome of a `/look` or `/use` on an item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reaction {
    /// Shown to the whole room, with optional text only the actor sees in
    /// place of it.
    Seen {
        everyone: String,
        actor: Option<String>,
    },
    /// The actor is sent out through an exit.
    Exit { direction: Direction, text: &'static str },
}

impl Reaction {
    fn seen(everyone: String, actor: &str) -> Self {
        Self::Seen {
            everyone,
            actor: Some(actor.to_owned()),
        }
    }
}

impl Item {
    pub const ALL: [Item; 4] = [Self::TeddyBear, Self::Mud, Self::MoonDiagram, Self::Bookshelf];

    /// Inventory name advertised in `location` frames.
    pub fn name(self) -> &'static str {
        match self {
            Self::TeddyBear => "red teddy bear",
            Self::Mud => "big pile of mud",
            Self::MoonDiagram => "moon diagram",
            Self::Bookshelf => "bookshelf",
        }
    }

    /// The item a `/look` argument refers to. Matching is by keyword
    /// anywhere in the text, checked in a fixed order.
    pub fn looked_at(target: &str) -> Option<Self> {
        let target = target.to_lowercase();
        [
            ("moon diagram", Self::MoonDiagram),
            ("mud", Self::Mud),
            ("teddy", Self::TeddyBear),
            ("books", Self::Bookshelf),
        ]
        .into_iter()
        .find_map(|(keyword, item)| target.contains(keyword).then_some(item))
    }

    /// The item a `/use` argument refers to. `book` is enough for the shelf.
    pub fn used(target: &str) -> Option<Self> {
        let target = target.to_lowercase();
        [
            ("teddy", Self::TeddyBear),
            ("mud", Self::Mud),
            ("moon diagram", Self::MoonDiagram),
            ("book", Self::Bookshelf),
        ]
        .into_iter()
        .find_map(|(keyword, item)| target.contains(keyword).then_some(item))
    }

    pub fn look(self, username: &str) -> Reaction {
        match self {
            Self::MoonDiagram => Reaction::seen(
                format!("{username} picks up the moon diagram and looks at it fondly before dropping it again"),
                "You pick it up, read it, and love it for no reason. You put it down.",
            ),
            Self::Mud => Reaction::seen(
                format!("{username} is disgusted by mud on the floor"),
                "It looks awful. You look away.",
            ),
            Self::TeddyBear => Reaction::Seen {
                everyone: "The teddy bear burps, 'Hello'".to_owned(),
                actor: None,
            },
            Self::Bookshelf => Reaction::seen(
                format!("{username} is confused by the bookshelf"),
                "It's a bit odd",
            ),
        }
    }

    pub fn used_by(self, username: &str) -> Reaction {
        match self {
            Self::TeddyBear => Reaction::seen(
                format!("The teddy bear squeaks! {username} looks around sheepishly, and sets the teddy back down."),
                "You pick up the teddy and put it in your mouth. It squeaks!! You quickly put it back down.",
            ),
            Self::Mud => Reaction::seen(
                format!("{username} has very dirty hands."),
                "You pat the big pile of mud. It's very sticky, and now it's all over your hands!",
            ),
            Self::MoonDiagram => Reaction::seen(
                format!(
                    "{username} picks up the moon diagram, and scrunches it into a ball! After a brief moment, \
                     {username} smiles, smoothes it out again, and lets the diagram float back to the floor"
                ),
                "You grab the moon diagram and crumple it into a ball. Hey! That looks like a moon! \
                 How satisfying! You unfold it, and let it go.",
            ),
            Self::Bookshelf => Reaction::Exit {
                direction: Direction::West,
                text: "You take a book down from the shelf, but it vanishes in your hand. \
                       Hey.. what? .. You're going west!",
            },
        }
    }
}
