//! Rooms for roomrelay.
//!
//! Rooms are created on first join and destroyed when the last member
//! leaves. Members are live connections; everything a member sends with
//! `room` is relayed to the others.
//!
//! # Key types
//!
//! - [`RoomTable`]: room ids to member sets, one lock per room
//! - [`Dispatcher`]: fans one frame out to a room's members
//! - [`SessionManager`]: applies each connection's commands
//! - [`RoomDescription`]: what a room tells clients about itself
//! - [`Item`]: things in a room that react to `/look` and `/use`
//! - [`RoomError`]: rejections reported back to the sender

mod commands;
mod config;
mod dispatcher;
mod error;
mod items;
mod manager;
mod table;

pub use commands::{interpret, Direction, Intent, RoomCommand};
pub use config::{RoomDescription, ROOM_PLACEHOLDER};
pub use dispatcher::{DeliveryReport, Dispatcher};
pub use error::RoomError;
pub use items::{Item, Reaction};
pub use manager::SessionManager;
pub use table::{Room, RoomGuard, RoomTable};
