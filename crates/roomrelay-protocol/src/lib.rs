//! Wire protocol for roomrelay.
//!
//! This crate defines the "language" clients and the relay speak:
//!
//! - **Types** ([`Command`], [`RoomId`], [`UserRef`], [`ProtocolVersion`]):
//!   the typed form of inbound `verb,roomId,{json}` frames.
//! - **Parser** ([`parse`]): the strict grammar for inbound frames.
//! - **Outbound** ([`Outbound`], [`Body`]): ack, location, event, chat,
//!   exit, and error frames the server sends.
//! - **Codec** ([`Codec`] trait, [`TextCodec`]): the seam the server uses
//!   to turn text into commands and frames into text.
//! - **Errors** ([`ProtocolError`]).
//!
//! # Architecture
//!
//! ```text
//! Transport (text) → Protocol (Command) → Session / Room (state, fan-out)
//! ```
//!
//! The protocol layer knows nothing about connections or rooms beyond
//! their names.

mod codec;
mod error;
mod outbound;
mod parser;
mod types;

pub use codec::{Codec, TextCodec};
pub use error::ProtocolError;
pub use outbound::{Body, ErrorCode, Location, Outbound, Target, ALL};
pub use parser::parse;
pub use types::{Command, ProtocolVersion, RoomId, UserRef, Verb};
