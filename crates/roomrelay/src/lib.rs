//! # roomrelay
//!
//! A room-based WebSocket relay server.
//!
//! Clients open one WebSocket and send text frames of the form
//! `verb,roomId,json`. After `roomHello` a client may `roomJoin` any number
//! of rooms, talk in them with `room`, and leave with `roomPart` or
//! `roomGoodbye`. Rooms appear on first join and disappear when empty.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use roomrelay::prelude::*;
//!
//! # async fn start() -> Result<(), RelayError> {
//! let server = RelayServer::builder().bind("127.0.0.1:9080").build().await?;
//! server.run().await
//! # }
//! ```

mod error;
mod handler;
mod server;

pub use error::RelayError;
pub use server::{RelayConfig, RelayServer, RelayServerBuilder, DEFAULT_BIND_ADDR};

/// The types needed to configure and run a server.
pub mod prelude {
    pub use crate::{RelayConfig, RelayError, RelayServer, RelayServerBuilder};
    pub use roomrelay_protocol::{Codec, Command, Outbound, RoomId, TextCodec};
    pub use roomrelay_room::RoomDescription;
    pub use roomrelay_session::SessionConfig;
}
