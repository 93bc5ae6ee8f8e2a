//! Connection bookkeeping for roomrelay.
//!
//! This crate is the Connection Registry:
//!
//! 1. **Registration**: every accepted socket gets an entry and a bounded
//!    outbound queue ([`ConnectionRegistry::register`]).
//! 2. **Identity**: `roomHello` attaches a [`Member`] to the entry
//!    ([`SessionState`]).
//! 3. **Membership index**: which rooms each connection has joined, kept
//!    in step with the room table by the session manager above.
//! 4. **Delivery**: non-blocking enqueue with disconnect-on-overflow.
//!
//! # How it fits in the stack
//!
//! ```text
//! Room Layer (above)  ← room table, dispatcher, session manager
//!     ↕
//! Session Layer (this crate)  ← live connections, identities, queues
//!     ↕
//! Protocol / Transport (below)  ← RoomId, ConnectionId
//! ```

mod error;
mod registry;
mod session;

pub use error::SessionError;
pub use registry::{ConnectionRegistry, OutboundQueue, Outbox};
pub use session::{Member, SessionConfig, SessionState};
