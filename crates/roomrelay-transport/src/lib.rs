//! Transport abstraction layer for roomrelay.
//!
//! Provides the [`Transport`] and [`Connection`] traits that hide the
//! network protocol from the relay core. The relay speaks UTF-8 text
//! frames, so connections exchange `String`s rather than raw bytes.
//!
//! # Feature Flags
//!
//! - `websocket` (default): WebSocket transport via `tokio-tungstenite`

#![allow(async_fn_in_trait)]

mod error;
#[cfg(feature = "websocket")]
mod websocket;

pub use error::TransportError;
#[cfg(feature = "websocket")]
pub use websocket::{IncomingStream, WebSocketConnection, WebSocketTransport};

use std::fmt;

/// Identifies one accepted connection for the lifetime of the process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(u64);

impl ConnectionId {
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    pub fn into_inner(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// A listener that yields connected peers.
///
/// Accepting and upgrading are separate steps so a peer that stalls in its
/// handshake only holds up its own task, never the accept loop.
pub trait Transport: Send + Sync + 'static {
    /// A peer that has connected but not finished the protocol handshake.
    type Incoming: Send + 'static;
    type Connection: Connection;
    type Error: std::error::Error + Send + Sync;

    /// Resolves once the next peer connects.
    async fn accept(&mut self) -> Result<Self::Incoming, Self::Error>;

    /// Runs the handshake for a peer returned by [`accept`](Transport::accept).
    async fn upgrade(incoming: Self::Incoming) -> Result<Self::Connection, Self::Error>;

    /// Stops taking new peers. Established connections are unaffected.
    async fn shutdown(&self) -> Result<(), Self::Error>;
}

/// One peer, exchanging UTF-8 text frames.
///
/// Reads and writes go through independent halves: a task parked in
/// [`recv`](Connection::recv) never holds up the writer calling
/// [`send`](Connection::send).
pub trait Connection: Send + Sync + 'static {
    type Error: std::error::Error + Send + Sync;

    async fn send(&self, frame: &str) -> Result<(), Self::Error>;

    /// The next text frame, or `Ok(None)` once the peer has closed.
    async fn recv(&self) -> Result<Option<String>, Self::Error>;

    /// Sends a close frame and flushes the write half.
    async fn close(&self) -> Result<(), Self::Error>;

    fn id(&self) -> ConnectionId;
}
