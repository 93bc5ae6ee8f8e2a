//! Session types: what the server knows about one live connection.
//!
//! A connection starts out anonymous. Sending `roomHello` attaches a
//! [`Member`] identity to it; `roomGoodbye` takes the identity away again
//! while the socket stays open.

use roomrelay_protocol::{ProtocolVersion, UserRef};
use roomrelay_transport::ConnectionId;

// ---------------------------------------------------------------------------
// SessionConfig
// ---------------------------------------------------------------------------

/// Configuration for per-connection resources.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Frames that may wait in one connection's outbound queue.
    ///
    /// When the queue is full the connection is evicted rather than
    /// letting a slow reader hold up everyone else. Default: 256.
    pub outbound_queue_capacity: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            outbound_queue_capacity: 256,
        }
    }
}

// ---------------------------------------------------------------------------
// Member
// ---------------------------------------------------------------------------

/// The identity a connection presents after `roomHello` or `roomJoin`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Member {
    pub connection_id: ConnectionId,
    pub user: UserRef,
    pub version: ProtocolVersion,
}

impl Member {
    pub fn new(
        connection_id: ConnectionId,
        user: UserRef,
        version: ProtocolVersion,
    ) -> Self {
        Self {
            connection_id,
            user,
            version,
        }
    }

    pub fn user_id(&self) -> &str {
        &self.user.user_id
    }

    pub fn username(&self) -> &str {
        &self.user.username
    }
}

// ---------------------------------------------------------------------------
// SessionState
// ---------------------------------------------------------------------------

/// Identity state of a connection.
///
/// ```text
///   Unidentified ──(roomHello)──→ Identified
///        ↑                            │
///        └───────(roomGoodbye)────────┘
/// ```
///
/// Only `roomHello` is accepted while `Unidentified`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum SessionState {
    #[default]
    Unidentified,
    Identified(Member),
}

impl SessionState {
    pub fn is_identified(&self) -> bool {
        matches!(self, Self::Identified(_))
    }

    pub fn member(&self) -> Option<&Member> {
        match self {
            Self::Identified(member) => Some(member),
            Self::Unidentified => None,
        }
    }
}
