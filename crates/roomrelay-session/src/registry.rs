//! The connection registry: every live socket, its identity, its rooms,
//! and the queue that feeds its writer task.
//!
//! # Concurrency note
//!
//! All state sits behind one `tokio::sync::Mutex`. The lock is only held
//! for map lookups and updates, never across socket I/O: sends go through
//! [`Outbox::try_send`], which never waits. Callers that fan out to many
//! connections take an [`outboxes`](ConnectionRegistry::outboxes) snapshot
//! first and deliver after the lock is released.

use std::collections::{BTreeSet, HashMap};

use roomrelay_protocol::{ProtocolVersion, RoomId};
use roomrelay_transport::ConnectionId;
use tokio::sync::{mpsc, Mutex};

use crate::{Member, SessionConfig, SessionError, SessionState};

// ---------------------------------------------------------------------------
// Outbound queue halves
// ---------------------------------------------------------------------------

/// Sending half of a connection's outbound queue.
///
/// Cheap to clone. Holding one does not keep the connection registered.
#[derive(Debug, Clone)]
pub struct Outbox {
    connection_id: ConnectionId,
    tx: mpsc::Sender<String>,
}

impl Outbox {
    pub fn connection_id(&self) -> ConnectionId {
        self.connection_id
    }

    /// Enqueues a frame without waiting.
    ///
    /// # Errors
    /// - [`SessionError::QueueOverflow`]: the queue is full
    /// - [`SessionError::ConnectionGone`]: the writer has shut down
    pub fn try_send(&self, frame: String) -> Result<(), SessionError> {
        self.tx.try_send(frame).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => {
                SessionError::QueueOverflow(self.connection_id)
            }
            mpsc::error::TrySendError::Closed(_) => {
                SessionError::ConnectionGone(self.connection_id)
            }
        })
    }
}

/// Receiving half of a connection's outbound queue, owned by its writer
/// task.
#[derive(Debug)]
pub struct OutboundQueue {
    connection_id: ConnectionId,
    rx: mpsc::Receiver<String>,
}

impl OutboundQueue {
    pub fn connection_id(&self) -> ConnectionId {
        self.connection_id
    }

    /// Waits for the next frame. Returns `None` once the connection has
    /// been evicted or unregistered and the queue is drained.
    pub async fn recv(&mut self) -> Option<String> {
        self.rx.recv().await
    }
}

// ---------------------------------------------------------------------------
// Registry
// ---------------------------------------------------------------------------

struct Entry {
    state: SessionState,
    /// `None` after eviction. The entry itself stays until `unregister` so
    /// room memberships never point at a missing connection.
    outbox: Option<Outbox>,
    joined_rooms: BTreeSet<RoomId>,
}

/// Tracks every live connection.
pub struct ConnectionRegistry {
    entries: Mutex<HashMap<ConnectionId, Entry>>,
    config: SessionConfig,
}

impl ConnectionRegistry {
    pub fn new(config: SessionConfig) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            config,
        }
    }

    /// Registers a freshly accepted connection in the `Unidentified` state
    /// and returns the receiving end of its outbound queue.
    ///
    /// # Errors
    /// Returns [`SessionError::AlreadyRegistered`] if the id is in use.
    pub async fn register(
        &self,
        connection_id: ConnectionId,
    ) -> Result<OutboundQueue, SessionError> {
        let mut entries = self.entries.lock().await;
        if entries.contains_key(&connection_id) {
            return Err(SessionError::AlreadyRegistered(connection_id));
        }

        let (tx, rx) =
            mpsc::channel(self.config.outbound_queue_capacity.max(1));
        entries.insert(
            connection_id,
            Entry {
                state: SessionState::Unidentified,
                outbox: Some(Outbox { connection_id, tx }),
                joined_rooms: BTreeSet::new(),
            },
        );
        tracing::debug!(%connection_id, connections = entries.len(), "connection registered");

        Ok(OutboundQueue { connection_id, rx })
    }

    /// Drops a connection's entry. Idempotent.
    ///
    /// Room memberships must already have been removed; any rooms still
    /// recorded are returned so the caller can log the leak.
    pub async fn unregister(
        &self,
        connection_id: ConnectionId,
    ) -> Option<Vec<RoomId>> {
        let mut entries = self.entries.lock().await;
        let entry = entries.remove(&connection_id)?;
        tracing::debug!(%connection_id, connections = entries.len(), "connection unregistered");
        Some(entry.joined_rooms.into_iter().collect())
    }

    /// Closes a connection's outbound queue without removing its entry.
    ///
    /// The writer task drains what is already queued, sees the queue close,
    /// and shuts the socket; the reader then runs the normal close path.
    /// Returns `false` if the connection was unknown or already evicted.
    pub async fn evict(&self, connection_id: ConnectionId) -> bool {
        let mut entries = self.entries.lock().await;
        match entries.get_mut(&connection_id) {
            Some(entry) if entry.outbox.is_some() => {
                entry.outbox = None;
                tracing::warn!(%connection_id, "connection evicted");
                true
            }
            _ => false,
        }
    }

    /// Enqueues one frame for one connection.
    ///
    /// A full queue evicts the connection.
    ///
    /// # Errors
    /// [`SessionError::ConnectionGone`] or [`SessionError::QueueOverflow`].
    pub async fn send(
        &self,
        connection_id: ConnectionId,
        frame: String,
    ) -> Result<(), SessionError> {
        let outbox = self
            .outbox(connection_id)
            .await
            .ok_or(SessionError::ConnectionGone(connection_id))?;
        let result = outbox.try_send(frame);
        if let Err(SessionError::QueueOverflow(_)) = result {
            self.evict(connection_id).await;
        }
        result
    }

    /// Snapshot of the outboxes for `ids`, in the same order. Unknown or
    /// evicted connections map to `None`.
    pub async fn outboxes(
        &self,
        ids: &[ConnectionId],
    ) -> Vec<(ConnectionId, Option<Outbox>)> {
        let entries = self.entries.lock().await;
        ids.iter()
            .map(|id| {
                let outbox = entries.get(id).and_then(|e| e.outbox.clone());
                (*id, outbox)
            })
            .collect()
    }

    async fn outbox(&self, connection_id: ConnectionId) -> Option<Outbox> {
        self.entries
            .lock()
            .await
            .get(&connection_id)
            .and_then(|e| e.outbox.clone())
    }

    // -- identity ---------------------------------------------------------

    /// Attaches (or replaces) the identity of a connection.
    ///
    /// # Errors
    /// [`SessionError::ConnectionGone`] if the connection is unknown.
    pub async fn identify(&self, member: Member) -> Result<(), SessionError> {
        let connection_id = member.connection_id;
        let mut entries = self.entries.lock().await;
        let entry = entries
            .get_mut(&connection_id)
            .ok_or(SessionError::ConnectionGone(connection_id))?;
        entry.state = SessionState::Identified(member);
        Ok(())
    }

    /// Returns the connection to `Unidentified`, yielding the old identity.
    pub async fn forget_identity(
        &self,
        connection_id: ConnectionId,
    ) -> Option<Member> {
        let mut entries = self.entries.lock().await;
        let entry = entries.get_mut(&connection_id)?;
        match std::mem::take(&mut entry.state) {
            SessionState::Identified(member) => Some(member),
            SessionState::Unidentified => None,
        }
    }

    /// The current identity, if the connection has sent `roomHello`.
    pub async fn member(&self, connection_id: ConnectionId) -> Option<Member> {
        self.entries
            .lock()
            .await
            .get(&connection_id)
            .and_then(|e| e.state.member().cloned())
    }

    /// The version negotiated by the last `roomHello`.
    pub async fn protocol_version(
        &self,
        connection_id: ConnectionId,
    ) -> Option<ProtocolVersion> {
        self.member(connection_id).await.map(|m| m.version)
    }

    // -- joined rooms -----------------------------------------------------

    /// Records that the connection is now a member of `room_id`.
    /// Returns `false` if the connection is unknown.
    pub async fn record_join(
        &self,
        connection_id: ConnectionId,
        room_id: &RoomId,
    ) -> bool {
        let mut entries = self.entries.lock().await;
        match entries.get_mut(&connection_id) {
            Some(entry) => {
                entry.joined_rooms.insert(room_id.clone());
                true
            }
            None => false,
        }
    }

    /// Records that the connection left `room_id`.
    pub async fn record_part(&self, connection_id: ConnectionId, room_id: &RoomId) {
        if let Some(entry) = self.entries.lock().await.get_mut(&connection_id) {
            entry.joined_rooms.remove(room_id);
        }
    }

    /// Rooms the connection belongs to, in name order.
    pub async fn joined_rooms(&self, connection_id: ConnectionId) -> Vec<RoomId> {
        self.entries
            .lock()
            .await
            .get(&connection_id)
            .map(|e| e.joined_rooms.iter().cloned().collect())
            .unwrap_or_default()
    }

    // -- gauges -----------------------------------------------------------

    pub async fn contains(&self, connection_id: ConnectionId) -> bool {
        self.entries.lock().await.contains_key(&connection_id)
    }

    /// Number of registered connections.
    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.lock().await.is_empty()
    }
}

impl Default for ConnectionRegistry {
    fn default() -> Self {
        Self::new(SessionConfig::default())
    }
}
