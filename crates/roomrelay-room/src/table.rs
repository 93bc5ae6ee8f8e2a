//! The room table: room ids to member sets.
//!
//! Two levels of locking:
//!
//! - the table map lock, held only to look up, insert, or remove a room;
//! - one lock per room, held for a whole join, part, or broadcast
//!   enumeration so nobody observes a half-applied change and every member
//!   sees a room's frames in the same order.
//!
//! Lock order is room → table map. A room that empties is marked closed
//! before it leaves the map; a joiner that raced it sees the flag and
//! retries against a fresh room.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use roomrelay_protocol::RoomId;
use roomrelay_session::Member;
use roomrelay_transport::ConnectionId;
use tokio::sync::{Mutex, OwnedMutexGuard};

#[derive(Debug, Default)]
struct Members {
    by_connection: BTreeMap<ConnectionId, Member>,
    closed: bool,
}

/// One room. Obtained from [`RoomTable::get_or_create`].
#[derive(Debug)]
pub struct Room {
    id: RoomId,
    members: Arc<Mutex<Members>>,
}

impl Room {
    fn new(id: RoomId) -> Self {
        Self {
            id,
            members: Arc::new(Mutex::new(Members::default())),
        }
    }

    pub fn id(&self) -> &RoomId {
        &self.id
    }

    /// Current member ids, in connection order.
    pub async fn member_ids(&self) -> Vec<ConnectionId> {
        self.members.lock().await.by_connection.keys().copied().collect()
    }
}

/// Exclusive access to one room's member set.
///
/// Holding a guard is what makes a join/part/broadcast atomic. Guards
/// must be handed back through [`RoomTable::release`] so an emptied room
/// is removed.
pub struct RoomGuard {
    room: Arc<Room>,
    members: OwnedMutexGuard<Members>,
}

impl RoomGuard {
    pub fn room_id(&self) -> &RoomId {
        &self.room.id
    }

    /// Adds or replaces the record for `member.connection_id`. Returns the
    /// record it replaced.
    pub fn insert(&mut self, member: Member) -> Option<Member> {
        self.members
            .by_connection
            .insert(member.connection_id, member)
    }

    pub fn remove(&mut self, connection_id: ConnectionId) -> Option<Member> {
        self.members.by_connection.remove(&connection_id)
    }

    pub fn contains(&self, connection_id: ConnectionId) -> bool {
        self.members.by_connection.contains_key(&connection_id)
    }

    pub fn member(&self, connection_id: ConnectionId) -> Option<&Member> {
        self.members.by_connection.get(&connection_id)
    }

    /// Member ids except `exclude`, in connection order.
    pub fn member_ids_except(&self, exclude: Option<ConnectionId>) -> Vec<ConnectionId> {
        self.members
            .by_connection
            .keys()
            .copied()
            .filter(|id| Some(*id) != exclude)
            .collect()
    }

    pub fn len(&self) -> usize {
        self.members.by_connection.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.by_connection.is_empty()
    }
}

/// Maps room ids to rooms. Rooms exist only while they have members.
#[derive(Default)]
pub struct RoomTable {
    rooms: Mutex<HashMap<RoomId, Arc<Room>>>,
}

impl RoomTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the room, creating an empty one if needed.
    ///
    /// Prefer [`join`](Self::join) or [`lock_for_join`](Self::lock_for_join):
    /// a room created here and never joined stays in the table until
    /// someone joins and leaves it.
    pub async fn get_or_create(&self, room_id: &RoomId) -> Arc<Room> {
        let mut rooms = self.rooms.lock().await;
        if let Some(room) = rooms.get(room_id) {
            return Arc::clone(room);
        }
        let room = Arc::new(Room::new(room_id.clone()));
        rooms.insert(room_id.clone(), Arc::clone(&room));
        tracing::info!(%room_id, rooms = rooms.len(), "room created");
        room
    }

    /// Locks the room for a join, creating it if needed.
    pub async fn lock_for_join(&self, room_id: &RoomId) -> RoomGuard {
        loop {
            let room = self.get_or_create(room_id).await;
            let members = Arc::clone(&room.members).lock_owned().await;
            if !members.closed {
                return RoomGuard { room, members };
            }
            // Emptied and removed while we waited; the next lookup creates
            // a fresh room.
            tracing::trace!(%room_id, "raced room teardown, retrying");
        }
    }

    /// Locks an existing room. `None` if there is no such room.
    pub async fn lock_existing(&self, room_id: &RoomId) -> Option<RoomGuard> {
        let room = self.rooms.lock().await.get(room_id).cloned()?;
        let members = Arc::clone(&room.members).lock_owned().await;
        if members.closed {
            return None;
        }
        Some(RoomGuard { room, members })
    }

    /// Releases a guard, deleting the room if it is now empty.
    pub async fn release(&self, mut guard: RoomGuard) {
        if !guard.is_empty() {
            return;
        }
        guard.members.closed = true;
        let mut rooms = self.rooms.lock().await;
        let same_room = rooms
            .get(guard.room_id())
            .is_some_and(|r| Arc::ptr_eq(r, &guard.room));
        if same_room {
            rooms.remove(guard.room_id());
            tracing::info!(room_id = %guard.room_id(), rooms = rooms.len(), "room destroyed");
        }
    }

    /// Adds `member` to the room, replacing any record with the same
    /// connection id. Returns `true` if the connection was not already a
    /// member.
    pub async fn join(&self, room_id: &RoomId, member: Member) -> bool {
        let mut guard = self.lock_for_join(room_id).await;
        let added = guard.insert(member).is_none();
        self.release(guard).await;
        added
    }

    /// Removes a connection from the room. Idempotent. Returns the removed
    /// record, if there was one.
    pub async fn part(
        &self,
        room_id: &RoomId,
        connection_id: ConnectionId,
    ) -> Option<Member> {
        let mut guard = self.lock_existing(room_id).await?;
        let removed = guard.remove(connection_id);
        self.release(guard).await;
        removed
    }

    /// Current member ids of a room; empty if the room does not exist.
    pub async fn members_of(&self, room_id: &RoomId) -> Vec<ConnectionId> {
        match self.lock_existing(room_id).await {
            Some(guard) => {
                let ids = guard.member_ids_except(None);
                self.release(guard).await;
                ids
            }
            None => Vec::new(),
        }
    }

    pub async fn contains(&self, room_id: &RoomId, connection_id: ConnectionId) -> bool {
        match self.lock_existing(room_id).await {
            Some(guard) => {
                let found = guard.contains(connection_id);
                self.release(guard).await;
                found
            }
            None => false,
        }
    }

    pub async fn exists(&self, room_id: &RoomId) -> bool {
        self.rooms.lock().await.contains_key(room_id)
    }

    /// Number of rooms with at least one member.
    pub async fn room_count(&self) -> usize {
        self.rooms.lock().await.len()
    }
}
