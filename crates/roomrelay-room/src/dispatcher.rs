//! Fan-out of one frame to the members of a room.

use std::sync::Arc;

use roomrelay_protocol::RoomId;
use roomrelay_session::{ConnectionRegistry, SessionError};
use roomrelay_transport::ConnectionId;

use crate::table::{RoomGuard, RoomTable};

/// Outcome of one broadcast.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeliveryReport {
    /// Members whose queue accepted the frame.
    pub delivered: Vec<ConnectionId>,
    /// Members that were already gone.
    pub skipped: Vec<ConnectionId>,
    /// Members whose queue was full; they have been evicted.
    pub evicted: Vec<ConnectionId>,
}

impl DeliveryReport {
    pub fn delivered_count(&self) -> usize {
        self.delivered.len()
    }
}

/// Enqueues frames on member outboxes. Never waits on a peer.
#[derive(Clone)]
pub struct Dispatcher {
    registry: Arc<ConnectionRegistry>,
}

impl Dispatcher {
    pub fn new(registry: Arc<ConnectionRegistry>) -> Self {
        Self { registry }
    }

    /// Sends `frame` to every member of `room_id` except `exclude`.
    ///
    /// A room that does not exist yields an empty report.
    pub async fn broadcast(
        &self,
        table: &RoomTable,
        room_id: &RoomId,
        frame: &str,
        exclude: Option<ConnectionId>,
    ) -> DeliveryReport {
        let Some(guard) = table.lock_existing(room_id).await else {
            return DeliveryReport::default();
        };
        let report = self.broadcast_locked(&guard, frame, exclude).await;
        table.release(guard).await;
        report
    }

    /// Same as [`broadcast`](Self::broadcast) for a room the caller already
    /// holds. Keeps the room locked for the whole enumeration so every
    /// member sees the room's frames in the same order.
    pub async fn broadcast_locked(
        &self,
        guard: &RoomGuard,
        frame: &str,
        exclude: Option<ConnectionId>,
    ) -> DeliveryReport {
        let targets = guard.member_ids_except(exclude);
        let report = self.deliver(&targets, frame).await;
        tracing::debug!(
            room_id = %guard.room_id(),
            members = guard.len(),
            delivered = report.delivered.len(),
            skipped = report.skipped.len(),
            evicted = report.evicted.len(),
            "broadcast"
        );
        report
    }

    /// Sends `frame` to each of `targets`, in order.
    pub async fn deliver(&self, targets: &[ConnectionId], frame: &str) -> DeliveryReport {
        let mut report = DeliveryReport::default();
        // Registry lock is released before anything is enqueued.
        let outboxes = self.registry.outboxes(targets).await;

        for (connection_id, outbox) in outboxes {
            let Some(outbox) = outbox else {
                tracing::debug!(%connection_id, "skipping delivery, connection gone");
                report.skipped.push(connection_id);
                continue;
            };
            match outbox.try_send(frame.to_owned()) {
                Ok(()) => report.delivered.push(connection_id),
                Err(SessionError::QueueOverflow(_)) => {
                    self.registry.evict(connection_id).await;
                    report.evicted.push(connection_id);
                }
                Err(e) => {
                    tracing::debug!(%connection_id, error = %e, "skipping delivery");
                    report.skipped.push(connection_id);
                }
            }
        }
        report
    }
}
