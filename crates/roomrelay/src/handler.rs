//! Per-connection handler: reader loop, writer task, close cascade.
//!
//! Each accepted connection gets its own Tokio task running this handler.
//! The flow is:
//!   1. Finish the WebSocket upgrade here rather than in the accept loop,
//!      so a peer that stalls its handshake only holds up its own task
//!   2. Register with the session manager, which queues the `ack`
//!   3. Spawn the writer: drains the outbound queue onto the socket
//!   4. Loop: receive frames in order and hand them to the manager
//!   5. On close, error, idle timeout or eviction: leave every room, then
//!      unregister

use std::sync::Arc;
use std::time::Duration;

use roomrelay_protocol::Codec;
use roomrelay_session::OutboundQueue;
use roomrelay_transport::{
    Connection, ConnectionId, IncomingStream, Transport, TransportError, WebSocketConnection,
    WebSocketTransport,
};
use tokio::task::JoinError;

use crate::server::ServerState;
use crate::RelayError;

/// Runs the close cascade if the handler exits without doing so itself.
///
/// `Drop` is synchronous, so the cascade is spawned as its own task.
struct CloseGuard<C: Codec> {
    conn_id: ConnectionId,
    state: Arc<ServerState<C>>,
    armed: bool,
}

impl<C: Codec> CloseGuard<C> {
    async fn close(mut self) {
        self.armed = false;
        self.state.manager.connection_closed(self.conn_id).await;
    }
}

impl<C: Codec> Drop for CloseGuard<C> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        let conn_id = self.conn_id;
        let state = Arc::clone(&self.state);
        tokio::spawn(async move {
            state.manager.connection_closed(conn_id).await;
        });
    }
}

enum Inbound {
    Frame(String),
    Closed,
    Failed(TransportError),
    Idle,
}

/// Handles a single connection from accept to close.
pub(crate) async fn handle_connection<C: Codec>(
    incoming: IncomingStream,
    state: Arc<ServerState<C>>,
) -> Result<(), RelayError> {
    let peer = incoming.peer_addr();
    let conn = WebSocketTransport::upgrade(incoming).await?;
    let conn_id = conn.id();
    let queue = state.manager.connection_opened(conn_id).await?;
    let guard = CloseGuard {
        conn_id,
        state: Arc::clone(&state),
        armed: true,
    };
    tracing::info!(%conn_id, %peer, "connection accepted");

    let conn = Arc::new(conn);
    let mut writer = tokio::spawn(write_loop(Arc::clone(&conn), queue));
    let mut writer_done = false;

    loop {
        let inbound = tokio::select! {
            inbound = next_inbound(&conn, state.idle_timeout) => inbound,
            joined = &mut writer => {
                // Evicted or the socket stopped accepting writes.
                writer_done = true;
                writer_finished(conn_id, joined);
                break;
            }
        };

        match inbound {
            Inbound::Frame(frame) => {
                if let Err(e) = state.manager.handle_frame(conn_id, &frame).await {
                    tracing::debug!(%conn_id, error = %e, "frame rejected");
                }
            }
            Inbound::Closed => {
                tracing::debug!(%conn_id, "peer closed");
                break;
            }
            Inbound::Failed(e) => {
                tracing::debug!(%conn_id, error = %e, "recv error");
                break;
            }
            Inbound::Idle => {
                tracing::info!(%conn_id, "connection idle, closing");
                break;
            }
        }
    }

    // Unregistering closes the outbound queue, which ends the writer.
    guard.close().await;
    if !writer_done {
        writer_finished(conn_id, writer.await);
    }
    tracing::info!(%conn_id, "connection closed");
    Ok(())
}

async fn next_inbound(conn: &WebSocketConnection, idle_timeout: Option<Duration>) -> Inbound {
    let received = match idle_timeout {
        Some(limit) => match tokio::time::timeout(limit, conn.recv()).await {
            Ok(received) => received,
            Err(_) => return Inbound::Idle,
        },
        None => conn.recv().await,
    };
    match received {
        Ok(Some(frame)) => Inbound::Frame(frame),
        Ok(None) => Inbound::Closed,
        Err(e) => Inbound::Failed(e),
    }
}

/// Logs how the writer task ended. Returns false if it panicked or was
/// cancelled.
fn writer_finished(conn_id: ConnectionId, joined: Result<(), JoinError>) -> bool {
    match joined {
        Ok(()) => {
            tracing::debug!(%conn_id, "writer finished");
            true
        }
        Err(e) => {
            tracing::debug!(%conn_id, error = %e, "writer task failed");
            false
        }
    }
}

/// Drains the outbound queue onto the socket, then closes it.
async fn write_loop(conn: Arc<WebSocketConnection>, mut queue: OutboundQueue) {
    let conn_id = queue.connection_id();
    while let Some(frame) = queue.recv().await {
        if let Err(e) = conn.send(&frame).await {
            tracing::debug!(%conn_id, error = %e, "send failed");
            break;
        }
    }
    let _ = conn.close().await;
}
