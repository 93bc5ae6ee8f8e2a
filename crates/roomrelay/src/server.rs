//! `RelayServer` builder and accept loop.
//!
//! Ties the layers together: transport → protocol → session → room.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use roomrelay_protocol::{Codec, TextCodec};
use roomrelay_room::{RoomDescription, RoomTable, SessionManager};
use roomrelay_session::{ConnectionRegistry, SessionConfig};
use roomrelay_transport::{Transport, WebSocketTransport};

use crate::handler::handle_connection;
use crate::RelayError;

/// Address used when none is configured.
pub const DEFAULT_BIND_ADDR: &str = "127.0.0.1:9080";

// ---------------------------------------------------------------------------
// RelayConfig
// ---------------------------------------------------------------------------

/// Everything a server needs before it binds.
#[derive(Debug, Clone)]
pub struct RelayConfig {
    pub bind_addr: String,

    /// Frames that may wait for one slow client before it is disconnected.
    pub outbound_queue_capacity: usize,

    /// Close connections that send nothing for this long. `None` keeps
    /// quiet connections open forever.
    pub idle_timeout: Option<Duration>,

    pub room: RoomDescription,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            bind_addr: DEFAULT_BIND_ADDR.to_owned(),
            outbound_queue_capacity: SessionConfig::default().outbound_queue_capacity,
            idle_timeout: None,
            room: RoomDescription::default(),
        }
    }
}

/// Shared state handed to every connection task.
pub(crate) struct ServerState<C: Codec> {
    pub(crate) manager: SessionManager<C>,
    pub(crate) idle_timeout: Option<Duration>,
}

// ---------------------------------------------------------------------------
// Builder
// ---------------------------------------------------------------------------

/// Builder for configuring and starting a relay server.
///
/// # Example
///
/// ```rust,no_run
/// use roomrelay::prelude::*;
///
/// # async fn start() -> Result<(), RelayError> {
/// let server = RelayServer::builder()
///     .bind("0.0.0.0:9080")
///     .outbound_queue_capacity(64)
///     .build()
///     .await?;
/// server.run().await
/// # }
/// ```
#[derive(Debug, Clone, Default)]
pub struct RelayServerBuilder {
    config: RelayConfig,
}

impl RelayServerBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the whole configuration.
    pub fn config(mut self, config: RelayConfig) -> Self {
        self.config = config;
        self
    }

    pub fn bind(mut self, addr: &str) -> Self {
        self.config.bind_addr = addr.to_owned();
        self
    }

    pub fn outbound_queue_capacity(mut self, capacity: usize) -> Self {
        self.config.outbound_queue_capacity = capacity;
        self
    }

    pub fn idle_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.config.idle_timeout = timeout;
        self
    }

    pub fn room_description(mut self, room: RoomDescription) -> Self {
        self.config.room = room;
        self
    }

    /// Binds the listener. Uses the text codec and the WebSocket transport.
    pub async fn build(self) -> Result<RelayServer, RelayError> {
        self.build_with_codec(TextCodec).await
    }

    /// Binds the listener with a custom frame codec.
    pub async fn build_with_codec<C: Codec>(
        self,
        codec: C,
    ) -> Result<RelayServer<C>, RelayError> {
        let RelayConfig {
            bind_addr,
            outbound_queue_capacity,
            idle_timeout,
            room,
        } = self.config;

        let transport = WebSocketTransport::bind(&bind_addr).await?;

        let registry = Arc::new(ConnectionRegistry::new(SessionConfig {
            outbound_queue_capacity,
        }));
        let table = Arc::new(RoomTable::new());
        let manager = SessionManager::new(registry, table, codec, room);

        Ok(RelayServer {
            transport,
            state: Arc::new(ServerState {
                manager,
                idle_timeout,
            }),
        })
    }
}

// ---------------------------------------------------------------------------
// Server
// ---------------------------------------------------------------------------

/// A bound relay server. Call [`run()`](Self::run) to start serving.
pub struct RelayServer<C: Codec = TextCodec> {
    transport: WebSocketTransport,
    state: Arc<ServerState<C>>,
}

impl RelayServer {
    pub fn builder() -> RelayServerBuilder {
        RelayServerBuilder::new()
    }
}

impl<C: Codec> RelayServer<C> {
    /// The address the listener is bound to. Useful after binding port 0.
    pub fn local_addr(&self) -> Result<SocketAddr, RelayError> {
        self.transport.local_addr().map_err(RelayError::LocalAddr)
    }

    /// Live connections; `len()` is the connection gauge.
    pub fn registry(&self) -> Arc<ConnectionRegistry> {
        Arc::clone(self.state.manager.registry())
    }

    /// Live rooms; `room_count()` is the room gauge.
    pub fn rooms(&self) -> Arc<RoomTable> {
        Arc::clone(self.state.manager.table())
    }

    /// Accepts connections until the process ends, one task per
    /// connection. Failed accepts are logged and skipped.
    pub async fn run(self) -> Result<(), RelayError> {
        self.run_until(std::future::pending::<()>()).await
    }

    /// Like [`run()`](Self::run), but stops accepting once `signal`
    /// completes. Connections already accepted keep running on their own
    /// tasks.
    pub async fn run_until<F>(mut self, signal: F) -> Result<(), RelayError>
    where
        F: Future<Output = ()>,
    {
        let addr = self.local_addr()?;
        tracing::info!(%addr, "relay server running");
        tokio::pin!(signal);

        loop {
            let accepted = tokio::select! {
                accepted = self.transport.accept() => accepted,
                () = &mut signal => break,
            };
            match accepted {
                Ok(incoming) => {
                    let state = Arc::clone(&self.state);
                    tokio::spawn(async move {
                        if let Err(e) = handle_connection(incoming, state).await {
                            tracing::debug!(error = %e, "connection ended with error");
                        }
                    });
                }
                Err(e) => {
                    tracing::warn!(error = %e, "accept failed");
                }
            }
        }

        self.transport.shutdown().await?;
        Ok(())
    }
}
