//! `roomrelay` server binary.

use std::time::Duration;

use clap::Parser;
use roomrelay::prelude::*;
use roomrelay::DEFAULT_BIND_ADDR;
use tracing_subscriber::EnvFilter;

/// Room-based WebSocket relay server.
#[derive(Parser, Debug)]
#[command(name = "roomrelay", version, about = "Room-based WebSocket relay server")]
struct Cli {
    /// Address to listen on.
    #[arg(long, env = "ROOMRELAY_BIND", default_value = DEFAULT_BIND_ADDR)]
    bind: String,

    /// Frames buffered per client before a slow client is disconnected.
    #[arg(long, env = "ROOMRELAY_QUEUE_CAPACITY", default_value_t = 256)]
    queue_capacity: usize,

    /// Close connections that stay silent this many seconds.
    #[arg(long, env = "ROOMRELAY_IDLE_TIMEOUT_SECS")]
    idle_timeout_secs: Option<u64>,

    /// Description every room shows to clients.
    #[arg(long, env = "ROOMRELAY_DESCRIPTION")]
    description: Option<String>,
}

impl Cli {
    fn into_config(self) -> RelayConfig {
        let room = match self.description {
            Some(text) => RoomDescription::with_description(text),
            None => RoomDescription::default(),
        };
        RelayConfig {
            bind_addr: self.bind,
            outbound_queue_capacity: self.queue_capacity,
            idle_timeout: self.idle_timeout_secs.map(Duration::from_secs),
            room,
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), RelayError> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let config = Cli::parse().into_config();
    let server = RelayServer::builder().config(config).build().await?;

    server
        .run_until(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::warn!(error = %e, "could not listen for ctrl-c");
                std::future::pending::<()>().await;
            }
            tracing::info!("interrupted, shutting down");
        })
        .await
}
