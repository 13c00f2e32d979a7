//! TCP listener and top-level server wiring.
//!
//! This module:
//! - Listens on the configured address/port.
//! - Accepts new client connections, up to `max_clients`.
//! - Spawns a task per connection running the client's I/O loop.
//!
//! Sessions are started through the [`Arena`] handle, by whichever
//! front end the binary runs alongside the listener.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tokio::net::TcpListener;
use tracing::{info, warn};

use crate::arena::Arena;
use crate::client;
use crate::config::Config;

pub struct Server {
    listener: TcpListener,
    arena: Arc<Arena>,
    max_clients: usize,
}

impl Server {
    /// Bind the listener and set up an empty arena.
    pub async fn bind(config: &Config) -> anyhow::Result<Server> {
        let arena = Arena::from_config(config).context("could not locate the engine program")?;
        let addr = config.socket_addr_string();
        let listener = TcpListener::bind(&addr)
            .await
            .with_context(|| format!("could not listen on {addr}"))?;

        info!(
            addr = %listener.local_addr()?,
            backend = ?arena.backend(),
            max_clients = config.max_clients,
            "listening for clients"
        );

        Ok(Server {
            listener,
            arena: Arc::new(arena),
            max_clients: config.max_clients,
        })
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    pub fn arena(&self) -> Arc<Arena> {
        Arc::clone(&self.arena)
    }

    /// Accept clients until the task is dropped.
    pub async fn run(self) -> anyhow::Result<()> {
        loop {
            let (stream, peer) = match self.listener.accept().await {
                Ok(accepted) => accepted,
                Err(e) => {
                    warn!(error = %e, "accept failed");
                    tokio::time::sleep(Duration::from_millis(100)).await;
                    continue;
                }
            };

            if self.arena.client_count().await >= self.max_clients {
                warn!(%peer, max_clients = self.max_clients, "rejecting connection: max_clients reached");
                // Just drop the stream; the client sees the connection closed.
                continue;
            }

            let arena = Arc::clone(&self.arena);
            tokio::spawn(async move {
                // errors are logged inside the client loop
                let _ = client::run_client(stream, peer, arena).await;
            });
        }
    }
}

/// Run the server with the given configuration.
pub async fn run(config: Config) -> anyhow::Result<()> {
    Server::bind(&config).await?.run().await
}
