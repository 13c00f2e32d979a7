//! The arena: every registry of a running server behind one handle.
//!
//! Front ends (the operator console, a web UI) only talk to [`Arena`].

use std::collections::HashSet;
use std::io;
use std::sync::Arc;

use arena_engine::{GameCatalog, GameInfo};
use arena_protocol::{ConnectRequest, SessionId};
use tokio::sync::mpsc;

use crate::config::Config;
use crate::endpoint::Backend;
use crate::error::StartError;
use crate::fanout::{ObserverId, ObserverSink};
use crate::launcher::UnitLauncher;
use crate::proxy::ClientHandle;
use crate::registry::ClientRegistry;
use crate::session::{Session, SessionRegistry, SessionRunner};
use crate::types::{ClientSummary, OutboundTx, SessionSummary};

pub struct Arena {
    catalog: GameCatalog,
    clients: ClientRegistry,
    sessions: SessionRegistry,
}

impl Arena {
    pub fn new(catalog: GameCatalog, backend: Backend, launcher: UnitLauncher) -> Self {
        Arena {
            catalog,
            clients: ClientRegistry::new(),
            sessions: SessionRegistry::new(SessionRunner::new(backend, launcher)),
        }
    }

    /// Built-in games, with the backend and unit program from `config`.
    pub fn from_config(config: &Config) -> io::Result<Self> {
        Ok(Arena::new(
            GameCatalog::builtin(),
            config.backend,
            config.launcher()?,
        ))
    }

    pub fn backend(&self) -> Backend {
        self.sessions.backend()
    }

    pub fn catalog(&self) -> &GameCatalog {
        &self.catalog
    }

    pub fn available_games(&self) -> Vec<&GameInfo> {
        self.catalog.available_games()
    }

    pub async fn register_client(
        &self,
        request: ConnectRequest,
        outbound: OutboundTx,
    ) -> Arc<ClientHandle> {
        self.clients.register(request, outbound).await
    }

    pub async fn unregister_client(&self, client: &ClientHandle) -> bool {
        self.clients.remove(client).await
    }

    pub async fn client_count(&self) -> usize {
        self.clients.len().await
    }

    pub async fn client_info(&self, name: &str) -> Option<ClientSummary> {
        self.clients.get(name).await.map(|c| c.summary())
    }

    pub async fn list_clients(&self) -> Vec<ClientSummary> {
        self.clients.list().await
    }

    /// Clients that play `kind` and have a free slot, sorted by name.
    pub async fn available_clients_for_game(&self, kind: &str) -> Vec<String> {
        self.clients.available_for_game(kind).await
    }

    /// Start a session of `kind` between the named clients, in seat order.
    pub async fn start_session<S: AsRef<str>>(
        &self,
        kind: &str,
        client_names: &[S],
    ) -> Result<SessionId, StartError> {
        let info = self
            .catalog
            .info(kind)
            .ok_or_else(|| StartError::UnknownGame(kind.to_string()))?;
        if client_names.len() != info.num_players {
            return Err(StartError::PlayerCount {
                kind: kind.to_string(),
                expected: info.num_players,
                actual: client_names.len(),
            });
        }

        let mut seen = HashSet::new();
        let mut players = Vec::with_capacity(client_names.len());
        for name in client_names.iter().map(AsRef::as_ref) {
            if !seen.insert(name) {
                return Err(StartError::DuplicatePlayer(name.to_string()));
            }
            let client = self
                .clients
                .get(name)
                .await
                .ok_or_else(|| StartError::UnknownClient(name.to_string()))?;
            if !client.supports(kind) {
                return Err(StartError::UnsupportedGame {
                    client: name.to_string(),
                    kind: kind.to_string(),
                });
            }
            if !client.is_available() {
                return Err(StartError::Unavailable(name.to_string()));
            }
            players.push(client);
        }

        self.sessions.start(kind, &players).await
    }

    pub async fn get_session(&self, id: SessionId) -> Option<Arc<Session>> {
        self.sessions.get(id).await
    }

    pub async fn list_sessions(&self) -> Vec<SessionSummary> {
        self.sessions.list().await
    }

    /// Attach an observer to a session's snapshots. `None` if no such
    /// session exists.
    pub async fn attach_observer(
        &self,
        id: SessionId,
        observer: impl ObserverSink + 'static,
    ) -> Option<ObserverId> {
        let session = self.sessions.get(id).await?;
        Some(session.attach_observer(observer))
    }

    pub async fn detach_observer(&self, id: SessionId, observer: ObserverId) -> bool {
        match self.sessions.get(id).await {
            Some(session) => session.detach_observer(observer),
            None => false,
        }
    }

    /// Attach a channel-backed observer and hand back its receiving end.
    pub async fn watch_session(
        &self,
        id: SessionId,
    ) -> Option<(ObserverId, mpsc::UnboundedReceiver<String>)> {
        let (tx, rx) = mpsc::unbounded_channel();
        let observer = self.attach_observer(id, tx).await?;
        Some((observer, rx))
    }
}
