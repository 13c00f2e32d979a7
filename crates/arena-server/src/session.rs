//! Sessions and the runner that starts them.
//!
//! Starting a session:
//!
//! 1. open the view endpoint
//! 2. ask each player's proxy for an endpoint (reserving a slot and
//!    sending the client `start`)
//! 3. launch the execution unit with every remote descriptor
//! 4. relay the view endpoint into the session's [`ViewFanout`]
//!
//! If any step fails, the endpoints already minted are abandoned: their
//! clients get a `close` for the session and their slots come back.
//! The session id is not reused.
//!
//! The session stops running when the view endpoint delivers `close` or
//! reaches end of stream.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use arena_protocol::engine_frame::is_close_line;
use arena_protocol::SessionId;
use tokio::process::Child;
use tokio::sync::{watch, RwLock};
use tracing::{debug, info, warn};

use crate::endpoint::{Backend, FrameReader};
use crate::error::StartError;
use crate::fanout::{ObserverId, ObserverSink, ViewFanout};
use crate::launcher::UnitLauncher;
use crate::proxy::ClientHandle;
use crate::types::SessionSummary;

pub struct Session {
    id: SessionId,
    game_kind: String,
    players: Vec<String>,
    fanout: ViewFanout,
    running: AtomicBool,
}

impl Session {
    fn new(id: SessionId, game_kind: &str, players: Vec<String>) -> Self {
        Session {
            id,
            game_kind: game_kind.to_string(),
            players,
            fanout: ViewFanout::new(),
            running: AtomicBool::new(true),
        }
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn game_kind(&self) -> &str {
        &self.game_kind
    }

    /// Player names in seat order.
    pub fn players(&self) -> &[String] {
        &self.players
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Latest snapshot the execution unit produced, if any.
    pub fn last_state(&self) -> Option<String> {
        self.fanout.last_state()
    }

    pub fn attach_observer(&self, observer: impl ObserverSink + 'static) -> ObserverId {
        self.fanout.attach(observer)
    }

    pub fn detach_observer(&self, id: ObserverId) -> bool {
        self.fanout.detach(id)
    }

    pub fn summary(&self) -> SessionSummary {
        SessionSummary {
            id: self.id,
            game_kind: self.game_kind.clone(),
            players: self.players.clone(),
            is_running: self.is_running(),
        }
    }

    fn finish(&self) {
        self.running.store(false, Ordering::Release);
        self.fanout.freeze();
    }
}

/// Launches execution units and wires their endpoints.
pub struct SessionRunner {
    backend: Backend,
    launcher: UnitLauncher,
}

impl SessionRunner {
    pub fn new(backend: Backend, launcher: UnitLauncher) -> Self {
        SessionRunner { backend, launcher }
    }

    pub fn backend(&self) -> Backend {
        self.backend
    }

    /// Start session `id` of `kind` between `players`, in seat order.
    ///
    /// The caller has checked that the players exist, play `kind` and
    /// have a free slot.
    pub fn start(
        &self,
        id: SessionId,
        kind: &str,
        players: &[Arc<ClientHandle>],
    ) -> Result<Arc<Session>, StartError> {
        let (view, view_remote) = self.backend.open().map_err(StartError::ViewEndpoint)?;

        let mut remotes = Vec::with_capacity(players.len());
        for client in players {
            match client.create_session_endpoints(id, self.backend) {
                Ok(remote) => remotes.push(remote),
                Err(e) => {
                    abandon(id, &players[..remotes.len()]);
                    return Err(e.into());
                }
            }
        }

        let child = match self.launcher.spawn(id, kind, &remotes, &view_remote) {
            Ok(child) => child,
            Err(e) => {
                warn!(session = %id, program = %self.launcher.program().display(), error = %e, "could not launch execution unit");
                abandon(id, players);
                return Err(StartError::Spawn(e));
            }
        };

        let (exited_tx, exited_rx) = watch::channel(false);
        for remote in remotes {
            remote.release(exited_rx.clone());
        }
        view_remote.release(exited_rx);
        tokio::spawn(reap(id, child, exited_tx));

        let names = players.iter().map(|c| c.name().to_string()).collect();
        let session = Arc::new(Session::new(id, kind, names));
        let (reader, _) = view.split();
        tokio::spawn(relay_view(Arc::clone(&session), reader));

        info!(session = %id, kind, players = ?session.players(), "session started");
        Ok(session)
    }
}

fn abandon(id: SessionId, players: &[Arc<ClientHandle>]) {
    for client in players {
        client.abandon_session(id);
    }
}

/// Wait for the execution unit so it never lingers as a zombie.
async fn reap(session: SessionId, mut child: Child, exited: watch::Sender<bool>) {
    match child.wait().await {
        Ok(status) if status.success() => debug!(%session, "execution unit exited"),
        Ok(status) => warn!(%session, %status, "execution unit exited abnormally"),
        Err(e) => warn!(%session, error = %e, "could not wait for execution unit"),
    }
    let _ = exited.send(true);
}

async fn relay_view(session: Arc<Session>, mut view: FrameReader) {
    loop {
        match view.read_frame().await {
            Ok(Some(frame)) if is_close_line(&frame) => break,
            Ok(Some(frame)) => session.fanout.broadcast(frame),
            Ok(None) => break,
            Err(e) => {
                warn!(session = %session.id, error = %e, "view endpoint failed");
                break;
            }
        }
    }
    view.close();
    session.finish();
    info!(session = %session.id, "session finished");
}

/// Every session started since the server came up, running or not.
pub struct SessionRegistry {
    next_id: AtomicU64,
    sessions: RwLock<BTreeMap<SessionId, Arc<Session>>>,
    runner: SessionRunner,
}

impl SessionRegistry {
    pub fn new(runner: SessionRunner) -> Self {
        SessionRegistry {
            next_id: AtomicU64::new(0),
            sessions: RwLock::new(BTreeMap::new()),
            runner,
        }
    }

    pub fn backend(&self) -> Backend {
        self.runner.backend()
    }

    /// Allocate an id and start the session. A failed start still
    /// consumes its id.
    pub async fn start(
        &self,
        kind: &str,
        players: &[Arc<ClientHandle>],
    ) -> Result<SessionId, StartError> {
        let id = SessionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let session = self.runner.start(id, kind, players)?;
        self.sessions.write().await.insert(id, session);
        Ok(id)
    }

    pub async fn get(&self, id: SessionId) -> Option<Arc<Session>> {
        self.sessions.read().await.get(&id).cloned()
    }

    /// Summaries ordered by id.
    pub async fn list(&self) -> Vec<SessionSummary> {
        self.sessions
            .read()
            .await
            .values()
            .map(|s| s.summary())
            .collect()
    }
}
