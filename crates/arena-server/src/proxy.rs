//! Client proxy: multiplexes many sessions over one client connection.
//!
//! For every session a client plays, the proxy mints an endpoint whose
//! remote side goes to the execution unit. Two tasks serve it:
//!
//! - a pump draining frames routed from the client into the endpoint
//! - a forwarder reading engine frames, tagging them with `game_id`
//!   and queueing them on the client's socket writer
//!
//! A session's slot is held from endpoint creation until the engine
//! closes it (or the client disconnects).

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use arena_protocol::engine_frame::is_close_line;
use arena_protocol::{tag_with_session, ConnectRequest, EngineFrame, ServerFrame, SessionId};
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::endpoint::{Backend, FrameReader, FrameWriter, RemoteEnd};
use crate::error::ProxyError;
use crate::types::{ClientSummary, OutboundTx};

struct SessionLink {
    to_engine: mpsc::UnboundedSender<String>,
}

#[derive(Default)]
struct Links {
    sessions: HashMap<SessionId, SessionLink>,
    // set once the client's socket is gone; no session may be added after
    closed: bool,
}

/// A connected client, as seen by the rest of the server.
pub struct ClientHandle {
    name: String,
    supported_games: Vec<String>,
    max_games: usize,
    outbound: OutboundTx,
    links: Mutex<Links>,
}

impl ClientHandle {
    pub(crate) fn new(name: String, request: ConnectRequest, outbound: OutboundTx) -> Arc<Self> {
        Arc::new(ClientHandle {
            name,
            supported_games: request.supported_games,
            max_games: request.max_games,
            outbound,
            links: Mutex::new(Links::default()),
        })
    }

    fn links(&self) -> MutexGuard<'_, Links> {
        self.links.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn supported_games(&self) -> &[String] {
        &self.supported_games
    }

    pub fn supports(&self, kind: &str) -> bool {
        self.supported_games.iter().any(|g| g == kind)
    }

    pub fn max_games(&self) -> usize {
        self.max_games
    }

    /// `max_games` minus the sessions currently held.
    pub fn available_slots(&self) -> usize {
        self.max_games.saturating_sub(self.links().sessions.len())
    }

    pub fn is_available(&self) -> bool {
        !self.is_closed() && self.available_slots() > 0
    }

    /// Whether the client's connection has gone away.
    pub fn is_closed(&self) -> bool {
        self.links().closed
    }

    pub fn active_sessions(&self) -> Vec<SessionId> {
        let mut ids: Vec<_> = self.links().sessions.keys().copied().collect();
        ids.sort();
        ids
    }

    pub fn summary(&self) -> ClientSummary {
        ClientSummary {
            name: self.name.clone(),
            supported_games: self.supported_games.clone(),
            max_games: self.max_games,
            available_slots: self.available_slots(),
            active_sessions: self.active_sessions(),
        }
    }

    /// Queue a frame on the client's socket. Dropped if the client is gone.
    pub(crate) fn send(&self, frame: String) {
        let _ = self.outbound.send(frame);
    }

    /// Reserve a slot for `session` and return the remote end the
    /// execution unit attaches to. The client is told with a `start`
    /// frame.
    pub fn create_session_endpoints(
        self: &Arc<Self>,
        session: SessionId,
        backend: Backend,
    ) -> Result<RemoteEnd, ProxyError> {
        let mut links = self.links();
        if links.closed {
            return Err(ProxyError::Disconnected(self.name.clone()));
        }
        if links.sessions.contains_key(&session) {
            return Err(ProxyError::DuplicateSession {
                client: self.name.clone(),
                session,
            });
        }
        if links.sessions.len() >= self.max_games {
            return Err(ProxyError::NoFreeSlot(self.name.clone()));
        }

        let (endpoint, remote) = backend.open()?;
        let (reader, writer) = endpoint.split();
        let (to_engine, from_client) = mpsc::unbounded_channel();

        links.sessions.insert(session, SessionLink { to_engine });
        drop(links);

        self.send(ServerFrame::Start { game_id: session }.to_line());
        tokio::spawn(pump_to_engine(writer, from_client));
        tokio::spawn(forward_to_client(Arc::clone(self), session, reader));

        debug!(client = %self.name, %session, slots = self.available_slots(), "session endpoint created");
        Ok(remote)
    }

    /// Hand an untagged frame from the client to the session's engine.
    /// Returns `false` if the client is not in that session.
    pub fn route_to_session(&self, session: SessionId, frame: String) -> bool {
        match self.links().sessions.get(&session) {
            Some(link) => link.to_engine.send(frame).is_ok(),
            None => false,
        }
    }

    /// Give up a session that never got going. The forwarder still
    /// tells the client once the endpoint reports closed.
    pub(crate) fn abandon_session(&self, session: SessionId) {
        if self.links().sessions.remove(&session).is_some() {
            debug!(client = %self.name, %session, "session abandoned");
        }
    }

    /// The client is gone: tell every engine it played with. Later
    /// attempts to add a session fail with [`ProxyError::Disconnected`].
    pub fn disconnect(&self) {
        let links: Vec<_> = {
            let mut links = self.links();
            links.closed = true;
            links.sessions.drain().collect()
        };
        let close = EngineFrame::Close.to_line();
        for (session, link) in links {
            debug!(client = %self.name, %session, "closing session for departed client");
            let _ = link.to_engine.send(close.clone());
        }
    }

    fn finish_session(&self, session: SessionId) {
        if self.links().sessions.remove(&session).is_some() {
            debug!(client = %self.name, %session, slots = self.available_slots(), "session slot released");
        }
    }
}

async fn pump_to_engine(mut writer: FrameWriter, mut frames: mpsc::UnboundedReceiver<String>) {
    while let Some(frame) = frames.recv().await {
        writer.write_frame(&frame).await;
    }
    writer.close().await;
}

async fn forward_to_client(client: Arc<ClientHandle>, session: SessionId, mut reader: FrameReader) {
    loop {
        match reader.read_frame().await {
            Ok(Some(frame)) => {
                let closing = is_close_line(&frame);
                match tag_with_session(&frame, session) {
                    Ok(tagged) => client.send(tagged),
                    Err(e) => warn!(client = %client.name, %session, error = %e, "dropping malformed engine frame"),
                }
                if closing {
                    break;
                }
            }
            Ok(None) => {
                debug!(client = %client.name, %session, "engine endpoint ended without close");
                client.send(ServerFrame::Close { game_id: Some(session) }.to_line());
                break;
            }
            Err(e) => {
                warn!(client = %client.name, %session, error = %e, "engine endpoint failed");
                client.send(ServerFrame::Close { game_id: Some(session) }.to_line());
                break;
            }
        }
    }
    reader.close();
    client.finish_session(session);
}
