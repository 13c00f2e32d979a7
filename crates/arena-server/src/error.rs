//! Error types for the arena server.

use std::io;

use arena_protocol::SessionId;
use thiserror::Error;

/// Failures minting a client's per-session endpoint.
#[derive(Debug, Error)]
pub enum ProxyError {
    #[error("client {0} has no free session slot")]
    NoFreeSlot(String),

    #[error("client {client} is already playing session {session}")]
    DuplicateSession { client: String, session: SessionId },

    #[error("client {0} has disconnected")]
    Disconnected(String),

    #[error("could not open endpoint: {0}")]
    Endpoint(#[from] io::Error),
}

/// Reasons a session could not be started.
#[derive(Debug, Error)]
pub enum StartError {
    #[error("unknown game kind {0:?}")]
    UnknownGame(String),

    #[error("{kind} needs {expected} players, got {actual}")]
    PlayerCount {
        kind: String,
        expected: usize,
        actual: usize,
    },

    #[error("client {0} listed more than once")]
    DuplicatePlayer(String),

    #[error("no connected client named {0}")]
    UnknownClient(String),

    #[error("client {client} does not play {kind}")]
    UnsupportedGame { client: String, kind: String },

    #[error("client {0} has no free session slot")]
    Unavailable(String),

    #[error(transparent)]
    Proxy(#[from] ProxyError),

    #[error("could not open view endpoint: {0}")]
    ViewEndpoint(io::Error),

    #[error("could not launch execution unit: {0}")]
    Spawn(io::Error),
}

/// A configuration value that does not parse.
#[derive(Debug, Error)]
#[error("invalid value {value:?} for {key}: {reason}")]
pub struct ConfigError {
    pub key: &'static str,
    pub value: String,
    pub reason: String,
}
