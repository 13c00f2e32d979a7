//! Error types for the engine side.

use std::io;

use arena_protocol::ProtocolError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    /// A player's endpoint delivered `close` (or reached end of stream).
    /// The game cannot continue without them.
    #[error("player {0} disconnected")]
    PlayerDisconnected(usize),

    /// The game addressed a player index it does not have.
    #[error("no player with index {0}")]
    UnknownPlayer(usize),

    #[error("unknown game kind {0:?}")]
    UnknownGame(String),

    #[error("{kind} needs {expected} players, got {actual}")]
    PlayerCount {
        kind: String,
        expected: usize,
        actual: usize,
    },

    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    #[error("i/o error: {0}")]
    Io(#[from] io::Error),
}
