//! The contract a game implementation fulfills.

use arena_protocol::EngineFrame;
use serde_json::Value;
use tracing::warn;

use crate::channel::Channel;
use crate::error::EngineError;

/// A turn-based game running inside an execution unit.
///
/// The engine loop owns the game and drives it:
///
/// ```text
/// emit state
/// while !is_game_over() { play_turn(); emit state }
/// emit state
/// ```
pub trait Game: Send {
    /// True once the game has ended. Must not change state.
    fn is_game_over(&self) -> bool;

    /// Snapshot shown to players and spectators.
    fn state(&self) -> Value;

    /// Advance by exactly one turn, talking to players through `players`.
    ///
    /// This is the only place a game mutates itself. Errors from the
    /// messaging primitives should be propagated with `?`; the engine
    /// loop tears the session down.
    fn play_turn(&mut self, players: &mut Players) -> Result<(), EngineError>;
}

/// The ordered player endpoints of one session.
pub struct Players {
    channels: Vec<Channel>,
}

impl Players {
    pub fn new(channels: Vec<Channel>) -> Self {
        Players { channels }
    }

    pub fn len(&self) -> usize {
        self.channels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }

    /// Wrap `payload` in a `message` envelope and send it to one player.
    pub fn send_message(&mut self, player: usize, payload: Value) -> Result<(), EngineError> {
        let channel = self
            .channels
            .get_mut(player)
            .ok_or(EngineError::UnknownPlayer(player))?;
        channel.send(&EngineFrame::message(payload))?;
        Ok(())
    }

    /// Block until the player sends a message and return its payload.
    ///
    /// A `close` from the player (or its endpoint vanishing) yields
    /// [`EngineError::PlayerDisconnected`]. Frames that are not valid
    /// envelopes are logged and skipped.
    pub fn receive_message(&mut self, player: usize) -> Result<Value, EngineError> {
        let channel = self
            .channels
            .get_mut(player)
            .ok_or(EngineError::UnknownPlayer(player))?;

        loop {
            match channel.receive() {
                Ok(EngineFrame::Message { payload }) => return Ok(payload),
                Ok(EngineFrame::Close) => return Err(EngineError::PlayerDisconnected(player)),
                Err(EngineError::Protocol(e)) => {
                    warn!(player, error = %e, "ignoring malformed frame from player");
                }
                Err(EngineError::Io(e)) => {
                    warn!(player, error = %e, "player endpoint failed");
                    return Err(EngineError::PlayerDisconnected(player));
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Send the same frame to every player.
    pub(crate) fn broadcast(&mut self, frame: &EngineFrame) -> Result<(), EngineError> {
        for channel in &mut self.channels {
            channel.send(frame)?;
        }
        Ok(())
    }

    /// Close every player endpoint, each preceded by a `close` frame.
    pub(crate) fn close_all(&mut self) {
        for channel in &mut self.channels {
            channel.close(true);
        }
    }
}
