//! Engine main loop.
//!
//! The loop owns the game, the player channels and the view channel:
//!
//! 1. emit state
//! 2. while the game is not over: play one turn, emit state
//! 3. emit the final state once more
//! 4. close every player channel (with a `close` frame)
//! 5. close the view channel without a `close` frame; the runner on
//!    the other side treats end of stream as the end of the session
//!
//! "Emit state" writes `{"type":"message","payload":<state>}` to every
//! player and to the view.
//!
//! If a player disconnects mid-game, every channel is closed at once
//! (the view included, this time with a `close` frame) and the unit
//! exits: the game is not salvageable.

use arena_protocol::{EngineFrame, RemoteDescriptor};
use tracing::{debug, info, warn};

use crate::catalog::GameCatalog;
use crate::channel::Channel;
use crate::error::EngineError;
use crate::game::{Game, Players};

/// How a run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// The game reached its end.
    Finished { turns: usize },
    /// A player left; the session was torn down.
    Aborted { player: usize },
}

pub struct Engine {
    game: Box<dyn Game>,
    players: Players,
    view: Channel,
}

impl Engine {
    pub fn new(game: Box<dyn Game>, players: Vec<Channel>, view: Channel) -> Self {
        Engine {
            game,
            players: Players::new(players),
            view,
        }
    }

    pub fn run(mut self) -> Result<Outcome, EngineError> {
        match self.play() {
            Ok(turns) => {
                self.emit_state()?;
                self.players.close_all();
                self.view.close(false);
                info!(turns, "game finished");
                Ok(Outcome::Finished { turns })
            }
            Err(EngineError::PlayerDisconnected(player)) => {
                warn!(player, "player disconnected, ending game");
                self.abort();
                Ok(Outcome::Aborted { player })
            }
            Err(e) => {
                self.abort();
                Err(e)
            }
        }
    }

    fn play(&mut self) -> Result<usize, EngineError> {
        let mut turns = 0;
        self.emit_state()?;
        while !self.game.is_game_over() {
            self.game.play_turn(&mut self.players)?;
            turns += 1;
            debug!(turns, "turn played");
            self.emit_state()?;
        }
        Ok(turns)
    }

    fn emit_state(&mut self) -> Result<(), EngineError> {
        let frame = EngineFrame::message(self.game.state());
        self.players.broadcast(&frame)?;
        self.view.send(&frame)?;
        Ok(())
    }

    fn abort(&mut self) {
        self.players.close_all();
        self.view.close(true);
    }
}

/// Entry point of an execution unit: attach to every endpoint, build
/// the game of `kind` and run it to the end.
pub fn run_unit(
    catalog: &GameCatalog,
    kind: &str,
    players: &[RemoteDescriptor],
    view: &RemoteDescriptor,
) -> Result<Outcome, EngineError> {
    let info = catalog
        .info(kind)
        .ok_or_else(|| EngineError::UnknownGame(kind.to_owned()))?;
    if info.num_players != players.len() {
        return Err(EngineError::PlayerCount {
            kind: kind.to_owned(),
            expected: info.num_players,
            actual: players.len(),
        });
    }

    let game = catalog.create(kind)?;
    let channels = players
        .iter()
        .map(Channel::connect)
        .collect::<Result<Vec<_>, _>>()?;
    let view = Channel::connect(view)?;

    Engine::new(game, channels, view).run()
}
