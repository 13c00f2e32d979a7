//! Game-kind registry.
//!
//! Maps a game-kind identifier to its metadata and a constructor. New
//! games register here; nothing else in the system changes.

use std::collections::BTreeMap;

use crate::error::EngineError;
use crate::game::Game;
use crate::games::tictactoe::TicTacToe;

/// Static description of a game kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GameInfo {
    /// Key used on the wire and in `supported_games`.
    pub kind: &'static str,
    pub display_name: &'static str,
    pub description: &'static str,
    /// Exact number of players a session of this kind needs.
    pub num_players: usize,
    /// Per-seat labels, in player order.
    pub player_names: &'static [&'static str],
}

type Constructor = fn() -> Box<dyn Game>;

#[derive(Clone)]
struct Entry {
    info: GameInfo,
    create: Constructor,
}

#[derive(Clone, Default)]
pub struct GameCatalog {
    entries: BTreeMap<&'static str, Entry>,
}

impl GameCatalog {
    /// An empty catalog.
    pub fn new() -> Self {
        GameCatalog::default()
    }

    /// Catalog holding every game shipped with the crate.
    pub fn builtin() -> Self {
        let mut catalog = GameCatalog::new();
        catalog.register(TicTacToe::INFO, || Box::new(TicTacToe::new()));
        catalog
    }

    /// Register (or replace) a game kind.
    pub fn register(&mut self, info: GameInfo, create: Constructor) {
        self.entries.insert(info.kind, Entry { info, create });
    }

    pub fn info(&self, kind: &str) -> Option<&GameInfo> {
        self.entries.get(kind).map(|e| &e.info)
    }

    /// All registered kinds, sorted by kind.
    pub fn available_games(&self) -> Vec<&GameInfo> {
        self.entries.values().map(|e| &e.info).collect()
    }

    /// Construct a fresh game of `kind`.
    pub fn create(&self, kind: &str) -> Result<Box<dyn Game>, EngineError> {
        self.entries
            .get(kind)
            .map(|e| (e.create)())
            .ok_or_else(|| EngineError::UnknownGame(kind.to_owned()))
    }
}
