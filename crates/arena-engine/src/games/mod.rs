//! Built-in games.

pub mod tictactoe;
