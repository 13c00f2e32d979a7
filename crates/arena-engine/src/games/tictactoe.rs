//! Tic-tac-toe.
//!
//! State: `{"type":"state","board":[[cell;3];3],"winner":<"X"|"O"|null>}`.
//!
//! On its turn a player gets `{"type":"turn"}` and answers with
//! `{"row":r,"column":c}`. Invalid moves are answered with
//! `{"type":"repeat-turn","error":<reason>,"last-move":<move>}` until a
//! valid one arrives.

use serde_json::{json, Value};

use crate::catalog::GameInfo;
use crate::error::EngineError;
use crate::game::{Game, Players};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mark {
    X,
    O,
}

impl Mark {
    fn as_str(self) -> &'static str {
        match self {
            Mark::X => "X",
            Mark::O => "O",
        }
    }

    fn seat(self) -> usize {
        match self {
            Mark::X => 0,
            Mark::O => 1,
        }
    }

    fn other(self) -> Mark {
        match self {
            Mark::X => Mark::O,
            Mark::O => Mark::X,
        }
    }
}

type Board = [[Option<Mark>; 3]; 3];

const LINES: [[(usize, usize); 3]; 8] = [
    [(0, 0), (0, 1), (0, 2)],
    [(1, 0), (1, 1), (1, 2)],
    [(2, 0), (2, 1), (2, 2)],
    [(0, 0), (1, 0), (2, 0)],
    [(0, 1), (1, 1), (2, 1)],
    [(0, 2), (1, 2), (2, 2)],
    [(0, 0), (1, 1), (2, 2)],
    [(2, 0), (1, 1), (0, 2)],
];

#[derive(Debug, Clone)]
pub struct TicTacToe {
    board: Board,
    to_move: Mark,
    winner: Option<Mark>,
}

impl Default for TicTacToe {
    fn default() -> Self {
        TicTacToe::new()
    }
}

impl TicTacToe {
    pub const INFO: GameInfo = GameInfo {
        kind: "tictactoe",
        display_name: "TicTacToe",
        description: "A game of TicTacToe.",
        num_players: 2,
        player_names: &["X", "O"],
    };

    pub fn new() -> Self {
        TicTacToe {
            board: [[None; 3]; 3],
            to_move: Mark::X,
            winner: None,
        }
    }

    pub fn winner(&self) -> Option<Mark> {
        self.winner
    }

    fn is_full(&self) -> bool {
        self.board.iter().flatten().all(Option::is_some)
    }

    /// Validate a move, returning the cell or the reason it is refused.
    fn check_move(&self, mv: &Value) -> Result<(usize, usize), &'static str> {
        let coord = |key: &str| mv.get(key).and_then(Value::as_i64);
        let (Some(row), Some(col)) = (coord("row"), coord("column")) else {
            return Err("invalid-move");
        };
        if !(0..3).contains(&row) || !(0..3).contains(&col) {
            return Err("out-of-bounds");
        }
        let (row, col) = (row as usize, col as usize);
        if self.board[row][col].is_some() {
            return Err("space-not-empty");
        }
        Ok((row, col))
    }

    fn place(&mut self, row: usize, col: usize) {
        let mark = self.to_move;
        self.board[row][col] = Some(mark);
        let won = LINES
            .iter()
            .any(|line| line.iter().all(|&(r, c)| self.board[r][c] == Some(mark)));
        if won {
            self.winner = Some(mark);
        }
        self.to_move = mark.other();
    }
}

impl Game for TicTacToe {
    fn is_game_over(&self) -> bool {
        self.winner.is_some() || self.is_full()
    }

    fn state(&self) -> Value {
        let board: Vec<Vec<Value>> = self
            .board
            .iter()
            .map(|row| {
                row.iter()
                    .map(|cell| cell.map_or(Value::Null, |m| Value::from(m.as_str())))
                    .collect()
            })
            .collect();

        json!({
            "type": "state",
            "board": board,
            "winner": self.winner.map(Mark::as_str),
        })
    }

    fn play_turn(&mut self, players: &mut Players) -> Result<(), EngineError> {
        let seat = self.to_move.seat();
        players.send_message(seat, json!({ "type": "turn" }))?;

        loop {
            let mv = players.receive_message(seat)?;
            match self.check_move(&mv) {
                Ok((row, col)) => {
                    self.place(row, col);
                    return Ok(());
                }
                Err(reason) => {
                    players.send_message(
                        seat,
                        json!({ "type": "repeat-turn", "error": reason, "last-move": mv }),
                    )?;
                }
            }
        }
    }
}
