// crates/arena-engine/tests/engine_loop.rs
#![cfg(unix)]

use std::io::{BufRead, BufReader, Write};
use std::os::unix::net::UnixStream;
use std::thread;
use std::time::Duration;

use arena_engine::games::tictactoe::TicTacToe;
use arena_engine::{run_unit, Channel, Engine, EngineError, Game, GameCatalog, Outcome};
use arena_protocol::RemoteDescriptor;
use serde_json::{json, Value};

/// The test's side of one engine channel.
struct Peer {
    reader: BufReader<UnixStream>,
    writer: UnixStream,
}

impl Peer {
    /// Next frame, or `None` at end of stream.
    fn recv(&mut self) -> Option<Value> {
        let mut line = String::new();
        let n = self.reader.read_line(&mut line).expect("read from engine");
        if n == 0 {
            return None;
        }
        Some(serde_json::from_str(line.trim()).expect("engine wrote valid json"))
    }

    fn send(&mut self, frame: Value) {
        writeln!(self.writer, "{frame}").expect("write to engine");
    }

    fn play(&mut self, row: i64, column: i64) {
        self.send(json!({"type": "message", "payload": {"row": row, "column": column}}));
    }

    /// Skip frames until the engine asks for a move; returns what was skipped.
    fn wait_for_turn(&mut self) -> Vec<Value> {
        let mut skipped = Vec::new();
        loop {
            let frame = self.recv().expect("engine closed before our turn");
            if frame["payload"]["type"] == "turn" {
                return skipped;
            }
            skipped.push(frame);
        }
    }

    fn drain(&mut self) -> Vec<Value> {
        std::iter::from_fn(|| self.recv()).collect()
    }
}

fn channel_pair() -> (Channel, Peer) {
    let (engine_side, test_side) = UnixStream::pair().unwrap();
    test_side
        .set_read_timeout(Some(Duration::from_secs(10)))
        .unwrap();

    let channel = Channel::from_io(engine_side.try_clone().unwrap(), engine_side);
    let peer = Peer {
        reader: BufReader::new(test_side.try_clone().unwrap()),
        writer: test_side,
    };
    (channel, peer)
}

fn start_tictactoe() -> (thread::JoinHandle<Result<Outcome, EngineError>>, Vec<Peer>, Peer) {
    let (x, x_peer) = channel_pair();
    let (o, o_peer) = channel_pair();
    let (view, view_peer) = channel_pair();

    let engine = Engine::new(Box::new(TicTacToe::new()), vec![x, o], view);
    let handle = thread::spawn(move || engine.run());
    (handle, vec![x_peer, o_peer], view_peer)
}

fn is_state(frame: &Value) -> bool {
    frame["type"] == "message" && frame["payload"]["type"] == "state"
}

#[test]
fn x_wins_top_row() {
    let (handle, mut players, mut view) = start_tictactoe();

    let moves = [(0, 0, 0), (1, 1, 0), (0, 0, 1), (1, 1, 1), (0, 0, 2)];
    for (seat, row, col) in moves {
        players[seat].wait_for_turn();
        players[seat].play(row, col);
    }

    let outcome = handle.join().unwrap().unwrap();
    assert_eq!(outcome, Outcome::Finished { turns: 5 });

    for peer in &mut players {
        let rest = peer.drain();
        let (last, before) = rest.split_last().expect("frames after the last move");
        assert_eq!(*last, json!({"type": "close"}));
        let final_state = before.last().unwrap();
        assert!(is_state(final_state));
        assert_eq!(final_state["payload"]["winner"], "X");
    }

    // initial + one per turn + final, and no close frame on the view
    let states = view.drain();
    assert_eq!(states.len(), 7);
    assert!(states.iter().all(is_state));
    assert_eq!(
        states[6]["payload"]["board"][0],
        json!(["X", "X", "X"])
    );
}

#[test]
fn full_board_is_a_draw() {
    let (handle, mut players, mut view) = start_tictactoe();

    let moves = [
        (0, 0, 0),
        (1, 0, 1),
        (0, 0, 2),
        (1, 1, 1),
        (0, 1, 0),
        (1, 2, 0),
        (0, 1, 2),
        (1, 2, 2),
        (0, 2, 1),
    ];
    for (seat, row, col) in moves {
        players[seat].wait_for_turn();
        players[seat].play(row, col);
    }

    assert_eq!(handle.join().unwrap().unwrap(), Outcome::Finished { turns: 9 });

    let states = view.drain();
    let last = states.last().unwrap();
    assert_eq!(last["payload"]["winner"], Value::Null);
    assert!(last["payload"]["board"]
        .as_array()
        .unwrap()
        .iter()
        .flat_map(|row| row.as_array().unwrap())
        .all(|cell| !cell.is_null()));
}

#[test]
fn invalid_moves_are_repeated() {
    let (handle, mut players, mut view) = start_tictactoe();

    players[0].wait_for_turn();
    players[0].play(3, 0);
    let reply = players[0].recv().unwrap();
    assert_eq!(reply["payload"]["type"], "repeat-turn");
    assert_eq!(reply["payload"]["error"], "out-of-bounds");
    assert_eq!(reply["payload"]["last-move"], json!({"row": 3, "column": 0}));

    players[0].send(json!({"type": "message", "payload": {"row": "middle"}}));
    let reply = players[0].recv().unwrap();
    assert_eq!(reply["payload"]["error"], "invalid-move");

    // garbage is skipped without costing the player their turn
    writeln!(players[0].writer, "this is not json").unwrap();
    players[0].play(1, 1);

    players[1].wait_for_turn();
    players[1].play(1, 1);
    let reply = players[1].recv().unwrap();
    assert_eq!(reply["payload"]["error"], "space-not-empty");

    // O gives up
    players[1].send(json!({"type": "close"}));
    assert_eq!(
        handle.join().unwrap().unwrap(),
        Outcome::Aborted { player: 1 }
    );

    let frames = view.drain();
    assert_eq!(frames.last().unwrap(), &json!({"type": "close"}));
}

#[test]
fn vanished_player_aborts_for_everyone() {
    let (handle, mut players, mut view) = start_tictactoe();

    players[0].wait_for_turn();
    let x = players.remove(0);
    drop(x);

    assert_eq!(
        handle.join().unwrap().unwrap(),
        Outcome::Aborted { player: 0 }
    );

    let o_frames = players[0].drain();
    assert_eq!(o_frames.last().unwrap(), &json!({"type": "close"}));
    assert!(o_frames.iter().all(|f| f["payload"]["type"] != "turn"));

    let view_frames = view.drain();
    assert!(is_state(&view_frames[0]));
    assert_eq!(view_frames.last().unwrap(), &json!({"type": "close"}));
}

#[test]
fn catalog_knows_tictactoe() {
    let catalog = GameCatalog::builtin();

    let info = catalog.info("tictactoe").unwrap();
    assert_eq!(info.display_name, "TicTacToe");
    assert_eq!(info.num_players, 2);
    assert_eq!(info.player_names, &["X", "O"]);

    let kinds: Vec<_> = catalog.available_games().iter().map(|g| g.kind).collect();
    assert_eq!(kinds, vec!["tictactoe"]);

    let fresh = catalog.create("tictactoe").unwrap();
    assert!(!fresh.is_game_over());
    assert_eq!(fresh.state()["winner"], Value::Null);

    assert!(matches!(catalog.create("chess"), Err(EngineError::UnknownGame(_))));
}

#[test]
fn run_unit_checks_kind_and_seat_count_first() {
    let catalog = GameCatalog::builtin();
    let view = RemoteDescriptor::Socket { port: 1 };

    let err = run_unit(&catalog, "chess", &[], &view).unwrap_err();
    assert!(matches!(err, EngineError::UnknownGame(kind) if kind == "chess"));

    let err = run_unit(&catalog, "tictactoe", &[view], &view).unwrap_err();
    assert!(matches!(
        err,
        EngineError::PlayerCount { expected: 2, actual: 1, .. }
    ));
}
