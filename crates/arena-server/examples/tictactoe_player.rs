//! A minimal tic-tac-toe player: plays the first empty cell, in as many
//! sessions as the server gives it.
//!
//! ```text
//! cargo run -p arena-server --example tictactoe_player -- [name] [max_games]
//! ```

use std::collections::HashMap;
use std::env;

use anyhow::{bail, Context, Result};
use serde_json::{json, Value};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;

#[tokio::main]
async fn main() -> Result<()> {
    // Where to connect: env override or default.
    let addr = env::var("ARENA_CLIENT_ADDR").unwrap_or_else(|_| "127.0.0.1:8889".to_string());
    let mut args = env::args().skip(1);
    let name = args.next();
    let max_games: usize = match args.next() {
        Some(n) => n.parse().context("max_games must be a number")?,
        None => 1,
    };

    println!("Connecting to {}...", addr);
    let stream = TcpStream::connect(&addr).await?;
    let (read_half, mut write_half) = stream.into_split();
    let mut lines = BufReader::new(read_half).lines();

    let connect = json!({
        "type": "connect",
        "name": name,
        "max_games": max_games,
        "supported_games": ["tictactoe"],
    });
    write_half.write_all(format!("{connect}\n").as_bytes()).await?;

    // Latest board per session.
    let mut boards: HashMap<u64, Value> = HashMap::new();

    while let Some(line) = lines.next_line().await? {
        let frame: Value = serde_json::from_str(&line)?;
        let game_id = frame["game_id"].as_u64();

        match (frame["type"].as_str(), game_id) {
            (Some("name"), _) => println!("Playing as {}", frame["name"]),
            (Some("start"), Some(id)) => println!("[{id}] session started"),
            (Some("close"), Some(id)) => {
                let result = boards
                    .remove(&id)
                    .map(|state| state["winner"].clone())
                    .unwrap_or(Value::Null);
                println!("[{id}] session over, winner: {result}");
            }
            (Some("message"), Some(id)) => {
                let payload = &frame["payload"];
                match payload["type"].as_str() {
                    Some("state") => {
                        boards.insert(id, payload.clone());
                    }
                    Some("turn") | Some("repeat-turn") => {
                        let board = boards.get(&id).map(|s| &s["board"]);
                        let Some((row, column)) = board.and_then(first_empty) else {
                            bail!("session {id}: asked to move on a full board");
                        };
                        let reply = json!({
                            "type": "message",
                            "game_id": id,
                            "payload": {"row": row, "column": column},
                        });
                        write_half.write_all(format!("{reply}\n").as_bytes()).await?;
                    }
                    _ => println!("[{id}] {payload}"),
                }
            }
            _ => eprintln!("Unexpected frame: {line}"),
        }
    }

    println!("Server closed the connection.");
    Ok(())
}

fn first_empty(board: &Value) -> Option<(usize, usize)> {
    let rows = board.as_array()?;
    rows.iter().enumerate().find_map(|(r, row)| {
        row.as_array()?
            .iter()
            .position(Value::is_null)
            .map(|c| (r, c))
    })
}
