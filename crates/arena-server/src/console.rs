//! Operator console: a line-oriented front end on stdin/stdout.
//!
//! ```text
//! games                       list game kinds
//! clients                     list connected clients
//! available <kind>            clients free to play <kind>
//! sessions                    list sessions
//! start <kind> <client>...    start a session, players in seat order
//! watch <id>                  print a session's snapshots
//! help
//! ```

use std::fmt::Write as _;
use std::sync::Arc;

use arena_protocol::SessionId;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing::debug;

use crate::arena::Arena;

const HELP: &str = "\
commands:
  games                       list game kinds
  clients                     list connected clients
  available <kind>            clients free to play <kind>
  sessions                    list sessions
  start <kind> <client>...    start a session, players in seat order
  watch <id>                  print a session's snapshots
  help
";

/// Read commands from stdin until it closes.
pub async fn run(arena: Arc<Arena>) -> anyhow::Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = tokio::io::stdout();

    while let Some(line) = lines.next_line().await? {
        let reply = execute(&arena, &line).await;
        stdout.write_all(reply.as_bytes()).await?;
        stdout.flush().await?;
    }
    debug!("console input closed");
    Ok(())
}

/// Run one console command and return what to print.
pub async fn execute(arena: &Arc<Arena>, line: &str) -> String {
    let mut words = line.split_whitespace();
    let Some(command) = words.next() else {
        return String::new();
    };
    let args: Vec<&str> = words.collect();

    match (command, args.as_slice()) {
        ("games", []) => {
            let mut out = String::new();
            for game in arena.available_games() {
                let _ = writeln!(
                    out,
                    "{:<12} {} ({} players: {})",
                    game.kind,
                    game.display_name,
                    game.num_players,
                    game.player_names.join(", ")
                );
            }
            out
        }
        ("clients", []) => {
            let clients = arena.list_clients().await;
            if clients.is_empty() {
                return "no clients connected\n".to_string();
            }
            let mut out = String::new();
            for c in clients {
                let _ = writeln!(
                    out,
                    "{:<16} slots {}/{}  games [{}]",
                    c.name,
                    c.available_slots,
                    c.max_games,
                    c.supported_games.join(", ")
                );
            }
            out
        }
        ("available", [kind]) => {
            let names = arena.available_clients_for_game(kind).await;
            if names.is_empty() {
                format!("nobody is free to play {kind}\n")
            } else {
                format!("{}\n", names.join(" "))
            }
        }
        ("sessions", []) => {
            let sessions = arena.list_sessions().await;
            if sessions.is_empty() {
                return "no sessions\n".to_string();
            }
            let mut out = String::new();
            for s in sessions {
                let status = if s.is_running { "running" } else { "finished" };
                let _ = writeln!(out, "{:>4} {:<12} {:<8} {}", s.id, s.game_kind, status, s.players.join(" vs "));
            }
            out
        }
        ("start", [kind, players @ ..]) if !players.is_empty() => {
            match arena.start_session(kind, players).await {
                Ok(id) => format!("started session {id}\n"),
                Err(e) => format!("error: {e}\n"),
            }
        }
        ("watch", [id]) => match id.parse::<u64>() {
            Ok(id) => watch(arena, SessionId(id)).await,
            Err(_) => format!("error: bad session id {id:?}\n"),
        },
        ("help", _) => HELP.to_string(),
        _ => format!("unknown command {line:?}, try help\n"),
    }
}

async fn watch(arena: &Arc<Arena>, id: SessionId) -> String {
    let Some((_, mut snapshots)) = arena.watch_session(id).await else {
        return format!("error: no session {id}\n");
    };
    tokio::spawn(async move {
        let mut stdout = tokio::io::stdout();
        while let Some(frame) = snapshots.recv().await {
            let line = format!("[session {id}] {frame}\n");
            if stdout.write_all(line.as_bytes()).await.is_err() {
                break;
            }
            let _ = stdout.flush().await;
        }
    });
    format!("watching session {id}\n")
}
