//! Helpers shared by the server integration tests.
#![allow(dead_code)]

use std::future::Future;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use arena_server::arena::Arena;
use arena_server::config::Config;
use arena_server::endpoint::Backend;
use arena_server::server::Server;
use serde_json::{json, Value};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::time::timeout;

pub const PATIENCE: Duration = Duration::from_secs(10);

pub fn config(backend: Backend, engine_program: impl Into<PathBuf>) -> Config {
    Config {
        bind_addr: "127.0.0.1".to_string(),
        port: 0,
        max_clients: 8,
        backend,
        engine_program: Some(engine_program.into()),
    }
}

/// A server whose execution units are this crate's own binary.
pub async fn start_server(backend: Backend) -> (SocketAddr, Arc<Arena>) {
    start_with(config(backend, env!("CARGO_BIN_EXE_arena-server"))).await
}

pub async fn start_with(config: Config) -> (SocketAddr, Arc<Arena>) {
    let server = Server::bind(&config).await.unwrap();
    let addr = server.local_addr().unwrap();
    let arena = server.arena();
    tokio::spawn(server.run());
    (addr, arena)
}

/// Poll `check` until it holds.
pub async fn eventually<F, Fut>(what: &str, mut check: F)
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    let waited = timeout(PATIENCE, async {
        while !check().await {
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    })
    .await;
    assert!(waited.is_ok(), "timed out waiting for {what}");
}

/// A player program speaking the client protocol.
pub struct TestClient {
    pub name: String,
    lines: Lines<BufReader<OwnedReadHalf>>,
    writer: OwnedWriteHalf,
}

impl TestClient {
    pub async fn connect(addr: SocketAddr, name: Option<&str>, max_games: usize, games: &[&str]) -> TestClient {
        let stream = TcpStream::connect(addr).await.unwrap();
        let (read_half, writer) = stream.into_split();
        let mut client = TestClient {
            name: String::new(),
            lines: BufReader::new(read_half).lines(),
            writer,
        };
        client
            .send(json!({
                "type": "connect",
                "name": name,
                "max_games": max_games,
                "supported_games": games,
            }))
            .await;

        let reply = client.recv().await.expect("name frame");
        assert_eq!(reply["type"], "name");
        client.name = reply["name"].as_str().unwrap().to_string();
        client
    }

    pub async fn send(&mut self, frame: Value) {
        self.send_raw(&frame.to_string()).await;
    }

    pub async fn send_raw(&mut self, line: &str) {
        self.writer.write_all(line.as_bytes()).await.unwrap();
        self.writer.write_all(b"\n").await.unwrap();
    }

    /// Next frame, or `None` once the server hangs up.
    pub async fn recv(&mut self) -> Option<Value> {
        let line = timeout(PATIENCE, self.lines.next_line())
            .await
            .expect("server answered in time")
            .ok()??;
        Some(serde_json::from_str(&line).unwrap())
    }

    /// Play one session to its end, answering each turn with the next
    /// move. Returns every frame received for it, `start` excluded.
    pub async fn play(&mut self, game_id: u64, moves: &[(i64, i64)]) -> Vec<Value> {
        let mut moves = moves.iter();
        let mut frames = Vec::new();
        loop {
            let frame = self.recv().await.expect("session frames");
            assert_eq!(frame["game_id"], game_id, "{frame}");
            let done = frame["type"] == "close";
            if frame["payload"]["type"] == "turn" {
                let (row, column) = moves.next().expect("a move left to play");
                self.send(json!({
                    "type": "message",
                    "game_id": game_id,
                    "payload": {"row": row, "column": column},
                }))
                .await;
            }
            frames.push(frame);
            if done {
                return frames;
            }
        }
    }
}
