//! Shared types for the arena server.
//!
//! This module defines:
//! - channel aliases for frames headed to a client socket
//! - summaries handed out to front ends

use tokio::sync::mpsc;

pub use arena_protocol::SessionId;

/// One encoded frame, without its trailing newline.
pub type Frame = String;

/// Frames queued for a client's socket writer.
pub type OutboundTx = mpsc::UnboundedSender<Frame>;
pub type OutboundRx = mpsc::UnboundedReceiver<Frame>;

/// Point-in-time view of a connected client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientSummary {
    pub name: String,
    pub supported_games: Vec<String>,
    pub max_games: usize,
    pub available_slots: usize,
    pub active_sessions: Vec<SessionId>,
}

/// Point-in-time view of a session, running or finished.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSummary {
    pub id: SessionId,
    pub game_kind: String,
    pub players: Vec<String>,
    pub is_running: bool,
}
