//! arena-server
//!
//! Hosts turn-based game sessions for remote player programs.
//!
//! - [`server`] accepts client connections.
//! - [`registry`] negotiates client names and tracks connected clients.
//! - [`proxy`] multiplexes many sessions over one client connection.
//! - [`endpoint`] provides the duplex channels to execution units.
//! - [`session`] launches and watches one session's execution unit.
//! - [`fanout`] replays and forwards state snapshots to observers.
//! - [`arena`] ties them together behind the operations a front end
//!   (web UI, [`console`]) uses.

pub mod arena;
pub mod config;
pub mod console;
pub mod endpoint;
pub mod error;
pub mod fanout;
pub mod launcher;
pub mod proxy;
pub mod registry;
pub mod server;
pub mod session;
pub mod types;

// connection handling is internal, not re-exported
mod client;
