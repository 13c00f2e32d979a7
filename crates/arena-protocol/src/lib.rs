//! arena-protocol
//!
//! Wire-level frames for the game arena.
//!
//! Every frame is a single JSON object terminated by `\n`. Two
//! conversations use this crate:
//!
//! - [`engine_frame`] : engine <-> endpoint traffic, scoped to one
//!   endpoint and therefore carrying no session id.
//! - [`client_frame`] : client <-> server traffic on the shared TCP
//!   connection, where in-session frames carry a `game_id`.
//!
//! [`descriptor`] describes how an execution unit reaches the remote
//! side of an endpoint.

pub mod client_frame;
pub mod descriptor;
pub mod engine_frame;
pub mod error;

use std::fmt;

use serde::{Deserialize, Serialize};

pub use client_frame::{tag_with_session, ConnectRequest, ServerFrame, SessionFrame};
pub use descriptor::RemoteDescriptor;
pub use engine_frame::EngineFrame;
pub use error::ProtocolError;

/// Identifier of one game session.
///
/// Allocated monotonically by the server and never reused while the
/// process lives. On the client wire it is the `game_id` field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(pub u64);

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Name of the field carrying the session id on the client wire.
pub const SESSION_ID_FIELD: &str = "game_id";
