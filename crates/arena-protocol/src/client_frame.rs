//! Client-facing frames.
//!
//! Client -> server:
//!
//! - connect: `{"type":"connect","name":<string|null>,"max_games":<int>,"supported_games":[..]}`
//! - in-session: any object with `"game_id":<int>`, routed to that session
//! - teardown: `{"type":"close"}` (whole connection) or
//!   `{"type":"close","game_id":<int>}` (one session)
//!
//! Server -> client:
//!
//! - `{"type":"name","name":<string>}`
//! - `{"type":"start","game_id":<int>}`
//! - anything produced by a session's engine, with `game_id` injected

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::ProtocolError;
use crate::{SessionId, SESSION_ID_FIELD};

/// First frame a client sends.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectRequest {
    /// Requested name; `None` asks the server to pick one.
    pub name: Option<String>,
    /// How many sessions the client is willing to play at once.
    pub max_games: usize,
    /// Game kinds the client declares it can play.
    pub supported_games: Vec<String>,
}

#[derive(Deserialize)]
struct RawConnect {
    #[serde(rename = "type")]
    kind: Option<String>,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    max_games: Value,
    #[serde(default)]
    supported_games: Option<Vec<String>>,
}

impl ConnectRequest {
    pub fn parse(line: &str) -> Result<Self, ProtocolError> {
        let value: Value = serde_json::from_str(line.trim())?;
        if !value.is_object() {
            return Err(ProtocolError::NotAnObject);
        }
        let raw: RawConnect = serde_json::from_value(value)?;

        if raw.kind.as_deref() != Some("connect") {
            return Err(ProtocolError::UnexpectedType {
                expected: "connect",
                found: raw.kind,
            });
        }

        Ok(ConnectRequest {
            name: raw.name,
            max_games: parse_max_games(&raw.max_games)?,
            supported_games: raw.supported_games.unwrap_or_default(),
        })
    }

    pub fn to_line(&self) -> String {
        serde_json::json!({
            "type": "connect",
            "name": self.name,
            "max_games": self.max_games,
            "supported_games": self.supported_games,
        })
        .to_string()
    }
}

/// Accepts a JSON integer or a string holding one.
fn parse_max_games(value: &Value) -> Result<usize, ProtocolError> {
    let parsed = match value {
        Value::Number(n) => n.as_u64().and_then(|n| usize::try_from(n).ok()),
        Value::String(s) => s.trim().parse::<usize>().ok(),
        _ => None,
    };
    parsed.ok_or_else(|| ProtocolError::InvalidMaxGames(value.to_string()))
}

/// Frames the server originates on the client connection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ServerFrame {
    Name {
        name: String,
    },
    Start {
        game_id: SessionId,
    },
    Close {
        #[serde(skip_serializing_if = "Option::is_none")]
        game_id: Option<SessionId>,
    },
}

impl ServerFrame {
    pub fn to_line(&self) -> String {
        // strings and integers only; serialization cannot fail
        serde_json::to_string(self).unwrap_or_default()
    }
}

/// A frame read from a client after the handshake.
///
/// `body` is the frame with `game_id` removed, which is exactly what the
/// session's engine gets to see.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionFrame {
    pub game_id: Option<SessionId>,
    pub body: Map<String, Value>,
}

impl SessionFrame {
    pub fn parse(line: &str) -> Result<Self, ProtocolError> {
        let value: Value = serde_json::from_str(line.trim())?;
        let Value::Object(mut body) = value else {
            return Err(ProtocolError::NotAnObject);
        };

        let game_id = match body.remove(SESSION_ID_FIELD) {
            None | Some(Value::Null) => None,
            Some(Value::Number(n)) => match n.as_u64() {
                Some(id) => Some(SessionId(id)),
                None => return Err(ProtocolError::InvalidSessionId(n.to_string())),
            },
            Some(other) => return Err(ProtocolError::InvalidSessionId(other.to_string())),
        };

        Ok(SessionFrame { game_id, body })
    }

    pub fn frame_type(&self) -> Option<&str> {
        self.body.get("type").and_then(Value::as_str)
    }

    pub fn is_close(&self) -> bool {
        self.frame_type() == Some("close")
    }

    /// The untagged line to forward to the engine.
    pub fn body_line(&self) -> String {
        Value::Object(self.body.clone()).to_string()
    }
}

/// Inject `game_id` into a frame produced by a session's engine.
///
/// The frame keeps every other field untouched; an existing `game_id`
/// is overwritten so an engine can never address another session.
pub fn tag_with_session(line: &str, game_id: SessionId) -> Result<String, ProtocolError> {
    let value: Value = serde_json::from_str(line.trim())?;
    let Value::Object(mut obj) = value else {
        return Err(ProtocolError::NotAnObject);
    };
    obj.insert(SESSION_ID_FIELD.to_owned(), Value::from(game_id.0));
    Ok(Value::Object(obj).to_string())
}
