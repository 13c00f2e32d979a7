//! Engine-side envelope.
//!
//! Frames on a single endpoint:
//!
//! - `{"type":"message","payload":<json>}` : state snapshot (view) or a
//!   game-specific message (player).
//! - `{"type":"close"}` : ends the conversation on that endpoint.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::error::ProtocolError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum EngineFrame {
    Message {
        #[serde(default)]
        payload: Value,
    },
    Close,
}

impl EngineFrame {
    pub fn message(payload: Value) -> Self {
        EngineFrame::Message { payload }
    }

    /// Parse one line (without or with its trailing newline).
    pub fn parse(line: &str) -> Result<Self, ProtocolError> {
        let value: Value = serde_json::from_str(line.trim())?;
        if !value.is_object() {
            return Err(ProtocolError::NotAnObject);
        }
        let found = value.get("type").and_then(Value::as_str).map(str::to_owned);
        match found.as_deref() {
            Some("message") | Some("close") => Ok(serde_json::from_value(value)?),
            _ => Err(ProtocolError::UnexpectedType {
                expected: "message or close",
                found,
            }),
        }
    }

    /// Encode as a single line, without the trailing newline.
    pub fn to_line(&self) -> String {
        match self {
            EngineFrame::Message { payload } => {
                json!({ "type": "message", "payload": payload }).to_string()
            }
            EngineFrame::Close => json!({ "type": "close" }).to_string(),
        }
    }

    pub fn is_close(&self) -> bool {
        matches!(self, EngineFrame::Close)
    }
}

/// Cheap check used by relays that forward frames verbatim and only
/// need to spot the end of a conversation.
pub fn is_close_line(line: &str) -> bool {
    serde_json::from_str::<Value>(line.trim())
        .ok()
        .and_then(|v| v.get("type").and_then(Value::as_str).map(|t| t == "close"))
        .unwrap_or(false)
}
