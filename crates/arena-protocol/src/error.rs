//! Protocol error type.

use thiserror::Error;

/// Anything that can go wrong turning a line into a frame.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// The line is not valid JSON.
    #[error("malformed frame: {0}")]
    Json(#[from] serde_json::Error),

    /// Valid JSON, but not an object.
    #[error("frame is not a JSON object")]
    NotAnObject,

    /// The envelope `type` is missing or is not the one expected here.
    #[error("unexpected frame type {found:?} (expected {expected})")]
    UnexpectedType {
        expected: &'static str,
        found: Option<String>,
    },

    /// `max_games` does not parse as a non-negative integer.
    #[error("invalid max_games value: {0}")]
    InvalidMaxGames(String),

    /// `game_id` is present but is not a non-negative integer.
    #[error("invalid game_id value: {0}")]
    InvalidSessionId(String),

    /// A remote descriptor string could not be parsed.
    #[error("invalid endpoint descriptor {0:?}")]
    InvalidDescriptor(String),
}
