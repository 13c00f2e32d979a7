//! arena-engine
//!
//! Everything that runs inside a session's execution unit:
//! - the synchronous endpoint [`Channel`]
//! - the [`Game`] contract and the [`Players`] messaging primitives
//! - the engine main loop ([`Engine`]) and [`run_unit`]
//! - the [`GameCatalog`] mapping game kinds to constructors
//! - built-in games
//!
//! Nothing here knows about clients, sessions ids or the server; an
//! engine only ever sees its own endpoints.

pub mod catalog;
pub mod channel;
pub mod error;
pub mod game;
pub mod games;
pub mod runtime;

pub use catalog::{GameCatalog, GameInfo};
pub use channel::Channel;
pub use error::EngineError;
pub use game::{Game, Players};
pub use runtime::{run_unit, Engine, Outcome};
