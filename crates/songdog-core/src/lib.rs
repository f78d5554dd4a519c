//! Game runtime for Songdog: the round engine, the clock that drives stage
//! budgets, and the single-owner event loop that ties them to a playback
//! device and the remote leaderboard.

pub mod clock;
pub mod core;
pub mod engine;
pub mod error;
pub mod leaderboard;
pub mod playback;

pub use crate::core::{GameBroadcast, GameCore, GameEvent};
pub use crate::engine::Engine;
pub use crate::error::EngineError;
