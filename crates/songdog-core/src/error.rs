//! Engine error taxonomy.
//!
//! These are programming errors or unmet preconditions.  User-facing
//! conditions such as an invalid guess never show up here; they are absorbed
//! as inert outcomes.

use songdog_proto::protocol::Mode;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, EngineError>;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
    /// A round operation was called before any track was selected.
    #[error("no round in progress")]
    NoRound,

    /// Submit or skip after the round was already evaluated.
    #[error("round already evaluated; acknowledge it first")]
    RoundFinished,

    /// Acknowledge while the round is still being guessed.
    #[error("round still in progress")]
    RoundInProgress,

    /// Plain acknowledge on a game-over result.
    #[error("game over pending; submit a score or cancel")]
    GameOverPending,

    /// Score submission outside of a game-over result.
    #[error("no game over to resolve")]
    NotGameOver,

    /// The candidate pool for the next round is empty.
    #[error("no tracks available for {mode:?} mode with genres {genres:?}")]
    EmptyPool { mode: Mode, genres: Vec<String> },
}
