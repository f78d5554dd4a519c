use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::stages::STAGE_COUNT;

/// One playable catalog entry.  Never mutated after the catalog is loaded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Track {
    pub artist: String,
    pub title: String,
    pub genre: String,
    /// Opaque reference handed to the playback device (URL or file path).
    #[serde(alias = "preview")]
    pub preview_url: String,
}

impl Track {
    /// The `"{artist} - {title}"` string used for autocomplete and the
    /// validity gate.
    pub fn option(&self) -> String {
        format!("{} - {}", self.artist, self.title)
    }
}

/// Game mode.  Orthogonal to the round phase and persists across rounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    #[default]
    Ranked,
    Casual,
}

impl Mode {
    pub fn label(&self) -> &'static str {
        match self {
            Mode::Ranked => "ranked",
            Mode::Casual => "casual",
        }
    }
}

/// Per-stage indicator shown in the stage strip.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum StageStatus {
    #[default]
    Pending,
    Correct,
    Incorrect,
    Skipped,
}

impl StageStatus {
    pub fn symbol(&self) -> &'static str {
        match self {
            StageStatus::Pending => "·",
            StageStatus::Correct => "✓",
            StageStatus::Incorrect => "✖",
            StageStatus::Skipped => "→",
        }
    }
}

/// Leaderboard time window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Board {
    #[default]
    Daily,
    Weekly,
    Monthly,
}

impl Board {
    pub const ALL: [Board; 3] = [Board::Daily, Board::Weekly, Board::Monthly];

    pub fn days(&self) -> i64 {
        match self {
            Board::Daily => 1,
            Board::Weekly => 7,
            Board::Monthly => 30,
        }
    }

    /// Lower bound of the window ending at `now`.
    pub fn since(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        now - Duration::days(self.days())
    }

    pub fn label(&self) -> &'static str {
        match self {
            Board::Daily => "daily",
            Board::Weekly => "weekly",
            Board::Monthly => "monthly",
        }
    }
}

impl std::str::FromStr for Board {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "daily" | "day" | "d" => Ok(Board::Daily),
            "weekly" | "week" | "w" => Ok(Board::Weekly),
            "monthly" | "month" | "m" => Ok(Board::Monthly),
            other => anyhow::bail!("unknown leaderboard period: {other}"),
        }
    }
}

/// A row read back from the remote leaderboard.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LeaderboardEntry {
    pub name: String,
    pub score: u32,
    #[serde(default)]
    pub mode: Mode,
    pub created_at: DateTime<Utc>,
}

/// A finished ranked score waiting to be submitted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewScore {
    pub name: String,
    pub score: u32,
    pub mode: Mode,
}

/// How an evaluated round ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    Correct,
    Wrong,
    GameOver,
}

/// Round phase.
///
/// ```text
///  Selecting ─▶ Paused ⇄ Playing ─▶ Evaluated(verdict) ─▶ (acknowledged) ─▶ Paused …
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(tag = "phase", content = "verdict", rename_all = "snake_case")]
pub enum RoundPhase {
    /// No track has been chosen yet.
    #[default]
    Selecting,
    Playing,
    Paused,
    Evaluated(Verdict),
}

impl RoundPhase {
    pub fn is_evaluated(&self) -> bool {
        matches!(self, RoundPhase::Evaluated(_))
    }
}

/// Commands accepted by the game core.  Produced by the presentation layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "cmd")]
pub enum GameCommand {
    NewRound,
    TogglePlayback,
    Guess { text: String },
    Skip,
    Acknowledge,
    ToggleMode,
    ConfirmLeaveRanked,
    CancelLeaveRanked,
    ToggleGenre { genre: String },
    SubmitScore { name: String },
    CancelGameOver,
    SelectBoard { board: Board },
    SetVolume { value: f32 },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct RoundSnapshot {
    pub track: Option<Track>,
    pub stage_index: usize,
    pub statuses: [StageStatus; STAGE_COUNT],
    pub guesses: [Option<String>; STAGE_COUNT],
    pub playback_elapsed: f64,
    pub is_playing: bool,
    pub budget_secs: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct SessionSnapshot {
    pub mode: Mode,
    pub lives: u32,
    pub score: u32,
    pub genres: Vec<String>,
}

/// Everything the presentation layer needs to draw one frame.
/// `rev` increases on every published change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct GameSnapshot {
    #[serde(default)]
    pub rev: u64,
    pub phase: RoundPhase,
    pub round: RoundSnapshot,
    pub session: SessionSnapshot,
    pub confirm_leave_ranked: bool,
    pub volume: f32,
    pub board: Board,
    pub high_score: Option<u32>,
}
