use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use super::platform;
use crate::protocol::{Board, Mode};

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub catalog: CatalogConfig,
    #[serde(default)]
    pub game: GameConfig,
    #[serde(default)]
    pub playback: PlaybackConfig,
    #[serde(default)]
    pub leaderboard: LeaderboardConfig,
    #[serde(default)]
    pub paths: PathsConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogConfig {
    /// JSON array or TOML `[[track]]` file.
    #[serde(default = "default_catalog_path")]
    pub path: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GameConfig {
    #[serde(default)]
    pub start_mode: Mode,
    /// Initial casual genre filter.
    #[serde(default = "default_genres")]
    pub default_genres: Vec<String>,
    #[serde(default)]
    pub default_board: Board,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlaybackConfig {
    /// Used until the preference store has a saved volume.
    #[serde(default = "default_volume")]
    pub default_volume: f32,
    /// Clock sampling period.  Read it through [`PlaybackConfig::tick_interval`].
    #[serde(default = "default_tick_interval_ms")]
    pub tick_interval_ms: u64,
}

/// Bounds for `tick_interval_ms`.  The upper bound keeps the period well under
/// the shortest (0.1 s) stage budget.
pub const TICK_INTERVAL_MS: std::ops::RangeInclusive<u64> = 1..=60;

impl PlaybackConfig {
    /// The configured tick period, clamped into [`TICK_INTERVAL_MS`].
    pub fn tick_interval(&self) -> Duration {
        let ms = self
            .tick_interval_ms
            .clamp(*TICK_INTERVAL_MS.start(), *TICK_INTERVAL_MS.end());
        if ms != self.tick_interval_ms {
            tracing::warn!(
                "config: tick_interval_ms = {} is out of range, using {}",
                self.tick_interval_ms,
                ms
            );
        }
        Duration::from_millis(ms)
    }
}

/// Remote leaderboard (PostgREST-style `/rest/v1/<table>` endpoint).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LeaderboardConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub api_key: String,
    #[serde(default = "default_table")]
    pub table: String,
    #[serde(default = "default_limit")]
    pub limit: usize,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathsConfig {
    /// Volume and high-score preferences.
    #[serde(default = "default_prefs_file")]
    pub prefs_file: PathBuf,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            path: default_catalog_path(),
        }
    }
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            start_mode: Mode::default(),
            default_genres: default_genres(),
            default_board: Board::default(),
        }
    }
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            default_volume: default_volume(),
            tick_interval_ms: default_tick_interval_ms(),
        }
    }
}

impl Default for LeaderboardConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            url: String::new(),
            api_key: String::new(),
            table: default_table(),
            limit: default_limit(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            prefs_file: default_prefs_file(),
        }
    }
}

fn default_catalog_path() -> PathBuf {
    platform::config_dir().join("songs.json")
}

fn default_genres() -> Vec<String> {
    vec!["Pop".to_string()]
}

fn default_volume() -> f32 {
    0.8
}

fn default_tick_interval_ms() -> u64 {
    60
}

fn default_table() -> String {
    "scores".to_string()
}

fn default_limit() -> usize {
    100
}

fn default_timeout_secs() -> u64 {
    10
}

fn default_prefs_file() -> PathBuf {
    platform::data_dir().join("prefs.json")
}

impl Config {
    pub fn load() -> anyhow::Result<Self> {
        Self::load_from(&Self::config_path())
    }

    /// Read `path`, writing the defaults there first if it does not exist.
    pub fn load_from(path: &std::path::Path) -> anyhow::Result<Self> {
        if !path.exists() {
            let config = Self::default();
            config.save_to(path)?;
            return Ok(config);
        }

        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        Ok(config)
    }

    pub fn save(&self) -> anyhow::Result<()> {
        self.save_to(&Self::config_path())
    }

    pub fn save_to(&self, path: &std::path::Path) -> anyhow::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    pub fn config_path() -> PathBuf {
        platform::config_dir().join("config.toml")
    }
}
