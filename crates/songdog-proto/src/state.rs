use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::protocol::Board;

/// What survives restarts: the last volume and the best known score per
/// leaderboard period.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct Preferences {
    #[serde(default)]
    pub volume: Option<f32>,
    /// Keyed by `Board::label()`.
    #[serde(default)]
    pub high_scores: BTreeMap<String, u32>,
}

/// Durable key-value preferences backed by a JSON file.
///
/// Reads are served from memory; every setter rewrites the file.
pub struct PreferenceStore {
    prefs: Preferences,
    prefs_file: PathBuf,
}

impl PreferenceStore {
    /// Open the store.  A missing or unreadable file yields defaults.
    pub fn open(prefs_file: PathBuf) -> Self {
        let prefs = Self::load_persistent(&prefs_file);
        Self { prefs, prefs_file }
    }

    pub fn volume(&self) -> Option<f32> {
        self.prefs.volume
    }

    pub async fn set_volume(&mut self, volume: f32) -> anyhow::Result<()> {
        self.prefs.volume = Some(volume.clamp(0.0, 1.0));
        self.save().await
    }

    pub fn high_score(&self, board: Board) -> Option<u32> {
        self.prefs.high_scores.get(board.label()).copied()
    }

    pub async fn set_high_score(&mut self, board: Board, score: u32) -> anyhow::Result<()> {
        self.prefs
            .high_scores
            .insert(board.label().to_string(), score);
        self.save().await
    }

    pub fn path(&self) -> &Path {
        &self.prefs_file
    }

    async fn save(&self) -> anyhow::Result<()> {
        if let Some(parent) = self.prefs_file.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let json = serde_json::to_string_pretty(&self.prefs)?;
        tokio::fs::write(&self.prefs_file, json).await?;
        Ok(())
    }

    fn load_persistent(prefs_file: &Path) -> Preferences {
        if let Ok(content) = std::fs::read_to_string(prefs_file) {
            match serde_json::from_str::<Preferences>(&content) {
                Ok(prefs) => return prefs,
                Err(e) => tracing::warn!(
                    "prefs: ignoring unreadable {}: {}",
                    prefs_file.display(),
                    e
                ),
            }
        }
        Preferences::default()
    }
}
