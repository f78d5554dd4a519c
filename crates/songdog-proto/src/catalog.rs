//! Track catalog: loading, the autocomplete universe and pool selection.

use std::collections::{BTreeSet, HashSet};
use std::path::Path;

use anyhow::Context;
use rand::seq::SliceRandom;
use rand::Rng;
use tracing::{debug, warn};

use crate::protocol::{Mode, Track};

/// Immutable track collection.  `options[i]` is always `tracks[i].option()`.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    tracks: Vec<Track>,
    options: Vec<String>,
}

impl Catalog {
    /// Build a catalog, dropping tracks whose option string was already seen
    /// so the validity gate stays unambiguous.
    pub fn new(tracks: Vec<Track>) -> Self {
        let mut seen = HashSet::new();
        let mut kept = Vec::with_capacity(tracks.len());
        for track in tracks {
            let option = track.option();
            if seen.insert(option.clone()) {
                kept.push(track);
            } else {
                warn!("catalog: dropping duplicate track {:?}", option);
            }
        }
        let options = kept.iter().map(Track::option).collect();
        Self {
            tracks: kept,
            options,
        }
    }

    /// Load from a `.toml` (`[[track]]` tables) or JSON array file.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read catalog {}", path.display()))?;
        let is_toml = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.eq_ignore_ascii_case("toml"))
            .unwrap_or(false);
        let catalog = if is_toml {
            Self::parse_toml_str(&content)
        } else {
            Self::parse_json_str(&content)
        }
        .with_context(|| format!("failed to parse catalog {}", path.display()))?;
        debug!("catalog: loaded {} tracks from {}", catalog.len(), path.display());
        Ok(catalog)
    }

    pub fn parse_json_str(content: &str) -> anyhow::Result<Self> {
        let tracks: Vec<Track> = serde_json::from_str(content)?;
        Ok(Self::new(tracks))
    }

    pub fn parse_toml_str(content: &str) -> anyhow::Result<Self> {
        let file: TomlCatalogFile = toml::from_str(content)?;
        Ok(Self::new(file.track))
    }

    pub fn tracks(&self) -> &[Track] {
        &self.tracks
    }

    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    /// `"{artist} - {title}"` for every track, in catalog order.
    pub fn all_options(&self) -> &[String] {
        &self.options
    }

    /// Exact, case-sensitive membership of the raw input in the option list.
    pub fn is_valid_guess(&self, raw: &str) -> bool {
        self.options.iter().any(|o| o == raw)
    }

    /// Options containing `query` case-insensitively, in catalog order.
    pub fn suggest(&self, query: &str) -> Vec<&str> {
        let needle = query.to_lowercase();
        self.options
            .iter()
            .filter(|o| o.to_lowercase().contains(&needle))
            .map(String::as_str)
            .collect()
    }

    /// Distinct genres, sorted.
    pub fn genres(&self) -> Vec<String> {
        self.tracks
            .iter()
            .map(|t| t.genre.clone())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    /// Candidate tracks for a round.  Ranked draws from everything; casual
    /// keeps tracks whose genre is in `genres`, with an empty set meaning all.
    pub fn pool(&self, mode: Mode, genres: &BTreeSet<String>) -> Vec<&Track> {
        match mode {
            Mode::Ranked => self.tracks.iter().collect(),
            Mode::Casual if genres.is_empty() => self.tracks.iter().collect(),
            Mode::Casual => self
                .tracks
                .iter()
                .filter(|t| genres.contains(&t.genre))
                .collect(),
        }
    }

    /// Uniform-random pick from the pool.  `None` when the pool is empty.
    pub fn pick<R: Rng + ?Sized>(
        &self,
        mode: Mode,
        genres: &BTreeSet<String>,
        rng: &mut R,
    ) -> Option<&Track> {
        self.pool(mode, genres).choose(rng).copied()
    }
}

/// Matches the TOML `[[track]]` layout.
#[derive(Debug, serde::Deserialize)]
struct TomlCatalogFile {
    #[serde(default)]
    track: Vec<Track>,
}
