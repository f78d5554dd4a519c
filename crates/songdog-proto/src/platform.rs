//! Where Songdog keeps its files.
//!
//! `SONGDOG_HOME` puts config and data under a single directory.  Without it
//! unix uses the XDG layout (also on macOS, instead of Application Support)
//! and Windows prefers a portable install beside the executable.

use std::path::{Path, PathBuf};

const APP_DIR: &str = "songdog";

/// Overrides both [`config_dir`] and [`data_dir`].
pub const HOME_ENV: &str = "SONGDOG_HOME";

fn home_override() -> Option<PathBuf> {
    std::env::var_os(HOME_ENV)
        .filter(|v| !v.is_empty())
        .map(PathBuf::from)
}

/// `<home>/<parts…>/songdog`
fn under_home(home: &Path, parts: &[&str]) -> PathBuf {
    parts
        .iter()
        .fold(home.to_path_buf(), |dir, part| dir.join(part))
        .join(APP_DIR)
}

/// The executable's directory, if `marker` exists in it.
#[cfg(windows)]
fn portable_dir(marker: &str) -> Option<PathBuf> {
    let exe = std::env::current_exe().ok()?;
    let dir = exe.parent()?;
    dir.join(marker).exists().then(|| dir.to_path_buf())
}

/// Preferences and the log file.
pub fn data_dir() -> PathBuf {
    if let Some(home) = home_override() {
        return home.join("data");
    }
    #[cfg(unix)]
    {
        let home = dirs::home_dir().unwrap_or_else(|| PathBuf::from("/tmp"));
        under_home(&home, &[".local", "share"])
    }
    #[cfg(windows)]
    {
        if let Some(dir) = portable_dir("data") {
            return dir.join("data");
        }
        under_home(
            &dirs::data_local_dir().unwrap_or_else(|| PathBuf::from(".")),
            &[],
        )
    }
}

/// `config.toml` and the default catalog.
pub fn config_dir() -> PathBuf {
    if let Some(home) = home_override() {
        return home;
    }
    #[cfg(unix)]
    {
        let home = dirs::home_dir().unwrap_or_else(|| PathBuf::from("."));
        under_home(&home, &[".config"])
    }
    #[cfg(windows)]
    {
        if let Some(dir) = portable_dir("config.toml") {
            return dir;
        }
        under_home(
            &dirs::config_dir().unwrap_or_else(|| PathBuf::from(".")),
            &[],
        )
    }
}
