//! Where the assistant keeps its files.
//!
//! `settings.toml` lives in the platform config directory and spoken answers
//! in the platform local-data directory, each under `cooking-assistant/`.
//! A platform without such a directory falls back to the working directory.

use std::path::{Path, PathBuf};

const APP_DIR: &str = "cooking-assistant";

/// Resolved file locations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppPaths {
    pub settings_file: PathBuf,
    /// Spoken answers written by the terminal front-end.
    pub audio_dir: PathBuf,
}

impl AppPaths {
    /// Platform locations from the `dirs` crate.
    pub fn new() -> Self {
        let or_cwd = |dir: Option<PathBuf>| dir.unwrap_or_else(|| PathBuf::from("."));
        Self::from_roots(&or_cwd(dirs::config_dir()), &or_cwd(dirs::data_local_dir()))
    }

    /// The same layout under explicit config and data roots.
    pub fn from_roots(config_root: &Path, data_root: &Path) -> Self {
        Self {
            settings_file: config_root.join(APP_DIR).join("settings.toml"),
            audio_dir: data_root.join(APP_DIR).join("audio"),
        }
    }
}

impl Default for AppPaths {
    fn default() -> Self {
        Self::new()
    }
}
