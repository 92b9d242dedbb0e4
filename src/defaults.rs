//! Default values for plugsync configuration.
//!
//! This module provides centralized default locations used across commands,
//! ensuring consistency and avoiding duplication.

use std::path::{Path, PathBuf};

/// Returns the default plugsync data directory.
///
/// Uses the platform-appropriate data directory:
/// - Linux: `~/.local/share/plugsync` (XDG Base Directory)
/// - macOS: `~/Library/Application Support/plugsync`
/// - Windows: `{FOLDERID_RoamingAppData}\plugsync`
///
/// Falls back to `.plugsync` in the current directory if the platform data
/// directory cannot be determined.
pub fn default_data_dir() -> PathBuf {
    dirs::data_dir()
        .map(|dir| dir.join("plugsync"))
        .unwrap_or_else(|| PathBuf::from(".plugsync"))
}

/// Directory holding one checkout per plugin.
///
/// Can be overridden by `settings.plugin_dir`, the `--plugin-dir` CLI flag
/// or the `PLUGSYNC_PLUGIN_DIR` environment variable.
pub fn default_plugin_dir() -> PathBuf {
    default_data_dir().join("plugins")
}

/// Directory for automatic pre-checkout snapshots.
pub fn default_rollback_dir() -> PathBuf {
    default_data_dir().join("rollback")
}

/// Expand a leading `~` to the home directory.
pub fn expand_tilde(path: &Path) -> PathBuf {
    let Ok(rest) = path.strip_prefix("~") else {
        return path.to_path_buf();
    };
    match dirs::home_dir() {
        Some(home) => home.join(rest),
        None => path.to_path_buf(),
    }
}
