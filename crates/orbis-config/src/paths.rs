//! Platform-specific configuration locations.
//!
//! - **User config**: `~/.config/orbis/` (Linux),
//!   `~/Library/Application Support/orbis/` (macOS), `%APPDATA%\orbis\`
//!   (Windows)
//!
//! File paths inside a configuration (array, filter WAVs) may be relative;
//! they are resolved against the directory of the configuration file.

use std::path::{Path, PathBuf};

/// Application name used for directory paths.
const APP_NAME: &str = "orbis";

/// File name of the default renderer configuration.
const CONFIG_FILE: &str = "renderer.toml";

/// Returns the user-specific configuration directory.
///
/// Returns a fallback path if the config directory cannot be determined.
pub fn user_config_dir() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_NAME)
}

/// Returns the path of the default renderer configuration file.
pub fn default_config_path() -> PathBuf {
    user_config_dir().join(CONFIG_FILE)
}

/// Resolves `path` against `base` unless it is absolute.
pub fn resolve(base: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base.join(path)
    }
}
