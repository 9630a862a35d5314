//! Configuration errors.

use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::validation::ValidationError;

/// Failures while loading, storing or checking a renderer configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A configuration file could not be accessed.
    #[error("cannot {action} '{}': {source}", .path.display())]
    Io {
        /// `"read"` or `"write"`.
        action: &'static str,
        /// The file.
        path: PathBuf,
        /// OS error.
        #[source]
        source: std::io::Error,
    },

    /// The TOML document is malformed or has unknown or mistyped keys.
    #[error("invalid renderer configuration: {0}")]
    Toml(#[from] toml::de::Error),

    /// The configuration could not be rendered as TOML.
    #[error("cannot serialize renderer configuration: {0}")]
    Serialize(#[from] toml::ser::Error),

    /// The JSON reverb object is malformed or lacks a required key.
    #[error("invalid reverb configuration: {0}")]
    Json(#[from] serde_json::Error),

    /// Values outside their valid range.
    #[error("{0}")]
    Invalid(#[from] ValidationError),
}

impl ConfigError {
    pub(crate) fn io(action: &'static str, path: &Path, source: std::io::Error) -> Self {
        ConfigError::Io {
            action,
            path: path.to_path_buf(),
            source,
        }
    }

    /// The file involved, for I/O errors.
    pub fn path(&self) -> Option<&Path> {
        match self {
            ConfigError::Io { path, .. } => Some(path),
            _ => None,
        }
    }
}

/// Result type for configuration operations.
pub type Result<T> = std::result::Result<T, ConfigError>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error;
    use std::io::ErrorKind;

    #[test]
    fn io_errors_name_the_file_and_keep_the_cause() {
        let err = ConfigError::io(
            "read",
            Path::new("/etc/orbis/renderer.toml"),
            std::io::Error::from(ErrorKind::NotFound),
        );
        let msg = err.to_string();
        assert!(msg.starts_with("cannot read '/etc/orbis/renderer.toml'"), "got: {msg}");
        assert_eq!(err.path(), Some(Path::new("/etc/orbis/renderer.toml")));
        assert!(err.source().is_some());
    }

    #[test]
    fn validation_messages_pass_through() {
        let err = ConfigError::from(ValidationError::Zero("renderer.period"));
        assert_eq!(err.to_string(), "renderer.period must be greater than zero");
        assert!(err.path().is_none());
    }
}
