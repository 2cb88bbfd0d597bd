//! Error types for configuration and debounced async calls

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while loading, validating or installing delay configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to access config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("{key} = {value} is out of range (0-{max})")]
    OutOfRange { key: String, value: u64, max: u64 },

    #[error("unknown delay preset: {0}")]
    UnknownPreset(String),

    #[error("delay preset table is already installed")]
    AlreadyInstalled,

    #[error("could not determine the user config directory")]
    NoConfigDir,
}

/// Outcome of a debounced async call that did not succeed
///
/// `Failed` carries the original failure untouched so callers awaiting a
/// flush can react to it; the human-readable message is also stored in the
/// task's `error` signal.
#[derive(Debug, Error)]
pub enum CallError<E> {
    #[error("{0}")]
    Failed(E),

    #[error("debounced call panicked: {0}")]
    Panicked(String),

    #[error("debounced call was aborted before it settled")]
    Aborted,
}

impl<E> CallError<E> {
    /// Returns the original failure, if the call settled with one
    pub fn into_failure(self) -> Option<E> {
        match self {
            CallError::Failed(e) => Some(e),
            _ => None,
        }
    }
}
