//! Error types for settings handling.

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur while reading or writing the settings file.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The settings file could not be read.
    #[error("failed to read settings file {path}: {source}")]
    Read {
        /// Path of the settings file.
        path: PathBuf,
        /// Underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// The settings file could not be rewritten.
    #[error("failed to write settings file {path}: {source}")]
    Write {
        /// Path of the settings file.
        path: PathBuf,
        /// Underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// A setting holds a value that cannot be interpreted.
    #[error("invalid value for {key}: {reason}")]
    InvalidValue {
        /// The offending key.
        key: String,
        /// Why the value was rejected.
        reason: String,
    },

    /// A key is not a valid settings identifier.
    #[error("invalid settings key: {0:?}")]
    InvalidKey(String),
}

/// Result type alias for settings operations.
pub type Result<T> = std::result::Result<T, ConfigError>;
