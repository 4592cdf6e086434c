//! CLI error types.

use gantry_api::ApiError;
use gantry_config::ConfigError;
use thiserror::Error;

/// CLI-specific errors.
#[derive(Debug, Error)]
pub enum CliError {
    /// Management API call failed.
    #[error(transparent)]
    Api(#[from] ApiError),

    /// Settings file could not be read or written.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The container tool failed.
    #[error("stack error: {0}")]
    Stack(String),

    /// The operator declined a confirmation prompt.
    #[error("cancelled by user")]
    Cancelled,

    /// Invalid argument.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Output formatting error.
    #[error("format error: {0}")]
    Format(String),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
