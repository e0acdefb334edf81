//! Error types for lroctl

use lroctl_core::LroError;
use lroctl_core::config::ConfigError;
use thiserror::Error;

/// Main error type for the lroctl application
#[derive(Error, Debug)]
pub enum CliError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Failed to read state file {path}: {source}")]
    ReadState {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write state file {path}: {source}")]
    WriteState {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid state file {path}: {source}")]
    InvalidState {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Failed to encode output: {0}")]
    Encode(String),

    #[error(transparent)]
    Operation(#[from] LroError),
}

pub type Result<T> = std::result::Result<T, CliError>;
