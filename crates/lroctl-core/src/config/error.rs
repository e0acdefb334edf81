//! Error types for configuration operations

use thiserror::Error;

/// Errors that can occur during configuration operations
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to load config from {path}: {source}")]
    LoadError {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to save config to {path}: {source}")]
    SaveError {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Failed to serialize config: {0}")]
    SerializeError(#[from] toml::ser::Error),

    #[error("Invalid header '{name}' in http configuration")]
    InvalidHeader { name: String },

    #[error("Failed to build HTTP client: {0}")]
    ClientError(#[from] reqwest::Error),

    #[error("Failed to determine config directory")]
    ConfigDirError,
}

/// Result type for configuration operations
pub type Result<T> = std::result::Result<T, ConfigError>;
