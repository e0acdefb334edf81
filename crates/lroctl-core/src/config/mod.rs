//! Configuration for polling behaviour and the HTTP sender
//!
//! Settings live in a TOML file at the platform config location. Values may
//! reference environment variables with `${VAR}` or `${VAR:-default}`,
//! which keeps tokens out of the file itself.

#![allow(clippy::module_inception)]

pub mod config;
pub mod error;

// Re-export main types for convenience
pub use config::{Config, HttpConfig, PollingConfig};
pub use error::{ConfigError, Result};
