//! Configuration file structures and loading

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use super::error::{ConfigError, Result};

/// Main configuration structure
#[derive(Debug, Serialize, Deserialize, Default, Clone, PartialEq)]
pub struct Config {
    /// Polling loop behaviour
    #[serde(default)]
    pub polling: PollingConfig,
    /// HTTP sender settings
    #[serde(default)]
    pub http: HttpConfig,
}

/// Polling loop configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PollingConfig {
    /// Delay between polls when the service sends no Retry-After hint
    #[serde(default = "default_polling_delay_ms")]
    pub polling_delay_ms: u64,

    /// Overall bound for waiting on one operation; 0 waits forever
    #[serde(default = "default_polling_timeout_secs")]
    pub polling_timeout_secs: u64,

    /// Transient polling failures tolerated before giving up
    #[serde(default = "default_retry_attempts")]
    pub retry_attempts: u32,

    /// Base delay after a transient polling failure
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,

    /// Cap for the attempt-indexed retry delay
    #[serde(default = "default_max_retry_delay_ms")]
    pub max_retry_delay_ms: u64,
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            polling_delay_ms: default_polling_delay_ms(),
            polling_timeout_secs: default_polling_timeout_secs(),
            retry_attempts: default_retry_attempts(),
            retry_delay_ms: default_retry_delay_ms(),
            max_retry_delay_ms: default_max_retry_delay_ms(),
        }
    }
}

impl PollingConfig {
    pub fn polling_delay(&self) -> Duration {
        Duration::from_millis(self.polling_delay_ms)
    }

    pub fn polling_timeout(&self) -> Option<Duration> {
        (self.polling_timeout_secs > 0).then(|| Duration::from_secs(self.polling_timeout_secs))
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }

    pub fn max_retry_delay(&self) -> Duration {
        Duration::from_millis(self.max_retry_delay_ms)
    }
}

/// HTTP sender configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HttpConfig {
    /// User agent sent with every request
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Per-request timeout
    #[serde(default)]
    pub timeout_secs: Option<u64>,

    /// Headers added to every request, e.g. `Authorization`
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            user_agent: default_user_agent(),
            timeout_secs: None,
            headers: BTreeMap::new(),
        }
    }
}

impl Config {
    /// Load configuration from the standard location
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path()?;
        Self::load_from_path(&config_path)
    }

    /// Load configuration from a specific path
    pub fn load_from_path(config_path: &Path) -> Result<Self> {
        if !config_path.exists() {
            return Ok(Config::default());
        }

        let content = fs::read_to_string(config_path).map_err(|e| ConfigError::LoadError {
            path: config_path.display().to_string(),
            source: e,
        })?;

        // Expand environment variables in the config content
        let expanded_content = Self::expand_env_vars(&content);

        let config: Config = toml::from_str(&expanded_content)?;

        Ok(config)
    }

    /// Save configuration to a specific path
    pub fn save_to_path(&self, config_path: &Path) -> Result<()> {
        // Create parent directories if they don't exist
        if let Some(parent) = config_path.parent() {
            fs::create_dir_all(parent).map_err(|e| ConfigError::SaveError {
                path: parent.display().to_string(),
                source: e,
            })?;
        }

        let content = toml::to_string_pretty(self)?;

        fs::write(config_path, content).map_err(|e| ConfigError::SaveError {
            path: config_path.display().to_string(),
            source: e,
        })?;

        Ok(())
    }

    /// Get the path to the configuration file
    pub fn config_path() -> Result<PathBuf> {
        let proj_dirs =
            ProjectDirs::from("io", "lroctl", "lroctl").ok_or(ConfigError::ConfigDirError)?;

        Ok(proj_dirs.config_dir().join("config.toml"))
    }

    /// Expand environment variables in configuration content
    ///
    /// Supports ${VAR} and ${VAR:-default} syntax. Unset variables without a
    /// default are left as written.
    fn expand_env_vars(content: &str) -> String {
        let expanded =
            shellexpand::env_with_context_no_errors(content, |var| std::env::var(var).ok());
        expanded.to_string()
    }
}

// Default value functions for serde
fn default_polling_delay_ms() -> u64 {
    60_000
}

fn default_polling_timeout_secs() -> u64 {
    15 * 60
}

fn default_retry_attempts() -> u32 {
    3
}

fn default_retry_delay_ms() -> u64 {
    30_000
}

fn default_max_retry_delay_ms() -> u64 {
    300_000
}

fn default_user_agent() -> String {
    concat!("lroctl/", env!("CARGO_PKG_VERSION")).to_string()
}
