//! config path and show commands

use lroctl_core::Config;
use std::path::{Path, PathBuf};

use crate::error::{CliError, Result};

const REDACTED: &str = "********";

pub fn handle_path(explicit: Option<&Path>) -> Result<()> {
    let path = match explicit {
        Some(path) => path.to_path_buf(),
        None => Config::config_path()?,
    };
    println!("{}", path.display());
    Ok(())
}

/// Print the effective configuration with header values masked
pub fn handle_show(config: &Config, source: Option<PathBuf>) -> Result<()> {
    let mut shown = config.clone();
    for value in shown.http.headers.values_mut() {
        *value = REDACTED.to_string();
    }

    if let Some(path) = source {
        println!("# {}", path.display());
    }
    let text = toml::to_string_pretty(&shown).map_err(|e| CliError::Encode(e.to_string()))?;
    print!("{text}");
    Ok(())
}
