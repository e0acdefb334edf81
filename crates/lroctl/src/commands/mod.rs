//! Command implementations

pub mod config;
pub mod operation;

use lroctl_core::OperationHandle;
use std::fs;
use std::path::Path;

use crate::error::{CliError, Result};

/// Resume an operation from its JSON state file
pub fn load_state(path: &Path) -> Result<OperationHandle> {
    let content = fs::read_to_string(path).map_err(|e| CliError::ReadState {
        path: path.display().to_string(),
        source: e,
    })?;
    serde_json::from_str(&content).map_err(|e| CliError::InvalidState {
        path: path.display().to_string(),
        source: e,
    })
}

/// Write an operation's state back to its file
pub fn save_state(path: &Path, op: &OperationHandle) -> Result<()> {
    let content = serde_json::to_string_pretty(op).map_err(|e| CliError::Encode(e.to_string()))?;
    fs::write(path, content + "\n").map_err(|e| CliError::WriteState {
        path: path.display().to_string(),
        source: e,
    })
}

pub fn print_json(value: &serde_json::Value) -> Result<()> {
    let text = serde_json::to_string_pretty(value).map_err(|e| CliError::Encode(e.to_string()))?;
    println!("{text}");
    Ok(())
}
