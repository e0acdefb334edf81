//! CLI structure and command definitions

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Inspect and drive long-running control-plane operations
#[derive(Parser, Debug)]
#[command(name = "lroctl")]
#[command(version, about = "Track long-running control-plane operations")]
#[command(long_about = "
Track long-running control-plane operations

Operations are stored as JSON state files, the same document a provider
writes when it serializes an in-flight operation handle.

EXAMPLES:
    # Show where an operation stands without touching the network
    lroctl status ./pool-a-scale.json

    # Keep polling until it finishes, saving progress back to the file
    lroctl wait ./pool-a-scale.json --timeout-secs 600

    # Fetch the finished resource
    lroctl result ./pool-a-scale.json

    # Show the effective configuration
    lroctl config show
")]
pub struct Cli {
    /// Path to alternate configuration file
    #[arg(long, global = true, env = "LROCTL_CONFIG_FILE")]
    pub config_file: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(long, short, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Print the recorded state of an operation
    Status {
        /// Operation state file
        file: PathBuf,
    },

    /// Poll an operation until it reaches a terminal state
    Wait {
        /// Operation state file
        file: PathBuf,

        /// Overall timeout, overriding the configured polling timeout
        #[arg(long)]
        timeout_secs: Option<u64>,

        /// Do not write the updated state back to the file
        #[arg(long)]
        no_save: bool,
    },

    /// Fetch the resource produced by a finished operation
    Result {
        /// Operation state file
        file: PathBuf,
    },

    /// Configuration management
    #[command(subcommand)]
    Config(ConfigCommands),
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommands {
    /// Print the configuration file path
    Path,
    /// Print the effective configuration
    Show,
}
