use anyhow::Result;
use clap::Parser;
use lroctl_core::Config;
use tracing::{debug, info, trace};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

mod cli;
mod commands;
mod error;

use cli::{Cli, Commands, ConfigCommands};
use error::CliError;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_tracing(cli.verbose);

    let config = match &cli.config_file {
        Some(path) => {
            debug!("Loading config from explicit path: {:?}", path);
            Config::load_from_path(path)?
        }
        None => {
            debug!("Loading config from default location");
            Config::load()?
        }
    };

    if let Err(e) = execute_command(&cli, &config).await {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }

    Ok(())
}

fn init_tracing(verbose: u8) {
    // RUST_LOG wins over the verbosity flag
    let filter = if std::env::var("RUST_LOG").is_ok() {
        tracing_subscriber::EnvFilter::from_default_env()
    } else {
        let level = match verbose {
            0 => "lroctl=warn,lroctl_core=warn",
            1 => "lroctl=info,lroctl_core=info",
            2 => "lroctl=debug,lroctl_core=debug",
            _ => "lroctl=trace,lroctl_core=trace",
        };
        tracing_subscriber::EnvFilter::new(level)
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(true)
                .with_thread_ids(false)
                .with_thread_names(false)
                .compact(),
        )
        .init();

    debug!("Tracing initialized with verbosity level: {}", verbose);
}

async fn execute_command(cli: &Cli, config: &Config) -> Result<(), CliError> {
    trace!("Executing command: {:?}", cli.command);

    let start = std::time::Instant::now();
    let result = match &cli.command {
        Commands::Status { file } => commands::operation::handle_status(file),
        Commands::Wait {
            file,
            timeout_secs,
            no_save,
        } => commands::operation::handle_wait(config, file, *timeout_secs, *no_save).await,
        Commands::Result { file } => commands::operation::handle_result(config, file).await,
        Commands::Config(ConfigCommands::Path) => {
            commands::config::handle_path(cli.config_file.as_deref())
        }
        Commands::Config(ConfigCommands::Show) => {
            commands::config::handle_show(config, cli.config_file.clone())
        }
    };

    let duration = start.elapsed();
    match &result {
        Ok(_) => info!("Command completed successfully in {:?}", duration),
        Err(e) => info!("Command failed after {:?}: {}", duration, e),
    }

    result
}
