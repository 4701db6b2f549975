//! Scanwarden CLI library
//!
//! The `scanwarden` binary is a thin wrapper around [`run`]. Keeping the
//! handlers in a library lets integration tests drive them directly.

pub mod cli;
pub mod commands;
pub mod error;
pub mod logging;
pub mod metrics_server;
pub mod output;

use std::path::Path;

use scanwarden_core::config::ScanwardenConfig;

use crate::cli::{Cli, Commands};
use crate::error::CliError;
use crate::output::OutputWriter;

/// Dispatch a parsed command line.
///
/// Configuration is loaded (file + env overrides + defaults) and logging is
/// initialised before the subcommand runs.
pub async fn run(cli: Cli) -> Result<(), CliError> {
    let Cli {
        config: config_path,
        log_level,
        output,
        command,
    } = cli;
    let writer = OutputWriter::new(output);

    match command {
        Commands::Scan(args) => {
            let config = setup(&config_path, log_level.as_deref()).await?;
            if config.metrics.enabled {
                metrics_server::install_metrics_recorder(&config.metrics)?;
            }
            commands::scan::execute(args, &config, &writer).await
        }
        Commands::Command(args) => {
            let config = setup(&config_path, log_level.as_deref()).await?;
            commands::command::execute(args, &config, &writer)
        }
        Commands::Parse(args) => {
            let config = setup(&config_path, log_level.as_deref()).await?;
            commands::parse::execute(args, &config, &writer).await
        }
        Commands::Config(args) => {
            // validate reports load errors itself; fall back to default logging
            let general = ScanwardenConfig::load_or_default(&config_path)
                .await
                .map(|config| config.general)
                .unwrap_or_default();
            logging::init_tracing(&general, log_level.as_deref())?;
            commands::config::execute(args, &config_path, &writer).await
        }
    }
}

async fn setup(config_path: &Path, log_level: Option<&str>) -> Result<ScanwardenConfig, CliError> {
    let config = ScanwardenConfig::load_or_default(config_path)
        .await
        .map_err(|e| CliError::Config(e.to_string()))?;
    logging::init_tracing(&config.general, log_level)?;
    tracing::debug!(path = %config_path.display(), "configuration loaded");
    Ok(config)
}
