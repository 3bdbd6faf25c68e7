//! # sensord
//!
//! Sensor daemon entry point.
//!
//! Provides:
//! - Configuration loading (primary file plus `conf.d` fragments) and validation
//! - Backend, adaptor and channel assembly
//! - Graceful shutdown with display-state signals

mod cli;
mod commands;
mod daemon;
mod error;

use anyhow::Result;
use clap::Parser;
use observability::ObservabilityConfig;

use cli::{Cli, Commands};
use commands::{run_daemon, run_info, run_validate};

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    // `run` initializes logging itself once the config is known
    if !matches!(cli.command, Commands::Run(_)) {
        init_tool_logging(&cli)?;
    }

    let result = match &cli.command {
        Commands::Run(args) => run_daemon(&cli, args).await,
        Commands::Validate(args) => run_validate(args),
        Commands::Info(args) => run_info(args).await,
    };

    if let Err(ref e) = result {
        tracing::error!(error = %e, "Command failed");
    }

    result
}

/// Logging for the one-shot commands: warnings only unless asked for more
fn init_tool_logging(cli: &Cli) -> Result<()> {
    let mut config = ObservabilityConfig {
        default_log_level: cli.level_override().unwrap_or("warn").to_string(),
        ..ObservabilityConfig::default()
    };
    if let Some(format) = cli.log_format {
        config.log_format = contracts::LogFormatSetting::from(format).into();
    }
    observability::init_with_config(config)
}
