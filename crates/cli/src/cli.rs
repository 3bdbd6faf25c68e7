//! CLI argument definitions using clap.

use clap::{Parser, Subcommand, ValueEnum};
use contracts::{BackendKind, LogFormatSetting};
use std::path::PathBuf;

/// sensord - sensor daemon serving hybris and kernel sensors to sessions
#[derive(Parser, Debug)]
#[command(
    name = "sensord",
    author,
    version,
    about = "Sensor abstraction daemon",
    long_about = "Wraps platform HAL sensors and Linux kernel sensor interfaces in device \n\
                  adaptors, arbitrates interval requests between sessions and fans samples \n\
                  out to per-session queues."
)]
pub struct Cli {
    /// Increase logging verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true, env = "SENSORD_VERBOSE")]
    pub verbose: u8,

    /// Suppress all output except warnings and errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Log output format, overrides `daemon.log_format`
    #[arg(long, value_enum, global = true, env = "SENSORD_LOG_FORMAT")]
    pub log_format: Option<LogFormat>,

    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    /// Level implied by `-v`/`-q`, `None` keeps the configured one
    pub fn level_override(&self) -> Option<&'static str> {
        if self.quiet {
            return Some("warn");
        }
        match self.verbose {
            0 => None,
            1 => Some("debug"),
            _ => Some("trace"),
        }
    }
}

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the daemon until SIGINT/SIGTERM
    Run(RunArgs),

    /// Validate configuration without starting anything
    Validate(ValidateArgs),

    /// Display configuration and, optionally, the adaptors it produces
    Info(InfoArgs),
}

/// Configuration file location shared by every command
#[derive(Parser, Debug, Clone)]
pub struct ConfigArgs {
    /// Primary configuration file (TOML or JSON)
    #[arg(short, long, default_value = "/etc/sensord.toml", env = "SENSORD_CONFIG")]
    pub config: PathBuf,

    /// Directory of config fragments applied before the primary file
    #[arg(long, env = "SENSORD_CONF_DIR")]
    pub conf_dir: Option<PathBuf>,
}

/// Arguments for the `run` command
#[derive(Parser, Debug, Clone)]
pub struct RunArgs {
    #[command(flatten)]
    pub config: ConfigArgs,

    /// Override the platform backend from configuration
    #[arg(long, value_enum, env = "SENSORD_BACKEND")]
    pub backend: Option<Backend>,

    /// Prometheus port, overrides `daemon.metrics_port` (0 = disabled)
    #[arg(long, env = "SENSORD_METRICS_PORT")]
    pub metrics_port: Option<u16>,

    /// Open a session on a channel and log its samples (repeatable)
    #[arg(long = "watch", value_name = "CHANNEL")]
    pub watch: Vec<String>,

    /// Interval requested by watch sessions in ms (0 = adaptor default)
    #[arg(long, default_value = "0", env = "SENSORD_WATCH_INTERVAL")]
    pub watch_interval: u32,

    /// Stop after this many seconds (0 = run until signalled)
    #[arg(long, default_value = "0", env = "SENSORD_TIMEOUT")]
    pub timeout: u64,
}

/// Arguments for the `validate` command
#[derive(Parser, Debug)]
pub struct ValidateArgs {
    #[command(flatten)]
    pub config: ConfigArgs,

    /// Output validation result as JSON
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the `info` command
#[derive(Parser, Debug)]
pub struct InfoArgs {
    #[command(flatten)]
    pub config: ConfigArgs,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,

    /// Build the adaptors and channels and report their state
    #[arg(long)]
    pub probe: bool,
}

/// Log output format
#[derive(ValueEnum, Clone, Copy, Debug)]
pub enum LogFormat {
    /// JSON structured logging
    Json,
    /// Human-readable pretty format
    Pretty,
    /// Compact single-line format
    Compact,
}

impl From<LogFormat> for LogFormatSetting {
    fn from(format: LogFormat) -> Self {
        match format {
            LogFormat::Json => Self::Json,
            LogFormat::Pretty => Self::Pretty,
            LogFormat::Compact => Self::Compact,
        }
    }
}

/// Platform backend selectable on the command line
#[derive(ValueEnum, Clone, Copy, Debug)]
pub enum Backend {
    Mock,
    BinderLoopback,
    Disabled,
}

impl From<Backend> for BackendKind {
    fn from(backend: Backend) -> Self {
        match backend {
            Backend::Mock => Self::Mock,
            Backend::BinderLoopback => Self::BinderLoopback,
            Backend::Disabled => Self::Disabled,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_run_with_watch() {
        let cli = Cli::try_parse_from([
            "sensord",
            "-v",
            "run",
            "--config",
            "/tmp/s.toml",
            "--backend",
            "binder-loopback",
            "--watch",
            "alssensor",
            "--watch",
            "proximitysensor",
        ])
        .unwrap();
        assert_eq!(cli.level_override(), Some("debug"));
        let Commands::Run(args) = cli.command else {
            panic!("expected run");
        };
        assert_eq!(args.config.config, PathBuf::from("/tmp/s.toml"));
        assert!(matches!(args.backend, Some(Backend::BinderLoopback)));
        assert_eq!(args.watch, vec!["alssensor", "proximitysensor"]);
    }

    #[test]
    fn test_quiet_conflicts_with_verbose() {
        assert!(Cli::try_parse_from(["sensord", "-q", "-v", "validate"]).is_err());
        let cli = Cli::try_parse_from(["sensord", "-q", "validate"]).unwrap();
        assert_eq!(cli.level_override(), Some("warn"));
    }
}
