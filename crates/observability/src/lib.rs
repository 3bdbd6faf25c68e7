//! # Observability
//!
//! Tracing and Prometheus metrics for the daemon.
//!
//! ## Features
//!
//! - Tracing subscriber (JSON/Pretty/Compact), `RUST_LOG` overrides the
//!   configured level
//! - Prometheus exporter on an optional port
//! - Metric descriptions and per-channel sample gap statistics
//!
//! ## Usage Example
//!
//! ```ignore
//! let config = ObservabilityConfig::from_settings(&daemon_config.daemon);
//! observability::init_with_config(config)?;
//! ```

pub mod metrics;

use anyhow::{Context, Result};
use contracts::{DaemonSettings, LogFormatSetting};
use metrics_exporter_prometheus::PrometheusBuilder;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

pub use crate::metrics::{describe_metrics, record_sample_gap_ms, GapStats, GapSummary};

/// Observability configuration
#[derive(Debug, Clone)]
pub struct ObservabilityConfig {
    pub log_format: LogFormat,
    /// Prometheus port (None = disabled)
    pub metrics_port: Option<u16>,
    /// Level used when `RUST_LOG` is unset
    pub default_log_level: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_format: LogFormat::Pretty,
            metrics_port: None,
            default_log_level: "info".to_string(),
        }
    }
}

impl ObservabilityConfig {
    pub fn from_settings(settings: &DaemonSettings) -> Self {
        Self {
            log_format: settings.log_format.into(),
            metrics_port: settings.metrics_port,
            default_log_level: settings.log_level.clone(),
        }
    }
}

/// Log output format
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    Json,
    #[default]
    Pretty,
    Compact,
}

impl From<LogFormatSetting> for LogFormat {
    fn from(setting: LogFormatSetting) -> Self {
        match setting {
            LogFormatSetting::Json => Self::Json,
            LogFormatSetting::Pretty => Self::Pretty,
            LogFormatSetting::Compact => Self::Compact,
        }
    }
}

/// Install the tracing subscriber and, if configured, the Prometheus exporter
pub fn init_with_config(config: ObservabilityConfig) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.default_log_level));

    match config.log_format {
        LogFormat::Json => {
            let fmt_layer = fmt::layer()
                .json()
                .with_target(true)
                .with_thread_ids(true)
                .with_thread_names(true)
                .with_file(true)
                .with_line_number(true);

            tracing_subscriber::registry()
                .with(filter)
                .with(fmt_layer)
                .try_init()
                .context("Failed to initialize tracing subscriber")?;
        }
        LogFormat::Pretty => {
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt::layer().pretty().with_thread_names(true))
                .try_init()
                .context("Failed to initialize tracing subscriber")?;
        }
        LogFormat::Compact => {
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt::layer().compact())
                .try_init()
                .context("Failed to initialize tracing subscriber")?;
        }
    }

    if let Some(port) = config.metrics_port {
        PrometheusBuilder::new()
            .with_http_listener(([0, 0, 0, 0], port))
            .install()
            .context("Failed to install Prometheus recorder")?;
        describe_metrics();
        tracing::info!(port, "Prometheus metrics endpoint initialized");
    }

    tracing::info!(
        log_format = ?config.log_format,
        metrics_port = ?config.metrics_port,
        "Observability initialized"
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ObservabilityConfig::default();
        assert_eq!(config.metrics_port, None);
        assert_eq!(config.default_log_level, "info");
    }

    #[test]
    fn test_from_daemon_settings() {
        let settings = DaemonSettings {
            log_level: "debug".into(),
            log_format: LogFormatSetting::Json,
            metrics_port: Some(9464),
            ..DaemonSettings::default()
        };
        let config = ObservabilityConfig::from_settings(&settings);
        assert_eq!(config.log_format, LogFormat::Json);
        assert_eq!(config.metrics_port, Some(9464));
        assert_eq!(config.default_log_level, "debug");
    }
}
