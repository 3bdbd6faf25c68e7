//! `info` command implementation.

use anyhow::{Context, Result};
use contracts::DaemonConfig;
use sensor_channels::ChannelInfo;
use serde::Serialize;
use tracing::info;

use super::load_config;
use crate::cli::InfoArgs;
use crate::daemon::{default_channel_name, AdaptorReport, Daemon};

/// Configuration and probe result for JSON output
#[derive(Serialize)]
struct DaemonInfo<'a> {
    config: &'a DaemonConfig,
    #[serde(skip_serializing_if = "Option::is_none")]
    adaptors: Option<Vec<AdaptorReport>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    channels: Option<Vec<ChannelInfo>>,
}

/// Execute the `info` command
pub async fn run_info(args: &InfoArgs) -> Result<()> {
    let config = load_config(&args.config)?;

    let (adaptors, channels) = if args.probe {
        info!("Probing adaptors");
        let daemon = Daemon::build(&config, &[], 0).await.context("Failed to assemble daemon")?;
        let adaptors = daemon.adaptors().to_vec();
        let channels = daemon.channels();
        daemon.shutdown().await.context("Shutdown after probe failed")?;
        (Some(adaptors), Some(channels))
    } else {
        (None, None)
    };

    let report = DaemonInfo {
        config: &config,
        adaptors,
        channels,
    };
    if args.json {
        let json = serde_json::to_string_pretty(&report).context("Failed to serialize daemon info")?;
        println!("{json}");
    } else {
        print_info(&report);
    }
    Ok(())
}

fn print_info(report: &DaemonInfo<'_>) {
    let daemon = &report.config.daemon;
    println!("\n=== Daemon ===\n");
    println!("  Backend: {:?}", daemon.backend);
    println!("  Log: {} ({:?})", daemon.log_level, daemon.log_format);
    match daemon.metrics_port {
        Some(port) => println!("  Metrics: :{port}"),
        None => println!("  Metrics: disabled"),
    }

    println!("\n=== Adaptors ({}) ===\n", report.config.adaptors.len());
    match &report.adaptors {
        Some(adaptors) => {
            for a in adaptors {
                let state = if a.valid { "ok" } else { "unavailable" };
                let channel = a.channel.as_deref().unwrap_or("-");
                println!("  - {} ({:?}) [{state}] {} -> {channel}", a.name, a.kind, a.description);
            }
        }
        None => {
            for (name, kind) in &report.config.adaptors {
                println!("  - {name} ({kind:?}) -> {}", default_channel_name(name));
            }
        }
    }

    if let Some(channels) = &report.channels {
        println!("\n=== Channels ({}) ===\n", channels.len());
        for c in channels {
            println!(
                "  - {} on {}/{}: interval {}ms, {} ranges",
                c.name,
                c.adaptor,
                c.output,
                c.interval_ms,
                c.data_ranges.len()
            );
        }
    }

    if !report.config.sensors.is_empty() {
        println!("\n=== Sensor settings ===\n");
        for (group, settings) in &report.config.sensors {
            println!("  [{group}] {settings:?}");
        }
    }
    println!();
}
