//! `run` command implementation.

use std::time::Duration;

use anyhow::{Context, Result};
use observability::ObservabilityConfig;
use sensor_channels::SensorManager;
use tracing::{error, info, warn};

use super::load_config;
use crate::cli::{Cli, RunArgs};
use crate::daemon::Daemon;

/// Execute the `run` command
pub async fn run_daemon(cli: &Cli, args: &RunArgs) -> Result<()> {
    let mut config = load_config(&args.config)?;

    // Apply CLI overrides
    if let Some(backend) = args.backend {
        config.daemon.backend = backend.into();
    }
    if let Some(port) = args.metrics_port {
        config.daemon.metrics_port = (port != 0).then_some(port);
    }
    if let Some(format) = cli.log_format {
        config.daemon.log_format = format.into();
    }
    if let Some(level) = cli.level_override() {
        config.daemon.log_level = level.to_string();
    }

    observability::init_with_config(ObservabilityConfig::from_settings(&config.daemon))?;

    info!(
        version = env!("CARGO_PKG_VERSION"),
        backend = ?config.daemon.backend,
        adaptors = config.adaptors.len(),
        "sensord starting"
    );

    let daemon = Daemon::build(&config, &args.watch, args.watch_interval)
        .await
        .context("Failed to assemble daemon")?;

    let timeout = (args.timeout > 0).then(|| Duration::from_secs(args.timeout));
    serve_until_shutdown(daemon.manager(), timeout).await;

    info!("Shutting down...");
    match daemon.shutdown().await {
        Ok(summary) => {
            if !args.watch.is_empty() {
                print!("{summary}");
            }
        }
        Err(e) if e.is_fatal() => {
            error!(error = %e, "event reader did not stop, exiting");
            std::process::exit(1);
        }
        Err(e) => return Err(e).context("Shutdown failed"),
    }

    info!("sensord finished");
    Ok(())
}

/// Serve until SIGINT, SIGTERM or the optional timeout.
///
/// SIGUSR1 and SIGUSR2 switch the display state off and on.
async fn serve_until_shutdown(manager: &SensorManager, timeout: Option<Duration>) {
    let deadline = async {
        match timeout {
            Some(t) => tokio::time::sleep(t).await,
            None => std::future::pending::<()>().await,
        }
    };
    tokio::pin!(deadline);

    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        let mut terminate = install(signal(SignalKind::terminate()), "SIGTERM");
        let mut display_off = install(signal(SignalKind::user_defined1()), "SIGUSR1");
        let mut display_on = install(signal(SignalKind::user_defined2()), "SIGUSR2");

        loop {
            tokio::select! {
                res = tokio::signal::ctrl_c() => {
                    if let Err(e) = res {
                        warn!(error = %e, "Ctrl+C handler failed");
                    }
                    warn!("Received SIGINT");
                    break;
                }
                _ = recv_or_pending(&mut terminate) => {
                    warn!("Received SIGTERM");
                    break;
                }
                _ = recv_or_pending(&mut display_off) => manager.set_display_state(false),
                _ = recv_or_pending(&mut display_on) => manager.set_display_state(true),
                _ = &mut deadline => {
                    info!("Run timeout reached");
                    break;
                }
            }
        }
    }

    #[cfg(not(unix))]
    {
        let _ = manager;
        tokio::select! {
            _ = tokio::signal::ctrl_c() => warn!("Received Ctrl+C"),
            _ = &mut deadline => info!("Run timeout reached"),
        }
    }
}

#[cfg(unix)]
fn install(
    res: std::io::Result<tokio::signal::unix::Signal>,
    name: &'static str,
) -> Option<tokio::signal::unix::Signal> {
    res.map_err(|e| warn!(signal = name, error = %e, "failed to install signal handler"))
        .ok()
}

#[cfg(unix)]
async fn recv_or_pending(signal: &mut Option<tokio::signal::unix::Signal>) {
    if let Some(s) = signal {
        if s.recv().await.is_some() {
            return;
        }
    }
    std::future::pending::<()>().await
}
