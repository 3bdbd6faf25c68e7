//! Daemon composition root.
//!
//! Builds the platform backend, every configured adaptor and its default
//! channel, then serves until shutdown is requested.

mod backend;
mod registry;
mod watch;

use std::sync::Arc;

use adaptor_core::DeviceAdaptor;
use contracts::{AdaptorKind, DaemonConfig};
use observability::GapSummary;
use sensor_channels::{ChannelInfo, SensorManager};
use serde::Serialize;
use tracing::{info, instrument, warn};

pub use backend::Backend;
pub use registry::{build_adaptor, default_channel_name, load_default_channel, ChannelVisitor};
pub use watch::Watcher;

use crate::error::{CliError, Result};

/// Adaptor state as reported by `info --probe` and at startup
#[derive(Debug, Clone, Serialize)]
pub struct AdaptorReport {
    pub name: String,
    pub kind: AdaptorKind,
    pub description: String,
    pub valid: bool,
    pub channel: Option<String>,
}

/// Assembled daemon
pub struct Daemon {
    manager: Arc<SensorManager>,
    backend: Backend,
    adaptors: Vec<AdaptorReport>,
    watcher: Option<Watcher>,
}

impl Daemon {
    /// Start the backend, register every configured adaptor and load its
    /// default channel.
    ///
    /// Adaptors whose hardware is missing stay registered but get no
    /// channel; `watch` lists channels to tap after loading.
    #[instrument(name = "daemon_build", skip_all, fields(backend = ?config.daemon.backend))]
    pub async fn build(config: &DaemonConfig, watch: &[String], watch_interval_ms: u32) -> Result<Self> {
        let backend = Backend::start(config.daemon.backend, &config.daemon).await?;
        let manager = Arc::new(SensorManager::new());
        let mut watcher = Watcher::new(Arc::clone(&manager), watch, watch_interval_ms);
        let mut adaptors = Vec::with_capacity(config.adaptors.len());

        for (name, kind) in &config.adaptors {
            let adaptor = match build_adaptor(name, *kind, config, backend.hybris()) {
                Ok(adaptor) => adaptor,
                Err(e @ CliError::BackendUnavailable { .. }) => {
                    warn!(adaptor = %name, error = %e, "adaptor skipped");
                    continue;
                }
                Err(e) => return Err(e),
            };
            let mut report = AdaptorReport {
                name: name.clone(),
                kind: *kind,
                description: adaptor.core().description(),
                valid: adaptor.is_valid(),
                channel: None,
            };
            manager.register_adaptor(adaptor);
            if report.valid {
                match load_default_channel(&manager, name, *kind, &mut watcher) {
                    Ok(channel) => report.channel = Some(channel),
                    Err(e) => warn!(adaptor = %name, error = %e, "channel not loaded"),
                }
            }
            adaptors.push(report);
        }

        if let Some(name) = watcher.missing().into_iter().next() {
            let daemon = Self {
                manager,
                backend,
                adaptors,
                watcher: Some(watcher),
            };
            daemon.shutdown().await?;
            return Err(CliError::unknown_channel(name));
        }

        info!(
            adaptors = adaptors.len(),
            valid = adaptors.iter().filter(|a| a.valid).count(),
            channels = manager.channel_infos().len(),
            watched = watcher.tap_count(),
            "daemon assembled"
        );
        Ok(Self {
            manager,
            backend,
            adaptors,
            watcher: Some(watcher),
        })
    }

    pub fn manager(&self) -> &Arc<SensorManager> {
        &self.manager
    }

    pub fn backend(&self) -> &Backend {
        &self.backend
    }

    pub fn adaptors(&self) -> &[AdaptorReport] {
        &self.adaptors
    }

    pub fn channels(&self) -> Vec<ChannelInfo> {
        self.manager.channel_infos()
    }

    /// Close watch sessions, unload every channel and stop the backend.
    ///
    /// Returns the watch statistics; a stuck reader thread is reported as
    /// a fatal error.
    #[instrument(name = "daemon_shutdown", skip(self))]
    pub async fn shutdown(mut self) -> Result<GapSummary> {
        let summary = self.watcher.take().map(Watcher::finish).unwrap_or_default();
        self.manager.shutdown();
        self.backend.stop().await?;
        info!("daemon stopped");
        Ok(summary)
    }
}
