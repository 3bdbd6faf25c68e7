//! `--watch` taps: a session per watched channel that logs its samples

use std::collections::BTreeSet;
use std::sync::Arc;

use contracts::{SensorRecord, SessionId};
use observability::{GapStats, GapSummary};
use parking_lot::Mutex;
use sensor_channels::{ChannelControl, SensorChannel, SensorManager};
use tokio::task::JoinHandle;
use tracing::{info, warn};

use super::registry::ChannelVisitor;

/// Opens sessions on watched channels as they are loaded
pub struct Watcher {
    manager: Arc<SensorManager>,
    wanted: BTreeSet<String>,
    interval_ms: u32,
    stats: Arc<Mutex<GapStats>>,
    taps: Vec<(SessionId, JoinHandle<()>)>,
}

impl Watcher {
    pub fn new(manager: Arc<SensorManager>, channels: &[String], interval_ms: u32) -> Self {
        Self {
            manager,
            wanted: channels.iter().cloned().collect(),
            interval_ms,
            stats: Arc::new(Mutex::new(GapStats::new())),
            taps: Vec::new(),
        }
    }

    /// Watched channels that were never loaded
    pub fn missing(&self) -> Vec<String> {
        self.wanted
            .iter()
            .filter(|name| self.manager.channel(name).is_none())
            .cloned()
            .collect()
    }

    pub fn tap_count(&self) -> usize {
        self.taps.len()
    }

    /// Stop every tap and close its session
    pub fn finish(self) -> GapSummary {
        for (session, task) in self.taps {
            task.abort();
            if let Err(e) = self.manager.close_session(session) {
                warn!(%session, error = %e, "failed to close watch session");
            }
        }
        let summary = self.stats.lock().summary();
        summary
    }

    fn open<T: SensorRecord>(&mut self, channel: &Arc<SensorChannel<T>>) -> contracts::Result<()> {
        let name = channel.name().to_string();
        let session = self.manager.open_session(&name)?;
        let mut rx = channel.subscribe_default(session);
        if self.interval_ms > 0 {
            self.manager.set_interval(session, self.interval_ms)?;
        }
        self.manager.start(session)?;

        let stats = Arc::clone(&self.stats);
        let task = tokio::spawn(async move {
            while let Some(sample) = rx.recv().await {
                stats.lock().record(&name, sample.timestamp());
                info!(channel = %name, %session, ?sample, "sample");
            }
        });
        info!(channel = %channel.name(), %session, "watch session started");
        self.taps.push((session, task));
        Ok(())
    }
}

impl ChannelVisitor for Watcher {
    fn visit<T: SensorRecord>(&mut self, channel: &Arc<SensorChannel<T>>) {
        if !self.wanted.contains(channel.name().as_str()) {
            return;
        }
        if let Err(e) = self.open(channel) {
            warn!(channel = %channel.name(), error = %e, "failed to open watch session");
        }
    }
}
