//! Metric descriptions and sample gap statistics
//!
//! Counters and gauges are emitted where they happen (adaptors, manager,
//! channels); this module only describes them for the exporter and keeps
//! the in-memory statistics the `--watch` tap prints on exit.

use std::collections::BTreeMap;

use metrics::{describe_counter, describe_gauge, describe_histogram, histogram, Unit};

/// Register help text for every metric the daemon emits
pub fn describe_metrics() {
    describe_counter!("sensord_samples_total", "Samples committed to adaptor buffers");
    describe_counter!("sensord_fallback_events_total", "Synthetic fallback samples injected");
    describe_counter!("sensord_hal_events_total", "Events read from the platform HAL");
    describe_counter!("sensord_hal_poll_errors_total", "Failed HAL or binder polls");
    describe_counter!("sensord_hal_malformed_batches_total", "Event batches with malformed records");
    describe_counter!("sensord_binder_reconnects_total", "Reconnects after sensor service death");
    describe_counter!("sensord_wakelocks_total", "Wake locks taken for proximity events");
    describe_counter!("sensord_sysfs_poll_errors_total", "Failed poll calls on kernel sources");
    describe_counter!("sensord_channel_samples_total", "Samples delivered to sessions");
    describe_counter!("sensord_channel_duplicates_total", "Unchanged samples suppressed by channels");
    describe_counter!("sensord_channel_dropped_total", "Samples dropped on full session queues");
    describe_gauge!("sensord_adaptor_interval_ms", Unit::Milliseconds, "Arbitrated interval per adaptor");
    describe_gauge!("sensord_active_sessions", "Open client sessions");
    describe_histogram!("sensord_sample_gap_ms", Unit::Milliseconds, "Time between samples on a watched channel");
}

/// Record the time between two samples on a watched channel
pub fn record_sample_gap_ms(channel: &str, gap_ms: f64) {
    histogram!("sensord_sample_gap_ms", "channel" => channel.to_string()).record(gap_ms);
}

/// Online mean/variance of sample gaps (Welford's algorithm)
#[derive(Debug, Clone, Default)]
pub struct RunningStats {
    count: u64,
    mean: f64,
    m2: f64,
    min: f64,
    max: f64,
}

impl RunningStats {
    pub fn push(&mut self, value: f64) {
        self.count += 1;
        if self.count == 1 {
            self.min = value;
            self.max = value;
            self.mean = value;
            self.m2 = 0.0;
        } else {
            self.min = self.min.min(value);
            self.max = self.max.max(value);
            let delta = value - self.mean;
            self.mean += delta / self.count as f64;
            self.m2 += delta * (value - self.mean);
        }
    }

    pub fn count(&self) -> u64 {
        self.count
    }

    pub fn mean(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.mean
        }
    }

    pub fn variance(&self) -> f64 {
        if self.count < 2 {
            0.0
        } else {
            self.m2 / (self.count - 1) as f64
        }
    }

    pub fn std_dev(&self) -> f64 {
        self.variance().sqrt()
    }
}

/// Sample counts and gaps per watched channel
#[derive(Debug, Clone, Default)]
pub struct GapStats {
    channels: BTreeMap<String, (u64, Option<u64>, RunningStats)>,
}

impl GapStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Account one sample with its timestamp in microseconds
    pub fn record(&mut self, channel: &str, timestamp_us: u64) {
        let (samples, last, stats) = self.channels.entry(channel.to_string()).or_default();
        *samples += 1;
        if let Some(prev) = *last {
            let gap_ms = timestamp_us.saturating_sub(prev) as f64 / 1000.0;
            stats.push(gap_ms);
            record_sample_gap_ms(channel, gap_ms);
        }
        *last = Some(timestamp_us);
    }

    pub fn summary(&self) -> GapSummary {
        GapSummary {
            channels: self
                .channels
                .iter()
                .map(|(name, (samples, _, stats))| {
                    (
                        name.clone(),
                        ChannelGapSummary {
                            samples: *samples,
                            mean_gap_ms: stats.mean(),
                            std_dev_ms: stats.std_dev(),
                            min_gap_ms: if stats.count() > 0 { stats.min } else { 0.0 },
                            max_gap_ms: if stats.count() > 0 { stats.max } else { 0.0 },
                        },
                    )
                })
                .collect(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ChannelGapSummary {
    pub samples: u64,
    pub mean_gap_ms: f64,
    pub std_dev_ms: f64,
    pub min_gap_ms: f64,
    pub max_gap_ms: f64,
}

#[derive(Debug, Clone, Default)]
pub struct GapSummary {
    pub channels: BTreeMap<String, ChannelGapSummary>,
}

impl std::fmt::Display for GapSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "=== Watched Channels ===")?;
        if self.channels.is_empty() {
            return writeln!(f, "no samples");
        }
        for (name, s) in &self.channels {
            if s.samples < 2 {
                writeln!(f, "{name}: {} samples", s.samples)?;
            } else {
                writeln!(
                    f,
                    "{name}: {} samples, gap mean={:.1}ms std={:.1}ms min={:.1}ms max={:.1}ms",
                    s.samples, s.mean_gap_ms, s.std_dev_ms, s.min_gap_ms, s.max_gap_ms
                )?;
            }
        }
        Ok(())
    }
}
