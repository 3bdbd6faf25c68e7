//! SensorChannel - one logical sensor over an adaptor output
//!
//! A channel owns a reader on the adaptor's ring buffer while at least one
//! session has it started, drops values equal to the last published one and
//! fans records out to per-session queues. Slow sessions lose samples; the
//! producer is never blocked.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use adaptor_core::{BufferReader, DeviceAdaptor, RingBuffer};
use contracts::{DataRange, Result, SensorError, SensorName, SensorRecord, SessionId};
use metrics::counter;
use parking_lot::Mutex;
use serde::Serialize;
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, warn};

/// Per-session queue depth used by [`SensorChannel::subscribe_default`]
pub const DEFAULT_SESSION_QUEUE: usize = 32;

/// Snapshot of a channel for status output
#[derive(Debug, Clone, Serialize)]
pub struct ChannelInfo {
    pub name: String,
    pub description: String,
    pub adaptor: String,
    pub output: String,
    pub running: bool,
    pub active_sessions: usize,
    pub interval_ms: u32,
    pub data_ranges: Vec<DataRange>,
    pub intervals: Vec<DataRange>,
}

/// Session-facing control surface shared by channels of every record type
pub trait ChannelControl: Send + Sync {
    fn name(&self) -> &SensorName;

    fn adaptor_name(&self) -> &SensorName;

    fn info(&self) -> ChannelInfo;

    /// Start delivery to `session`; the first active session starts the adaptor
    fn start(&self, session: SessionId) -> bool;

    /// Stop delivery to `session`; `false` if it was not started
    fn stop(&self, session: SessionId) -> bool;

    fn set_interval(&self, session: SessionId, interval_ms: u32) -> bool;

    fn set_standby_override(&self, session: SessionId, value: bool) -> bool;

    fn request_data_range(&self, session: SessionId, range: DataRange) -> bool;

    /// Stop the session and drop everything it requested
    fn remove_session(&self, session: SessionId);

    /// Stop every session and the buffer reader
    fn shutdown(&self);
}

struct Fanout<T> {
    subscribers: BTreeMap<SessionId, mpsc::Sender<T>>,
    active: BTreeSet<SessionId>,
    last: Option<T>,
}

impl<T: SensorRecord> Fanout<T> {
    fn publish(&mut self, channel: &SensorName, record: T, dedup: bool) {
        if dedup && self.last.as_ref().is_some_and(|last| last.same_value(&record)) {
            counter!("sensord_channel_duplicates_total", "channel" => channel.to_string()).increment(1);
            return;
        }
        self.last = Some(record.clone());
        for session in &self.active {
            let Some(tx) = self.subscribers.get(session) else {
                continue;
            };
            match tx.try_send(record.clone()) {
                Ok(()) => {
                    counter!("sensord_channel_samples_total", "channel" => channel.to_string()).increment(1);
                }
                Err(mpsc::error::TrySendError::Full(_)) => {
                    counter!("sensord_channel_dropped_total", "channel" => channel.to_string()).increment(1);
                    warn!(channel = %channel, %session, "session queue full, sample dropped");
                }
                Err(mpsc::error::TrySendError::Closed(_)) => {
                    debug!(channel = %channel, %session, "session receiver gone");
                }
            }
        }
    }
}

async fn pump<T: SensorRecord>(channel: SensorName, mut reader: BufferReader<T>, fanout: Arc<Mutex<Fanout<T>>>, dedup: bool) {
    debug!(channel = %channel, "channel reader started");
    while reader.wait().await {
        let records = reader.read();
        let mut fanout = fanout.lock();
        for record in records {
            fanout.publish(&channel, record, dedup);
        }
    }
    debug!(channel = %channel, "channel reader finished");
}

/// Logical sensor publishing records of type `T`
pub struct SensorChannel<T: SensorRecord> {
    name: SensorName,
    description: String,
    output: String,
    adaptor: Arc<dyn DeviceAdaptor>,
    buffer: Arc<RingBuffer<T>>,
    dedup: bool,
    runtime: Handle,
    fanout: Arc<Mutex<Fanout<T>>>,
    reader_task: Mutex<Option<JoinHandle<()>>>,
}

impl<T: SensorRecord> SensorChannel<T> {
    /// Attach to `output` of `adaptor`, or its primary output when `None`.
    ///
    /// Fails when the output does not exist or carries another record type.
    pub fn new(
        name: impl Into<SensorName>,
        adaptor: Arc<dyn DeviceAdaptor>,
        output: Option<&str>,
        runtime: Handle,
    ) -> Result<Self> {
        let name = name.into();
        let core = adaptor.core();
        let entry = match output {
            Some(output) => core.adapted_sensor(output),
            None => core.primary_entry(),
        }
        .ok_or_else(|| SensorError::adaptor_invalid(adaptor.name(), format!("no output for channel '{name}'")))?;
        let buffer = entry
            .buffer::<T>()
            .ok_or_else(|| SensorError::adaptor_invalid(adaptor.name(), format!("record type mismatch for '{}'", entry.name())))?;

        Ok(Self {
            description: entry.description().to_string(),
            output: entry.name().to_string(),
            name,
            adaptor,
            buffer,
            dedup: true,
            runtime,
            fanout: Arc::new(Mutex::new(Fanout {
                subscribers: BTreeMap::new(),
                active: BTreeSet::new(),
                last: None,
            })),
            reader_task: Mutex::new(None),
        })
    }

    /// Publish every record, even when unchanged
    pub fn without_dedup(mut self) -> Self {
        self.dedup = false;
        self
    }

    pub fn adaptor(&self) -> &Arc<dyn DeviceAdaptor> {
        &self.adaptor
    }

    /// Register the queue `session` receives records on.
    ///
    /// Records only flow while the session is started.
    pub fn subscribe(&self, session: SessionId, capacity: usize) -> mpsc::Receiver<T> {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        self.fanout.lock().subscribers.insert(session, tx);
        rx
    }

    pub fn subscribe_default(&self, session: SessionId) -> mpsc::Receiver<T> {
        self.subscribe(session, DEFAULT_SESSION_QUEUE)
    }

    /// Last record published to sessions
    pub fn latest(&self) -> Option<T> {
        self.fanout.lock().last.clone()
    }

    pub fn active_sessions(&self) -> Vec<SessionId> {
        self.fanout.lock().active.iter().copied().collect()
    }

    fn start_reader(&self) {
        // Positioned before the adaptor starts so a fallback sample injected
        // during start is not missed
        let reader = self.buffer.reader();
        self.fanout.lock().last = None;
        let task = self
            .runtime
            .spawn(pump(self.name.clone(), reader, Arc::clone(&self.fanout), self.dedup));
        if let Some(old) = self.reader_task.lock().replace(task) {
            old.abort();
        }
    }

    fn stop_reader(&self) {
        if let Some(task) = self.reader_task.lock().take() {
            task.abort();
        }
    }
}

impl<T: SensorRecord> ChannelControl for SensorChannel<T> {
    fn name(&self) -> &SensorName {
        &self.name
    }

    fn adaptor_name(&self) -> &SensorName {
        self.adaptor.core().name()
    }

    fn info(&self) -> ChannelInfo {
        let core = self.adaptor.core();
        ChannelInfo {
            name: self.name.to_string(),
            description: self.description.clone(),
            adaptor: core.name().to_string(),
            output: self.output.clone(),
            running: self.adaptor.is_running(),
            active_sessions: self.fanout.lock().active.len(),
            interval_ms: self.adaptor.interval(),
            data_ranges: core.available_data_ranges(),
            intervals: core.available_intervals(),
        }
    }

    #[instrument(name = "channel_start", skip(self), fields(channel = %self.name))]
    fn start(&self, session: SessionId) -> bool {
        let first = {
            let mut fanout = self.fanout.lock();
            let was_idle = fanout.active.is_empty();
            if !fanout.active.insert(session) {
                debug!("session already started");
                return true;
            }
            was_idle
        };
        if !first {
            return true;
        }

        self.start_reader();
        if !self.adaptor.start_sensor() {
            warn!(adaptor = %self.adaptor.name(), "adaptor refused to start");
            self.stop_reader();
            self.fanout.lock().active.remove(&session);
            return false;
        }
        info!(adaptor = %self.adaptor.name(), "channel started");
        true
    }

    #[instrument(name = "channel_stop", skip(self), fields(channel = %self.name))]
    fn stop(&self, session: SessionId) -> bool {
        let now_idle = {
            let mut fanout = self.fanout.lock();
            if !fanout.active.remove(&session) {
                return false;
            }
            fanout.active.is_empty()
        };
        if now_idle {
            self.adaptor.stop_sensor();
            self.stop_reader();
            info!(adaptor = %self.adaptor.name(), "channel stopped");
        }
        true
    }

    fn set_interval(&self, session: SessionId, interval_ms: u32) -> bool {
        self.adaptor.set_interval(interval_ms, session)
    }

    fn set_standby_override(&self, session: SessionId, value: bool) -> bool {
        self.adaptor.set_standby_override(session, value)
    }

    fn request_data_range(&self, session: SessionId, range: DataRange) -> bool {
        self.adaptor.request_data_range(session, range)
    }

    fn remove_session(&self, session: SessionId) {
        self.stop(session);
        self.fanout.lock().subscribers.remove(&session);
        self.adaptor.remove_session(session);
    }

    fn shutdown(&self) {
        let was_active = {
            let mut fanout = self.fanout.lock();
            let was_active = !fanout.active.is_empty();
            fanout.active.clear();
            fanout.subscribers.clear();
            was_active
        };
        if was_active {
            self.adaptor.stop_sensor();
        }
        self.stop_reader();
    }
}
