//! Connection to the platform sensor provider
//!
//! `HybrisManager` owns the single HAL handle, the sensor table and the
//! adaptor registry. It is constructed by the composition root and shared
//! with every hybris adaptor as `Arc<HybrisManager>`.
//!
//! Two delivery regimes feed [`HybrisManager::handle_batch`]: the reader
//! thread started by [`HybrisManager::start_reader_thread`], or the binder
//! event loop in [`crate::binder`].

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use adaptor_core::{sleep_unless_stopped, ReaderThread};
use contracts::{DaemonSettings, HalEvent, HalSensorType, Result, SensorError, SensorHal, SensorInfo};
use metrics::counter;
use parking_lot::{Mutex, RwLock};
use tracing::{debug, info, instrument, trace, warn};

use crate::table::{SensorState, SensorTable};
use crate::wakelock::WakeLock;

/// Pause after a batch containing malformed records
pub const MALFORMED_BATCH_BACKOFF: Duration = Duration::from_millis(50);

/// Receiver of demultiplexed HAL samples
pub trait HalSampleSink: Send + Sync {
    fn sink_name(&self) -> &str;

    /// Platform type this sink consumes
    fn sensor_type(&self) -> HalSensorType;

    /// Only running sinks receive samples
    fn is_hardware_running(&self) -> bool;

    fn process_sample(&self, event: &HalEvent);

    /// Re-program hardware after the sensor table was rebuilt
    fn reattach(&self);
}

/// Timing knobs of the event path
#[derive(Debug, Clone)]
pub struct ManagerSettings {
    /// Events fetched per poll
    pub batch_size: usize,
    /// Upper bound on one blocking poll, so the stop flag is observed
    pub poll_timeout: Duration,
    /// Sleep after a failed HAL poll
    pub poll_retry: Duration,
    /// Reader thread join timeout
    pub join_timeout: Duration,
}

impl Default for ManagerSettings {
    fn default() -> Self {
        Self {
            batch_size: 16,
            poll_timeout: Duration::from_millis(200),
            poll_retry: Duration::from_millis(1000),
            join_timeout: Duration::from_millis(3000),
        }
    }
}

impl From<&DaemonSettings> for ManagerSettings {
    fn from(s: &DaemonSettings) -> Self {
        Self {
            batch_size: s.batch_size,
            poll_retry: Duration::from_millis(s.poll_retry_ms),
            join_timeout: Duration::from_millis(s.reader_join_timeout_ms),
            ..Self::default()
        }
    }
}

/// What a processed batch asks of the delivery loop
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchOutcome {
    /// Batch held proximity data; a wake lock was requested
    pub block_suspend: bool,
    /// Batch held records with an unexpected layout
    pub error_in_input: bool,
    pub dispatched: usize,
}

/// Platform sensor service manager
pub struct HybrisManager {
    hal: RwLock<Option<Arc<dyn SensorHal>>>,
    table: Mutex<SensorTable>,
    sinks: RwLock<Vec<Weak<dyn HalSampleSink>>>,
    wakelock: WakeLock,
    settings: ManagerSettings,
    reader: Mutex<Option<ReaderThread>>,
}

impl HybrisManager {
    /// Manager with no connection yet
    pub fn new(settings: ManagerSettings, wakelock: WakeLock) -> Self {
        Self {
            hal: RwLock::new(None),
            table: Mutex::new(SensorTable::default()),
            sinks: RwLock::new(Vec::new()),
            wakelock,
            settings,
            reader: Mutex::new(None),
        }
    }

    /// Manager connected to an in-process HAL
    pub fn with_hal(
        hal: Arc<dyn SensorHal>,
        settings: ManagerSettings,
        wakelock: WakeLock,
    ) -> Result<Arc<Self>> {
        let manager = Arc::new(Self::new(settings, wakelock));
        manager.attach(hal)?;
        Ok(manager)
    }

    pub fn settings(&self) -> &ManagerSettings {
        &self.settings
    }

    pub fn is_connected(&self) -> bool {
        self.hal.read().is_some()
    }

    fn hal(&self) -> Result<Arc<dyn SensorHal>> {
        self.hal.read().clone().ok_or(SensorError::NotConnected)
    }

    /// Take ownership of a fresh connection.
    ///
    /// Enumerates the sensors, programs initial delays, makes sure every
    /// sensor starts out deactivated, then lets registered adaptors that
    /// were running re-apply their state.
    #[instrument(name = "hybris_attach", skip(self, hal))]
    pub fn attach(&self, hal: Arc<dyn SensorHal>) -> Result<usize> {
        let list = hal.sensor_list()?;
        let (table, initial_delays) = SensorTable::build(list);
        let count = table.len();
        let handles = table.handles();

        *self.table.lock() = table;
        *self.hal.write() = Some(hal);

        for (handle, delay) in initial_delays {
            self.set_delay(handle, delay, true);
        }
        for handle in handles {
            self.set_active(handle, false);
        }
        info!(sensors = count, "sensor service attached");

        for sink in self.live_sinks() {
            if sink.is_hardware_running() {
                debug!(adaptor = sink.sink_name(), "re-applying adaptor state");
                sink.reattach();
            }
        }
        Ok(count)
    }

    /// Forget the connection and the table built from it
    pub fn detach(&self) {
        *self.hal.write() = None;
        *self.table.lock() = SensorTable::default();
        info!("sensor service detached");
    }

    /// Register an adaptor for sample delivery; duplicates are ignored
    pub fn register_adaptor(&self, sink: Weak<dyn HalSampleSink>) {
        let mut sinks = self.sinks.write();
        sinks.retain(|s| s.strong_count() > 0);
        if !sinks.iter().any(|s| s.ptr_eq(&sink)) {
            sinks.push(sink);
        }
    }

    pub fn registered_adaptors(&self) -> usize {
        self.live_sinks().len()
    }

    fn live_sinks(&self) -> Vec<Arc<dyn HalSampleSink>> {
        self.sinks.read().iter().filter_map(Weak::upgrade).collect()
    }

    // ===== Table queries =====

    pub fn handle_for_type(&self, sensor_type: HalSensorType) -> Option<i32> {
        self.table.lock().handle_for_type(sensor_type)
    }

    fn with_state<R>(&self, handle: i32, f: impl FnOnce(&SensorState) -> R) -> Option<R> {
        self.table.lock().get(handle).map(f)
    }

    pub fn sensor_info(&self, handle: i32) -> Option<SensorInfo> {
        self.with_state(handle, |s| s.info.clone())
    }

    pub fn sensor_list(&self) -> Vec<SensorInfo> {
        self.table.lock().iter().map(|s| s.info.clone()).collect()
    }

    pub fn max_range(&self, handle: i32) -> f32 {
        self.with_state(handle, |s| s.info.max_range).unwrap_or(0.0)
    }

    pub fn resolution(&self, handle: i32) -> f32 {
        self.with_state(handle, |s| s.info.resolution).unwrap_or(0.0)
    }

    pub fn min_delay(&self, handle: i32) -> i32 {
        self.with_state(handle, |s| s.min_delay_ms).unwrap_or(0)
    }

    pub fn max_delay(&self, handle: i32) -> i32 {
        self.with_state(handle, |s| s.max_delay_ms).unwrap_or(0)
    }

    /// Delay last accepted by the HAL
    pub fn delay(&self, handle: i32) -> Option<i32> {
        self.with_state(handle, |s| s.delay_ms).flatten()
    }

    pub fn is_active(&self, handle: i32) -> bool {
        self.with_state(handle, |s| s.active == Some(true)).unwrap_or(false)
    }

    /// Hand out the pending fallback sample, at most once per connection
    pub fn take_fallback(&self, handle: i32, sensor_type: HalSensorType) -> Option<HalEvent> {
        let event = self.table.lock().take_fallback(handle, sensor_type)?;
        trace!(handle, sensor_type = ?sensor_type, "fallback sample injected");
        counter!("sensord_fallback_events_total").increment(1);
        Some(event)
    }

    // ===== Control path =====

    /// Program the sampling delay in milliseconds.
    ///
    /// Unchanged values are skipped unless `force` is set. State is only
    /// updated when the HAL accepts the value.
    pub fn set_delay(&self, handle: i32, delay_ms: i32, force: bool) -> bool {
        let Ok(hal) = self.hal() else {
            warn!(handle, "set_delay while disconnected");
            return false;
        };
        let mut table = self.table.lock();
        let Some(state) = table.get_mut(handle) else {
            warn!(handle, "set_delay for unknown handle");
            return false;
        };
        apply_delay(hal.as_ref(), state, delay_ms, force)
    }

    /// Activate or deactivate a handle.
    ///
    /// A pending delay is pushed before activation when the HAL asks for it,
    /// otherwise re-applied right after.
    pub fn set_active(&self, handle: i32, active: bool) -> bool {
        let Ok(hal) = self.hal() else {
            warn!(handle, "set_active while disconnected");
            return false;
        };
        let mut table = self.table.lock();
        let Some(state) = table.get_mut(handle) else {
            warn!(handle, "set_active for unknown handle");
            return false;
        };

        if state.active == Some(active) {
            trace!(handle, active, "activation unchanged");
            return true;
        }

        let delay_first = hal.requires_delay_before_activate();
        if delay_first && active {
            if let Some(delay) = state.delay_ms.take() {
                apply_delay(hal.as_ref(), state, delay, true);
            }
        }

        let success = match hal.activate(handle, active) {
            Ok(()) => {
                state.active = Some(active);
                true
            }
            Err(e) => {
                warn!(handle, active, error = %e, "activate failed");
                false
            }
        };
        debug!(handle, active, success, "set_active");

        if !delay_first && state.active == Some(true) {
            if let Some(delay) = state.delay_ms.take() {
                apply_delay(hal.as_ref(), state, delay, false);
            }
        }
        success
    }

    // ===== Event path =====

    /// Demultiplex one batch to the registered adaptors.
    ///
    /// Records with an unexpected version are flagged but still delivered,
    /// as are the valid records around them.
    pub fn process_events(&self, events: &[HalEvent]) -> BatchOutcome {
        let mut outcome = BatchOutcome::default();
        if events.is_empty() {
            return outcome;
        }

        {
            let mut table = self.table.lock();
            for event in events {
                table.clear_fallback_for(event);
            }
        }

        let sinks = self.live_sinks();
        for event in events {
            trace!(handle = event.sensor, sensor_type = event.sensor_type, "hal event");
            if !event.is_well_formed() {
                warn!(version = event.version, "incorrect event version");
                outcome.error_in_input = true;
            }
            if event.sensor_type == HalSensorType::Proximity.code() {
                outcome.block_suspend = true;
            }
            for sink in &sinks {
                if sink.sensor_type().code() == event.sensor_type && sink.is_hardware_running() {
                    sink.process_sample(event);
                    outcome.dispatched += 1;
                }
            }
        }

        counter!("sensord_hal_events_total").increment(events.len() as u64);
        if outcome.error_in_input {
            counter!("sensord_hal_malformed_batches_total").increment(1);
        }
        outcome
    }

    /// Process a batch and take the wake lock when needed
    pub fn handle_batch(&self, events: &[HalEvent]) -> BatchOutcome {
        let outcome = self.process_events(events);
        if outcome.block_suspend {
            self.wakelock.obtain_temporary();
        }
        outcome
    }

    // ===== Reader thread regime =====

    /// Start the dedicated poll thread; a second call is a no-op
    pub fn start_reader_thread(self: &Arc<Self>) -> Result<()> {
        let mut reader = self.reader.lock();
        if reader.is_some() {
            return Ok(());
        }
        let manager = Arc::clone(self);
        *reader = Some(ReaderThread::spawn("hal-event-reader", move |stop| {
            manager.reader_loop(&stop)
        })?);
        Ok(())
    }

    pub fn is_reader_running(&self) -> bool {
        self.reader.lock().is_some()
    }

    /// Stop the poll thread within the configured join timeout
    pub fn stop_reader_thread(&self) -> Result<()> {
        let reader = self.reader.lock().take();
        match reader {
            Some(reader) => reader.stop(self.settings.join_timeout),
            None => Ok(()),
        }
    }

    fn reader_loop(&self, stop: &AtomicBool) {
        while !stop.load(Ordering::Relaxed) {
            let hal = match self.hal() {
                Ok(hal) => hal,
                Err(_) => {
                    sleep_unless_stopped(stop, self.settings.poll_retry);
                    continue;
                }
            };
            match hal.poll(self.settings.batch_size, self.settings.poll_timeout) {
                Ok(events) => {
                    let outcome = self.handle_batch(&events);
                    if outcome.error_in_input {
                        sleep_unless_stopped(stop, MALFORMED_BATCH_BACKOFF);
                    }
                }
                Err(e) => {
                    warn!(error = %e, "hal poll failed");
                    counter!("sensord_hal_poll_errors_total").increment(1);
                    sleep_unless_stopped(stop, self.settings.poll_retry);
                }
            }
        }
        debug!("hal event reader exiting");
    }

    /// Deactivate everything that is still active and stop the reader.
    ///
    /// A reader that does not exit in time is returned as an error; the
    /// caller must not continue running.
    pub fn shutdown(&self) -> Result<()> {
        let active: Vec<i32> = self
            .table
            .lock()
            .iter()
            .filter(|s| s.active == Some(true))
            .map(|s| s.info.handle)
            .collect();
        for handle in active {
            self.set_active(handle, false);
        }
        self.stop_reader_thread()
    }
}

fn apply_delay(hal: &dyn SensorHal, state: &mut SensorState, delay_ms: i32, force: bool) -> bool {
    let handle = state.info.handle;
    if !force && state.delay_ms == Some(delay_ms) {
        trace!(handle, delay_ms, "delay unchanged");
        return true;
    }
    match hal.set_delay(handle, i64::from(delay_ms) * 1_000_000) {
        Ok(()) => {
            debug!(handle, delay_ms, force, "delay set");
            state.delay_ms = Some(delay_ms);
            true
        }
        Err(e) => {
            warn!(handle, delay_ms, error = %e, "set_delay failed");
            false
        }
    }
}
