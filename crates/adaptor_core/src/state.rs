//! State shared by every adaptor regardless of backend.
//!
//! Backends embed one `AdaptorCore` and expose it through
//! [`DeviceAdaptor::core`](crate::DeviceAdaptor::core); all arbitration and
//! reference counting runs against it.

use std::any::Any;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicUsize, Ordering};
use std::sync::Arc;

use contracts::{DataRange, SensorName, SensorRecord, SessionId};
use parking_lot::{Mutex, MutexGuard, RwLock};

use crate::arbitration::SessionRequests;
use crate::ring_buffer::RingBuffer;

/// Named output of an adaptor.
///
/// Holds the ring buffer readers attach to and counts the logical channels
/// currently started on it.
pub struct AdaptedSensorEntry {
    name: String,
    description: String,
    buffer: Arc<dyn Any + Send + Sync>,
    ref_count: AtomicUsize,
    running: AtomicBool,
}

impl AdaptedSensorEntry {
    pub fn new<T: SensorRecord>(
        name: impl Into<String>,
        description: impl Into<String>,
        buffer: Arc<RingBuffer<T>>,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            buffer,
            ref_count: AtomicUsize::new(0),
            running: AtomicBool::new(false),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    /// Typed access to the buffer, `None` if `T` is not the record type
    pub fn buffer<T: SensorRecord>(&self) -> Option<Arc<RingBuffer<T>>> {
        Arc::clone(&self.buffer).downcast::<RingBuffer<T>>().ok()
    }

    /// Increment and return the new count
    pub fn add_reference(&self) -> usize {
        self.ref_count.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Decrement and return the new count, `None` if already zero
    pub fn remove_reference(&self) -> Option<usize> {
        self.ref_count
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |c| c.checked_sub(1))
            .ok()
            .map(|prev| prev - 1)
    }

    pub fn reference_count(&self) -> usize {
        self.ref_count.load(Ordering::SeqCst)
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    pub(crate) fn set_running(&self, running: bool) {
        self.running.store(running, Ordering::SeqCst);
    }
}

impl std::fmt::Debug for AdaptedSensorEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdaptedSensorEntry")
            .field("name", &self.name)
            .field("refs", &self.reference_count())
            .field("running", &self.is_running())
            .finish()
    }
}

/// Lifecycle flags evaluated by `evaluate_sensor`
#[derive(Debug, Default)]
pub(crate) struct RunState {
    pub should_be_running: bool,
    pub in_standby: bool,
    pub hardware_running: bool,
}

/// Backend-independent adaptor state
pub struct AdaptorCore {
    name: SensorName,
    description: RwLock<String>,
    valid: AtomicBool,
    default_interval: AtomicU32,
    data_ranges: RwLock<Vec<DataRange>>,
    intervals: RwLock<Vec<DataRange>>,
    requests: Mutex<SessionRequests>,
    run_state: Mutex<RunState>,
    lifecycle: Mutex<()>,
    running: AtomicBool,
    entries: RwLock<Vec<Arc<AdaptedSensorEntry>>>,
}

impl AdaptorCore {
    pub fn new(name: impl Into<SensorName>) -> Self {
        Self {
            name: name.into(),
            description: RwLock::new(String::new()),
            valid: AtomicBool::new(true),
            default_interval: AtomicU32::new(0),
            data_ranges: RwLock::new(Vec::new()),
            intervals: RwLock::new(Vec::new()),
            requests: Mutex::new(SessionRequests::default()),
            run_state: Mutex::new(RunState::default()),
            lifecycle: Mutex::new(()),
            running: AtomicBool::new(false),
            entries: RwLock::new(Vec::new()),
        }
    }

    #[inline]
    pub fn name(&self) -> &SensorName {
        &self.name
    }

    pub fn description(&self) -> String {
        self.description.read().clone()
    }

    pub fn set_description(&self, description: impl Into<String>) {
        *self.description.write() = description.into();
    }

    #[inline]
    pub fn is_valid(&self) -> bool {
        self.valid.load(Ordering::SeqCst)
    }

    pub fn set_valid(&self, valid: bool) {
        self.valid.store(valid, Ordering::SeqCst);
    }

    /// Hardware is currently delivering samples
    #[inline]
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    pub fn default_interval(&self) -> u32 {
        self.default_interval.load(Ordering::SeqCst)
    }

    pub fn set_default_interval(&self, interval_ms: u32) {
        self.default_interval.store(interval_ms, Ordering::SeqCst);
    }

    pub fn introduce_available_data_range(&self, range: DataRange) {
        let mut ranges = self.data_ranges.write();
        if !ranges.contains(&range) {
            ranges.push(range);
        }
    }

    pub fn available_data_ranges(&self) -> Vec<DataRange> {
        self.data_ranges.read().clone()
    }

    pub fn introduce_available_interval(&self, range: DataRange) {
        let mut intervals = self.intervals.write();
        if !intervals.contains(&range) {
            intervals.push(range);
        }
    }

    pub fn available_intervals(&self) -> Vec<DataRange> {
        self.intervals.read().clone()
    }

    /// Replace all outputs with a single one
    pub fn set_adapted_sensor<T: SensorRecord>(
        &self,
        name: impl Into<String>,
        description: impl Into<String>,
        buffer: Arc<RingBuffer<T>>,
    ) {
        let entry = Arc::new(AdaptedSensorEntry::new(name, description, buffer));
        *self.entries.write() = vec![entry];
    }

    /// Add another named output
    pub fn add_adapted_sensor<T: SensorRecord>(
        &self,
        name: impl Into<String>,
        description: impl Into<String>,
        buffer: Arc<RingBuffer<T>>,
    ) {
        let entry = Arc::new(AdaptedSensorEntry::new(name, description, buffer));
        self.entries.write().push(entry);
    }

    pub fn adapted_sensor(&self, name: &str) -> Option<Arc<AdaptedSensorEntry>> {
        self.entries.read().iter().find(|e| e.name() == name).cloned()
    }

    /// The output whose reference count drives the hardware lifecycle
    pub fn primary_entry(&self) -> Option<Arc<AdaptedSensorEntry>> {
        self.entries.read().first().cloned()
    }

    pub fn adapted_sensor_names(&self) -> Vec<String> {
        self.entries.read().iter().map(|e| e.name().to_string()).collect()
    }

    /// Mutate the session request tables under their lock
    pub fn update_requests<R>(&self, f: impl FnOnce(&mut SessionRequests) -> R) -> R {
        f(&mut self.requests.lock())
    }

    pub fn interval_requests(&self) -> Vec<(SessionId, u32)> {
        self.requests
            .lock()
            .intervals
            .iter()
            .map(|(s, v)| (*s, *v))
            .collect()
    }

    pub fn standby_override(&self) -> bool {
        self.requests.lock().standby_override()
    }

    /// Data range in effect: head of the request queue, else the first
    /// advertised range
    pub fn current_data_range(&self) -> Option<DataRange> {
        let queued = self.requests.lock().data_ranges.current().map(|(_, r)| r);
        queued.or_else(|| self.data_ranges.read().first().copied())
    }

    pub fn in_standby(&self) -> bool {
        self.run_state.lock().in_standby
    }

    pub fn should_be_running(&self) -> bool {
        self.run_state.lock().should_be_running
    }

    pub(crate) fn run_state(&self) -> MutexGuard<'_, RunState> {
        self.run_state.lock()
    }

    /// Held across a start/stop reference transition and the re-evaluation
    /// that follows it
    pub(crate) fn lifecycle(&self) -> MutexGuard<'_, ()> {
        self.lifecycle.lock()
    }

    pub(crate) fn mark_running(&self, running: bool) {
        self.running.store(running, Ordering::SeqCst);
        for entry in self.entries.read().iter() {
            entry.set_running(running);
        }
    }
}

impl std::fmt::Debug for AdaptorCore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdaptorCore")
            .field("name", &self.name)
            .field("valid", &self.is_valid())
            .field("running", &self.is_running())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::{TimedUnsigned, TimedXyzData};

    #[test]
    fn test_entry_reference_counting() {
        let buffer = Arc::new(RingBuffer::<TimedUnsigned>::new(1));
        let entry = AdaptedSensorEntry::new("pressure", "Pressure", buffer);
        assert_eq!(entry.remove_reference(), None);
        assert_eq!(entry.add_reference(), 1);
        assert_eq!(entry.add_reference(), 2);
        assert_eq!(entry.remove_reference(), Some(1));
        assert_eq!(entry.remove_reference(), Some(0));
        assert_eq!(entry.remove_reference(), None);
    }

    #[test]
    fn test_entry_buffer_downcast() {
        let core = AdaptorCore::new("pressureadaptor");
        core.set_adapted_sensor("pressure", "Pressure", Arc::new(RingBuffer::<TimedUnsigned>::new(1)));
        let entry = core.adapted_sensor("pressure").unwrap();
        assert!(entry.buffer::<TimedUnsigned>().is_some());
        assert!(entry.buffer::<TimedXyzData>().is_none());
        assert!(core.adapted_sensor("missing").is_none());
    }

    #[test]
    fn test_current_data_range_falls_back_to_first_available() {
        let core = AdaptorCore::new("alsadaptor");
        assert_eq!(core.current_data_range(), None);
        let wide = DataRange::new(0.0, 65535.0, 1.0);
        let narrow = DataRange::new(0.0, 1000.0, 1.0);
        core.introduce_available_data_range(wide);
        core.introduce_available_data_range(narrow);
        core.introduce_available_data_range(wide);
        assert_eq!(core.available_data_ranges().len(), 2);
        assert_eq!(core.current_data_range(), Some(wide));

        core.update_requests(|r| r.data_ranges.request(SessionId(5), narrow));
        assert_eq!(core.current_data_range(), Some(narrow));
    }
}
