//! In-memory adaptor for channel and manager tests

use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use std::sync::Arc;

use adaptor_core::{AdaptorCore, DeviceAdaptor, RingBuffer};
use contracts::{monotonic_us, DataRange, SessionId, TimedUnsigned};

pub struct TestAdaptor {
    core: AdaptorCore,
    buffer: Arc<RingBuffer<TimedUnsigned>>,
    starts: AtomicUsize,
    stops: AtomicUsize,
    interval: AtomicU32,
    start_sample: Option<u32>,
}

impl TestAdaptor {
    pub fn new(name: &str, default_interval: u32) -> Self {
        let core = AdaptorCore::new(name);
        let buffer = Arc::new(RingBuffer::new(4));
        core.set_adapted_sensor("test", "test output", Arc::clone(&buffer));
        core.set_default_interval(default_interval);
        core.introduce_available_data_range(DataRange::new(0.0, 100.0, 1.0));
        Self {
            core,
            buffer,
            starts: AtomicUsize::new(0),
            stops: AtomicUsize::new(0),
            interval: AtomicU32::new(0),
            start_sample: None,
        }
    }

    /// Push `value` whenever hardware starts, like a fallback injection
    pub fn with_start_sample(mut self, value: u32) -> Self {
        self.start_sample = Some(value);
        self
    }

    pub fn emit(&self, value: u32) {
        self.buffer.push(TimedUnsigned::new(monotonic_us(), value));
    }

    pub fn starts(&self) -> usize {
        self.starts.load(Ordering::SeqCst)
    }

    pub fn stops(&self) -> usize {
        self.stops.load(Ordering::SeqCst)
    }
}

impl DeviceAdaptor for TestAdaptor {
    fn core(&self) -> &AdaptorCore {
        &self.core
    }

    fn start_hardware(&self) -> bool {
        self.starts.fetch_add(1, Ordering::SeqCst);
        if let Some(value) = self.start_sample {
            self.emit(value);
        }
        true
    }

    fn stop_hardware(&self) {
        self.stops.fetch_add(1, Ordering::SeqCst);
    }

    fn apply_interval(&self, interval_ms: u32, _winner: Option<SessionId>) -> bool {
        self.interval.store(interval_ms, Ordering::SeqCst);
        true
    }

    fn interval(&self) -> u32 {
        self.interval.load(Ordering::SeqCst)
    }
}
