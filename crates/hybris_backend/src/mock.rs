//! In-process simulated HAL
//!
//! Stands in for the platform sensor library in tests and on hosts without
//! one. Events are injected by the test (or the generator thread) and handed
//! out by `poll`; every control call is recorded.

use std::collections::{HashSet, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use contracts::{HalEvent, HalSensorType, Result, SensorError, SensorHal, SensorInfo};
use parking_lot::{Condvar, Mutex};
use tracing::{debug, instrument};

/// Control call observed by the mock
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HalCall {
    Activate { handle: i32, enabled: bool },
    SetDelay { handle: i32, delay_ns: i64 },
}

/// Failure injection
#[derive(Debug, Default, Clone)]
pub struct MockHalConfig {
    /// Handles whose activation fails
    pub fail_activate: Vec<i32>,
    /// Handles whose delay setting fails
    pub fail_set_delay: Vec<i32>,
    /// Number of poll calls that fail before polling works
    pub failing_polls: usize,
}

#[derive(Debug, Default)]
struct MockState {
    queue: VecDeque<HalEvent>,
    calls: Vec<HalCall>,
    active: HashSet<i32>,
    failing_polls: usize,
    polls: usize,
}

/// Simulated sensor HAL
pub struct MockHal {
    sensors: Vec<SensorInfo>,
    config: MockHalConfig,
    state: Mutex<MockState>,
    ready: Condvar,
}

impl MockHal {
    pub fn new(sensors: Vec<SensorInfo>) -> Self {
        Self::with_config(sensors, MockHalConfig::default())
    }

    pub fn with_config(sensors: Vec<SensorInfo>, config: MockHalConfig) -> Self {
        let state = MockState {
            failing_polls: config.failing_polls,
            ..MockState::default()
        };
        Self {
            sensors,
            config,
            state: Mutex::new(state),
            ready: Condvar::new(),
        }
    }

    /// A phone-like sensor set with one sensor of every common type
    pub fn typical_device() -> Self {
        Self::new(typical_sensor_list())
    }

    /// Queue events for the next `poll`
    pub fn inject(&self, events: impl IntoIterator<Item = HalEvent>) {
        let mut state = self.state.lock();
        state.queue.extend(events);
        self.ready.notify_all();
    }

    /// Every control call so far, in order
    pub fn calls(&self) -> Vec<HalCall> {
        self.state.lock().calls.clone()
    }

    pub fn clear_calls(&self) {
        self.state.lock().calls.clear();
    }

    pub fn is_active(&self, handle: i32) -> bool {
        self.state.lock().active.contains(&handle)
    }

    pub fn poll_count(&self) -> usize {
        self.state.lock().polls
    }

    fn info(&self, handle: i32) -> Option<&SensorInfo> {
        self.sensors.iter().find(|s| s.handle == handle)
    }
}

impl SensorHal for MockHal {
    fn sensor_list(&self) -> Result<Vec<SensorInfo>> {
        Ok(self.sensors.clone())
    }

    #[instrument(name = "mock_hal_activate", skip(self))]
    fn activate(&self, handle: i32, enabled: bool) -> Result<()> {
        let mut state = self.state.lock();
        state.calls.push(HalCall::Activate { handle, enabled });
        if self.info(handle).is_none() || self.config.fail_activate.contains(&handle) {
            return Err(SensorError::hal("activate", handle, -22));
        }
        if enabled {
            state.active.insert(handle);
        } else {
            state.active.remove(&handle);
        }
        Ok(())
    }

    #[instrument(name = "mock_hal_set_delay", skip(self))]
    fn set_delay(&self, handle: i32, delay_ns: i64) -> Result<()> {
        let mut state = self.state.lock();
        state.calls.push(HalCall::SetDelay { handle, delay_ns });
        if self.info(handle).is_none() || self.config.fail_set_delay.contains(&handle) {
            return Err(SensorError::hal("set_delay", handle, -22));
        }
        Ok(())
    }

    fn poll(&self, max_events: usize, timeout: Duration) -> Result<Vec<HalEvent>> {
        let mut state = self.state.lock();
        state.polls += 1;
        if state.failing_polls > 0 {
            state.failing_polls -= 1;
            return Err(SensorError::hal("poll", -1, -5));
        }
        if state.queue.is_empty() {
            let _ = self.ready.wait_for(&mut state, timeout);
        }
        let n = state.queue.len().min(max_events);
        Ok(state.queue.drain(..n).collect())
    }
}

/// Sensor list used by [`MockHal::typical_device`] and the `mock` backend
pub fn typical_sensor_list() -> Vec<SensorInfo> {
    vec![
        SensorInfo::new(1, HalSensorType::Accelerometer, "mock accelerometer")
            .with_range(39.2, 0.01)
            .with_delays(10_000, Some(1_000_000)),
        SensorInfo::new(2, HalSensorType::MagneticField, "mock magnetometer")
            .with_range(4912.0, 0.15)
            .with_delays(20_000, None),
        SensorInfo::new(3, HalSensorType::Orientation, "mock compass raw")
            .with_range(180.0, 1.0)
            .with_delays(20_000, None),
        SensorInfo::new(4, HalSensorType::Orientation, "mock orientation")
            .with_range(360.0, 1.0)
            .with_delays(20_000, None),
        SensorInfo::new(5, HalSensorType::Gyroscope, "mock gyroscope")
            .with_range(34.9, 0.001)
            .with_delays(5_000, Some(200_000)),
        SensorInfo::new(6, HalSensorType::Light, "mock light").with_range(65535.0, 1.0),
        SensorInfo::new(7, HalSensorType::Proximity, "mock proximity").with_range(5.0, 5.0),
        SensorInfo::new(8, HalSensorType::Pressure, "mock barometer")
            .with_range(1100.0, 0.01)
            .with_delays(40_000, None),
        SensorInfo::new(9, HalSensorType::RotationVector, "mock rotation vector")
            .with_range(1.0, 0.0001)
            .with_delays(10_000, None),
        SensorInfo::new(10, HalSensorType::StepCounter, "mock step counter")
            .with_range(f32::MAX, 1.0),
    ]
}

/// Background thread feeding synthetic samples for every active handle
pub struct MockEventGenerator {
    running: Arc<AtomicBool>,
    handle: Option<thread::JoinHandle<()>>,
}

impl MockEventGenerator {
    /// Emit one sample per active sensor every `period`
    pub fn spawn(hal: Arc<MockHal>, period: Duration) -> Self {
        let running = Arc::new(AtomicBool::new(true));
        let flag = Arc::clone(&running);
        let handle = thread::Builder::new()
            .name("mock-hal-gen".into())
            .spawn(move || {
                let start = std::time::Instant::now();
                let mut tick: u64 = 0;
                while flag.load(Ordering::Relaxed) {
                    tick += 1;
                    let ts = start.elapsed().as_nanos() as i64;
                    let events: Vec<HalEvent> = hal
                        .sensors
                        .iter()
                        .filter(|s| hal.is_active(s.handle))
                        .filter_map(|s| synthetic_event(s, ts, tick))
                        .collect();
                    if !events.is_empty() {
                        hal.inject(events);
                    }
                    thread::sleep(period);
                }
                debug!("mock event generator stopped");
            })
            .ok();
        Self { running, handle }
    }

    pub fn stop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for MockEventGenerator {
    fn drop(&mut self) {
        self.stop();
    }
}

fn synthetic_event(info: &SensorInfo, ts: i64, tick: u64) -> Option<HalEvent> {
    let kind = info.kind()?;
    let phase = (tick % 360) as f32;
    let event = HalEvent::new(info.handle, kind, ts);
    let event = match kind {
        HalSensorType::Accelerometer => event.with_values(&[0.0, 0.0, 9.81]),
        HalSensorType::Gyroscope => event.with_values(&[0.01, 0.0, -0.01]),
        HalSensorType::MagneticField => event.with_values(&[22.0, -5.0, 41.0, 3.0]),
        HalSensorType::Orientation => event.with_values(&[phase, 0.0, 0.0, 3.0]),
        HalSensorType::Light => event.with_values(&[300.0 + (tick % 50) as f32]),
        HalSensorType::Proximity => event.with_values(&[if tick % 20 < 10 { info.max_range } else { 0.0 }]),
        HalSensorType::Pressure => event.with_values(&[1013.25]),
        HalSensorType::RotationVector => event.with_values(&[0.0, 0.0, 0.0, 1.0, 0.01]),
        HalSensorType::StepCounter => event.with_step_counter(tick / 10),
        _ => return None,
    };
    Some(event)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_poll_times_out_empty() {
        let hal = MockHal::typical_device();
        let events = hal.poll(16, Duration::from_millis(10)).unwrap();
        assert!(events.is_empty());
    }

    #[test]
    fn test_poll_respects_batch_size() {
        let hal = MockHal::typical_device();
        hal.inject((0..5).map(|i| HalEvent::new(1, HalSensorType::Accelerometer, i)));
        assert_eq!(hal.poll(3, Duration::ZERO).unwrap().len(), 3);
        assert_eq!(hal.poll(3, Duration::ZERO).unwrap().len(), 2);
    }

    #[test]
    fn test_injected_failures() {
        let config = MockHalConfig {
            fail_activate: vec![1],
            failing_polls: 1,
            ..MockHalConfig::default()
        };
        let hal = MockHal::with_config(typical_sensor_list(), config);
        assert!(hal.activate(1, true).is_err());
        assert!(hal.activate(5, true).is_ok());
        assert!(hal.is_active(5));
        assert!(hal.poll(1, Duration::ZERO).is_err());
        assert!(hal.poll(1, Duration::ZERO).is_ok());
        assert_eq!(
            hal.calls(),
            vec![
                HalCall::Activate { handle: 1, enabled: true },
                HalCall::Activate { handle: 5, enabled: true },
            ]
        );
    }

    #[test]
    fn test_generator_feeds_active_sensors() {
        let hal = Arc::new(MockHal::typical_device());
        hal.activate(8, true).unwrap();
        let mut generator = MockEventGenerator::spawn(Arc::clone(&hal), Duration::from_millis(5));
        let events = hal.poll(16, Duration::from_secs(2)).unwrap();
        generator.stop();
        assert!(!events.is_empty());
        assert!(events.iter().all(|e| e.sensor == 8));
    }
}
