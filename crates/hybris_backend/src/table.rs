//! Static sensor table and per-handle runtime state
//!
//! Built once per connection from the platform's sensor list and rebuilt
//! from scratch after a reconnect.

use std::collections::HashMap;

use contracts::{HalEvent, HalSensorType, SensorInfo};
use tracing::debug;

/// Initial delay programmed for sensors that accept a delay
const INITIAL_DELAY_MS: i32 = 200;

/// Light level injected before the first real sample, roughly indoor lighting
const LIGHT_FALLBACK_LUX: f32 = 400.0;

/// Runtime state of one enumerated sensor
#[derive(Debug, Clone)]
pub struct SensorState {
    pub info: SensorInfo,
    pub min_delay_ms: i32,
    pub max_delay_ms: i32,
    /// Last delay accepted by the HAL, `None` before the first successful set
    pub delay_ms: Option<i32>,
    /// Last activation state accepted by the HAL, `None` when unknown
    pub active: Option<bool>,
    fallback: Option<HalEvent>,
}

impl SensorState {
    fn new(info: SensorInfo) -> Self {
        Self {
            info,
            min_delay_ms: 0,
            max_delay_ms: 0,
            delay_ms: None,
            active: None,
            fallback: None,
        }
    }

    pub fn has_fallback(&self) -> bool {
        self.fallback.is_some()
    }
}

/// Convert microseconds to milliseconds, rounding up
#[inline]
fn us_to_ms_ceil(us: i32) -> i32 {
    us.saturating_add(999) / 1000
}

/// Delay range in ms derived from the platform metadata, plus the delay to
/// program at startup. `None` when the sensor takes no delay at all.
pub fn derive_delays(info: &SensorInfo) -> Option<(i32, i32, i32)> {
    let min = us_to_ms_ceil(info.min_delay_us);
    let mut max = info.max_delay_us.map_or(-1, us_to_ms_ceil);

    if max < 0 && min > 0 {
        max = if min < 500 { 1000 } else { min.saturating_mul(2) };
        debug!(handle = info.handle, max, "no max delay reported, synthesized");
    }

    if min < 0 {
        return None;
    }
    if max < min {
        max = min;
    }
    let initial = if min > 0 { INITIAL_DELAY_MS } else { 0 }.clamp(min, max);
    Some((min, max, initial))
}

/// Pre-canned sample for sensors that only report on change
fn fallback_event(info: &SensorInfo) -> Option<HalEvent> {
    let kind = info.kind()?;
    let value = match kind {
        HalSensorType::Light => LIGHT_FALLBACK_LUX,
        // Far
        HalSensorType::Proximity => info.max_range,
        _ => return None,
    };
    Some(HalEvent::new(info.handle, kind, 0).with_values(&[value]))
}

/// Every enumerated sensor indexed by handle, and the canonical one per type
#[derive(Debug, Default)]
pub struct SensorTable {
    sensors: Vec<SensorState>,
    index_of_handle: HashMap<i32, usize>,
    index_of_type: HashMap<i32, usize>,
}

impl SensorTable {
    /// Build the table and return `(handle, delay_ms)` pairs that must be
    /// force-programmed before anything else.
    ///
    /// The first sensor listed for a type is canonical. Orientation sensors
    /// are only used when their range is a full circle; anything else is the
    /// raw compass.
    pub fn build(list: Vec<SensorInfo>) -> (Self, Vec<(i32, i32)>) {
        let mut table = Self::default();
        let mut initial_delays = Vec::new();

        for (index, info) in list.into_iter().enumerate() {
            table.index_of_handle.insert(info.handle, index);
            let handle = info.handle;
            let sensor_type = info.sensor_type;

            let mut used = !table.index_of_type.contains_key(&sensor_type);
            if info.kind() == Some(HalSensorType::Orientation) && info.max_range != 360.0 {
                used = false;
            }
            debug!(
                handle,
                sensor_type,
                name = %info.name,
                selected = used,
                "enumerated sensor"
            );

            let mut state = SensorState::new(info);
            if used {
                if let Some((min, max, initial)) = derive_delays(&state.info) {
                    state.min_delay_ms = min;
                    state.max_delay_ms = max;
                    initial_delays.push((handle, initial));
                    debug!(handle, initial, min, max, "delay range");
                }
                table.index_of_type.insert(sensor_type, index);
                state.fallback = fallback_event(&state.info);
            }
            table.sensors.push(state);
        }

        (table, initial_delays)
    }

    pub fn is_empty(&self) -> bool {
        self.sensors.is_empty()
    }

    pub fn len(&self) -> usize {
        self.sensors.len()
    }

    pub fn handles(&self) -> Vec<i32> {
        self.sensors.iter().map(|s| s.info.handle).collect()
    }

    /// Handle of the canonical sensor for a type
    pub fn handle_for_type(&self, sensor_type: HalSensorType) -> Option<i32> {
        self.index_of_type
            .get(&sensor_type.code())
            .map(|&i| self.sensors[i].info.handle)
    }

    pub fn get(&self, handle: i32) -> Option<&SensorState> {
        self.index_of_handle.get(&handle).map(|&i| &self.sensors[i])
    }

    pub fn get_mut(&mut self, handle: i32) -> Option<&mut SensorState> {
        self.index_of_handle
            .get(&handle)
            .copied()
            .map(move |i| &mut self.sensors[i])
    }

    /// Drop the fallback once real data for the handle shows up
    pub fn clear_fallback_for(&mut self, event: &HalEvent) -> bool {
        match self.get_mut(event.sensor) {
            Some(state)
                if state
                    .fallback
                    .is_some_and(|f| f.sensor == event.sensor && f.sensor_type == event.sensor_type) =>
            {
                state.fallback = None;
                true
            }
            _ => false,
        }
    }

    /// Hand out the fallback for `(handle, type)` exactly once
    pub fn take_fallback(&mut self, handle: i32, sensor_type: HalSensorType) -> Option<HalEvent> {
        let state = self.get_mut(handle)?;
        match state.fallback {
            Some(f) if f.sensor == handle && f.sensor_type == sensor_type.code() => state.fallback.take(),
            _ => None,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &SensorState> {
        self.sensors.iter()
    }
}
