//! Platform sensor HAL model
//!
//! Static sensor metadata as enumerated by the platform, and the fixed-layout
//! event record delivered by `poll`.

use serde::{Deserialize, Serialize};

/// Size in bytes of the platform's event record; doubles as the version tag.
pub const SENSORS_EVENT_SIZE: i32 = 104;

/// Number of float slots in an event's data union
pub const EVENT_DATA_LEN: usize = 16;

/// Platform sensor type codes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(i32)]
pub enum HalSensorType {
    Accelerometer = 1,
    MagneticField = 2,
    Orientation = 3,
    Gyroscope = 4,
    Light = 5,
    Pressure = 6,
    Temperature = 7,
    Proximity = 8,
    Gravity = 9,
    LinearAcceleration = 10,
    RotationVector = 11,
    RelativeHumidity = 12,
    AmbientTemperature = 13,
    MagneticFieldUncalibrated = 14,
    GameRotationVector = 15,
    GyroscopeUncalibrated = 16,
    SignificantMotion = 17,
    StepDetector = 18,
    StepCounter = 19,
    GeomagneticRotationVector = 20,
}

impl HalSensorType {
    pub const ALL: [HalSensorType; 20] = [
        Self::Accelerometer,
        Self::MagneticField,
        Self::Orientation,
        Self::Gyroscope,
        Self::Light,
        Self::Pressure,
        Self::Temperature,
        Self::Proximity,
        Self::Gravity,
        Self::LinearAcceleration,
        Self::RotationVector,
        Self::RelativeHumidity,
        Self::AmbientTemperature,
        Self::MagneticFieldUncalibrated,
        Self::GameRotationVector,
        Self::GyroscopeUncalibrated,
        Self::SignificantMotion,
        Self::StepDetector,
        Self::StepCounter,
        Self::GeomagneticRotationVector,
    ];

    /// Map a raw platform code, `None` for vendor or unknown types
    pub fn from_code(code: i32) -> Option<Self> {
        Self::ALL.iter().copied().find(|t| t.code() == code)
    }

    #[inline]
    pub fn code(self) -> i32 {
        self as i32
    }
}

/// Static description of one physical sensor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensorInfo {
    /// Backend-assigned handle
    pub handle: i32,
    /// Raw type code, see [`HalSensorType`]
    pub sensor_type: i32,
    pub name: String,
    pub vendor: String,
    pub max_range: f32,
    pub resolution: f32,
    pub power_ma: f32,
    /// Minimum delay between samples in microseconds
    pub min_delay_us: i32,
    /// Maximum delay in microseconds, `None` when the platform API predates it
    pub max_delay_us: Option<i32>,
}

impl SensorInfo {
    /// Convenience constructor used by mocks and tests
    pub fn new(handle: i32, sensor_type: HalSensorType, name: impl Into<String>) -> Self {
        Self {
            handle,
            sensor_type: sensor_type.code(),
            name: name.into(),
            vendor: String::new(),
            max_range: 0.0,
            resolution: 0.0,
            power_ma: 0.0,
            min_delay_us: 0,
            max_delay_us: None,
        }
    }

    pub fn with_range(mut self, max_range: f32, resolution: f32) -> Self {
        self.max_range = max_range;
        self.resolution = resolution;
        self
    }

    pub fn with_delays(mut self, min_delay_us: i32, max_delay_us: Option<i32>) -> Self {
        self.min_delay_us = min_delay_us;
        self.max_delay_us = max_delay_us;
        self
    }

    pub fn kind(&self) -> Option<HalSensorType> {
        HalSensorType::from_code(self.sensor_type)
    }
}

/// One event record as produced by `poll`.
///
/// `data` mirrors the platform union: vectors use slots 0..3 with the status
/// byte in slot 3; scalars (light, pressure, distance, humidity, temperature)
/// use slot 0; the step counter uses `step_counter`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HalEvent {
    pub version: i32,
    pub sensor: i32,
    pub sensor_type: i32,
    pub timestamp_ns: i64,
    pub data: [f32; EVENT_DATA_LEN],
    pub step_counter: u64,
}

impl Default for HalEvent {
    fn default() -> Self {
        Self {
            version: SENSORS_EVENT_SIZE,
            sensor: 0,
            sensor_type: 0,
            timestamp_ns: 0,
            data: [0.0; EVENT_DATA_LEN],
            step_counter: 0,
        }
    }
}

impl HalEvent {
    pub fn new(sensor: i32, sensor_type: HalSensorType, timestamp_ns: i64) -> Self {
        Self {
            sensor,
            sensor_type: sensor_type.code(),
            timestamp_ns,
            ..Self::default()
        }
    }

    /// Fill the leading data slots
    pub fn with_values(mut self, values: &[f32]) -> Self {
        for (slot, v) in self.data.iter_mut().zip(values) {
            *slot = *v;
        }
        self
    }

    pub fn with_step_counter(mut self, steps: u64) -> Self {
        self.step_counter = steps;
        self
    }

    /// Timestamp converted to microseconds
    #[inline]
    pub fn timestamp_us(&self) -> u64 {
        (self.timestamp_ns as f64 * 0.001) as u64
    }

    #[inline]
    pub fn scalar(&self) -> f32 {
        self.data[0]
    }

    #[inline]
    pub fn vector(&self) -> (f32, f32, f32) {
        (self.data[0], self.data[1], self.data[2])
    }

    /// Accuracy status carried by vector events
    #[inline]
    pub fn status(&self) -> i32 {
        self.data[3] as i32
    }

    /// Whether the record has the layout this build expects
    #[inline]
    pub fn is_well_formed(&self) -> bool {
        self.version == SENSORS_EVENT_SIZE
    }

    pub fn kind(&self) -> Option<HalSensorType> {
        HalSensorType::from_code(self.sensor_type)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_type_codes_round_trip() {
        for t in HalSensorType::ALL {
            assert_eq!(HalSensorType::from_code(t.code()), Some(t));
        }
        assert_eq!(HalSensorType::from_code(65536), None);
    }

    #[test]
    fn test_event_accessors() {
        let ev = HalEvent::new(4, HalSensorType::MagneticField, 2_000_000)
            .with_values(&[1.0, 2.0, 3.0, 2.0]);
        assert_eq!(ev.vector(), (1.0, 2.0, 3.0));
        assert_eq!(ev.status(), 2);
        assert_eq!(ev.timestamp_us(), 2000);
        assert!(ev.is_well_formed());
    }
}
