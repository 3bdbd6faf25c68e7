//! Timestamped sample records
//!
//! Plain fixed-width value structs written by adaptors into ring buffers
//! and read by channel filter chains.

use std::sync::OnceLock;
use std::time::Instant;

use serde::{Deserialize, Serialize};

/// Common contract for every sample record type.
pub trait SensorRecord: Clone + Default + std::fmt::Debug + Send + Sync + 'static {
    /// Monotonic timestamp in microseconds
    fn timestamp(&self) -> u64;

    /// Whether `other` carries the same measured value, ignoring the timestamp.
    ///
    /// Channels use this to suppress republishing unchanged values.
    fn same_value(&self, other: &Self) -> bool;
}

/// Microseconds since the first call in this process.
pub fn monotonic_us() -> u64 {
    static EPOCH: OnceLock<Instant> = OnceLock::new();
    EPOCH.get_or_init(Instant::now).elapsed().as_micros() as u64
}

/// Three-axis sample (accelerometer, gyroscope, raw magnetometer)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimedXyzData {
    pub timestamp: u64,
    pub x: i32,
    pub y: i32,
    pub z: i32,
}

impl TimedXyzData {
    pub fn new(timestamp: u64, x: i32, y: i32, z: i32) -> Self {
        Self { timestamp, x, y, z }
    }
}

impl SensorRecord for TimedXyzData {
    fn timestamp(&self) -> u64 {
        self.timestamp
    }

    fn same_value(&self, other: &Self) -> bool {
        (self.x, self.y, self.z) == (other.x, other.y, other.z)
    }
}

/// Single unsigned value (pressure, humidity, temperature, light, step count)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimedUnsigned {
    pub timestamp: u64,
    pub value: u32,
}

impl TimedUnsigned {
    pub fn new(timestamp: u64, value: u32) -> Self {
        Self { timestamp, value }
    }
}

impl SensorRecord for TimedUnsigned {
    fn timestamp(&self) -> u64 {
        self.timestamp
    }

    fn same_value(&self, other: &Self) -> bool {
        self.value == other.value
    }
}

/// Magnetometer sample with raw axes and calibration level
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CalibratedMagneticFieldData {
    pub timestamp: u64,
    pub x: i32,
    pub y: i32,
    pub z: i32,
    pub rx: i32,
    pub ry: i32,
    pub rz: i32,
    pub level: i32,
}

impl SensorRecord for CalibratedMagneticFieldData {
    fn timestamp(&self) -> u64 {
        self.timestamp
    }

    fn same_value(&self, other: &Self) -> bool {
        (self.x, self.y, self.z, self.level) == (other.x, other.y, other.z, other.level)
    }
}

/// Proximity reading
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProximityData {
    pub timestamp: u64,
    pub value: u32,
    pub within_proximity: bool,
}

impl SensorRecord for ProximityData {
    fn timestamp(&self) -> u64 {
        self.timestamp
    }

    fn same_value(&self, other: &Self) -> bool {
        self.value == other.value && self.within_proximity == other.within_proximity
    }
}

/// Which lid a [`LidData`] sample describes
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LidType {
    #[default]
    Unknown,
    FrontLid,
    BackLid,
}

/// Lid open/closed state, `value` 1 means closed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LidData {
    pub timestamp: u64,
    pub lid_type: LidType,
    pub value: u32,
}

impl SensorRecord for LidData {
    fn timestamp(&self) -> u64 {
        self.timestamp
    }

    fn same_value(&self, other: &Self) -> bool {
        self.value == other.value
    }
}

/// Heading sample
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompassData {
    pub timestamp: u64,
    pub degrees: i32,
    pub raw_degrees: i32,
    pub corrected_degrees: i32,
    pub level: i32,
}

impl CompassData {
    pub fn new(timestamp: u64, degrees: i32, level: i32) -> Self {
        Self {
            timestamp,
            degrees,
            raw_degrees: degrees,
            corrected_degrees: degrees,
            level,
        }
    }
}

impl SensorRecord for CompassData {
    fn timestamp(&self) -> u64 {
        self.timestamp
    }

    fn same_value(&self, other: &Self) -> bool {
        self.degrees == other.degrees && self.level == other.level
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_same_value_ignores_timestamp() {
        let a = TimedUnsigned::new(10, 42);
        let b = TimedUnsigned::new(20, 42);
        assert!(a.same_value(&b));
        assert!(!a.same_value(&TimedUnsigned::new(10, 43)));
    }

    #[test]
    fn test_lid_compares_value_only() {
        let front = LidData {
            timestamp: 1,
            lid_type: LidType::FrontLid,
            value: 1,
        };
        let back = LidData {
            timestamp: 2,
            lid_type: LidType::BackLid,
            value: 1,
        };
        assert!(front.same_value(&back));
    }

    #[test]
    fn test_monotonic_clock_does_not_go_backwards() {
        let a = monotonic_us();
        let b = monotonic_us();
        assert!(b >= a);
    }

    #[test]
    fn test_serde() {
        let d = TimedXyzData::new(5, 1, -2, 3);
        let json = serde_json::to_string(&d).unwrap();
        let back: TimedXyzData = serde_json::from_str(&json).unwrap();
        assert_eq!(d, back);
    }
}
