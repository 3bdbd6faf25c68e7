//! Value and interval ranges advertised by adaptors

use serde::{Deserialize, Serialize};

/// Closed range with a step size.
///
/// Used both for measurement ranges (min, max, resolution) and for
/// sampling interval ranges in milliseconds (min, max, step).
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct DataRange {
    pub min: f64,
    pub max: f64,
    pub resolution: f64,
}

impl DataRange {
    pub const fn new(min: f64, max: f64, resolution: f64) -> Self {
        Self {
            min,
            max,
            resolution,
        }
    }

    /// Whether `value` lies inside the range, bounds included
    #[inline]
    pub fn contains(&self, value: f64) -> bool {
        value >= self.min && value <= self.max
    }

    /// Clamp an interval into the range
    pub fn clamp_interval(&self, interval_ms: u32) -> u32 {
        let v = f64::from(interval_ms).clamp(self.min, self.max.max(self.min));
        v as u32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_contains_is_inclusive() {
        let r = DataRange::new(0.0, 4095.0, 1.0);
        assert!(r.contains(0.0));
        assert!(r.contains(4095.0));
        assert!(!r.contains(4095.5));
    }

    #[test]
    fn test_clamp_interval() {
        let r = DataRange::new(10.0, 586.0, 0.0);
        assert_eq!(r.clamp_interval(0), 10);
        assert_eq!(r.clamp_interval(50), 50);
        assert_eq!(r.clamp_interval(1000), 586);
    }
}
