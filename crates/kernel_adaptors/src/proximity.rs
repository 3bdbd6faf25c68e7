//! Proximity from an ASCII sysfs attribute

use std::fs::File;
use std::io::Read;
use std::path::PathBuf;
use std::sync::Arc;

use adaptor_core::{DeviceAdaptor, RingBuffer};
use contracts::{monotonic_us, DataRange, ProximityData, SensorSettings};
use tracing::{trace, warn};

use crate::sysfs::{PollMode, SampleProcessor, SysfsAdaptor};

const DEFAULT_DEVICE_PATH: &str = "/sys/bus/i2c/devices/5-0055/apds9802ps/proximity_output";
const PROXIMITY_RANGE: DataRange = DataRange::new(0.0, 4096.0, 1.0);
const BUFFER_SIZE: usize = 16;
const DEFAULT_THRESHOLD: u32 = 1;
const DEFAULT_INTERVAL: u32 = 100;

/// Leading decimal integer of an attribute, ignoring trailing text
pub fn parse_ascii_value(text: &str) -> Option<u32> {
    let text = text.trim_start();
    let end = text.find(|c: char| !c.is_ascii_digit()).unwrap_or(text.len());
    text[..end].parse().ok()
}

pub struct AsciiProximityProcessor {
    threshold: u32,
    buffer: Arc<RingBuffer<ProximityData>>,
}

impl AsciiProximityProcessor {
    pub fn new(threshold: u32) -> Self {
        Self {
            threshold,
            buffer: Arc::new(RingBuffer::new(BUFFER_SIZE)),
        }
    }

    pub fn buffer(&self) -> &Arc<RingBuffer<ProximityData>> {
        &self.buffer
    }

    /// Readings at or above the threshold count as near
    pub fn publish(&self, value: u32) {
        trace!(value, "proximity reading");
        self.buffer.push(ProximityData {
            timestamp: monotonic_us(),
            value,
            within_proximity: value >= self.threshold,
        });
    }
}

impl SampleProcessor for AsciiProximityProcessor {
    fn process_sample(&self, _path_id: usize, source: &File) {
        let mut text = String::new();
        let mut handle = source;
        if let Err(e) = handle.read_to_string(&mut text) {
            warn!(error = %e, "proximity read failed");
            return;
        }
        match parse_ascii_value(&text) {
            Some(value) => self.publish(value),
            None => warn!(text = text.trim(), "unparsable proximity value"),
        }
    }
}

pub type ProximityAsciiAdaptor = SysfsAdaptor<AsciiProximityProcessor>;

impl ProximityAsciiAdaptor {
    /// Reads `device_path` once per interval; a missing file leaves the
    /// adaptor invalid
    pub fn ascii(name: &str, settings: &SensorSettings) -> Arc<Self> {
        let path = settings
            .device_path
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_DEVICE_PATH));
        let threshold = settings
            .threshold
            .and_then(|t| u32::try_from(t).ok())
            .unwrap_or(DEFAULT_THRESHOLD);
        let paths = if path.exists() {
            vec![path]
        } else {
            warn!(adaptor = name, path = %path.display(), "proximity attribute missing");
            Vec::new()
        };

        let processor = AsciiProximityProcessor::new(threshold);
        let buffer = Arc::clone(processor.buffer());
        let adaptor = SysfsAdaptor::new(name, PollMode::Interval, paths, processor, settings);
        let core = adaptor.core();
        core.set_adapted_sensor("proximity", "apds9802ps ascii proximity", buffer);
        core.set_description("apds9802ps ascii");
        core.introduce_available_data_range(PROXIMITY_RANGE);
        core.set_default_interval(settings.default_interval.unwrap_or(DEFAULT_INTERVAL));
        Arc::new(adaptor)
    }

    pub fn buffer(&self) -> &Arc<RingBuffer<ProximityData>> {
        self.processor().buffer()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{Duration, Instant};

    use adaptor_core::DeviceAdaptor;
    use contracts::SessionId;

    #[test]
    fn test_parse_ascii_value() {
        assert_eq!(parse_ascii_value("42\n"), Some(42));
        assert_eq!(parse_ascii_value("  17 mm"), Some(17));
        assert_eq!(parse_ascii_value("near"), None);
        assert_eq!(parse_ascii_value(""), None);
    }

    #[test]
    fn test_threshold_decides_near() {
        let processor = AsciiProximityProcessor::new(30);
        let mut reader = processor.buffer().reader();
        processor.publish(29);
        processor.publish(30);
        let out = reader.read();
        assert!(!out[0].within_proximity);
        assert!(out[1].within_proximity);
    }

    #[test]
    fn test_missing_attribute_is_invalid() {
        let dir = tempfile::tempdir().unwrap();
        let settings = SensorSettings {
            device_path: Some(dir.path().join("proximity_output")),
            ..SensorSettings::default()
        };
        assert!(!ProximityAsciiAdaptor::ascii("proximityadaptor", &settings).is_valid());
    }

    #[test]
    fn test_polls_attribute_at_interval() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("proximity_output");
        std::fs::write(&path, "55\n").unwrap();
        let settings = SensorSettings {
            device_path: Some(path.clone()),
            threshold: Some(50),
            ..SensorSettings::default()
        };
        let adaptor = ProximityAsciiAdaptor::ascii("proximityadaptor", &settings);
        let mut reader = adaptor.buffer().reader();
        adaptor.set_interval(5, SessionId(1));
        assert!(adaptor.start_sensor());

        let deadline = Instant::now() + Duration::from_secs(2);
        while adaptor.buffer().committed_count() < 3 && Instant::now() < deadline {
            std::thread::sleep(Duration::from_millis(5));
        }
        adaptor.stop_sensor();
        let out = reader.read();
        assert!(out.len() >= 3);
        assert!(out.iter().all(|d| d.value == 55 && d.within_proximity));
    }
}
