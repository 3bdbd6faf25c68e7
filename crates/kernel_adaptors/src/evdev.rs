//! Input-device adaptors
//!
//! Reads `struct input_event` records from `/dev/input/eventN` nodes and
//! lets an [`InputInterpreter`] turn them into samples. Devices are found by
//! matching the configured `input_match` substrings against the names the
//! kernel exposes under `/sys/class/input`.

use std::fs::{self, File};
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use adaptor_core::{DeviceAdaptor, RingBuffer};
use bytemuck::{Pod, Zeroable};
use contracts::{ConfigValue, DataRange, LidData, LidType, SensorSettings, TimedUnsigned};
use parking_lot::Mutex;
use tracing::{debug, info, trace, warn};

use crate::sysfs::{PollMode, SampleProcessor, SysfsAdaptor};

pub const EV_SYN: u16 = 0x00;
pub const EV_ABS: u16 = 0x03;
pub const EV_MSC: u16 = 0x04;
pub const EV_SW: u16 = 0x05;

pub const ABS_X: u16 = 0x00;
pub const ABS_MISC: u16 = 0x28;
pub const MSC_SCAN: u16 = 0x04;
pub const SW_LID: u16 = 0x00;

/// Scan codes some keyboards send for a closed/opened back cover
const SCAN_BACK_LID_CLOSED: i32 = 0xCC;
const SCAN_BACK_LID_OPENED: i32 = 0xCD;

const DEFAULT_INPUT_CLASS_PATH: &str = "/sys/class/input";
const DEFAULT_INPUT_DEV_PATH: &str = "/dev/input";

/// Events decoded per read
const READ_BATCH: usize = 64;

/// Kernel `struct input_event` on 64-bit targets
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Pod, Zeroable)]
pub struct InputEvent {
    pub tv_sec: i64,
    pub tv_usec: i64,
    pub kind: u16,
    pub code: u16,
    pub value: i32,
}

pub const INPUT_EVENT_SIZE: usize = std::mem::size_of::<InputEvent>();

impl InputEvent {
    pub fn new(kind: u16, code: u16, value: i32) -> Self {
        Self {
            kind,
            code,
            value,
            ..Self::default()
        }
    }

    pub fn at(mut self, tv_sec: i64, tv_usec: i64) -> Self {
        self.tv_sec = tv_sec;
        self.tv_usec = tv_usec;
        self
    }

    /// Event time in microseconds
    pub fn timestamp_us(&self) -> u64 {
        (self.tv_sec.max(0) as u64) * 1_000_000 + self.tv_usec.max(0) as u64
    }

    pub fn sync() -> Self {
        Self::new(EV_SYN, 0, 0)
    }
}

/// Split raw bytes into events; a trailing partial record is dropped
pub fn decode_events(bytes: &[u8]) -> Vec<InputEvent> {
    let chunks = bytes.chunks_exact(INPUT_EVENT_SIZE);
    if !chunks.remainder().is_empty() {
        warn!(bytes = chunks.remainder().len(), "partial input event dropped");
    }
    chunks.map(bytemuck::pod_read_unaligned::<InputEvent>).collect()
}

/// Turns one device's event stream into samples
pub trait InputInterpreter: Send + Sync + 'static {
    /// Any non-sync event
    fn interpret_event(&self, source: usize, event: &InputEvent);

    /// End of an event frame; commit what was gathered
    fn interpret_sync(&self, source: usize, event: &InputEvent);
}

/// Reads events and dispatches them to an interpreter
pub struct EvdevProcessor<I> {
    interpreter: I,
}

impl<I: InputInterpreter> EvdevProcessor<I> {
    pub fn new(interpreter: I) -> Self {
        Self { interpreter }
    }

    pub fn interpreter(&self) -> &I {
        &self.interpreter
    }

    pub fn dispatch(&self, source: usize, events: &[InputEvent]) {
        for event in events {
            trace!(source, kind = event.kind, code = event.code, value = event.value, "input event");
            if event.kind == EV_SYN {
                self.interpreter.interpret_sync(source, event);
            } else {
                self.interpreter.interpret_event(source, event);
            }
        }
    }
}

impl<I: InputInterpreter> SampleProcessor for EvdevProcessor<I> {
    fn process_sample(&self, path_id: usize, source: &File) {
        let mut raw = [0u8; INPUT_EVENT_SIZE * READ_BATCH];
        let mut handle = source;
        match handle.read(&mut raw) {
            Ok(0) => {}
            Ok(n) => self.dispatch(path_id, &decode_events(&raw[..n])),
            Err(e) => warn!(source = path_id, error = %e, "input read failed"),
        }
    }
}

/// An evdev-backed adaptor
pub type InputDevAdaptor<I> = SysfsAdaptor<EvdevProcessor<I>>;

/// Find `/dev/input/eventN` nodes whose device name contains any of
/// `matches`, at most `max_devices` of them, in event number order.
pub fn find_input_devices(class_dir: &Path, dev_dir: &Path, matches: &[String], max_devices: usize) -> Vec<PathBuf> {
    let Ok(entries) = fs::read_dir(class_dir) else {
        warn!(path = %class_dir.display(), "input class directory unreadable");
        return Vec::new();
    };
    let mut events: Vec<(u32, String)> = entries
        .filter_map(|e| e.ok())
        .filter_map(|e| {
            let node = e.file_name().to_string_lossy().into_owned();
            let number = node.strip_prefix("event")?.parse().ok()?;
            Some((number, node))
        })
        .collect();
    events.sort();

    let mut found = Vec::new();
    for (_, node) in events {
        let Ok(name) = fs::read_to_string(class_dir.join(&node).join("device/name")) else {
            continue;
        };
        let name = name.trim();
        if matches.iter().any(|m| name.contains(m.as_str())) {
            debug!(node = %node, device = name, "input device matched");
            found.push(dev_dir.join(&node));
            if found.len() >= max_devices {
                break;
            }
        }
    }
    found
}

/// Device nodes for one adaptor: the configured `device_path`, otherwise a
/// name search rooted at the `input_class_path` setting.
fn resolve_devices(name: &str, settings: &SensorSettings, max_devices: usize) -> Vec<PathBuf> {
    if let Some(path) = &settings.device_path {
        return vec![path.clone()];
    }
    if settings.input_match.is_empty() {
        warn!(adaptor = name, "no input_match configured");
        return Vec::new();
    }
    let class_dir = match settings.extra.get("input_class_path") {
        Some(ConfigValue::Text(p)) => PathBuf::from(p),
        _ => PathBuf::from(DEFAULT_INPUT_CLASS_PATH),
    };
    let devices = find_input_devices(&class_dir, Path::new(DEFAULT_INPUT_DEV_PATH), &settings.input_match, max_devices);
    if devices.is_empty() {
        warn!(adaptor = name, matches = ?settings.input_match, "no matching input device");
    } else {
        info!(adaptor = name, devices = devices.len(), "input devices found");
    }
    devices
}

/// Scalar environment sensors reporting through one absolute axis
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AbsValueKind {
    Humidity,
    Pressure,
    Temperature,
}

impl AbsValueKind {
    fn output(self) -> (&'static str, &'static str) {
        match self {
            Self::Humidity => ("humidity", "Relative Humidity values"),
            Self::Pressure => ("pressure", "Pressure values"),
            Self::Temperature => ("temperature", "Temperature values"),
        }
    }

    fn description(self) -> &'static str {
        match self {
            Self::Humidity => "Input device humidity adaptor",
            Self::Pressure => "Input device pressure adaptor",
            Self::Temperature => "Input device temperature adaptor",
        }
    }
}

const ABS_VALUE_RANGE: DataRange = DataRange::new(0.0, 4095.0, 1.0);
const ABS_VALUE_DEFAULT_INTERVAL: u32 = 10;

/// Latest `ABS_X`/`ABS_MISC` value, committed on sync
pub struct AbsValueInterpreter {
    kind: AbsValueKind,
    value: Mutex<u32>,
    buffer: Arc<RingBuffer<TimedUnsigned>>,
}

impl AbsValueInterpreter {
    pub fn new(kind: AbsValueKind) -> Self {
        Self {
            kind,
            value: Mutex::new(0),
            buffer: Arc::new(RingBuffer::new(1)),
        }
    }

    pub fn kind(&self) -> AbsValueKind {
        self.kind
    }

    pub fn buffer(&self) -> &Arc<RingBuffer<TimedUnsigned>> {
        &self.buffer
    }
}

impl InputInterpreter for AbsValueInterpreter {
    fn interpret_event(&self, _source: usize, event: &InputEvent) {
        if event.kind == EV_ABS && (event.code == ABS_X || event.code == ABS_MISC) {
            *self.value.lock() = event.value.max(0) as u32;
        }
    }

    fn interpret_sync(&self, _source: usize, event: &InputEvent) {
        let value = *self.value.lock();
        self.buffer.push(TimedUnsigned::new(event.timestamp_us(), value));
    }
}

impl InputDevAdaptor<AbsValueInterpreter> {
    /// Humidity, pressure or temperature over one input device
    pub fn abs_value(kind: AbsValueKind, name: &str, settings: &SensorSettings) -> Arc<Self> {
        let interpreter = AbsValueInterpreter::new(kind);
        let buffer = Arc::clone(interpreter.buffer());
        let devices = resolve_devices(name, settings, 1);
        let adaptor = SysfsAdaptor::new(name, PollMode::Select, devices, EvdevProcessor::new(interpreter), settings);

        let (output, output_description) = kind.output();
        let core = adaptor.core();
        core.set_adapted_sensor(output, output_description, buffer);
        core.set_description(kind.description());
        core.introduce_available_data_range(ABS_VALUE_RANGE);
        core.set_default_interval(settings.default_interval.unwrap_or(ABS_VALUE_DEFAULT_INTERVAL));
        Arc::new(adaptor)
    }

    pub fn buffer(&self) -> &Arc<RingBuffer<TimedUnsigned>> {
        self.processor().interpreter().buffer()
    }
}

#[derive(Debug, Default)]
struct LidState {
    current_type: LidType,
    current_value: Option<u32>,
    last_value: Option<u32>,
    using_front: bool,
}

/// Front lid switch plus keyboard scan codes for the back cover.
///
/// Back cover scan codes are ignored while the front lid switch reports
/// closed.
pub struct LidInterpreter {
    state: Mutex<LidState>,
    buffer: Arc<RingBuffer<LidData>>,
}

impl Default for LidInterpreter {
    fn default() -> Self {
        Self {
            state: Mutex::new(LidState::default()),
            buffer: Arc::new(RingBuffer::new(1)),
        }
    }
}

impl LidInterpreter {
    pub fn buffer(&self) -> &Arc<RingBuffer<LidData>> {
        &self.buffer
    }
}

impl InputInterpreter for LidInterpreter {
    fn interpret_event(&self, _source: usize, event: &InputEvent) {
        let mut state = self.state.lock();
        match (event.kind, event.code) {
            (EV_SW, SW_LID) => {
                let value = event.value.max(0) as u32;
                state.current_type = LidType::FrontLid;
                state.current_value = Some(value);
                state.using_front = value == 1;
            }
            (EV_MSC, MSC_SCAN) if !state.using_front => {
                let value = match event.value {
                    SCAN_BACK_LID_CLOSED => 1,
                    SCAN_BACK_LID_OPENED => 0,
                    _ => return,
                };
                state.current_type = LidType::BackLid;
                state.current_value = Some(value);
            }
            _ => {}
        }
    }

    fn interpret_sync(&self, _source: usize, event: &InputEvent) {
        let mut state = self.state.lock();
        let Some(value) = state.current_value else {
            return;
        };
        if state.last_value == Some(value) {
            return;
        }
        let accepted = match state.current_type {
            LidType::FrontLid => true,
            LidType::BackLid => !state.using_front,
            LidType::Unknown => false,
        };
        if !accepted {
            return;
        }
        state.last_value = Some(value);
        let sample = LidData {
            timestamp: event.timestamp_us(),
            lid_type: state.current_type,
            value,
        };
        drop(state);
        debug!(lid = ?sample.lid_type, value, "lid state changed");
        self.buffer.push(sample);
    }
}

const LID_RANGE: DataRange = DataRange::new(0.0, 1.0, 1.0);

impl InputDevAdaptor<LidInterpreter> {
    /// Lid switch over up to two input devices
    pub fn lid(name: &str, settings: &SensorSettings) -> Arc<Self> {
        let interpreter = LidInterpreter::default();
        let buffer = Arc::clone(interpreter.buffer());
        let devices = resolve_devices(name, settings, 2);
        let adaptor = SysfsAdaptor::new(name, PollMode::Select, devices, EvdevProcessor::new(interpreter), settings);

        let core = adaptor.core();
        core.set_adapted_sensor("lidsensor", "Lid state", buffer);
        core.set_description("Input device lid adaptor");
        core.introduce_available_data_range(LID_RANGE);
        if let Some(interval) = settings.default_interval {
            core.set_default_interval(interval);
        }
        Arc::new(adaptor)
    }

    pub fn buffer(&self) -> &Arc<RingBuffer<LidData>> {
        self.processor().interpreter().buffer()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::OpenOptions;
    use std::io::Write;
    use std::time::{Duration, Instant};

    use adaptor_core::BufferReader;
    use nix::sys::stat::Mode;
    use nix::unistd::mkfifo;

    fn as_bytes(events: &[InputEvent]) -> Vec<u8> {
        bytemuck::cast_slice(events).to_vec()
    }

    #[test]
    fn test_event_layout_matches_kernel() {
        assert_eq!(INPUT_EVENT_SIZE, 24);
        let events = [InputEvent::new(EV_ABS, ABS_X, 300).at(2, 500), InputEvent::sync()];
        let mut bytes = as_bytes(&events);
        bytes.extend_from_slice(&[0u8; 5]);
        let decoded = decode_events(&bytes);
        assert_eq!(decoded, events.to_vec());
        assert_eq!(decoded[0].timestamp_us(), 2_000_500);
    }

    #[test]
    fn test_abs_value_commits_on_sync() {
        let processor = EvdevProcessor::new(AbsValueInterpreter::new(AbsValueKind::Humidity));
        let mut reader = processor.interpreter().buffer().reader();
        processor.dispatch(0, &[InputEvent::new(EV_ABS, ABS_MISC, 451)]);
        assert!(reader.read().is_empty());
        processor.dispatch(0, &[InputEvent::new(EV_ABS, 0x01, 9), InputEvent::sync().at(0, 10)]);
        let out = reader.read();
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].value, 451);
        assert_eq!(out[0].timestamp, 10);
    }

    fn lid_values(
        processor: &EvdevProcessor<LidInterpreter>,
        reader: &mut BufferReader<LidData>,
        source: usize,
        events: &[InputEvent],
    ) -> Vec<(LidType, u32)> {
        processor.dispatch(source, events);
        reader.read().iter().map(|d| (d.lid_type, d.value)).collect()
    }

    #[test]
    fn test_front_lid_reports_changes_only() {
        let processor = EvdevProcessor::new(LidInterpreter::default());
        let mut reader = processor.interpreter().buffer().reader();
        let closed = [InputEvent::new(EV_SW, SW_LID, 1), InputEvent::sync()];
        let opened = [InputEvent::new(EV_SW, SW_LID, 0), InputEvent::sync()];
        assert_eq!(lid_values(&processor, &mut reader, 0, &closed), vec![(LidType::FrontLid, 1)]);
        assert!(lid_values(&processor, &mut reader, 0, &closed).is_empty());
        assert_eq!(lid_values(&processor, &mut reader, 0, &opened), vec![(LidType::FrontLid, 0)]);
    }

    #[test]
    fn test_back_lid_scan_codes() {
        let processor = EvdevProcessor::new(LidInterpreter::default());
        let mut reader = processor.interpreter().buffer().reader();
        let closed = [InputEvent::new(EV_MSC, MSC_SCAN, SCAN_BACK_LID_CLOSED), InputEvent::sync()];
        let other_key = [InputEvent::new(EV_MSC, MSC_SCAN, 0x10), InputEvent::sync()];
        let opened = [InputEvent::new(EV_MSC, MSC_SCAN, SCAN_BACK_LID_OPENED), InputEvent::sync()];
        assert_eq!(lid_values(&processor, &mut reader, 1, &closed), vec![(LidType::BackLid, 1)]);
        assert!(lid_values(&processor, &mut reader, 1, &other_key).is_empty());
        assert_eq!(lid_values(&processor, &mut reader, 1, &opened), vec![(LidType::BackLid, 0)]);
    }

    #[test]
    fn test_front_lid_masks_back_cover() {
        let processor = EvdevProcessor::new(LidInterpreter::default());
        let mut reader = processor.interpreter().buffer().reader();
        let front_closed = [InputEvent::new(EV_SW, SW_LID, 1), InputEvent::sync()];
        let back_opened = [InputEvent::new(EV_MSC, MSC_SCAN, SCAN_BACK_LID_OPENED), InputEvent::sync()];
        assert_eq!(lid_values(&processor, &mut reader, 0, &front_closed), vec![(LidType::FrontLid, 1)]);
        assert!(lid_values(&processor, &mut reader, 1, &back_opened).is_empty());
    }

    #[test]
    fn test_back_cover_tracked_again_after_front_lid_opens() {
        let processor = EvdevProcessor::new(LidInterpreter::default());
        let mut reader = processor.interpreter().buffer().reader();
        let front_closed = [InputEvent::new(EV_SW, SW_LID, 1), InputEvent::sync()];
        let front_opened = [InputEvent::new(EV_SW, SW_LID, 0), InputEvent::sync()];
        let back_closed = [InputEvent::new(EV_MSC, MSC_SCAN, SCAN_BACK_LID_CLOSED), InputEvent::sync()];
        assert_eq!(lid_values(&processor, &mut reader, 0, &front_closed), vec![(LidType::FrontLid, 1)]);
        assert_eq!(lid_values(&processor, &mut reader, 0, &front_opened), vec![(LidType::FrontLid, 0)]);
        assert_eq!(lid_values(&processor, &mut reader, 1, &back_closed), vec![(LidType::BackLid, 1)]);
    }

    #[test]
    fn test_find_input_devices_by_name() {
        let dir = tempfile::tempdir().unwrap();
        for (node, name) in [("event0", "gpio-keys"), ("event3", "hts221 humidity"), ("event12", "lps22 humidity")] {
            let device = dir.path().join(node).join("device");
            fs::create_dir_all(&device).unwrap();
            fs::write(device.join("name"), format!("{name}\n")).unwrap();
        }
        fs::create_dir_all(dir.path().join("mouse0")).unwrap();

        let matches = vec!["humidity".to_string()];
        let found = find_input_devices(dir.path(), Path::new("/dev/input"), &matches, 1);
        assert_eq!(found, vec![PathBuf::from("/dev/input/event3")]);
        let found = find_input_devices(dir.path(), Path::new("/dev/input"), &matches, 2);
        assert_eq!(found.len(), 2);
        assert!(find_input_devices(dir.path(), Path::new("/dev/input"), &["accel".to_string()], 2).is_empty());
    }

    #[test]
    fn test_no_device_marks_invalid() {
        let dir = tempfile::tempdir().unwrap();
        let mut settings = SensorSettings {
            input_match: vec!["humidity".to_string()],
            ..SensorSettings::default()
        };
        settings
            .extra
            .insert("input_class_path".to_string(), ConfigValue::Text(dir.path().display().to_string()));
        let adaptor = InputDevAdaptor::abs_value(AbsValueKind::Humidity, "humidityadaptor", &settings);
        assert!(!adaptor.is_valid());
    }

    #[test]
    fn test_humidity_adaptor_reads_device_node() {
        let dir = tempfile::tempdir().unwrap();
        let node = dir.path().join("event5");
        mkfifo(&node, Mode::S_IRUSR | Mode::S_IWUSR).unwrap();
        // Read-write open never blocks on a fifo and keeps a writer alive
        let mut writer = OpenOptions::new().read(true).write(true).open(&node).unwrap();

        let settings = SensorSettings {
            device_path: Some(node.clone()),
            ..SensorSettings::default()
        };
        let adaptor = InputDevAdaptor::abs_value(AbsValueKind::Temperature, "temperatureadaptor", &settings);
        assert_eq!(adaptor.core().description(), "Input device temperature adaptor");
        assert_eq!(adaptor.core().default_interval(), 10);
        let mut reader = adaptor.buffer().reader();
        assert!(adaptor.start_sensor());

        writer
            .write_all(&as_bytes(&[InputEvent::new(EV_ABS, ABS_X, 2315), InputEvent::sync().at(1, 0)]))
            .unwrap();
        let deadline = Instant::now() + Duration::from_secs(2);
        while !reader.has_unread() && Instant::now() < deadline {
            std::thread::sleep(Duration::from_millis(5));
        }
        adaptor.stop_sensor();
        let out = reader.read();
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].value, 2315);
        assert_eq!(out[0].timestamp, 1_000_000);
    }
}
