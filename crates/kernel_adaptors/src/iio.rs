//! Industrial I/O adaptors
//!
//! Locates the IIO device by its `name` attribute and samples the per-axis
//! `*_raw` attributes on an interval, applying the device's `scale` and
//! `offset`. The triggered buffer is enabled while the adaptor runs.

use std::fs::{self, File};
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use adaptor_core::{write_to_file, DeviceAdaptor, RingBuffer};
use contracts::{CalibratedMagneticFieldData, DataRange, SensorSettings, TimedUnsigned, TimedXyzData};
use parking_lot::Mutex;
use tracing::{debug, info, warn};

use crate::sysfs::{PollMode, SampleProcessor, SysfsAdaptor};

const DEFAULT_IIO_BASE: &str = "/sys/bus/iio/devices";

const IIO_DATA_RANGE: DataRange = DataRange::new(0.0, 65535.0, 1.0);
const IIO_INTERVAL_RANGE: DataRange = DataRange::new(0.0, 586.0, 0.0);
const IIO_DEFAULT_INTERVAL: u32 = 10;
const IIO_BUFFER_LENGTH: u32 = 100;

/// Accelerometer and gyroscope axes are reported with inverted sign and
/// published in hundredths.
const MOTION_SCALE: f64 = 100.0;

/// Sensor families served over IIO
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IioDeviceKind {
    Accelerometer,
    Gyroscope,
    Magnetometer,
    Light,
}

impl IioDeviceKind {
    /// Value of the device's `name` attribute
    pub fn device_name(self) -> &'static str {
        match self {
            Self::Accelerometer => "accel_3d",
            Self::Gyroscope => "gyro_3d",
            Self::Magnetometer => "magn_3d",
            Self::Light => "als",
        }
    }

    fn output(self) -> (&'static str, &'static str) {
        match self {
            Self::Accelerometer => ("accelerometer", "accelerometer input"),
            Self::Gyroscope => ("gyroscope", "gyroscope input"),
            Self::Magnetometer => ("magnetometer", "magnetometer input"),
            Self::Light => ("als", "ambient light input"),
        }
    }

    fn description(self) -> String {
        let label = match self {
            Self::Accelerometer => "accelerometer",
            Self::Gyroscope => "gyroscope",
            Self::Magnetometer => "magnetometer",
            Self::Light => "ambient light",
        };
        format!("Industrial I/O {label} ({})", self.device_name())
    }
}

/// Byte width of a scan element from its `type` attribute, e.g. `le:s16/16>>0`
pub fn parse_scan_type(text: &str) -> Option<usize> {
    let (_, format) = text.trim().split_once(':')?;
    let sign = format.chars().next()?;
    if sign != 's' && sign != 'u' {
        return None;
    }
    let bits: usize = format[1..].split('/').next()?.parse().ok()?;
    match bits {
        8 | 16 | 32 | 64 => Some(bits / 8),
        _ => None,
    }
}

/// Device directory under `base` whose `name` attribute equals `name`
pub fn find_iio_device(base: &Path, name: &str) -> Option<PathBuf> {
    let mut dirs: Vec<PathBuf> = fs::read_dir(base)
        .ok()?
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| p.file_name().is_some_and(|n| n.to_string_lossy().starts_with("iio:device")))
        .collect();
    dirs.sort();
    dirs.into_iter()
        .find(|dir| fs::read_to_string(dir.join("name")).is_ok_and(|n| n.trim() == name))
}

fn read_number(path: &Path) -> Option<f64> {
    fs::read_to_string(path).ok()?.trim().parse().ok()
}

/// Device attributes relevant to sampling
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IioChannels {
    /// `*_raw` attributes in axis order
    pub raw: Vec<PathBuf>,
    pub scale: f64,
    pub offset: f64,
}

/// Collect the raw attributes plus the first `*scale`/`*offset` found
pub fn scan_channels(device_dir: &Path) -> IioChannels {
    let mut names: Vec<String> = match fs::read_dir(device_dir) {
        Ok(entries) => entries
            .filter_map(|e| e.ok())
            .map(|e| e.file_name().to_string_lossy().into_owned())
            .collect(),
        Err(_) => Vec::new(),
    };
    names.sort();

    let mut channels = IioChannels {
        scale: 1.0,
        ..IioChannels::default()
    };
    let mut scale = None;
    let mut offset = None;
    for name in names {
        let path = device_dir.join(&name);
        if name.ends_with("_raw") {
            channels.raw.push(path);
        } else if name.ends_with("scale") && scale.is_none() {
            scale = read_number(&path);
        } else if name.ends_with("offset") && offset.is_none() {
            offset = read_number(&path);
        }
    }
    channels.scale = scale.unwrap_or(1.0);
    channels.offset = offset.unwrap_or(0.0);
    channels
}

/// Toggle every scan element and the buffer; returns bytes per scan
pub fn set_buffer_enabled(device_dir: &Path, enable: bool) -> usize {
    let flag: &[u8] = if enable { b"1" } else { b"0" };
    let buffer_dir = device_dir.join("buffer");
    if !enable {
        let _ = write_to_file(&buffer_dir.join("enable"), flag);
    }

    let mut scan_bytes = 0;
    let scan_dir = device_dir.join("scan_elements");
    if let Ok(entries) = fs::read_dir(&scan_dir) {
        for entry in entries.filter_map(|e| e.ok()) {
            let name = entry.file_name().to_string_lossy().into_owned();
            let Some(element) = name.strip_suffix("_en") else {
                continue;
            };
            if let Err(e) = write_to_file(&entry.path(), flag) {
                warn!(element, error = %e, "failed to toggle scan element");
                continue;
            }
            if enable {
                let type_path = scan_dir.join(format!("{element}_type"));
                scan_bytes += fs::read_to_string(type_path)
                    .ok()
                    .and_then(|t| parse_scan_type(&t))
                    .unwrap_or(0);
            }
        }
    }

    if enable && buffer_dir.is_dir() {
        let _ = write_to_file(&buffer_dir.join("length"), IIO_BUFFER_LENGTH.to_string().as_bytes());
        if let Err(e) = write_to_file(&buffer_dir.join("enable"), flag) {
            warn!(device = %device_dir.display(), error = %e, "failed to enable iio buffer");
        }
    }
    scan_bytes
}

/// Partially assembled sample; committed after the last channel
#[derive(Debug, Default)]
struct Pending {
    axes: [i32; 3],
    timestamp: u64,
}

/// Output buffer by record type
pub enum IioBuffer {
    Xyz(Arc<RingBuffer<TimedXyzData>>),
    Magnetic(Arc<RingBuffer<CalibratedMagneticFieldData>>),
    Scalar(Arc<RingBuffer<TimedUnsigned>>),
}

/// Converts raw attribute reads into records
pub struct IioProcessor {
    kind: IioDeviceKind,
    device_dir: Option<PathBuf>,
    channels: IioChannels,
    pending: Mutex<Pending>,
    buffer: IioBuffer,
}

impl IioProcessor {
    fn new(kind: IioDeviceKind, device_dir: Option<PathBuf>, channels: IioChannels) -> Self {
        let buffer = match kind {
            IioDeviceKind::Accelerometer | IioDeviceKind::Gyroscope => IioBuffer::Xyz(Arc::new(RingBuffer::new(1))),
            IioDeviceKind::Magnetometer => IioBuffer::Magnetic(Arc::new(RingBuffer::new(1))),
            IioDeviceKind::Light => IioBuffer::Scalar(Arc::new(RingBuffer::new(1))),
        };
        Self {
            kind,
            device_dir,
            channels,
            pending: Mutex::new(Pending::default()),
            buffer,
        }
    }

    pub fn buffer(&self) -> &IioBuffer {
        &self.buffer
    }

    pub fn channels(&self) -> &IioChannels {
        &self.channels
    }

    fn convert(&self, raw: i64) -> i32 {
        let value = (raw as f64 + self.channels.offset) * self.channels.scale;
        match self.kind {
            IioDeviceKind::Accelerometer | IioDeviceKind::Gyroscope => (-value * MOTION_SCALE) as i32,
            IioDeviceKind::Magnetometer | IioDeviceKind::Light => value as i32,
        }
    }

    /// Feed one channel reading; the last channel commits the sample
    pub fn handle_reading(&self, channel: usize, raw: i64, timestamp: u64) {
        let value = self.convert(raw);
        let mut pending = self.pending.lock();
        if let Some(axis) = pending.axes.get_mut(channel) {
            *axis = value;
        }
        pending.timestamp = timestamp;
        if channel + 1 < self.channels.raw.len() {
            return;
        }
        let [x, y, z] = pending.axes;
        match &self.buffer {
            IioBuffer::Xyz(buffer) => buffer.push(TimedXyzData::new(timestamp, x, y, z)),
            IioBuffer::Magnetic(buffer) => buffer.push(CalibratedMagneticFieldData {
                timestamp,
                x,
                y,
                z,
                rx: x,
                ry: y,
                rz: z,
                level: 0,
            }),
            IioBuffer::Scalar(buffer) => buffer.push(TimedUnsigned::new(timestamp, x.max(0) as u32)),
        }
    }
}

impl SampleProcessor for IioProcessor {
    fn process_sample(&self, path_id: usize, source: &File) {
        let mut text = String::new();
        let mut handle = source;
        if let Err(e) = handle.read_to_string(&mut text) {
            warn!(kind = ?self.kind, channel = path_id, error = %e, "raw read failed");
            return;
        }
        match text.trim().parse::<i64>() {
            Ok(raw) => self.handle_reading(path_id, raw, contracts::monotonic_us()),
            Err(_) => warn!(kind = ?self.kind, channel = path_id, text = text.trim(), "unparsable raw value"),
        }
    }

    fn prepare(&self) -> bool {
        if let Some(dir) = &self.device_dir {
            let scan_bytes = set_buffer_enabled(dir, true);
            debug!(kind = ?self.kind, scan_bytes, "iio buffer enabled");
        }
        true
    }

    fn release(&self) {
        if let Some(dir) = &self.device_dir {
            set_buffer_enabled(dir, false);
        }
    }
}

pub type IioAdaptor = SysfsAdaptor<IioProcessor>;

impl IioAdaptor {
    /// Adaptor for the first IIO device named after `kind` under the
    /// configured `iio_base`
    pub fn iio(kind: IioDeviceKind, name: &str, settings: &SensorSettings) -> Arc<Self> {
        let base = settings
            .iio_base
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_IIO_BASE));
        let device_dir = find_iio_device(&base, kind.device_name());
        let channels = match &device_dir {
            Some(dir) => {
                let channels = scan_channels(dir);
                info!(
                    adaptor = name,
                    device = %dir.display(),
                    channels = channels.raw.len(),
                    scale = channels.scale,
                    offset = channels.offset,
                    "iio device found"
                );
                channels
            }
            None => {
                warn!(adaptor = name, device = kind.device_name(), base = %base.display(), "iio device not found");
                IioChannels::default()
            }
        };

        let paths = channels.raw.clone();
        let processor = IioProcessor::new(kind, device_dir, channels);
        let (output, output_description) = kind.output();
        let adaptor = SysfsAdaptor::new(name, PollMode::Interval, paths, processor, settings);
        let core = adaptor.core();
        match adaptor.processor().buffer() {
            IioBuffer::Xyz(buffer) => core.set_adapted_sensor(output, output_description, Arc::clone(buffer)),
            IioBuffer::Magnetic(buffer) => core.set_adapted_sensor(output, output_description, Arc::clone(buffer)),
            IioBuffer::Scalar(buffer) => core.set_adapted_sensor(output, output_description, Arc::clone(buffer)),
        }
        core.set_description(kind.description());
        core.introduce_available_data_range(IIO_DATA_RANGE);
        core.introduce_available_interval(IIO_INTERVAL_RANGE);
        core.set_default_interval(settings.default_interval.unwrap_or(IIO_DEFAULT_INTERVAL));
        Arc::new(adaptor)
    }
}
