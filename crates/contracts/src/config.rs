//! Daemon configuration
//!
//! Typed view of the key/value store. Per-sensor settings are read once at
//! adaptor construction through [`DaemonConfig::sensor`] or the
//! `"<group>/<key>"` lookup in [`DaemonConfig::value`].

use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use validator::Validate;

/// Top-level configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct DaemonConfig {
    #[validate(nested)]
    pub daemon: DaemonSettings,

    /// Adaptor name -> backend kind
    pub adaptors: BTreeMap<String, AdaptorKind>,

    /// Config group -> per-sensor settings
    pub sensors: BTreeMap<String, SensorSettings>,
}

impl DaemonConfig {
    /// Settings for one sensor group, empty defaults when absent
    pub fn sensor(&self, group: &str) -> SensorSettings {
        self.sensors.get(group).cloned().unwrap_or_default()
    }

    /// Look up `"<group>/<key>"` as a string.
    ///
    /// Known keys are read from the typed fields; anything else comes from
    /// the group's free-form entries.
    pub fn value(&self, key: &str) -> Option<String> {
        let (group, key) = key.split_once('/')?;
        let s = self.sensors.get(group)?;
        match key {
            "powerstate_path" => s.powerstate_path.as_ref().map(|p| p.display().to_string()),
            "threshold" => s.threshold.map(|v| v.to_string()),
            "default_interval" => s.default_interval.map(|v| v.to_string()),
            "poll_interval_path" => s
                .poll_interval_path
                .as_ref()
                .map(|p| p.display().to_string()),
            "device_path" => s.device_path.as_ref().map(|p| p.display().to_string()),
            "iio_base" => s.iio_base.as_ref().map(|p| p.display().to_string()),
            "input_match" if !s.input_match.is_empty() => Some(s.input_match.join(",")),
            other => s.extra.get(other).map(ToString::to_string),
        }
    }
}

/// `[daemon]` section
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct DaemonSettings {
    pub log_level: String,
    pub log_format: LogFormatSetting,
    /// Prometheus listener port, `None` disables the exporter
    pub metrics_port: Option<u16>,
    pub backend: BackendKind,
    /// File receiving temporary wake lock requests
    pub wakelock_path: Option<PathBuf>,
    #[validate(range(min = 1))]
    pub reader_join_timeout_ms: u64,
    #[validate(range(min = 1))]
    pub poll_retry_ms: u64,
    #[validate(range(min = 1))]
    pub reconnect_delay_ms: u64,
    #[validate(range(min = 1, max = 256))]
    pub batch_size: usize,
}

impl Default for DaemonSettings {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormatSetting::default(),
            metrics_port: None,
            backend: BackendKind::default(),
            wakelock_path: Some(PathBuf::from("/sys/power/wake_lock")),
            reader_join_timeout_ms: 3000,
            poll_retry_ms: 1000,
            reconnect_delay_ms: 1000,
            batch_size: 16,
        }
    }
}

/// Log output format as written in the config file
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormatSetting {
    Json,
    #[default]
    Pretty,
    Compact,
}

/// Which platform sensor provider backs the hybris adaptors
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BackendKind {
    /// In-process simulated HAL
    #[default]
    Mock,
    /// Binder event loop against an in-process loopback service
    BinderLoopback,
    /// No platform backend; only kernel adaptors are available
    Disabled,
}

/// Backend implementation behind one adaptor name
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AdaptorKind {
    HybrisAccelerometer,
    HybrisGyroscope,
    HybrisMagnetometer,
    HybrisPressure,
    HybrisProximity,
    HybrisAls,
    HybrisOrientation,
    HybrisRotation,
    HybrisStepcounter,
    IioAccelerometer,
    IioGyroscope,
    IioMagnetometer,
    IioAls,
    EvdevHumidity,
    EvdevPressure,
    EvdevTemperature,
    EvdevLid,
    SysfsProximity,
}

impl AdaptorKind {
    pub fn is_hybris(self) -> bool {
        matches!(
            self,
            Self::HybrisAccelerometer
                | Self::HybrisGyroscope
                | Self::HybrisMagnetometer
                | Self::HybrisPressure
                | Self::HybrisProximity
                | Self::HybrisAls
                | Self::HybrisOrientation
                | Self::HybrisRotation
                | Self::HybrisStepcounter
        )
    }
}

/// `[sensors.<group>]` section
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SensorSettings {
    /// File receiving "1"/"0" when hardware starts/stops
    pub powerstate_path: Option<PathBuf>,
    pub threshold: Option<i64>,
    /// Interval used when no session has a positive request
    pub default_interval: Option<u32>,
    /// Substrings matched against evdev device names
    pub input_match: Vec<String>,
    /// File receiving the effective interval in ms
    pub poll_interval_path: Option<PathBuf>,
    /// Explicit device node or sysfs attribute
    pub device_path: Option<PathBuf>,
    /// Root of the IIO device tree
    pub iio_base: Option<PathBuf>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, ConfigValue>,
}

/// Free-form config value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ConfigValue {
    Bool(bool),
    Integer(i64),
    Float(f64),
    Text(String),
    List(Vec<String>),
}

impl fmt::Display for ConfigValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(v) => write!(f, "{v}"),
            Self::Integer(v) => write!(f, "{v}"),
            Self::Float(v) => write!(f, "{v}"),
            Self::Text(v) => f.write_str(v),
            Self::List(v) => f.write_str(&v.join(",")),
        }
    }
}
