//! # Config Loader
//!
//! Daemon configuration loading.
//!
//! Responsibilities:
//! - Parse TOML/JSON configuration files
//! - Layer a `conf.d` directory under the primary file
//! - Validate the merged result
//!
//! # Example
//!
//! ```no_run
//! use config_loader::ConfigLoader;
//! use std::path::Path;
//!
//! let config = ConfigLoader::load_with_conf_dir(
//!     Path::new("/etc/sensord.toml"),
//!     Some(Path::new("/etc/sensord.d")),
//! )
//! .unwrap();
//! println!("backend: {:?}", config.daemon.backend);
//! ```

mod parser;
mod validator;

pub use contracts::DaemonConfig;
pub use parser::ConfigFormat;

use std::path::{Path, PathBuf};

use contracts::{Result, SensorError};
use serde_json::Value;
use tracing::{debug, info};

/// Configuration loader
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load a single configuration file.
    ///
    /// The format comes from the file extension (.toml / .json).
    pub fn load_from_path(path: &Path) -> Result<DaemonConfig> {
        let format = Self::detect_format(path)?;
        let content = std::fs::read_to_string(path)?;
        Self::load_from_str(&content, format)
    }

    /// Parse and validate configuration text
    pub fn load_from_str(content: &str, format: ConfigFormat) -> Result<DaemonConfig> {
        let config = parser::parse(content, format)?;
        validator::validate(&config)?;
        Ok(config)
    }

    /// Load `primary` layered over every `*.toml`/`*.json` in `conf_dir`.
    ///
    /// Directory files apply in alphanumeric order and the primary file is
    /// applied last. A missing primary file or directory leaves defaults in
    /// place; a file that exists but does not parse is an error.
    pub fn load_with_conf_dir(primary: &Path, conf_dir: Option<&Path>) -> Result<DaemonConfig> {
        let mut merged = Value::Object(Default::default());
        if let Some(dir) = conf_dir {
            for path in Self::conf_dir_files(dir)? {
                debug!(path = %path.display(), "applying config fragment");
                parser::merge(&mut merged, Self::read_value(&path)?);
            }
        }
        if primary.exists() {
            parser::merge(&mut merged, Self::read_value(primary)?);
        } else {
            info!(path = %primary.display(), "primary config not found, using defaults");
        }

        let config = parser::into_config(merged)?;
        validator::validate(&config)?;
        Ok(config)
    }

    /// Validate an already-built config
    pub fn validate(config: &DaemonConfig) -> Result<()> {
        validator::validate(config)
    }

    pub fn to_toml(config: &DaemonConfig) -> Result<String> {
        toml::to_string_pretty(config).map_err(|e| SensorError::config_parse(format!("TOML serialize error: {e}")))
    }

    pub fn to_json(config: &DaemonConfig) -> Result<String> {
        serde_json::to_string_pretty(config).map_err(|e| SensorError::config_parse(format!("JSON serialize error: {e}")))
    }
}

impl ConfigLoader {
    fn detect_format(path: &Path) -> Result<ConfigFormat> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .ok_or_else(|| SensorError::config_parse("cannot determine file format from extension"))?;

        ConfigFormat::from_extension(ext).ok_or_else(|| SensorError::config_parse(format!("unsupported config format: .{ext}")))
    }

    fn read_value(path: &Path) -> Result<Value> {
        let format = Self::detect_format(path)?;
        let content = std::fs::read_to_string(path)?;
        parser::parse_value(&content, format).map_err(|e| match e {
            SensorError::ConfigParse { message, source } => SensorError::ConfigParse {
                message: format!("{}: {message}", path.display()),
                source,
            },
            other => other,
        })
    }

    /// Config fragments in `dir`, sorted; other files are ignored
    fn conf_dir_files(dir: &Path) -> Result<Vec<PathBuf>> {
        if !dir.is_dir() {
            return Ok(Vec::new());
        }
        let mut files: Vec<PathBuf> = std::fs::read_dir(dir)?
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .filter(|p| {
                p.is_file()
                    && p.extension()
                        .and_then(|e| e.to_str())
                        .is_some_and(|e| ConfigFormat::from_extension(e).is_some())
            })
            .collect();
        files.sort();
        Ok(files)
    }
}
