//! Config parsing and layering
//!
//! Both formats are parsed into a `serde_json::Value` tree first so files can
//! be deep-merged before the typed `DaemonConfig` is built.

use contracts::{DaemonConfig, Result, SensorError};
use serde_json::Value;

/// Config file format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    Toml,
    Json,
}

impl ConfigFormat {
    /// Infer the format from a file extension
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_lowercase().as_str() {
            "toml" => Some(Self::Toml),
            "json" => Some(Self::Json),
            _ => None,
        }
    }
}

/// Parse into an untyped tree
pub fn parse_value(content: &str, format: ConfigFormat) -> Result<Value> {
    match format {
        ConfigFormat::Toml => toml::from_str(content).map_err(|e| SensorError::ConfigParse {
            message: format!("TOML parse error: {e}"),
            source: Some(Box::new(e)),
        }),
        ConfigFormat::Json => serde_json::from_str(content).map_err(|e| SensorError::ConfigParse {
            message: format!("JSON parse error: {e}"),
            source: Some(Box::new(e)),
        }),
    }
}

/// Recursively merge `overlay` into `base`; tables merge key by key,
/// anything else in `overlay` replaces the value in `base`
pub fn merge(base: &mut Value, overlay: Value) {
    match (base, overlay) {
        (Value::Object(base), Value::Object(overlay)) => {
            for (key, value) in overlay {
                match base.get_mut(&key) {
                    Some(existing) => merge(existing, value),
                    None => {
                        base.insert(key, value);
                    }
                }
            }
        }
        (base, overlay) => *base = overlay,
    }
}

/// Build the typed config from a merged tree
pub fn into_config(value: Value) -> Result<DaemonConfig> {
    serde_json::from_value(value).map_err(|e| SensorError::ConfigParse {
        message: format!("invalid config structure: {e}"),
        source: Some(Box::new(e)),
    })
}

/// Parse one document straight into the typed config
pub fn parse(content: &str, format: ConfigFormat) -> Result<DaemonConfig> {
    into_config(parse_value(content, format)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::{AdaptorKind, BackendKind, ConfigValue};
    use serde_json::json;

    #[test]
    fn test_parse_toml_sections() {
        let cfg = parse(
            r#"
[daemon]
backend = "binder-loopback"
batch_size = 8

[adaptors]
pressureadaptor = "hybris-pressure"

[sensors.pressure]
default_interval = 100
calibration = 1.5
"#,
            ConfigFormat::Toml,
        )
        .unwrap();
        assert_eq!(cfg.daemon.backend, BackendKind::BinderLoopback);
        assert_eq!(cfg.daemon.batch_size, 8);
        assert_eq!(cfg.adaptors["pressureadaptor"], AdaptorKind::HybrisPressure);
        assert_eq!(cfg.sensors["pressure"].default_interval, Some(100));
        assert_eq!(cfg.sensors["pressure"].extra["calibration"], ConfigValue::Float(1.5));
    }

    #[test]
    fn test_parse_json() {
        let cfg = parse(
            r#"{ "daemon": { "log_format": "json" }, "sensors": { "als": { "threshold": 3 } } }"#,
            ConfigFormat::Json,
        )
        .unwrap();
        assert_eq!(cfg.sensors["als"].threshold, Some(3));
    }

    #[test]
    fn test_syntax_error_is_parse_error() {
        let err = parse("invalid toml [[[", ConfigFormat::Toml).unwrap_err();
        assert!(matches!(err, SensorError::ConfigParse { .. }));
    }

    #[test]
    fn test_unknown_adaptor_kind_is_rejected() {
        let err = parse("[adaptors]\nfoo = \"hybris-teleporter\"\n", ConfigFormat::Toml).unwrap_err();
        assert!(err.to_string().contains("invalid config structure"));
    }

    #[test]
    fn test_deep_merge() {
        let mut base = json!({ "daemon": { "log_level": "info", "batch_size": 16 }, "sensors": { "als": { "threshold": 1 } } });
        merge(
            &mut base,
            json!({ "daemon": { "log_level": "debug" }, "sensors": { "proximity": { "threshold": 5 } } }),
        );
        assert_eq!(base["daemon"]["log_level"], "debug");
        assert_eq!(base["daemon"]["batch_size"], 16);
        assert_eq!(base["sensors"]["als"]["threshold"], 1);
        assert_eq!(base["sensors"]["proximity"]["threshold"], 5);
    }

    #[test]
    fn test_format_from_extension() {
        assert_eq!(ConfigFormat::from_extension("TOML"), Some(ConfigFormat::Toml));
        assert_eq!(ConfigFormat::from_extension("json"), Some(ConfigFormat::Json));
        assert_eq!(ConfigFormat::from_extension("ini"), None);
    }
}
