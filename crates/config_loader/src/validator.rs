//! Config validation
//!
//! Field ranges are checked by the `validator` derives on the contract
//! types; the rules below need more than one field:
//! - `log_level` is a known level
//! - every configured `default_interval` is positive
//! - `input_match` entries are non-empty
//! - evdev adaptors can locate their device (`input_match` or `device_path`)

use contracts::{AdaptorKind, DaemonConfig, Result, SensorError, SensorName};
use validator::Validate;

const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// Return the first violation found
pub fn validate(config: &DaemonConfig) -> Result<()> {
    config
        .validate()
        .map_err(|e| SensorError::config_validation("daemon", e.to_string()))?;
    validate_log_level(config)?;
    validate_sensor_settings(config)?;
    validate_evdev_sources(config)?;
    Ok(())
}

fn validate_log_level(config: &DaemonConfig) -> Result<()> {
    let level = config.daemon.log_level.to_lowercase();
    if !LOG_LEVELS.contains(&level.as_str()) {
        return Err(SensorError::config_validation(
            "daemon.log_level",
            format!("unknown level '{}', expected one of {}", config.daemon.log_level, LOG_LEVELS.join("/")),
        ));
    }
    Ok(())
}

fn validate_sensor_settings(config: &DaemonConfig) -> Result<()> {
    for (group, settings) in &config.sensors {
        if settings.default_interval == Some(0) {
            return Err(SensorError::config_validation(
                format!("sensors.{group}.default_interval"),
                "default_interval must be > 0",
            ));
        }
        if settings.input_match.iter().any(|m| m.trim().is_empty()) {
            return Err(SensorError::config_validation(
                format!("sensors.{group}.input_match"),
                "input_match entries cannot be empty",
            ));
        }
    }
    Ok(())
}

fn validate_evdev_sources(config: &DaemonConfig) -> Result<()> {
    for (name, kind) in &config.adaptors {
        let evdev = matches!(
            kind,
            AdaptorKind::EvdevHumidity | AdaptorKind::EvdevPressure | AdaptorKind::EvdevTemperature | AdaptorKind::EvdevLid
        );
        if !evdev {
            continue;
        }
        let group = SensorName::new(name);
        let settings = config.sensor(group.config_group());
        if settings.input_match.is_empty() && settings.device_path.is_none() {
            return Err(SensorError::config_validation(
                format!("sensors.{}", group.config_group()),
                format!("evdev adaptor '{name}' needs input_match or device_path"),
            ));
        }
    }
    Ok(())
}
