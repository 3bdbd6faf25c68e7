//! `validate` command implementation.

use std::collections::BTreeSet;

use anyhow::{Context, Result};
use contracts::{BackendKind, DaemonConfig, SensorName};
use serde::Serialize;
use tracing::info;

use super::load_config;
use crate::cli::{ConfigArgs, ValidateArgs};

/// Validation result for JSON output
#[derive(Serialize)]
struct ValidationResult {
    valid: bool,
    config_path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    warnings: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    summary: Option<ConfigSummary>,
}

#[derive(Serialize)]
struct ConfigSummary {
    backend: BackendKind,
    hybris_adaptors: usize,
    kernel_adaptors: usize,
    sensor_groups: usize,
}

/// Execute the `validate` command
pub fn run_validate(args: &ValidateArgs) -> Result<()> {
    info!(config = %args.config.config.display(), "Validating configuration");

    let result = validate_config(&args.config);

    if args.json {
        let json = serde_json::to_string_pretty(&result).context("Failed to serialize validation result")?;
        println!("{json}");
    } else {
        print_validation_result(&result);
    }

    if result.valid {
        Ok(())
    } else {
        anyhow::bail!("Configuration validation failed")
    }
}

fn validate_config(args: &ConfigArgs) -> ValidationResult {
    let config_path = args.config.display().to_string();
    match load_config(args) {
        Ok(config) => {
            let mut warnings = collect_warnings(&config);
            if !args.config.exists() {
                warnings.insert(0, format!("{config_path} not found, defaults and fragments only"));
            }
            let hybris = config.adaptors.values().filter(|k| k.is_hybris()).count();
            ValidationResult {
                valid: true,
                config_path,
                error: None,
                warnings,
                summary: Some(ConfigSummary {
                    backend: config.daemon.backend,
                    hybris_adaptors: hybris,
                    kernel_adaptors: config.adaptors.len() - hybris,
                    sensor_groups: config.sensors.len(),
                }),
            }
        }
        Err(e) => ValidationResult {
            valid: false,
            config_path,
            error: Some(e.to_string()),
            warnings: Vec::new(),
            summary: None,
        },
    }
}

/// Non-fatal configuration issues
fn collect_warnings(config: &DaemonConfig) -> Vec<String> {
    let mut warnings = Vec::new();

    if config.adaptors.is_empty() {
        warnings.push("No adaptors configured - no channels will be loaded".to_string());
    }

    if config.daemon.backend == BackendKind::Disabled {
        for (name, _) in config.adaptors.iter().filter(|(_, k)| k.is_hybris()) {
            warnings.push(format!("Adaptor '{name}' needs a platform backend, which is disabled"));
        }
    }

    let groups: BTreeSet<String> = config
        .adaptors
        .keys()
        .map(|name| SensorName::new(name).config_group().to_string())
        .collect();
    for group in config.sensors.keys() {
        if !groups.contains(group) {
            warnings.push(format!("[sensors.{group}] is not used by any adaptor"));
        }
    }

    warnings
}

fn print_validation_result(result: &ValidationResult) {
    if result.valid {
        println!("✓ Configuration is valid: {}", result.config_path);

        if let Some(ref summary) = result.summary {
            println!("\n  Backend: {:?}", summary.backend);
            println!("  Hybris adaptors: {}", summary.hybris_adaptors);
            println!("  Kernel adaptors: {}", summary.kernel_adaptors);
            println!("  Sensor groups: {}", summary.sensor_groups);
        }

        if !result.warnings.is_empty() {
            println!("\n⚠ Warnings:");
            for warning in &result.warnings {
                println!("  - {warning}");
            }
        }
    } else {
        println!("✗ Configuration is invalid: {}", result.config_path);
        if let Some(ref error) = result.error {
            println!("\n  Error: {error}");
        }
    }
}
