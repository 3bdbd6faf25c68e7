//! Error types for daemon assembly.

use contracts::{AdaptorKind, SensorError};
use thiserror::Error;

/// Failures while turning configuration into running adaptors
#[derive(Error, Debug)]
pub enum CliError {
    /// Configuration could not be loaded
    #[error("Failed to load configuration from {path}: {source}")]
    ConfigLoad {
        path: String,
        #[source]
        source: SensorError,
    },

    /// A hybris adaptor is configured but no platform backend is running
    #[error("Adaptor '{adaptor}' ({kind:?}) needs a platform backend, but the backend is disabled")]
    BackendUnavailable { adaptor: String, kind: AdaptorKind },

    /// `--watch` names a channel that was not loaded
    #[error("Unknown channel: {name}")]
    UnknownChannel { name: String },

    /// A reader thread did not exit; the process must not continue
    #[error("Fatal shutdown error: {source}")]
    FatalShutdown {
        #[source]
        source: SensorError,
    },

    #[error(transparent)]
    Sensor(#[from] SensorError),
}

impl CliError {
    pub fn config_load(path: impl Into<String>, source: SensorError) -> Self {
        Self::ConfigLoad {
            path: path.into(),
            source,
        }
    }

    pub fn backend_unavailable(adaptor: impl Into<String>, kind: AdaptorKind) -> Self {
        Self::BackendUnavailable {
            adaptor: adaptor.into(),
            kind,
        }
    }

    pub fn unknown_channel(name: impl Into<String>) -> Self {
        Self::UnknownChannel { name: name.into() }
    }

    /// Classify a shutdown failure; only a stuck reader is fatal
    pub fn from_shutdown(source: SensorError) -> Self {
        match source {
            SensorError::ReaderThreadStuck { .. } => Self::FatalShutdown { source },
            other => Self::Sensor(other),
        }
    }

    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::FatalShutdown { .. })
    }
}

/// Result type alias for daemon assembly
pub type Result<T> = std::result::Result<T, CliError>;
