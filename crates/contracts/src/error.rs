//! Layered error definitions
//!
//! Categorized by source: config / availability / backend / session

use thiserror::Error;

use crate::SessionId;

/// Unified error type
#[derive(Debug, Error)]
pub enum SensorError {
    // ===== Configuration Errors =====
    /// Configuration parse error
    #[error("config parse error: {message}")]
    ConfigParse {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Configuration validation error
    #[error("config validation error at '{field}': {message}")]
    ConfigValidation { field: String, message: String },

    // ===== Availability Errors =====
    /// No adaptor registered under this name
    #[error("device adaptor '{name}' is not registered")]
    AdaptorNotFound { name: String },

    /// Adaptor exists but could not find its hardware
    #[error("device adaptor '{name}' is invalid: {reason}")]
    AdaptorInvalid { name: String, reason: String },

    /// No channel registered under this name
    #[error("sensor channel '{name}' is not registered")]
    ChannelNotFound { name: String },

    /// Platform does not expose a sensor of the requested type
    #[error("platform has no sensor of type {sensor_type}")]
    SensorUnavailable { sensor_type: i32 },

    // ===== Backend Errors =====
    /// HAL call returned a non-zero status
    #[error("hal {op} failed for handle {handle} with status {status}")]
    Hal {
        op: &'static str,
        handle: i32,
        status: i32,
    },

    /// IPC transaction failed
    #[error("binder transaction {code} failed: {message}")]
    Transport { code: u32, message: String },

    /// Event record did not match the expected layout
    #[error("malformed event record: {message}")]
    MalformedEvent { message: String },

    /// Remote sensor service went away
    #[error("sensor service died")]
    ServiceDied,

    /// Backend not connected yet
    #[error("sensor service is not connected")]
    NotConnected,

    /// Reader thread ignored the stop request
    #[error("event reader thread did not exit within {timeout_ms}ms")]
    ReaderThreadStuck { timeout_ms: u64 },

    // ===== Session Errors =====
    /// Session id not known to the manager
    #[error("unknown session {0}")]
    UnknownSession(SessionId),

    // ===== General Errors =====
    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Other error
    #[error("{0}")]
    Other(String),
}

impl SensorError {
    /// Create configuration parse error
    pub fn config_parse(message: impl Into<String>) -> Self {
        Self::ConfigParse {
            message: message.into(),
            source: None,
        }
    }

    /// Create configuration validation error
    pub fn config_validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ConfigValidation {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Create HAL status error
    pub fn hal(op: &'static str, handle: i32, status: i32) -> Self {
        Self::Hal { op, handle, status }
    }

    /// Create transport error
    pub fn transport(code: u32, message: impl Into<String>) -> Self {
        Self::Transport {
            code,
            message: message.into(),
        }
    }

    /// Create invalid adaptor error
    pub fn adaptor_invalid(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::AdaptorInvalid {
            name: name.into(),
            reason: reason.into(),
        }
    }

    /// Create malformed event error
    pub fn malformed(message: impl Into<String>) -> Self {
        Self::MalformedEvent {
            message: message.into(),
        }
    }

    /// Whether the error is worth retrying after the fixed backoff
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::Hal { .. }
                | Self::Transport { .. }
                | Self::Io(_)
                | Self::NotConnected
                | Self::MalformedEvent { .. }
        )
    }
}

/// Result alias used across the workspace
pub type Result<T> = std::result::Result<T, SensorError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hal_error_display() {
        let err = SensorError::hal("activate", 3, -22);
        assert_eq!(
            err.to_string(),
            "hal activate failed for handle 3 with status -22"
        );
        assert!(err.is_transient());
    }

    #[test]
    fn test_config_errors_are_not_transient() {
        assert!(!SensorError::config_validation("daemon.batch_size", "must be > 0").is_transient());
        assert!(!SensorError::ReaderThreadStuck { timeout_ms: 3000 }.is_transient());
    }
}
