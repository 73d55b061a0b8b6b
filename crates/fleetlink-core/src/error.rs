//! Protocol error taxonomy.
//!
//! Every failure surfaced by a protocol adapter, the command pipeline or a
//! routing registry is a [`ProtocolError`]. The error's [`ErrorKind`] is the
//! only input to retry and criticality decisions: [`ErrorKind::is_retryable`]
//! and [`ErrorKind::is_critical`] are fixed lookup tables and never look at
//! the message text.

use crate::status::DeviceStatus;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Result type alias for device protocol operations.
pub type Result<T> = std::result::Result<T, ProtocolError>;

/// Closed set of protocol failure kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorKind {
    ConnectionFailed,
    ConnectionTimeout,
    AuthenticationFailed,
    PermissionDenied,
    DeviceNotSupported,
    ProtocolError,
    DataFormatError,
    ValidationFailed,
    OperationTimeout,
    NetworkError,
    DeviceBusy,
    DeviceOffline,
    DeviceFault,
    ConfigurationError,
    ResourceExhausted,
    TemporaryError,
    Unknown,
}

impl ErrorKind {
    /// All kinds, in declaration order.
    pub const ALL: [ErrorKind; 17] = [
        Self::ConnectionFailed,
        Self::ConnectionTimeout,
        Self::AuthenticationFailed,
        Self::PermissionDenied,
        Self::DeviceNotSupported,
        Self::ProtocolError,
        Self::DataFormatError,
        Self::ValidationFailed,
        Self::OperationTimeout,
        Self::NetworkError,
        Self::DeviceBusy,
        Self::DeviceOffline,
        Self::DeviceFault,
        Self::ConfigurationError,
        Self::ResourceExhausted,
        Self::TemporaryError,
        Self::Unknown,
    ];

    /// Whether a bounded re-attempt of the same call is safe and likely to help.
    #[must_use]
    pub fn is_retryable(self) -> bool {
        matches!(
            self,
            Self::ConnectionTimeout
                | Self::OperationTimeout
                | Self::NetworkError
                | Self::DeviceBusy
                | Self::TemporaryError
                | Self::ResourceExhausted
        )
    }

    /// Whether the failure is non-transient and needs operator attention.
    #[must_use]
    pub fn is_critical(self) -> bool {
        matches!(
            self,
            Self::AuthenticationFailed
                | Self::PermissionDenied
                | Self::DeviceNotSupported
                | Self::ConfigurationError
                | Self::DeviceFault
        )
    }

    /// Device status implied by a call failing with this kind, if any.
    ///
    /// Unreachable devices go offline, faulting or misconfigured devices go to
    /// fault. Other kinds say nothing about the device itself.
    #[must_use]
    pub fn status_hint(self) -> Option<DeviceStatus> {
        match self {
            Self::DeviceOffline
            | Self::ConnectionFailed
            | Self::ConnectionTimeout
            | Self::NetworkError => Some(DeviceStatus::Offline),
            Self::DeviceNotSupported => None,
            kind if kind == Self::DeviceFault || kind.is_critical() => Some(DeviceStatus::Fault),
            _ => None,
        }
    }

    /// Stable upper-snake code used in logs and serialized errors.
    #[must_use]
    pub fn code(self) -> &'static str {
        match self {
            Self::ConnectionFailed => "CONNECTION_FAILED",
            Self::ConnectionTimeout => "CONNECTION_TIMEOUT",
            Self::AuthenticationFailed => "AUTHENTICATION_FAILED",
            Self::PermissionDenied => "PERMISSION_DENIED",
            Self::DeviceNotSupported => "DEVICE_NOT_SUPPORTED",
            Self::ProtocolError => "PROTOCOL_ERROR",
            Self::DataFormatError => "DATA_FORMAT_ERROR",
            Self::ValidationFailed => "VALIDATION_FAILED",
            Self::OperationTimeout => "OPERATION_TIMEOUT",
            Self::NetworkError => "NETWORK_ERROR",
            Self::DeviceBusy => "DEVICE_BUSY",
            Self::DeviceOffline => "DEVICE_OFFLINE",
            Self::DeviceFault => "DEVICE_FAULT",
            Self::ConfigurationError => "CONFIGURATION_ERROR",
            Self::ResourceExhausted => "RESOURCE_EXHAUSTED",
            Self::TemporaryError => "TEMPORARY_ERROR",
            Self::Unknown => "UNKNOWN",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// Failure raised by a device operation.
///
/// Carries the device and operation that failed so callers can decide whether
/// to retry at a higher level or surface the problem to an operator.
#[derive(Debug, Clone, PartialEq, thiserror::Error, Serialize, Deserialize)]
#[error("[{kind}] {message}{}", context_suffix(.device.as_deref(), .operation.as_deref()))]
pub struct ProtocolError {
    /// Failure kind; drives retry and criticality decisions.
    pub kind: ErrorKind,

    /// Human readable description.
    pub message: String,

    /// Device the operation targeted.
    pub device: Option<String>,

    /// Operation that failed (e.g. `dispatch_person_data`).
    pub operation: Option<String>,

    /// Number of re-attempts made before this error was surfaced.
    pub retry_count: u32,

    /// When the error was raised.
    pub timestamp: DateTime<Utc>,
}

fn context_suffix(device: Option<&str>, operation: Option<&str>) -> String {
    match (device, operation) {
        (Some(d), Some(op)) => format!(" (device={d}, operation={op})"),
        (Some(d), None) => format!(" (device={d})"),
        (None, Some(op)) => format!(" (operation={op})"),
        (None, None) => String::new(),
    }
}

impl ProtocolError {
    /// Create a new error of the given kind.
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            device: None,
            operation: None,
            retry_count: 0,
            timestamp: Utc::now(),
        }
    }

    /// Attach the device the failing operation targeted.
    #[must_use]
    pub fn with_device(mut self, device: impl Into<String>) -> Self {
        self.device = Some(device.into());
        self
    }

    /// Attach the name of the failing operation.
    #[must_use]
    pub fn with_operation(mut self, operation: impl Into<String>) -> Self {
        self.operation = Some(operation.into());
        self
    }

    /// Record how many re-attempts were made.
    #[must_use]
    pub fn with_retry_count(mut self, retry_count: u32) -> Self {
        self.retry_count = retry_count;
        self
    }

    /// Fill in device and operation only where they are still missing.
    #[must_use]
    pub fn in_context(mut self, device: &str, operation: &str) -> Self {
        if self.device.is_none() {
            self.device = Some(device.to_string());
        }
        if self.operation.is_none() {
            self.operation = Some(operation.to_string());
        }
        self
    }

    #[must_use]
    pub fn is_retryable(&self) -> bool {
        self.kind.is_retryable()
    }

    #[must_use]
    pub fn is_critical(&self) -> bool {
        self.kind.is_critical()
    }

    pub fn connection_failed(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::ConnectionFailed, message)
    }

    pub fn connection_timeout(duration_ms: u64) -> Self {
        Self::new(
            ErrorKind::ConnectionTimeout,
            format!("Connection timeout after {duration_ms}ms"),
        )
    }

    pub fn operation_timeout(duration_ms: u64) -> Self {
        Self::new(
            ErrorKind::OperationTimeout,
            format!("Operation timeout after {duration_ms}ms"),
        )
    }

    /// No adapter or handler is bound to `tag`.
    pub fn not_supported(tag: impl fmt::Display) -> Self {
        Self::new(
            ErrorKind::DeviceNotSupported,
            format!("No binding registered for '{tag}'"),
        )
    }

    pub fn device_offline(device: impl Into<String>) -> Self {
        let device = device.into();
        Self::new(ErrorKind::DeviceOffline, format!("Device {device} is offline"))
            .with_device(device)
    }

    pub fn device_busy(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::DeviceBusy, message)
    }

    pub fn temporary(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::TemporaryError, message)
    }

    pub fn configuration(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::ConfigurationError, message)
    }

    pub fn data_format(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::DataFormatError, message)
    }
}
