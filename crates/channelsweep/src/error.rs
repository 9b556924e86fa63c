//! Error types for channelsweep.
//!
//! This module defines all error types used throughout the channelsweep crate,
//! providing detailed context for debugging and user-friendly error messages.

use std::path::PathBuf;
use thiserror::Error;

/// Why an interface-control command failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InterfaceFailureKind {
    /// The interface is no longer in monitor mode.
    NotInMonitorMode,
    /// The channel cannot legally be used in the active regulatory domain.
    IllegalChannel,
    /// The interface disappeared (adapter unplugged or renamed).
    NoSuchDevice,
    /// The command failed for some other reason.
    CommandFailed,
}

impl std::fmt::Display for InterfaceFailureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotInMonitorMode => write!(f, "not in monitor mode"),
            Self::IllegalChannel => write!(f, "illegal channel"),
            Self::NoSuchDevice => write!(f, "no such device"),
            Self::CommandFailed => write!(f, "command failed"),
        }
    }
}

/// The main error type for channelsweep operations.
#[derive(Error, Debug)]
pub enum Error {
    // === Environment Errors ===
    /// The host does not meet the minimum tool requirements.
    #[error("environment unsupported: {reason}")]
    EnvironmentUnsupported {
        /// What is missing or too old.
        reason: String,
    },

    // === Validation Errors ===
    /// The channel list is unusable (e.g. empty).
    #[error("invalid channel list: {message}")]
    InvalidChannelList {
        /// Description of the problem.
        message: String,
    },

    /// A value is not a known 2.4 GHz or 5 GHz Wi-Fi channel.
    #[error("invalid Wi-Fi channel: {value}")]
    InvalidChannel {
        /// The rejected input.
        value: String,
    },

    /// The adapter cannot tune to some of the requested channels.
    #[error("channels not supported by {interface}: {}", join_channels(.channels))]
    UnsupportedChannels {
        /// The interface that was queried.
        interface: String,
        /// The requested channels it does not support.
        channels: Vec<u16>,
    },

    /// An interface name or hardware address is malformed.
    #[error("invalid interface '{name}': {reason}")]
    InvalidInterface {
        /// The rejected name.
        name: String,
        /// Why it was rejected.
        reason: String,
    },

    /// None of the candidate interfaces exist on this host.
    #[error("no wireless interface found (tried {})", .candidates.join(", "))]
    InterfaceNotFound {
        /// Interface names that were looked up.
        candidates: Vec<String>,
    },

    // === Interface Control Errors ===
    /// The caller lacks the privilege to reconfigure interfaces or capture.
    #[error("permission denied: {operation}")]
    PermissionDenied {
        /// The operation that was refused.
        operation: String,
    },

    /// An interface-control command failed.
    #[error("{operation} failed ({kind}): {message}")]
    InterfaceControl {
        /// The operation that failed.
        operation: String,
        /// Classification of the failure.
        kind: InterfaceFailureKind,
        /// Output of the failing command.
        message: String,
    },

    // === Capture Errors ===
    /// The capture process failed to start or died during the run.
    #[error("capture process failure: {message}")]
    CaptureProcess {
        /// Description of what went wrong.
        message: String,
    },

    /// The capture process could not be terminated.
    #[error("failed to stop capture: {message}")]
    Termination {
        /// Description of what went wrong.
        message: String,
    },

    // === Configuration Errors ===
    /// Failed to load configuration.
    #[error("failed to load configuration: {0}")]
    ConfigLoad(Box<figment::Error>),

    /// Configuration validation failed.
    #[error("invalid configuration: {message}")]
    ConfigValidation {
        /// Description of the validation failure.
        message: String,
    },

    // === I/O Errors ===
    /// File system operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Failed to create a required directory.
    #[error("failed to create directory {path}: {source}")]
    DirectoryCreate {
        /// Path that couldn't be created.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: std::io::Error,
    },

    // === Serialization Errors ===
    /// JSON serialization/deserialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    // === Generic Errors ===
    /// An internal error occurred (bug).
    #[error("internal error: {0}")]
    Internal(String),
}

/// A specialized Result type for channelsweep operations.
pub type Result<T> = std::result::Result<T, Error>;

impl From<figment::Error> for Error {
    fn from(err: figment::Error) -> Self {
        Self::ConfigLoad(Box::new(err))
    }
}

fn join_channels(channels: &[u16]) -> String {
    channels
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

impl Error {
    /// Create an environment-unsupported error.
    #[must_use]
    pub fn environment_unsupported(reason: impl Into<String>) -> Self {
        Self::EnvironmentUnsupported {
            reason: reason.into(),
        }
    }

    /// Create a permission-denied error.
    #[must_use]
    pub fn permission_denied(operation: impl Into<String>) -> Self {
        Self::PermissionDenied {
            operation: operation.into(),
        }
    }

    /// Create an interface-control error.
    #[must_use]
    pub fn interface_control(
        operation: impl Into<String>,
        kind: InterfaceFailureKind,
        message: impl Into<String>,
    ) -> Self {
        Self::InterfaceControl {
            operation: operation.into(),
            kind,
            message: message.into(),
        }
    }

    /// Create a capture process error.
    #[must_use]
    pub fn capture_process(message: impl Into<String>) -> Self {
        Self::CaptureProcess {
            message: message.into(),
        }
    }

    /// Create a termination error.
    #[must_use]
    pub fn termination(message: impl Into<String>) -> Self {
        Self::Termination {
            message: message.into(),
        }
    }

    /// Create a configuration validation error.
    #[must_use]
    pub fn config_validation(message: impl Into<String>) -> Self {
        Self::ConfigValidation {
            message: message.into(),
        }
    }

    /// Create a new internal error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Check if this error is an environment check failure.
    #[must_use]
    pub fn is_environment_unsupported(&self) -> bool {
        matches!(self, Self::EnvironmentUnsupported { .. })
    }

    /// Check if this error is a permission issue.
    #[must_use]
    pub fn is_permission_error(&self) -> bool {
        matches!(self, Self::PermissionDenied { .. })
    }

    /// Check if a failed retune should end the sweep.
    ///
    /// Missing privileges and an interface that left monitor mode or vanished
    /// affect every later channel too. Anything else is reported and skipped.
    #[must_use]
    pub fn is_fatal_retune(&self) -> bool {
        match self {
            Self::PermissionDenied { .. } => true,
            Self::InterfaceControl { kind, .. } => matches!(
                kind,
                InterfaceFailureKind::NotInMonitorMode | InterfaceFailureKind::NoSuchDevice
            ),
            _ => false,
        }
    }

    /// A human-readable explanation of how to fix the problem, if one is known.
    #[must_use]
    pub fn hint(&self) -> Option<&'static str> {
        match self {
            Self::EnvironmentUnsupported { .. } => Some(
                "Install aircrack-ng (airmon-ng), iw and a recent Wireshark (tshark), \
                 or lower `environment.min_tool_version` in the configuration.",
            ),
            Self::PermissionDenied { .. } => Some(
                "Interface control and raw capture need root. Re-run with sudo or grant \
                 CAP_NET_ADMIN and CAP_NET_RAW.",
            ),
            Self::InterfaceNotFound { .. } => Some(
                "Plug in the adapter, or pass --interface/--mac matching `ip link` output.",
            ),
            Self::UnsupportedChannels { .. } => Some(
                "Run `chsweep channels` to list what the adapter supports in this \
                 regulatory domain.",
            ),
            Self::InterfaceControl {
                kind: InterfaceFailureKind::NotInMonitorMode,
                ..
            } => Some("Another process may have reset the interface; try `airmon-ng check kill`."),
            _ => None,
        }
    }
}
