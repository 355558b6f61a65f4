//! Error types for svcwrap.

use thiserror::Error;

/// Result type alias for supervisor operations.
pub type ServiceResult<T> = std::result::Result<T, ServiceError>;

/// Error type shared by all svcwrap crates.
///
/// Each variant carries enough context to identify the service or process
/// the failure belongs to. Benign races (signalling an already-exited
/// process) are handled at the call site and never surface as errors.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// The backend could not launch the executable.
    #[error("spawn failed: {name} - {reason}")]
    SpawnFailed { name: String, reason: String },

    /// Signal delivery failed for a reason other than a benign race.
    #[error("signal delivery failed: pid {pid} - {reason}")]
    SignalFailed { pid: u32, reason: String },

    /// A signal specification could not be parsed.
    #[error("invalid signal: {0}")]
    InvalidSignal(String),

    /// Log sink or tail I/O failure.
    #[error("log I/O error: {path} - {reason}")]
    LogIo { path: String, reason: String },

    /// Invalid configuration detected past the inert-state policy.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// I/O error (wraps std::io::Error).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ServiceError {
    /// Creates a SpawnFailed error.
    pub fn spawn_failed(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::SpawnFailed {
            name: name.into(),
            reason: reason.into(),
        }
    }

    /// Creates a SignalFailed error.
    pub fn signal_failed(pid: u32, reason: impl Into<String>) -> Self {
        Self::SignalFailed {
            pid,
            reason: reason.into(),
        }
    }

    /// Creates an InvalidSignal error.
    pub fn invalid_signal(spec: impl Into<String>) -> Self {
        Self::InvalidSignal(spec.into())
    }

    /// Creates a LogIo error.
    pub fn log_io(path: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::LogIo {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Creates a Configuration error.
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }
}
