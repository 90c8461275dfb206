//! Error taxonomy for energy attribution
//!
//! Only construction-time unavailability of the selected backend and
//! malformed results documents are fatal to a command. Measurement errors
//! are recovered inside the tracer and surface as warnings.

use thiserror::Error;

/// Errors produced by backends, the backend registry and results I/O
#[derive(Error, Debug)]
pub enum ProfileError {
    /// The backend's prerequisite (counter, sensor file, permission) is missing
    #[error("Backend '{backend}' is not available: {reason}")]
    BackendUnavailable {
        backend: &'static str,
        reason: String,
    },

    /// A single start/stop read failed
    #[error("Energy measurement failed on '{backend}': {reason}")]
    Measurement {
        backend: &'static str,
        reason: String,
    },

    /// `stop()` was called without a matching `start()`
    #[error("Backend '{backend}' has no open measurement window")]
    NoOpenWindow { backend: &'static str },

    /// Explicit backend name that the registry does not know
    #[error("Unknown backend: {0} (expected auto, rapl, hwmon, cpu_est or mock)")]
    UnknownBackend(String),

    /// Persisted results document could not be parsed
    #[error("Invalid results document {source_name}: {reason}")]
    ResultsFormat { source_name: String, reason: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl ProfileError {
    pub(crate) fn unavailable(backend: &'static str, reason: impl Into<String>) -> Self {
        ProfileError::BackendUnavailable {
            backend,
            reason: reason.into(),
        }
    }

    pub(crate) fn measurement(backend: &'static str, reason: impl Into<String>) -> Self {
        ProfileError::Measurement {
            backend,
            reason: reason.into(),
        }
    }

    /// True for errors the tracer recovers from by dropping one window
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            ProfileError::Measurement { .. } | ProfileError::NoOpenWindow { .. }
        )
    }
}

/// Result type for profiling operations
pub type Result<T> = std::result::Result<T, ProfileError>;
