//! Domain Error Types
//!
//! Construction and run failures of the harness. Lock-level failures
//! ([`LockError`]) are handled locally by actors and only surface here when a
//! caller chooses to propagate them.

use std::io;

use crate::domain::sync::LockError;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Harness Errors
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Errors raised while building or running a scenario
#[derive(Debug, thiserror::Error)]
pub enum HazardError {
    /// A configuration value or constructor argument was rejected
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// A resource rejected an operation, e.g. a deposit that would overflow
    #[error("Resource {resource}: {reason}")]
    Resource {
        /// Resource name
        resource: String,
        /// What went wrong
        reason: String,
    },

    /// The OS refused to start an actor thread
    #[error("Failed to spawn actor {actor}: {source}")]
    Spawn {
        /// Actor name
        actor: String,
        /// Underlying I/O error
        #[source]
        source: io::Error,
    },

    /// Lock failure propagated out of a workload; `Lock(Cancelled)` is a
    /// normal cooperative stop
    #[error(transparent)]
    Lock(#[from] LockError),
}

impl HazardError {
    /// Shorthand for [`HazardError::InvalidConfig`]
    pub fn invalid(reason: impl Into<String>) -> Self {
        Self::InvalidConfig(reason.into())
    }
}

/// Result alias for harness operations
pub type HazardResult<T> = Result<T, HazardError>;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Sink Errors
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Errors raised by event sinks
///
/// The monitor never propagates these: on the first failure of a sink it
/// drops that sink and carries on console-only.
#[derive(Debug, thiserror::Error)]
pub enum SinkError {
    /// File could not be opened, written or flushed
    #[error("Sink I/O error on {path}: {source}")]
    Io {
        /// Path of the sink file
        path: String,
        /// Underlying I/O error
        #[source]
        source: io::Error,
    },

    /// Record could not be encoded
    #[error("Sink serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
}

impl SinkError {
    pub(crate) fn io(path: impl AsRef<std::path::Path>, source: io::Error) -> Self {
        Self::Io {
            path: path.as_ref().display().to_string(),
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = HazardError::invalid("actors must be > 0");
        assert_eq!(err.to_string(), "Invalid configuration: actors must be > 0");

        let err: HazardError = LockError::Cancelled.into();
        assert_eq!(err.to_string(), "cancelled");

        let err = HazardError::Resource {
            resource: "joint-account".to_owned(),
            reason: "depositing 10 into 9223372036854775802 overflows".to_owned(),
        };
        assert_eq!(
            err.to_string(),
            "Resource joint-account: depositing 10 into 9223372036854775802 overflows"
        );

        let err = SinkError::io(
            "/tmp/x.jsonl",
            io::Error::new(io::ErrorKind::PermissionDenied, "denied"),
        );
        assert!(err.to_string().contains("/tmp/x.jsonl"));
    }
}
