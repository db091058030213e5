//! Unified error type for the Labvisor workspace.
//!
//! Variants follow the lab lifecycle failure classes: lookups, resource
//! exhaustion, container engine invocations, preconditions, and the
//! partial-failure states that need an operator to reconcile.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Top-level error type shared across the workspace.
#[derive(Debug, Error)]
pub enum LabError {
    /// A required resource was not found.
    #[error("{kind} not found: {id}")]
    NotFound {
        /// Type of the missing resource (`lab`, `task`, ...).
        kind: &'static str,
        /// Identifier of the missing resource.
        id: String,
    },

    /// No free host port could be allocated.
    #[error("no free host port available: {message}")]
    PortExhausted {
        /// Description of the exhausted range or probe failure.
        message: String,
    },

    /// The container engine exited unsuccessfully.
    #[error("{operation} failed for {target} (exit {}): {output}", display_code(.exit_code))]
    Runtime {
        /// Engine operation that failed (`run`, `stop`, `commit`, ...).
        operation: &'static str,
        /// Container or image the operation targeted.
        target: String,
        /// Exit status of the engine process, if it exited normally.
        exit_code: Option<i32>,
        /// Captured combined stdout/stderr of the engine process.
        output: String,
    },

    /// The container engine binary could not be launched.
    #[error("failed to invoke {program}: {source}")]
    Spawn {
        /// Program that could not be spawned.
        program: String,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// An engine invocation was cancelled by the caller.
    #[error("{operation} on {target} was cancelled")]
    Cancelled {
        /// Engine operation that was interrupted.
        operation: &'static str,
        /// Container or image the operation targeted.
        target: String,
    },

    /// An engine invocation exceeded its deadline.
    #[error("{operation} on {target} timed out after {}s", .timeout.as_secs())]
    TimedOut {
        /// Engine operation that was interrupted.
        operation: &'static str,
        /// Container or image the operation targeted.
        target: String,
        /// Deadline that elapsed.
        timeout: Duration,
    },

    /// The lab record has no container attached.
    #[error("lab {lab_id} has no associated container")]
    NoContainer {
        /// Lab that was addressed.
        lab_id: u64,
    },

    /// The container is not in the running state.
    #[error("container {container} is not running")]
    NotRunning {
        /// Name of the container.
        container: String,
    },

    /// A command executed inside a container exited non-zero.
    #[error("command in container {container} exited with {}: {output}", display_code(.exit_code))]
    CommandFailed {
        /// Container the command ran in.
        container: String,
        /// Exit status of the command, if known.
        exit_code: Option<i32>,
        /// Trimmed combined output of the command.
        output: String,
    },

    /// The container was launched but the lab record could not be persisted,
    /// and the container is still present on the engine.
    #[error(
        "container {container_name} ({container_id}) is running without a lab record and needs manual cleanup: {source}"
    )]
    OrphanedContainer {
        /// Name of the orphaned container.
        container_name: String,
        /// Runtime identifier of the orphaned container.
        container_id: String,
        /// Persistence failure that caused the orphan.
        source: Box<LabError>,
    },

    /// Bulk snapshot removal left some images behind.
    #[error("{} snapshot image(s) were not deleted ({removed} removed), last error: {last_error}", .failed.len())]
    CleanupIncomplete {
        /// Image IDs that could not be removed.
        failed: Vec<String>,
        /// Number of images removed successfully.
        removed: usize,
        /// The last removal failure.
        last_error: Box<LabError>,
    },

    /// The lab store failed.
    #[error("persistence error: {message}")]
    Persistence {
        /// Description of the store failure.
        message: String,
    },

    /// The task catalog lookup failed.
    #[error("task catalog error: {message}")]
    Catalog {
        /// Description of the lookup failure.
        message: String,
    },

    /// A configuration value is invalid.
    #[error("invalid configuration: {message}")]
    Config {
        /// Description of the invalid configuration.
        message: String,
    },

    /// An I/O operation failed.
    #[error("I/O error at {path}: {source}")]
    Io {
        /// Path where the I/O error occurred.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// Serialization or deserialization failed.
    #[error("serialization error: {source}")]
    Serialization {
        /// Underlying serialization error.
        #[from]
        source: serde_json::Error,
    },
}

impl LabError {
    /// Returns `true` for the user-facing "not found" class.
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Returns `true` when re-invoking the same call may succeed without
    /// any operator action.
    ///
    /// Interrupted engine calls are excluded: an interrupted launch may
    /// already have created its container.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::PortExhausted { .. })
    }

    /// Returns `true` when persisted state and engine state have diverged.
    #[must_use]
    pub const fn is_partial_failure(&self) -> bool {
        matches!(
            self,
            Self::OrphanedContainer { .. } | Self::CleanupIncomplete { .. }
        )
    }
}

#[allow(clippy::ref_option)]
fn display_code(code: &Option<i32>) -> String {
    code.map_or_else(|| "signal".to_string(), |c| c.to_string())
}

/// Convenience alias used throughout the workspace.
pub type Result<T> = std::result::Result<T, LabError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn runtime_error_carries_output() {
        let err = LabError::Runtime {
            operation: "run",
            target: "lab_1_x".into(),
            exit_code: Some(125),
            output: "port is already allocated".into(),
        };
        let msg = err.to_string();
        assert!(msg.contains("exit 125"));
        assert!(msg.contains("port is already allocated"));
    }

    #[test]
    fn killed_process_shows_signal() {
        let err = LabError::CommandFailed {
            container: "c".into(),
            exit_code: None,
            output: String::new(),
        };
        assert!(err.to_string().contains("signal"));
    }

    #[test]
    fn orphan_is_partial_failure() {
        let err = LabError::OrphanedContainer {
            container_name: "lab_1_x".into(),
            container_id: "abc".into(),
            source: Box::new(LabError::Persistence {
                message: "disk full".into(),
            }),
        };
        assert!(err.is_partial_failure());
        assert!(err.to_string().contains("manual cleanup"));
        assert!(err.to_string().contains("disk full"));
    }

    #[test]
    fn port_exhaustion_is_retryable() {
        let err = LabError::PortExhausted {
            message: "range 7000-7001".into(),
        };
        assert!(err.is_retryable());
        assert!(!err.is_not_found());
    }

    #[test]
    fn interrupted_engine_calls_are_not_retryable() {
        let timed_out = LabError::TimedOut {
            operation: "run",
            target: "lab_1_x".into(),
            timeout: Duration::from_secs(120),
        };
        let cancelled = LabError::Cancelled {
            operation: "run",
            target: "lab_1_x".into(),
        };
        assert!(!timed_out.is_retryable());
        assert!(!cancelled.is_retryable());
    }

    #[test]
    fn cleanup_incomplete_counts_failures() {
        let err = LabError::CleanupIncomplete {
            failed: vec!["a".into(), "b".into()],
            removed: 3,
            last_error: Box::new(LabError::NotRunning {
                container: "x".into(),
            }),
        };
        assert!(err.to_string().starts_with("2 snapshot image(s)"));
        assert!(err.to_string().contains("3 removed"));
    }
}
