//! Error types used by the stepvisor runtime.
//!
//! This module defines two error enums:
//!
//! - [`RuntimeError`] — errors raised by the lifecycle/worker primitives.
//! - [`SubmitError`] — errors raised by [`WorkerPool`](crate::WorkerPool) submissions.
//!
//! Both types provide `as_label()` for stable snake_case identifiers in
//! logs/metrics. Operational failures inside tool steps are **not** modeled
//! here; they flow through the [`ErrorBudget`](crate::ErrorBudget) as opaque
//! recorded errors.

use std::time::Duration;
use thiserror::Error;

/// # Errors produced by the runtime primitives.
///
/// These are usage and supervision errors: double shutdown, launching work
/// after shutdown has begun, duplicate worker registrations, and shutdown
/// grace periods being exceeded. They are always returned synchronously and
/// never raised as panics.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum RuntimeError {
    /// Shutdown grace period was exceeded; some tasks were still running.
    ///
    /// Tasks are not force-killed. A task that ignores its
    /// `CancellationToken` keeps running past this error.
    #[error("shutdown timeout {grace:?} exceeded; tasks still running")]
    GraceExceeded {
        /// The configured grace duration.
        grace: Duration,
    },

    /// `shutdown()` was called a second time.
    #[error("shutdown already completed or in progress")]
    AlreadyShutdown,

    /// A task launch was attempted after shutdown had begun.
    #[error("lifecycle is shutting down; new tasks rejected")]
    ShutdownInProgress,

    /// A worker with this name is already registered.
    #[error("worker {name:?} already registered")]
    WorkerExists {
        /// The conflicting worker name.
        name: String,
    },

    /// No worker with this name is registered.
    #[error("worker {name:?} not found")]
    WorkerNotFound {
        /// The requested worker name.
        name: String,
    },

    /// One or more workers failed to stop cleanly.
    #[error("{failed} of {total} workers failed to stop")]
    WorkerStopFailed {
        /// Number of workers that returned an error from `stop()`.
        failed: usize,
        /// Number of workers that were asked to stop.
        total: usize,
    },
}

impl RuntimeError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    ///
    /// # Example
    /// ```
    /// use stepvisor::RuntimeError;
    /// use std::time::Duration;
    ///
    /// let err = RuntimeError::GraceExceeded { grace: Duration::from_secs(5) };
    /// assert_eq!(err.as_label(), "runtime_grace_exceeded");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            RuntimeError::GraceExceeded { .. } => "runtime_grace_exceeded",
            RuntimeError::AlreadyShutdown => "runtime_already_shutdown",
            RuntimeError::ShutdownInProgress => "runtime_shutdown_in_progress",
            RuntimeError::WorkerExists { .. } => "worker_exists",
            RuntimeError::WorkerNotFound { .. } => "worker_not_found",
            RuntimeError::WorkerStopFailed { .. } => "worker_stop_failed",
        }
    }

    /// Returns a human-readable message with details about the error.
    pub fn as_message(&self) -> String {
        match self {
            RuntimeError::GraceExceeded { grace } => {
                format!("grace exceeded after {grace:?}")
            }
            other => other.to_string(),
        }
    }
}

/// # Errors produced by [`WorkerPool`](crate::WorkerPool) submissions.
///
/// A closed pool rejects immediately; a saturated pool either blocks
/// (`submit`) or times out (`submit_with_timeout`).
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitError {
    /// Pool has been shut down; no further submissions are accepted.
    #[error("worker pool closed")]
    Closed,

    /// The queue did not accept the job within the requested deadline.
    #[error("submission timed out after {timeout:?}")]
    Timeout {
        /// The deadline that elapsed.
        timeout: Duration,
    },
}

impl SubmitError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            SubmitError::Closed => "submit_closed",
            SubmitError::Timeout { .. } => "submit_timeout",
        }
    }
}
