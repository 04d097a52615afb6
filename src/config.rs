//! # Tracker configuration.
//!
//! Provides [`TrackerConfig`], the centralized settings for a
//! [`Tracker`](crate::Tracker) run.
//!
//! ## Sentinel values
//! - `heartbeat = 0s` → heartbeat emission disabled
//! - `throttle = 0s` → no throttling (every update published)
//! - `publish_timeout = 0s` → sink publishes are not time-bounded
//!
//! Prefer the helper accessors over sprinkling sentinel checks across the
//! codebase.

use std::time::Duration;

/// Configuration for one tracker run.
///
/// Defines:
/// - **Heartbeat**: liveness updates while a long step is in flight
/// - **Throttling**: minimum gap between published updates
/// - **Publish bound**: maximum time one sink publish may take
/// - **Error budget**: failure count and sliding window for the embedded
///   circuit breaker
/// - **Correlation**: optional caller-supplied trace id
///
/// ## Field semantics
/// - `heartbeat`: interval between synthetic liveness updates (`0s` = none)
/// - `throttle`: intermediate updates arriving faster than this are dropped
/// - `publish_timeout`: a sink publish exceeding this is abandoned and logged
/// - `max_errors` / `reset_window`: budget of the embedded
///   [`ErrorBudget`](crate::ErrorBudget)
/// - `trace_id`: correlation id stamped on every update (`None` = generated)
#[derive(Clone, Debug)]
pub struct TrackerConfig {
    /// Interval between synthetic heartbeat updates.
    ///
    /// A heartbeat is emitted only if no regular publish happened within the
    /// interval, so a caller-side liveness watchdog can tell a long-running
    /// step from a hang. `Duration::ZERO` disables the heartbeat task.
    pub heartbeat: Duration,

    /// Minimum gap between published updates.
    ///
    /// Updates arriving faster are **dropped**, not queued, unless they are
    /// the final `step == total` update. `Duration::ZERO` disables throttling.
    pub throttle: Duration,

    /// Upper bound on a single sink publish.
    ///
    /// A slow or dead sink must not stall workflow progress; publishes that
    /// exceed this bound are abandoned and logged. `Duration::ZERO` disables
    /// the bound.
    pub publish_timeout: Duration,

    /// Maximum errors tolerated within `reset_window` before the embedded
    /// circuit breaker reports the budget as exceeded.
    pub max_errors: usize,

    /// Sliding window after which recorded errors age out of the budget.
    pub reset_window: Duration,

    /// Caller-supplied trace id for correlating updates.
    ///
    /// `None` generates a fresh UUID per tracker.
    pub trace_id: Option<String>,
}

impl TrackerConfig {
    /// Returns the heartbeat interval as an `Option`.
    ///
    /// - `None` → heartbeat disabled
    /// - `Some(d)` → heartbeat every `d`
    #[inline]
    pub fn heartbeat_interval(&self) -> Option<Duration> {
        if self.heartbeat == Duration::ZERO {
            None
        } else {
            Some(self.heartbeat)
        }
    }

    /// Returns the publish bound as an `Option`.
    #[inline]
    pub fn publish_bound(&self) -> Option<Duration> {
        if self.publish_timeout == Duration::ZERO {
            None
        } else {
            Some(self.publish_timeout)
        }
    }
}

impl Default for TrackerConfig {
    /// Default configuration:
    ///
    /// - `heartbeat = 15s` (liveness during multi-minute steps)
    /// - `throttle = 100ms` (at most 10 published updates per second)
    /// - `publish_timeout = 5s` (slow sinks cannot stall the tracker)
    /// - `max_errors = 5`, `reset_window = 10m` (5 errors per 10 minutes)
    /// - `trace_id = None` (generated per tracker)
    fn default() -> Self {
        Self {
            heartbeat: Duration::from_secs(15),
            throttle: Duration::from_millis(100),
            publish_timeout: Duration::from_secs(5),
            max_errors: 5,
            reset_window: Duration::from_secs(600),
            trace_id: None,
        }
    }
}
