//! # Progress updates emitted by the tracker.
//!
//! [`Update`] is the immutable snapshot handed to a [`Sink`](crate::Sink):
//! step position, percentage, ETA, status, trace id, and free-form caller
//! metadata. [`UpdateStatus`] classifies the update.
//!
//! ## Wire contract
//! The serde field names are observable wherever a sink serializes an update
//! and must stay stable: `step`, `total`, `message`, `percentage`, `eta_ms`,
//! `status`, `trace_id`, `meta`.
//!
//! ## Example
//! ```rust
//! use stepvisor::{Update, UpdateStatus};
//!
//! let up = Update::new(2, 10, "building image", UpdateStatus::Running, "trace-1")
//!     .with_meta("step_name", "build");
//!
//! assert_eq!(up.percentage, 20);
//! assert_eq!(up.status, UpdateStatus::Running);
//! ```

use std::time::{Duration, SystemTime};

use serde::{Serialize, Serializer};
use serde_json::{Map, Value};

/// Classification of a published update.
///
/// Serialized as the lowercase status string consumers of progress
/// notifications already expect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum UpdateStatus {
    /// First update of a run (`step == 0`).
    Started,
    /// Regular mid-run update.
    Running,
    /// Final update of a successful run (`step == total`).
    Completed,
    /// A step reported an error; the run itself continues.
    Failed,
}

impl UpdateStatus {
    /// Returns the stable wire string.
    pub fn as_str(&self) -> &'static str {
        match self {
            UpdateStatus::Started => "started",
            UpdateStatus::Running => "running",
            UpdateStatus::Completed => "completed",
            UpdateStatus::Failed => "failed",
        }
    }
}

impl std::fmt::Display for UpdateStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Immutable progress snapshot.
///
/// Produced by the [`Tracker`](crate::Tracker), consumed by sinks. The
/// snapshot is taken while the tracker holds its state lock and published
/// after the lock is released, so a slow sink never blocks other updates.
#[derive(Debug, Clone, Serialize)]
pub struct Update {
    /// Current step (0-based until completion; `total` on the final update).
    pub step: u64,
    /// Total number of steps in the run.
    pub total: u64,
    /// Human-readable message for this update.
    pub message: String,
    /// `floor(step / total * 100)`, clamped to [0, 100].
    pub percentage: u8,
    /// Estimated time remaining, absent outside `0 < step < total`.
    #[serde(
        rename = "eta_ms",
        skip_serializing_if = "Option::is_none",
        serialize_with = "serialize_opt_millis"
    )]
    pub eta: Option<Duration>,
    /// Update classification.
    pub status: UpdateStatus,
    /// Correlation id shared by every update of one run.
    pub trace_id: String,
    /// Free-form caller metadata (step names, heartbeat markers, budget flags).
    #[serde(skip_serializing_if = "Map::is_empty")]
    pub meta: Map<String, Value>,
    /// Wall-clock start of the run. Not part of the wire shape.
    #[serde(skip)]
    pub started_at: SystemTime,
}

fn serialize_opt_millis<S: Serializer>(d: &Option<Duration>, s: S) -> Result<S::Ok, S::Error> {
    match d {
        Some(d) => s.serialize_u64(d.as_millis().min(u128::from(u64::MAX)) as u64),
        None => s.serialize_none(),
    }
}

impl Update {
    /// Creates a new update snapshot with the percentage derived from
    /// `step`/`total`.
    pub fn new(
        step: u64,
        total: u64,
        message: impl Into<String>,
        status: UpdateStatus,
        trace_id: impl Into<String>,
    ) -> Self {
        Self {
            step,
            total,
            message: message.into(),
            percentage: percentage_of(step, total),
            eta: None,
            status,
            trace_id: trace_id.into(),
            meta: Map::new(),
            started_at: SystemTime::now(),
        }
    }

    /// Attaches an ETA estimate.
    #[inline]
    pub fn with_eta(mut self, eta: Duration) -> Self {
        self.eta = Some(eta);
        self
    }

    /// Attaches one metadata entry.
    #[inline]
    pub fn with_meta(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.meta.insert(key.into(), value.into());
        self
    }

    /// Replaces the metadata map wholesale.
    #[inline]
    pub fn with_meta_map(mut self, meta: Map<String, Value>) -> Self {
        self.meta = meta;
        self
    }

    /// True if this update is a synthetic heartbeat (`meta.kind == "heartbeat"`).
    pub fn is_heartbeat(&self) -> bool {
        self.meta.get("kind").and_then(Value::as_str) == Some("heartbeat")
    }
}

/// `floor(step / total * 100)`, clamped to [0, 100]. Zero when `total == 0`.
pub(crate) fn percentage_of(step: u64, total: u64) -> u8 {
    if total == 0 {
        return 0;
    }
    let pct = step.min(total) * 100 / total;
    pct.min(100) as u8
}
