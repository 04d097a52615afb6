//! # stepvisor
//!
//! **Stepvisor** is a progress and resilience runtime for long-running
//! operations in Rust.
//!
//! It provides a transport-agnostic progress tracker with throttling,
//! heartbeats, and ETA estimation; a sliding-window error budget acting as a
//! circuit breaker; and tracked concurrency primitives (lifecycle, worker
//! pool, managed background workers) with grace-bounded shutdown. The crate
//! is designed as a building block for tool servers and CLIs that run
//! multi-step operations.
//!
//! ## Architecture
//! ### Overview
//! ```text
//!   tool / pipeline code
//!          │
//!          │ begin / update / complete
//!          ▼
//! ┌────────────────────────────────────────────────────────┐
//! │  Tracker (per operation)                               │
//! │  - throttle: drop mid-run updates < 100ms apart        │
//! │  - heartbeat task: liveness when a step runs long      │
//! │  - EtaEstimator: EMA of per-step durations             │
//! │  - ErrorBudget: sliding-window circuit breaker         │
//! └──────────────────────┬─────────────────────────────────┘
//!                        │ Update snapshots (bounded publish)
//!                        ▼
//!              ┌──────────────────┐
//!              │  Sink (trait)    │
//!              └───┬──────────┬───┘
//!                  ▼          ▼
//!         NotificationSink   CliSink (feature "cli")
//!         (host session)     (spinner / bar / CI lines)
//!
//! ┌────────────────────────────────────────────────────────┐
//! │  Runtime                                               │
//! │  Lifecycle ──► tracked spawns + cancellation + grace   │
//! │     ├─ WorkerPool: bounded queue, fixed workers        │
//! │     └─ WorkerManager: named BackgroundWorkers,         │
//! │        per-worker state + bounded health probes        │
//! └────────────────────────────────────────────────────────┘
//! ```
//!
//! ### Progress flow
//! ```text
//! Tracker::begin ──► publish step 0 "started", spawn heartbeat
//! Tracker::update(step, msg, meta)
//!   ├─ throttled (gap < throttle, step != total) ─► dropped
//!   └─ else ─► clamp step monotonic ─► snapshot ─► Sink::publish
//! Tracker::complete(msg) ─► final step == total "completed"
//!                        └─► finish(): stop heartbeat, close sink
//! ```
//!
//! ## Features
//! | Area            | Description                                                    | Key types / traits                         |
//! |-----------------|----------------------------------------------------------------|--------------------------------------------|
//! | **Progress**    | Throttled, heartbeat-backed progress with ETA.                 | [`Tracker`], [`Update`], [`EtaEstimator`]  |
//! | **Sinks**       | Pluggable update destinations.                                 | [`Sink`], [`NotificationSink`]             |
//! | **Budget**      | Sliding-window error budget / circuit breaker.                 | [`ErrorBudget`], [`BudgetStatus`]          |
//! | **Runtime**     | Tracked spawns, pools, managed workers, graceful shutdown.     | [`Lifecycle`], [`WorkerPool`], [`WorkerManager`] |
//! | **Workflow**    | Per-stage bookkeeping for step-list UIs.                       | [`WorkflowProgress`], [`StepInfo`]         |
//! | **Errors**      | Typed errors for runtime and submission paths.                 | [`RuntimeError`], [`SubmitError`]          |
//! | **Configuration** | Centralized tracker tuning.                                  | [`TrackerConfig`]                          |
//!
//! ## Optional features
//! - `cli` *(default)*: exports [`CliSink`], a terminal spinner/bar renderer.
//!
//! ## Example
//! ```no_run
//! use std::sync::Arc;
//! use stepvisor::{Tracker, TrackerConfig};
//! #[cfg(feature = "cli")]
//! use stepvisor::CliSink;
//!
//! # #[cfg(feature = "cli")]
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() {
//!     let tracker = Tracker::new(3, Arc::new(CliSink::new()), TrackerConfig::default());
//!
//!     tracker.begin("containerizing repository").await;
//!     tracker.update(1, "analyzing repository", None).await;
//!     tracker.update(2, "building image", None).await;
//!     tracker.complete("image pushed").await;
//! }
//! # #[cfg(not(feature = "cli"))]
//! # fn main() {}
//! ```

mod budget;
mod config;
mod error;
mod progress;
mod runtime;
mod sinks;

// ---- Public re-exports ----

pub use budget::{BudgetStatus, ErrorBudget};
pub use config::TrackerConfig;
pub use error::{RuntimeError, SubmitError};
pub use progress::{
    EtaEstimator, StageStatus, StepInfo, Tracker, Update, UpdateStatus, WorkflowProgress,
    WorkflowStatus,
};
pub use runtime::{
    BackgroundWorker, HealthStatus, IntervalWorker, Job, Lifecycle, WorkerHealth, WorkerManager,
    WorkerPool, WorkerState,
};
pub use sinks::{NotificationSender, NotificationSink, Sink};

// Optional: expose the terminal renderer.
// Enable with: `--features cli` (on by default)
#[cfg(feature = "cli")]
pub use sinks::CliSink;
