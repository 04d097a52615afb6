//! # Runtime: tracked concurrency primitives.
//!
//! Three layers, each built on the one below:
//!
//! - [`Lifecycle`] — tracked spawns, one cancellation token, grace-bounded
//!   shutdown. Everything else in the crate drains through one of these.
//! - [`WorkerPool`] — a fixed set of workers pulling from a bounded queue,
//!   with backpressure on submit.
//! - [`WorkerManager`] — a registry of named [`BackgroundWorker`]s with
//!   per-worker state tracking and bounded health probes.

pub mod lifecycle;
pub mod manager;
pub mod pool;
pub mod worker;

pub use lifecycle::Lifecycle;
pub use manager::WorkerManager;
pub use pool::{Job, WorkerPool};
pub use worker::{BackgroundWorker, HealthStatus, IntervalWorker, WorkerHealth, WorkerState};
