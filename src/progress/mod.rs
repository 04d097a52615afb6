//! # Progress: tracking, ETA, and per-step workflow state.
//!
//! The module splits into four concerns:
//!
//! - [`update`] — the [`Update`] snapshot sinks consume, plus its wire shape.
//! - [`step`] — per-stage workflow bookkeeping ([`StepInfo`],
//!   [`WorkflowProgress`]) for callers that render step lists.
//! - [`eta`] — the [`EtaEstimator`] (EMA of per-step durations).
//! - [`tracker`] — the [`Tracker`] engine tying it all together.
//!
//! Most callers only touch [`Tracker`] and [`Update`]; the rest is exposed
//! for sinks and UIs that need the finer-grained state.

pub mod eta;
pub mod step;
pub mod tracker;
pub mod update;

pub use eta::EtaEstimator;
pub use step::{StageStatus, StepInfo, WorkflowProgress, WorkflowStatus};
pub use tracker::Tracker;
pub use update::{Update, UpdateStatus};
