//! # Per-step records and workflow aggregation.
//!
//! [`StepInfo`] is the richer per-step record behind a run: one instance per
//! step begun, carrying a unique stage id, a [`StageStatus`], fractional
//! progress, ETA, a detail map, and an error string. [`WorkflowProgress`]
//! aggregates an ordered list of them into an overall percentage and a
//! Running → {Completed, Failed} transition.
//!
//! ## Rules
//! - A step is mutable while `Pending`/`Running`/`Retrying` and frozen once
//!   terminal (`Completed`/`Failed`/`Skipped`): terminal transitions are
//!   applied once and later mutations are ignored.
//! - `progress` is always clamped to [0, 1].

use std::time::Duration;

use serde::Serialize;
use serde_json::{Map, Value};

/// Status of one step, with the numeric UI code existing consumers use for
/// styling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StageStatus {
    /// Step known but not yet begun.
    Pending,
    /// Step currently executing.
    Running,
    /// Step finished successfully. Terminal.
    Completed,
    /// Step failed. Terminal.
    Failed,
    /// Step skipped by the workflow. Terminal.
    Skipped,
    /// Step failed and is being retried.
    Retrying,
}

impl StageStatus {
    /// Numeric UI styling code (stable wire values).
    pub fn ui_code(&self) -> u8 {
        match self {
            StageStatus::Pending => 0,
            StageStatus::Running => 1,
            StageStatus::Completed => 2,
            StageStatus::Failed => 3,
            StageStatus::Skipped => 4,
            StageStatus::Retrying => 5,
        }
    }

    /// True for statuses that permit no further mutation.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            StageStatus::Completed | StageStatus::Failed | StageStatus::Skipped
        )
    }
}

/// Rich per-step record.
///
/// Created when a step begins, mutated by [`StepInfo::update_progress`],
/// [`StepInfo::complete`], and [`StepInfo::fail`], immutable once terminal.
#[derive(Debug, Clone, Serialize)]
pub struct StepInfo {
    /// Unique id for this step instance.
    pub stage_id: String,
    /// Step name shown to consumers.
    pub name: String,
    /// Current status.
    pub status: StageStatus,
    /// Fractional progress in [0, 1].
    pub progress: f64,
    /// Estimated time remaining in milliseconds, when known.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub eta_ms: Option<u64>,
    /// Arbitrary per-step details.
    #[serde(skip_serializing_if = "Map::is_empty")]
    pub details: Map<String, Value>,
    /// Error message for failed steps.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl StepInfo {
    /// Creates a new running step with a fresh stage id.
    pub fn begin(name: impl Into<String>) -> Self {
        Self {
            stage_id: uuid::Uuid::new_v4().to_string(),
            name: name.into(),
            status: StageStatus::Running,
            progress: 0.0,
            eta_ms: None,
            details: Map::new(),
            error: None,
        }
    }

    /// Updates fractional progress (clamped to [0, 1]) and optional ETA.
    ///
    /// Ignored once the step is terminal.
    pub fn update_progress(&mut self, progress: f64, eta: Option<Duration>) {
        if self.status.is_terminal() {
            return;
        }
        self.progress = progress.clamp(0.0, 1.0);
        self.eta_ms = eta.map(|d| d.as_millis().min(u128::from(u64::MAX)) as u64);
    }

    /// Marks the step completed with full progress. Terminal.
    pub fn complete(&mut self) {
        if self.status.is_terminal() {
            return;
        }
        self.status = StageStatus::Completed;
        self.progress = 1.0;
        self.eta_ms = None;
    }

    /// Marks the step failed with an error message. Terminal.
    pub fn fail(&mut self, error: impl Into<String>) {
        if self.status.is_terminal() {
            return;
        }
        self.status = StageStatus::Failed;
        self.error = Some(error.into());
    }

    /// Marks the step skipped. Terminal.
    pub fn skip(&mut self) {
        if self.status.is_terminal() {
            return;
        }
        self.status = StageStatus::Skipped;
    }

    /// Marks the step as retrying after a failure.
    pub fn retrying(&mut self) {
        if self.status.is_terminal() {
            return;
        }
        self.status = StageStatus::Retrying;
        self.error = None;
    }
}

/// Overall status of a workflow run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkflowStatus {
    /// Steps are still being added or executed.
    Running,
    /// All steps added and none failed.
    Completed,
    /// At least one step failed.
    Failed,
}

/// Ordered collection of step records with an aggregate percentage.
///
/// Percentage is steps *added* over the declared total, matching what the
/// orchestration layer reports: beginning a step counts it toward the
/// aggregate immediately.
#[derive(Debug, Clone, Serialize)]
pub struct WorkflowProgress {
    /// Steps in begin order.
    pub steps: Vec<StepInfo>,
    /// Declared number of steps in the workflow.
    pub total_steps: usize,
    /// Aggregate percentage in [0, 100].
    pub percentage: u8,
    /// Overall status.
    pub status: WorkflowStatus,
}

impl WorkflowProgress {
    /// Creates an empty running workflow of `total_steps` steps.
    pub fn new(total_steps: usize) -> Self {
        Self {
            steps: Vec::with_capacity(total_steps),
            total_steps,
            percentage: 0,
            status: WorkflowStatus::Running,
        }
    }

    /// Appends a step and recomputes the aggregate percentage.
    pub fn push(&mut self, step: StepInfo) {
        self.steps.push(step);
        self.percentage = if self.total_steps == 0 {
            0
        } else {
            ((self.steps.len().min(self.total_steps) * 100) / self.total_steps).min(100) as u8
        };
    }

    /// Returns the most recently added step, mutably.
    pub fn current_mut(&mut self) -> Option<&mut StepInfo> {
        self.steps.last_mut()
    }

    /// Transitions the workflow to its terminal status.
    ///
    /// `Failed` if any step failed, `Completed` otherwise. No-op once
    /// terminal.
    pub fn finish(&mut self) {
        if self.status != WorkflowStatus::Running {
            return;
        }
        let failed = self
            .steps
            .iter()
            .any(|s| matches!(s.status, StageStatus::Failed));
        self.status = if failed {
            WorkflowStatus::Failed
        } else {
            WorkflowStatus::Completed
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ui_codes_match_wire_contract() {
        assert_eq!(StageStatus::Pending.ui_code(), 0);
        assert_eq!(StageStatus::Running.ui_code(), 1);
        assert_eq!(StageStatus::Completed.ui_code(), 2);
        assert_eq!(StageStatus::Failed.ui_code(), 3);
        assert_eq!(StageStatus::Skipped.ui_code(), 4);
        assert_eq!(StageStatus::Retrying.ui_code(), 5);
    }

    #[test]
    fn test_progress_clamped_to_unit_interval() {
        let mut step = StepInfo::begin("analyze");
        step.update_progress(1.5, None);
        assert_eq!(step.progress, 1.0);
        step.update_progress(-0.25, None);
        assert_eq!(step.progress, 0.0);
    }

    #[test]
    fn test_terminal_steps_are_frozen() {
        let mut step = StepInfo::begin("build");
        step.complete();
        assert_eq!(step.status, StageStatus::Completed);

        step.fail("late failure");
        assert_eq!(step.status, StageStatus::Completed);
        assert!(step.error.is_none());

        step.update_progress(0.5, None);
        assert_eq!(step.progress, 1.0);
    }

    #[test]
    fn test_stage_ids_are_unique_per_instance() {
        let a = StepInfo::begin("scan");
        let b = StepInfo::begin("scan");
        assert_ne!(a.stage_id, b.stage_id);
    }

    #[test]
    fn test_workflow_percentage_counts_added_steps() {
        let mut wf = WorkflowProgress::new(4);
        assert_eq!(wf.percentage, 0);
        wf.push(StepInfo::begin("a"));
        assert_eq!(wf.percentage, 25);
        wf.push(StepInfo::begin("b"));
        wf.push(StepInfo::begin("c"));
        wf.push(StepInfo::begin("d"));
        assert_eq!(wf.percentage, 100);
    }

    #[test]
    fn test_workflow_terminal_transition() {
        let mut wf = WorkflowProgress::new(2);
        wf.push(StepInfo::begin("a"));
        wf.current_mut().unwrap().complete();
        wf.push(StepInfo::begin("b"));
        wf.current_mut().unwrap().fail("boom");
        wf.finish();
        assert_eq!(wf.status, WorkflowStatus::Failed);

        // Already terminal: further finishes keep the status.
        wf.finish();
        assert_eq!(wf.status, WorkflowStatus::Failed);
    }

    #[test]
    fn test_workflow_all_completed() {
        let mut wf = WorkflowProgress::new(1);
        wf.push(StepInfo::begin("only"));
        wf.current_mut().unwrap().complete();
        wf.finish();
        assert_eq!(wf.status, WorkflowStatus::Completed);
    }
}
