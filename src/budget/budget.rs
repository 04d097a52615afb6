//! # Sliding-window error budget (circuit breaker).
//!
//! [`ErrorBudget`] counts operational failures inside a sliding time window
//! and reports whether retrying is still worthwhile. It is purely advisory:
//! it never cancels anything itself — callers inspect
//! [`ErrorBudget::is_circuit_open`] (or the return of
//! `Tracker::update_with_error_handling`) and decide to stop.
//!
//! ## Boundary
//! One boundary, shared by every path: with `max_errors = N`, the Nth error
//! inside the window is still **within** budget; the (N+1)th exceeds it and
//! opens the circuit. Errors are only forgotten by aging out of
//! `reset_window` — successes never clear the error history.
//!
//! ## Example
//! ```rust
//! use std::time::Duration;
//! use stepvisor::ErrorBudget;
//!
//! let budget = ErrorBudget::new(5, Duration::from_secs(600));
//! for _ in 0..5 {
//!     assert!(budget.record_error()); // within budget
//! }
//! assert!(!budget.record_error()); // sixth exceeds it
//! assert!(budget.is_circuit_open());
//! ```

use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use tracing::warn;

/// Coarse health classification of the budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BudgetStatus {
    /// Recent errors below half the budget.
    Healthy,
    /// Recent errors at or past half the budget.
    Warning,
    /// Budget exceeded; the circuit is open.
    Exhausted,
}

impl BudgetStatus {
    /// Returns the stable wire string for metadata stamping.
    pub fn as_str(&self) -> &'static str {
        match self {
            BudgetStatus::Healthy => "healthy",
            BudgetStatus::Warning => "warning",
            BudgetStatus::Exhausted => "exhausted",
        }
    }
}

impl std::fmt::Display for BudgetStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Sliding-window failure counter with circuit-breaker semantics.
///
/// Error timestamps are kept in an append-only list pruned lazily before
/// every evaluation, so an old burst stops counting exactly `reset_window`
/// after it happened.
#[derive(Debug)]
pub struct ErrorBudget {
    max_errors: usize,
    reset_window: Duration,
    errors: Mutex<VecDeque<Instant>>,
    successes: AtomicU64,
}

impl ErrorBudget {
    /// Creates a budget of `max_errors` errors per `reset_window`.
    pub fn new(max_errors: usize, reset_window: Duration) -> Self {
        Self {
            max_errors,
            reset_window,
            errors: Mutex::new(VecDeque::new()),
            successes: AtomicU64::new(0),
        }
    }

    /// Records one error; returns whether the budget still holds.
    ///
    /// Prunes aged-out timestamps, appends now, and returns `true` while the
    /// windowed count (including this error) is at most `max_errors`.
    pub fn record_error(&self) -> bool {
        let now = Instant::now();
        let mut errors = self.errors.lock().unwrap_or_else(|p| p.into_inner());
        Self::prune(&mut errors, now, self.reset_window);
        errors.push_back(now);
        let within = errors.len() <= self.max_errors;
        if !within {
            warn!(
                recent_errors = errors.len(),
                max_errors = self.max_errors,
                window_secs = self.reset_window.as_secs(),
                "error budget exceeded"
            );
        }
        within
    }

    /// Records one success.
    ///
    /// Increments a counter only; error history is untouched and keeps
    /// counting until it ages out of the window.
    pub fn record_success(&self) {
        self.successes.fetch_add(1, Ordering::Relaxed);
    }

    /// True when the windowed error count strictly exceeds `max_errors`.
    pub fn is_circuit_open(&self) -> bool {
        self.recent_errors() > self.max_errors
    }

    /// Current health classification.
    ///
    /// `Exhausted` past `max_errors`, `Warning` from `max_errors / 2`,
    /// `Healthy` below that.
    pub fn status(&self) -> BudgetStatus {
        let recent = self.recent_errors();
        if recent > self.max_errors {
            BudgetStatus::Exhausted
        } else if recent > 0 && recent >= self.max_errors / 2 {
            BudgetStatus::Warning
        } else {
            BudgetStatus::Healthy
        }
    }

    /// Number of errors currently inside the window.
    pub fn recent_errors(&self) -> usize {
        let now = Instant::now();
        let mut errors = self.errors.lock().unwrap_or_else(|p| p.into_inner());
        Self::prune(&mut errors, now, self.reset_window);
        errors.len()
    }

    /// Number of successes recorded over the budget's lifetime.
    pub fn successes(&self) -> u64 {
        self.successes.load(Ordering::Relaxed)
    }

    fn prune(errors: &mut VecDeque<Instant>, now: Instant, window: Duration) {
        while let Some(&front) = errors.front() {
            if now.duration_since(front) > window {
                errors.pop_front();
            } else {
                break;
            }
        }
    }
}
