//! Failure budgeting: sliding-window error counting and circuit-breaker
//! status.
//!
//! ## Contents
//! - [`ErrorBudget`] — windowed failure counter, one per tracker/operation
//! - [`BudgetStatus`] — Healthy / Warning / Exhausted classification
//!
//! The budget is advisory: it annotates progress metadata and answers
//! queries; halting retries is always the caller's decision.

mod budget;

pub use budget::{BudgetStatus, ErrorBudget};
