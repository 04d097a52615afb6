//! # Lifecycle: spawn tracking and graceful shutdown.
//!
//! [`Lifecycle`] is the root primitive the rest of the runtime builds on:
//! every task it spawns is tracked, observes one [`CancellationToken`], and
//! is waited for on shutdown within a grace period.
//!
//! ## Flow
//! ```text
//! go(f) ─► tracker.spawn(f(child_token))        (rejected once shutdown begins)
//!
//! shutdown(grace):
//!   phase → ShuttingDown (exactly once; repeats → AlreadyShutdown)
//!   token.cancel() ─► propagates to every child token
//!   tracker.close(); timeout(grace, tracker.wait())
//!     ├─ Ok      → phase Stopped, Ok(())
//!     └─ elapsed → phase Stopped, Err(GraceExceeded)
//! ```
//!
//! ## Rules
//! - Spawned tasks receive a child token and are expected to return promptly
//!   after it fires; the lifecycle never aborts them.
//! - `shutdown` succeeds at most once; later calls fail fast instead of
//!   cancelling twice or double-waiting.
//! - Panic isolation is opt-in via [`Lifecycle::go_with_recover`]; plain
//!   [`Lifecycle::go`] lets a panic propagate to the join layer, matching
//!   ordinary spawned-task semantics.

use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Mutex;
use std::time::Duration;

use futures::FutureExt;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, error};

use crate::error::RuntimeError;

/// Lifecycle phase, advanced monotonically.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Running,
    ShuttingDown,
    Stopped,
}

/// Tracked-spawn primitive with cancellation and bounded shutdown.
pub struct Lifecycle {
    token: CancellationToken,
    tracker: TaskTracker,
    phase: Mutex<Phase>,
}

impl Lifecycle {
    /// Creates a lifecycle in the running phase with a fresh root token.
    #[must_use]
    pub fn new() -> Self {
        Self {
            token: CancellationToken::new(),
            tracker: TaskTracker::new(),
            phase: Mutex::new(Phase::Running),
        }
    }

    /// Spawns a tracked task observing a child of the root token.
    ///
    /// Returns [`RuntimeError::ShutdownInProgress`] once shutdown has begun;
    /// nothing new starts while the runtime is draining.
    pub fn go<F, Fut>(&self, f: F) -> Result<(), RuntimeError>
    where
        F: FnOnce(CancellationToken) -> Fut,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.check_running()?;
        self.tracker.spawn(f(self.token.child_token()));
        Ok(())
    }

    /// Spawns a tracked task with panic isolation.
    ///
    /// A panic inside the task is caught, stringified, and handed to
    /// `on_panic`; the task still counts as finished for shutdown purposes
    /// and nothing else in the runtime is affected.
    pub fn go_with_recover<F, Fut, P>(&self, f: F, on_panic: P) -> Result<(), RuntimeError>
    where
        F: FnOnce(CancellationToken) -> Fut,
        Fut: Future<Output = ()> + Send + 'static,
        P: FnOnce(String) + Send + 'static,
    {
        self.check_running()?;
        let fut = f(self.token.child_token());
        self.tracker.spawn(async move {
            if let Err(payload) = AssertUnwindSafe(fut).catch_unwind().await {
                let info = panic_message(payload);
                error!(panic = %info, "tracked task panicked");
                on_panic(info);
            }
        });
        Ok(())
    }

    /// Cancels the root token and waits up to `grace` for tracked tasks.
    ///
    /// Returns [`RuntimeError::GraceExceeded`] when tasks are still running
    /// after the grace period, and [`RuntimeError::AlreadyShutdown`] on any
    /// call after the first.
    pub async fn shutdown(&self, grace: Duration) -> Result<(), RuntimeError> {
        {
            let mut phase = self.phase.lock().unwrap_or_else(|p| p.into_inner());
            if *phase != Phase::Running {
                return Err(RuntimeError::AlreadyShutdown);
            }
            *phase = Phase::ShuttingDown;
        }

        debug!(grace_ms = grace.as_millis() as u64, "lifecycle shutdown");
        self.token.cancel();
        self.tracker.close();

        let waited = tokio::time::timeout(grace, self.tracker.wait()).await;
        *self.phase.lock().unwrap_or_else(|p| p.into_inner()) = Phase::Stopped;

        match waited {
            Ok(()) => Ok(()),
            Err(_) => Err(RuntimeError::GraceExceeded { grace }),
        }
    }

    /// Root cancellation token; fires when shutdown begins.
    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    /// Number of tracked tasks that have not yet finished.
    pub fn active(&self) -> usize {
        self.tracker.len()
    }

    /// True until [`Lifecycle::shutdown`] is called.
    pub fn is_running(&self) -> bool {
        *self.phase.lock().unwrap_or_else(|p| p.into_inner()) == Phase::Running
    }

    fn check_running(&self) -> Result<(), RuntimeError> {
        if self.is_running() {
            Ok(())
        } else {
            Err(RuntimeError::ShutdownInProgress)
        }
    }
}

impl Default for Lifecycle {
    fn default() -> Self {
        Self::new()
    }
}

/// Best-effort extraction of a panic payload message.
pub(crate) fn panic_message(payload: Box<dyn std::any::Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::time::Instant;

    #[tokio::test]
    async fn test_spawned_task_observes_cancellation() {
        let lc = Lifecycle::new();
        let stopped = Arc::new(AtomicBool::new(false));
        let flag = stopped.clone();

        lc.go(|token| async move {
            token.cancelled().await;
            flag.store(true, Ordering::SeqCst);
        })
        .unwrap();

        lc.shutdown(Duration::from_secs(1)).await.unwrap();
        assert!(stopped.load(Ordering::SeqCst));
        assert_eq!(lc.active(), 0);
    }

    #[tokio::test]
    async fn test_go_rejected_after_shutdown() {
        let lc = Lifecycle::new();
        lc.shutdown(Duration::from_millis(100)).await.unwrap();
        let res = lc.go(|_| async {});
        assert!(matches!(res, Err(RuntimeError::ShutdownInProgress)));
    }

    #[tokio::test]
    async fn test_double_shutdown_fails_fast() {
        let lc = Lifecycle::new();
        lc.shutdown(Duration::from_millis(100)).await.unwrap();
        let res = lc.shutdown(Duration::from_millis(100)).await;
        assert!(matches!(res, Err(RuntimeError::AlreadyShutdown)));
    }

    #[tokio::test]
    async fn test_grace_exceeded_on_stuck_task() {
        let lc = Lifecycle::new();
        lc.go(|_| async {
            // Ignores the token entirely.
            tokio::time::sleep(Duration::from_secs(60)).await;
        })
        .unwrap();

        let start = Instant::now();
        let res = lc.shutdown(Duration::from_millis(50)).await;
        let elapsed = start.elapsed();

        assert!(matches!(res, Err(RuntimeError::GraceExceeded { .. })));
        assert!(elapsed >= Duration::from_millis(50));
        assert!(elapsed < Duration::from_millis(500), "waited {elapsed:?}");
    }

    #[tokio::test]
    async fn test_panic_is_isolated_and_reported() {
        let lc = Lifecycle::new();
        let seen = Arc::new(Mutex::new(None::<String>));
        let slot = seen.clone();

        lc.go_with_recover(
            |_| async {
                panic!("worker exploded");
            },
            move |info| {
                *slot.lock().unwrap() = Some(info);
            },
        )
        .unwrap();

        // Shutdown drains cleanly despite the panic.
        lc.shutdown(Duration::from_secs(1)).await.unwrap();
        assert_eq!(seen.lock().unwrap().as_deref(), Some("worker exploded"));
    }

    #[tokio::test]
    async fn test_panicking_task_does_not_affect_siblings() {
        let lc = Lifecycle::new();
        let done = Arc::new(AtomicUsize::new(0));

        for _ in 0..3 {
            let counter = done.clone();
            lc.go_with_recover(
                |token| async move {
                    token.cancelled().await;
                    counter.fetch_add(1, Ordering::SeqCst);
                },
                |_| {},
            )
            .unwrap();
        }
        lc.go_with_recover(|_| async { panic!("boom") }, |_| {}).unwrap();

        lc.shutdown(Duration::from_secs(1)).await.unwrap();
        assert_eq!(done.load(Ordering::SeqCst), 3);
    }
}
