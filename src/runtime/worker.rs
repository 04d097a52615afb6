//! # Background workers: long-running managed services.
//!
//! A [`BackgroundWorker`] is a named service with explicit start/stop and a
//! queryable health snapshot. The [`WorkerManager`](crate::runtime::manager)
//! owns a set of them; [`IntervalWorker`] is the provided implementation for
//! the common run-a-closure-every-N-seconds case.
//!
//! ## Rules
//! - `start` registers the work and returns promptly; the work itself runs
//!   on the worker's own tracked tasks.
//! - `health` must be cheap and must not block on the worker's main loop;
//!   the manager bounds each call with a timeout and reports
//!   [`HealthStatus::Unknown`] when a worker fails to answer in time.

use std::future::Future;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant, SystemTime};

use async_trait::async_trait;
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::runtime::lifecycle::Lifecycle;

/// Health classification of one worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Unhealthy,
    /// The worker did not answer a bounded health probe.
    Unknown,
}

impl HealthStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            HealthStatus::Healthy => "healthy",
            HealthStatus::Unhealthy => "unhealthy",
            HealthStatus::Unknown => "unknown",
        }
    }
}

impl std::fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Point-in-time health snapshot of a worker.
#[derive(Debug, Clone, Serialize)]
pub struct WorkerHealth {
    pub status: HealthStatus,
    pub last_check: SystemTime,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Time since the worker started, in milliseconds.
    pub uptime_ms: u64,
    pub tasks_total: u64,
    pub tasks_failed: u64,
}

impl WorkerHealth {
    /// A snapshot for a worker that never answered the probe.
    pub fn unknown() -> Self {
        Self {
            status: HealthStatus::Unknown,
            last_check: SystemTime::now(),
            error: Some("health probe timed out".to_string()),
            uptime_ms: 0,
            tasks_total: 0,
            tasks_failed: 0,
        }
    }

    pub fn is_healthy(&self) -> bool {
        self.status == HealthStatus::Healthy
    }
}

/// Observed lifecycle state of a managed worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkerState {
    Starting,
    Running,
    Stopping,
    Stopped,
    Failed,
}

impl WorkerState {
    pub fn as_str(&self) -> &'static str {
        match self {
            WorkerState::Starting => "starting",
            WorkerState::Running => "running",
            WorkerState::Stopping => "stopping",
            WorkerState::Stopped => "stopped",
            WorkerState::Failed => "failed",
        }
    }
}

impl std::fmt::Display for WorkerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A managed long-running service.
#[async_trait]
pub trait BackgroundWorker: Send + Sync + 'static {
    /// Worker name, unique within a manager.
    fn name(&self) -> &str;

    /// Starts the worker's background work and returns promptly.
    ///
    /// `token` fires when the owning manager shuts down; the worker must
    /// wind down when it does, even if [`BackgroundWorker::stop`] is never
    /// called.
    async fn start(&self, token: CancellationToken) -> anyhow::Result<()>;

    /// Stops the worker and waits for its work to finish.
    async fn stop(&self) -> anyhow::Result<()>;

    /// Cheap health snapshot. Must not block on the worker's main loop.
    async fn health(&self) -> WorkerHealth;
}

/// Closure to run on each interval tick.
type TickFn = dyn Fn(CancellationToken) -> futures::future::BoxFuture<'static, anyhow::Result<()>>
    + Send
    + Sync;

/// Tick counters shared between the run loop and health snapshots.
#[derive(Default)]
struct TickStats {
    total: AtomicU64,
    failed: AtomicU64,
    last_error: Mutex<Option<String>>,
}

/// Runs a closure every `interval`, counting runs and failures.
///
/// ## Example
/// ```no_run
/// use std::time::Duration;
/// use stepvisor::IntervalWorker;
///
/// let worker = IntervalWorker::new("cache-sweeper", Duration::from_secs(30), |_token| async {
///     // sweep expired entries
///     Ok(())
/// });
/// ```
pub struct IntervalWorker {
    name: String,
    interval: Duration,
    tick: Arc<TickFn>,
    lifecycle: Lifecycle,
    stop_grace: Duration,
    stats: Arc<TickStats>,
    started_at: Mutex<Option<Instant>>,
}

impl IntervalWorker {
    /// Creates a worker running `tick` every `interval`, with a 10 s stop
    /// grace.
    pub fn new<F, Fut>(name: impl Into<String>, interval: Duration, tick: F) -> Self
    where
        F: Fn(CancellationToken) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        Self {
            name: name.into(),
            interval,
            tick: Arc::new(move |token| Box::pin(tick(token))),
            lifecycle: Lifecycle::new(),
            stop_grace: Duration::from_secs(10),
            stats: Arc::new(TickStats::default()),
            started_at: Mutex::new(None),
        }
    }

    /// Overrides the grace period [`BackgroundWorker::stop`] waits for.
    #[must_use]
    pub fn with_stop_grace(mut self, grace: Duration) -> Self {
        self.stop_grace = grace;
        self
    }

    /// Total tick executions so far.
    pub fn tasks_total(&self) -> u64 {
        self.stats.total.load(Ordering::Relaxed)
    }

    /// Tick executions that returned an error.
    pub fn tasks_failed(&self) -> u64 {
        self.stats.failed.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl BackgroundWorker for IntervalWorker {
    fn name(&self) -> &str {
        &self.name
    }

    async fn start(&self, token: CancellationToken) -> anyhow::Result<()> {
        *self.started_at.lock().unwrap_or_else(|p| p.into_inner()) = Some(Instant::now());

        let interval = self.interval;
        let tick = Arc::clone(&self.tick);
        let stats = Arc::clone(&self.stats);
        let name = self.name.clone();
        let outer = token;

        self.lifecycle.go(move |worker_token| async move {
            loop {
                tokio::select! {
                    _ = worker_token.cancelled() => break,
                    _ = outer.cancelled() => break,
                    _ = tokio::time::sleep(interval) => {}
                }

                stats.total.fetch_add(1, Ordering::Relaxed);
                match tick(worker_token.child_token()).await {
                    Ok(()) => {
                        *stats.last_error.lock().unwrap_or_else(|p| p.into_inner()) = None;
                    }
                    Err(e) => {
                        stats.failed.fetch_add(1, Ordering::Relaxed);
                        warn!(worker = %name, error = %e, "interval tick failed");
                        *stats.last_error.lock().unwrap_or_else(|p| p.into_inner()) =
                            Some(e.to_string());
                    }
                }
            }
        })?;
        Ok(())
    }

    async fn stop(&self) -> anyhow::Result<()> {
        self.lifecycle.shutdown(self.stop_grace).await?;
        Ok(())
    }

    async fn health(&self) -> WorkerHealth {
        let last_error = self
            .stats
            .last_error
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .clone();
        let status = if last_error.is_none() {
            HealthStatus::Healthy
        } else {
            HealthStatus::Unhealthy
        };
        let uptime = self
            .started_at
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .map_or(Duration::ZERO, |t| t.elapsed());

        WorkerHealth {
            status,
            last_check: SystemTime::now(),
            error: last_error,
            uptime_ms: uptime.as_millis().min(u128::from(u64::MAX)) as u64,
            tasks_total: self.tasks_total(),
            tasks_failed: self.tasks_failed(),
        }
    }
}
