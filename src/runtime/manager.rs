//! # WorkerManager: registry and lifecycle for background workers.
//!
//! Owns a named set of [`BackgroundWorker`]s, starts them with panic
//! isolation, tracks a per-worker [`WorkerState`], runs a periodic health
//! monitor, and probes health with a per-worker bound so one wedged worker
//! cannot stall the whole report.
//!
//! ## Flow
//! ```text
//! register(w) ─► map[name] = w, state = Stopped     (dupes rejected)
//!
//! start_all():
//!   per worker: state Starting
//!     go_with_recover( worker.start(child_token) )
//!       ├─ Ok    → state Running
//!       ├─ Err   → state Failed (logged; siblings unaffected)
//!       └─ panic → state Failed via the recover hook
//!   plus one supervised monitor task:
//!     every health_interval ─► bounded probes ─► cached report,
//!     unhealthy workers logged at warn
//!
//! stop_all(grace):
//!   concurrent worker.stop()s, bounded by grace
//!     └─ any failure → Err(WorkerStopFailed { failed, total })
//!   then lifecycle.shutdown(grace)
//!     └─ cancels worker tokens + monitor; GraceExceeded if a start
//!        task is still stuck past the grace
//!
//! health_check():
//!   per worker: timeout(health_timeout, worker.health())
//!     └─ elapsed → HealthStatus::Unknown for that worker
//! ```
//!
//! ## Rules
//! - Workers are stopped first and the lifecycle torn down last, so every
//!   registered worker gets its `stop()` call even when another worker
//!   ignores its token.
//! - `unregister` stops a running worker before forgetting it.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::RwLock;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tokio::task::JoinSet;
use tracing::{error, info, warn};

use crate::error::RuntimeError;
use crate::runtime::lifecycle::Lifecycle;
use crate::runtime::worker::{BackgroundWorker, WorkerHealth, WorkerState};

const DEFAULT_HEALTH_TIMEOUT: Duration = Duration::from_secs(2);
const DEFAULT_HEALTH_INTERVAL: Duration = Duration::from_secs(30);

type WorkerMap = HashMap<String, Arc<dyn BackgroundWorker>>;

/// Registry of named background workers with managed start/stop.
pub struct WorkerManager {
    workers: Arc<RwLock<WorkerMap>>,
    states: Arc<RwLock<HashMap<String, WorkerState>>>,
    /// Latest report produced by the periodic monitor.
    last_health: Arc<RwLock<HashMap<String, WorkerHealth>>>,
    lifecycle: Lifecycle,
    /// Bound for each individual health probe.
    health_timeout: Duration,
    /// Period of the background health monitor.
    health_interval: Duration,
    monitor_started: AtomicBool,
    stopped: AtomicBool,
}

impl WorkerManager {
    #[must_use]
    pub fn new() -> Self {
        Self {
            workers: Arc::new(RwLock::new(HashMap::new())),
            states: Arc::new(RwLock::new(HashMap::new())),
            last_health: Arc::new(RwLock::new(HashMap::new())),
            lifecycle: Lifecycle::new(),
            health_timeout: DEFAULT_HEALTH_TIMEOUT,
            health_interval: DEFAULT_HEALTH_INTERVAL,
            monitor_started: AtomicBool::new(false),
            stopped: AtomicBool::new(false),
        }
    }

    /// Overrides the per-worker health probe bound.
    #[must_use]
    pub fn with_health_timeout(mut self, timeout: Duration) -> Self {
        self.health_timeout = timeout;
        self
    }

    /// Overrides the period of the background health monitor.
    #[must_use]
    pub fn with_health_interval(mut self, interval: Duration) -> Self {
        self.health_interval = interval;
        self
    }

    /// Registers a worker under its name; duplicates are rejected.
    pub fn register(&self, worker: Arc<dyn BackgroundWorker>) -> Result<(), RuntimeError> {
        let name = worker.name().to_string();
        let mut workers = self.workers.write().unwrap_or_else(|p| p.into_inner());
        if workers.contains_key(&name) {
            return Err(RuntimeError::WorkerExists { name });
        }
        self.set_state(&name, WorkerState::Stopped);
        workers.insert(name, worker);
        Ok(())
    }

    /// Stops the worker when it is running, then removes it from the
    /// registry.
    ///
    /// A stop failure leaves the worker registered in the `Failed` state and
    /// returns [`RuntimeError::WorkerStopFailed`].
    pub async fn unregister(&self, name: &str) -> Result<Arc<dyn BackgroundWorker>, RuntimeError> {
        let worker = self
            .workers
            .read()
            .unwrap_or_else(|p| p.into_inner())
            .get(name)
            .cloned()
            .ok_or_else(|| RuntimeError::WorkerNotFound {
                name: name.to_string(),
            })?;

        let active = matches!(
            self.worker_status(name),
            Ok(WorkerState::Starting | WorkerState::Running)
        );
        if active {
            self.set_state(name, WorkerState::Stopping);
            if let Err(e) = worker.stop().await {
                warn!(worker = %name, error = %e, "worker stop failed during unregister");
                self.set_state(name, WorkerState::Failed);
                return Err(RuntimeError::WorkerStopFailed {
                    failed: 1,
                    total: 1,
                });
            }
        }

        self.workers
            .write()
            .unwrap_or_else(|p| p.into_inner())
            .remove(name);
        self.states
            .write()
            .unwrap_or_else(|p| p.into_inner())
            .remove(name);
        self.last_health
            .write()
            .unwrap_or_else(|p| p.into_inner())
            .remove(name);
        Ok(worker)
    }

    /// Starts every registered worker, each on its own tracked task with
    /// panic isolation, plus one supervised periodic health monitor.
    ///
    /// A worker that fails or panics on start is marked
    /// [`WorkerState::Failed`] and the rest still start. Fails only when the
    /// manager itself is already shutting down.
    pub fn start_all(&self) -> Result<(), RuntimeError> {
        let workers = snapshot(&self.workers);

        for (name, worker) in workers {
            self.set_state(&name, WorkerState::Starting);
            let states = Arc::clone(&self.states);
            let panic_states = Arc::clone(&self.states);
            let task_name = name.clone();
            let panic_name = name.clone();

            self.lifecycle.go_with_recover(
                move |token| async move {
                    match worker.start(token).await {
                        Ok(()) => {
                            info!(worker = %task_name, "worker started");
                            set_state_in(&states, &task_name, WorkerState::Running);
                        }
                        Err(e) => {
                            error!(worker = %task_name, error = %e, "worker failed to start");
                            set_state_in(&states, &task_name, WorkerState::Failed);
                        }
                    }
                },
                move |panic_info| {
                    error!(worker = %panic_name, panic = %panic_info, "worker start panicked");
                    set_state_in(&panic_states, &panic_name, WorkerState::Failed);
                },
            )?;
        }

        if !self.monitor_started.swap(true, Ordering::SeqCst) {
            self.spawn_health_monitor()?;
        }
        Ok(())
    }

    /// Stops workers concurrently within `grace`, then tears down the
    /// lifecycle (cancelling worker tokens and the health monitor).
    ///
    /// Every registered worker receives its `stop()` call before the
    /// lifecycle teardown, so one worker ignoring its token cannot deprive
    /// the others of a clean stop. Returns
    /// [`RuntimeError::WorkerStopFailed`] when any stop errored or ran out
    /// of time; otherwise propagates the lifecycle result.
    pub async fn stop_all(&self, grace: Duration) -> Result<(), RuntimeError> {
        if self.stopped.swap(true, Ordering::SeqCst) {
            return Err(RuntimeError::AlreadyShutdown);
        }

        let workers = snapshot(&self.workers);
        let total = workers.len();

        let mut set = JoinSet::new();
        for (name, worker) in workers {
            self.set_state(&name, WorkerState::Stopping);
            set.spawn(async move {
                let res = worker.stop().await;
                (name, res)
            });
        }

        let mut failed = 0usize;
        let drain = async {
            while let Some(joined) = set.join_next().await {
                match joined {
                    Ok((name, Ok(()))) => self.set_state(&name, WorkerState::Stopped),
                    Ok((name, Err(e))) => {
                        warn!(worker = %name, error = %e, "worker stop failed");
                        self.set_state(&name, WorkerState::Failed);
                        failed += 1;
                    }
                    Err(join_err) => {
                        warn!(error = %join_err, "worker stop task failed");
                        failed += 1;
                    }
                }
            }
        };
        if tokio::time::timeout(grace, drain).await.is_err() {
            let stuck = set.len();
            set.abort_all();
            failed += stuck;
        }

        // Lifecycle goes last: the stops above already drained each
        // worker's own work.
        let lifecycle_res = self.lifecycle.shutdown(grace).await;

        if failed > 0 {
            return Err(RuntimeError::WorkerStopFailed { failed, total });
        }
        lifecycle_res
    }

    /// Probes every worker's health, bounding each probe by the configured
    /// timeout.
    pub async fn health_check(&self) -> HashMap<String, WorkerHealth> {
        probe_all(snapshot(&self.workers), self.health_timeout).await
    }

    /// True when every registered worker reports healthy.
    pub async fn is_healthy(&self) -> bool {
        self.health_check().await.values().all(WorkerHealth::is_healthy)
    }

    /// Most recent report produced by the periodic health monitor.
    ///
    /// Empty until the first monitor sweep completes.
    pub fn last_health_report(&self) -> HashMap<String, WorkerHealth> {
        self.last_health
            .read()
            .unwrap_or_else(|p| p.into_inner())
            .clone()
    }

    /// Last observed state of one worker.
    pub fn worker_status(&self, name: &str) -> Result<WorkerState, RuntimeError> {
        self.states
            .read()
            .unwrap_or_else(|p| p.into_inner())
            .get(name)
            .copied()
            .ok_or_else(|| RuntimeError::WorkerNotFound {
                name: name.to_string(),
            })
    }

    /// Registered worker names, sorted.
    pub fn worker_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .workers
            .read()
            .unwrap_or_else(|p| p.into_inner())
            .keys()
            .cloned()
            .collect();
        names.sort();
        names
    }

    /// Refreshes the cached health report every `health_interval`.
    fn spawn_health_monitor(&self) -> Result<(), RuntimeError> {
        let workers = Arc::clone(&self.workers);
        let cache = Arc::clone(&self.last_health);
        let interval = self.health_interval;
        let bound = self.health_timeout;

        self.lifecycle.go(move |token| async move {
            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = tokio::time::sleep(interval) => {}
                }

                let report = probe_all(snapshot(&workers), bound).await;
                for (name, health) in &report {
                    if !health.is_healthy() {
                        warn!(worker = %name, status = %health.status, "worker unhealthy");
                    }
                }
                *cache.write().unwrap_or_else(|p| p.into_inner()) = report;
            }
        })
    }

    fn set_state(&self, name: &str, state: WorkerState) {
        set_state_in(&self.states, name, state);
    }
}

impl Default for WorkerManager {
    fn default() -> Self {
        Self::new()
    }
}

fn set_state_in(states: &RwLock<HashMap<String, WorkerState>>, name: &str, state: WorkerState) {
    states
        .write()
        .unwrap_or_else(|p| p.into_inner())
        .insert(name.to_string(), state);
}

fn snapshot(workers: &RwLock<WorkerMap>) -> Vec<(String, Arc<dyn BackgroundWorker>)> {
    workers
        .read()
        .unwrap_or_else(|p| p.into_inner())
        .iter()
        .map(|(n, w)| (n.clone(), Arc::clone(w)))
        .collect()
}

/// Probes each worker with an individual bound.
async fn probe_all(
    workers: Vec<(String, Arc<dyn BackgroundWorker>)>,
    bound: Duration,
) -> HashMap<String, WorkerHealth> {
    let probes = workers.into_iter().map(|(name, worker)| async move {
        let health = match tokio::time::timeout(bound, worker.health()).await {
            Ok(h) => h,
            Err(_) => {
                warn!(worker = %name, "health probe timed out");
                WorkerHealth::unknown()
            }
        };
        (name, health)
    });
    futures::future::join_all(probes).await.into_iter().collect()
}
