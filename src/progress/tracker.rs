//! # Tracker: progress engine for one operation's execution.
//!
//! The [`Tracker`] owns throttling, ETA estimation, heartbeat emission, and
//! an embedded [`ErrorBudget`], and publishes [`Update`] snapshots through a
//! single [`Sink`]. Tool code drives it; it neither knows nor cares whether
//! a CLI spinner or a host-notification channel is listening.
//!
//! ## Flow
//! ```text
//! begin(msg) ──► publish step 0 / "started"
//!            └─► spawn heartbeat loop (child token, if heartbeat > 0)
//!
//! update(step, msg, meta)
//!   ├─► throttle: gap < throttle && step != total → DROP (never queued)
//!   ├─► clamp step monotonically, feed EtaEstimator
//!   └─► publish "running" snapshot (lock released before the publish)
//!
//! complete(msg) ──► publish step == total / "completed" (throttle-exempt)
//!               └─► finish(): cancel heartbeat → await it → close sink
//!
//! heartbeat tick: no publish for one interval && not complete
//!   └─► publish synthetic update, meta.kind = "heartbeat" (throttle-exempt)
//! ```
//!
//! ## Rules
//! - Published `step` values are non-decreasing within one run; intermediate
//!   steps may be dropped, the final `step == total` publish never is.
//! - The state lock is never held across `Sink::publish`; a publish gate
//!   serializes the snapshot-then-publish path instead, and every publish is
//!   bounded by [`TrackerConfig::publish_timeout`].
//! - Publish failures are logged at `warn` and swallowed: progress
//!   reporting never fails the tool call.
//! - `finish` is idempotent; the second call is a no-op.

use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant, SystemTime};

use serde_json::{Map, Value};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::budget::{BudgetStatus, ErrorBudget};
use crate::config::TrackerConfig;
use crate::progress::eta::EtaEstimator;
use crate::progress::update::{Update, UpdateStatus, percentage_of};
use crate::sinks::Sink;

/// Mutable per-run state, behind a short-lived lock.
struct TrackerState {
    /// Current step; monotonically non-decreasing.
    current: u64,
    /// Monotonic start of the run.
    started: Instant,
    /// Wall-clock start, stamped on every snapshot.
    started_wall: SystemTime,
    /// Last successful publish decision (throttle + heartbeat reference).
    last_publish: Instant,
    /// Last step advance (per-step duration attribution).
    last_advance: Instant,
    eta: EtaEstimator,
}

/// State shared with the heartbeat task.
struct Shared {
    total: u64,
    trace_id: String,
    cfg: TrackerConfig,
    sink: Arc<dyn Sink>,
    state: Mutex<TrackerState>,
    /// Serializes snapshot-then-publish so published steps stay ordered.
    gate: tokio::sync::Mutex<()>,
}

/// Transport-agnostic progress tracker for one operation.
///
/// ## Example
/// ```no_run
/// use std::sync::Arc;
/// use stepvisor::{Tracker, TrackerConfig, Sink, Update};
///
/// # struct Noop;
/// # #[async_trait::async_trait]
/// # impl Sink for Noop {
/// #     async fn publish(&self, _u: &Update) -> anyhow::Result<()> { Ok(()) }
/// # }
/// # async fn run() {
/// let tracker = Tracker::new(4, Arc::new(Noop), TrackerConfig::default());
/// tracker.begin("containerizing repository").await;
/// tracker.update(1, "analyzing repository", None).await;
/// tracker.update(2, "building image", None).await;
/// tracker.update(3, "scanning image", None).await;
/// tracker.complete("deployed").await;
/// # }
/// ```
pub struct Tracker {
    shared: Arc<Shared>,
    budget: ErrorBudget,
    /// Cancels the heartbeat task; child of nothing — the tracker owns it.
    cancel: CancellationToken,
    heartbeat: Mutex<Option<JoinHandle<()>>>,
    finished: AtomicBool,
}

impl Tracker {
    /// Creates a tracker for a run of `total` steps publishing to `sink`.
    ///
    /// The embedded error budget is sized from
    /// [`TrackerConfig::max_errors`] / [`TrackerConfig::reset_window`]; the
    /// trace id comes from the config or is generated.
    pub fn new(total: u64, sink: Arc<dyn Sink>, cfg: TrackerConfig) -> Self {
        let trace_id = cfg
            .trace_id
            .clone()
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
        let budget = ErrorBudget::new(cfg.max_errors, cfg.reset_window);
        let now = Instant::now();

        Self {
            shared: Arc::new(Shared {
                total,
                trace_id,
                cfg,
                sink,
                state: Mutex::new(TrackerState {
                    current: 0,
                    started: now,
                    started_wall: SystemTime::now(),
                    last_publish: now,
                    last_advance: now,
                    eta: EtaEstimator::new(),
                }),
                gate: tokio::sync::Mutex::new(()),
            }),
            budget,
            cancel: CancellationToken::new(),
            heartbeat: Mutex::new(None),
            finished: AtomicBool::new(false),
        }
    }

    /// Starts the run: publishes step 0 with status `started` and spawns the
    /// heartbeat task when a heartbeat interval is configured.
    pub async fn begin(&self, msg: impl Into<String>) {
        let msg = msg.into();
        self.shared
            .publish_path(|st, sh| {
                st.last_publish = Instant::now();
                Some(
                    sh.snapshot(st, 0, msg, UpdateStatus::Started)
                        .with_meta("kind", "progress"),
                )
            })
            .await;

        if let Some(interval) = self.shared.cfg.heartbeat_interval() {
            let shared = Arc::clone(&self.shared);
            let token = self.cancel.child_token();
            let handle = tokio::spawn(heartbeat_loop(shared, token, interval));
            *self.heartbeat.lock().unwrap_or_else(|p| p.into_inner()) = Some(handle);
        }
    }

    /// Publishes a `running` update for `step`, subject to throttling.
    ///
    /// Updates arriving faster than the throttle gap are dropped, not
    /// queued, unless `step == total`. Steps below the current step are
    /// clamped up: the published sequence never decreases.
    pub async fn update(&self, step: u64, msg: impl Into<String>, meta: Option<Map<String, Value>>) {
        let msg = msg.into();
        self.shared
            .publish_path(move |st, sh| {
                let now = Instant::now();
                let throttled = sh.cfg.throttle > Duration::ZERO
                    && now.duration_since(st.last_publish) < sh.cfg.throttle
                    && step != sh.total;
                if throttled {
                    return None;
                }

                let step = step.max(st.current);
                if step > st.current {
                    st.eta
                        .record(now.duration_since(st.last_advance), step - st.current);
                    st.last_advance = now;
                    st.current = step;
                }
                st.last_publish = now;

                let pct = percentage_of(step, sh.total);
                let mut up = sh
                    .snapshot(st, step, format!("[{pct}%] {msg}"), UpdateStatus::Running)
                    .with_meta("kind", "progress");
                if let Some(meta) = meta {
                    for (k, v) in meta {
                        up.meta.insert(k, v);
                    }
                }
                if let Some(eta) = st.eta.estimate(step, sh.total, st.started.elapsed()) {
                    up = up.with_eta(eta);
                }
                Some(up)
            })
            .await;
    }

    /// Publishes a `failed` update for `step` carrying the error message.
    ///
    /// Throttle-exempt: failures are always worth a publish. Does not halt
    /// the tracker and does not touch the error budget — use
    /// [`Tracker::update_with_error_handling`] for budget integration.
    pub async fn error(&self, step: u64, msg: impl Into<String>, err: &anyhow::Error) {
        let msg = msg.into();
        let error = err.to_string();
        self.shared
            .publish_path(move |st, sh| {
                let step = step.max(st.current);
                st.current = step;
                st.last_publish = Instant::now();
                Some(
                    sh.snapshot(st, step, msg, UpdateStatus::Failed)
                        .with_meta("kind", "progress")
                        .with_meta("error", error),
                )
            })
            .await;
    }

    /// Publishes the final `step == total` / `completed` update, then
    /// [`Tracker::finish`]es the run.
    ///
    /// Always publishes exactly one final update regardless of throttling
    /// state.
    pub async fn complete(&self, msg: impl Into<String>) {
        let msg = msg.into();
        self.shared
            .publish_path(move |st, sh| {
                st.current = sh.total;
                st.last_publish = Instant::now();
                let elapsed = st.started.elapsed();
                let message = format!("{msg} (completed in {}s)", elapsed.as_secs());
                Some(
                    sh.snapshot(st, sh.total, message, UpdateStatus::Completed)
                        .with_meta("kind", "progress")
                        .with_meta("elapsed_ms", elapsed.as_millis().min(u128::from(u64::MAX)) as u64),
                )
            })
            .await;
        self.finish().await;
    }

    /// Stops the heartbeat task, waits for it, and closes the sink.
    ///
    /// Idempotent: the second and later calls return immediately and never
    /// panic.
    pub async fn finish(&self) {
        if self.finished.swap(true, Ordering::SeqCst) {
            return;
        }
        self.cancel.cancel();
        let handle = self
            .heartbeat
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .take();
        if let Some(handle) = handle {
            let _ = handle.await;
        }
        if let Err(e) = self.shared.sink.close().await {
            warn!(sink = self.shared.sink.name(), error = %e, "sink close failed");
        }
    }

    /// Records success/failure against the budget, stamps budget state into
    /// the metadata, publishes, and reports whether the caller should
    /// continue.
    ///
    /// This is the single recommended call site for tool code: on error it
    /// records the failure, adds `error` and `error_budget_status` to the
    /// metadata (plus `error_budget_exceeded` and `circuit_open` once the
    /// budget is blown), and publishes a `failed` update; on success it
    /// records the success and publishes a regular `running` update.
    /// Returns `true` iff there was no error and the circuit is closed.
    pub async fn update_with_error_handling(
        &self,
        step: u64,
        msg: impl Into<String>,
        meta: Option<Map<String, Value>>,
        err: Option<&anyhow::Error>,
    ) -> bool {
        let mut meta = meta.unwrap_or_default();
        match err {
            Some(e) => {
                let within = self.record_error();
                meta.insert("error".into(), Value::from(e.to_string()));
                meta.insert(
                    "error_budget_status".into(),
                    Value::from(self.budget_status().as_str()),
                );
                if !within {
                    meta.insert("error_budget_exceeded".into(), Value::from(true));
                    meta.insert("circuit_open".into(), Value::from(self.is_circuit_open()));
                }
                let msg = msg.into();
                let error = e.to_string();
                self.shared
                    .publish_path(move |st, sh| {
                        let step = step.max(st.current);
                        st.current = step;
                        st.last_publish = Instant::now();
                        Some(
                            sh.snapshot(st, step, msg, UpdateStatus::Failed)
                                .with_meta("kind", "progress")
                                .with_meta("error", error)
                                .with_meta_entries(meta),
                        )
                    })
                    .await;
                false
            }
            None => {
                self.record_success();
                self.update(step, msg, Some(meta)).await;
                !self.is_circuit_open()
            }
        }
    }

    /// Records one operational failure against the embedded budget; returns
    /// whether the budget still holds.
    pub fn record_error(&self) -> bool {
        self.budget.record_error()
    }

    /// Records one successful operation against the embedded budget.
    pub fn record_success(&self) {
        self.budget.record_success();
    }

    /// True when the embedded circuit breaker has tripped.
    pub fn is_circuit_open(&self) -> bool {
        self.budget.is_circuit_open()
    }

    /// Current classification of the embedded budget.
    pub fn budget_status(&self) -> BudgetStatus {
        self.budget.status()
    }

    /// Current step.
    pub fn current(&self) -> u64 {
        self.shared
            .state
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .current
    }

    /// Total steps in the run.
    pub fn total(&self) -> u64 {
        self.shared.total
    }

    /// True once the current step has reached the total.
    pub fn is_complete(&self) -> bool {
        self.current() >= self.shared.total
    }

    /// Correlation id stamped on every update of this run.
    pub fn trace_id(&self) -> &str {
        &self.shared.trace_id
    }
}

impl Shared {
    /// Builds an update snapshot from the locked state.
    fn snapshot(
        &self,
        st: &TrackerState,
        step: u64,
        message: impl Into<String>,
        status: UpdateStatus,
    ) -> Update {
        let mut up = Update::new(step, self.total, message, status, self.trace_id.clone());
        up.started_at = st.started_wall;
        up
    }

    /// Serialized snapshot-then-publish.
    ///
    /// The gate orders concurrent publishers; the state lock is dropped
    /// before the (bounded) publish, so a slow sink holds the gate only as
    /// long as `publish_timeout` allows.
    async fn publish_path<F>(&self, make: F)
    where
        F: FnOnce(&mut TrackerState, &Shared) -> Option<Update>,
    {
        let _gate = self.gate.lock().await;
        let up = {
            let mut st = self.state.lock().unwrap_or_else(|p| p.into_inner());
            make(&mut st, self)
        };
        if let Some(up) = up {
            self.publish_bounded(&up).await;
        }
    }

    /// Publishes one update within the configured bound, logging failures.
    async fn publish_bounded(&self, up: &Update) {
        let result = match self.cfg.publish_bound() {
            Some(bound) => match tokio::time::timeout(bound, self.sink.publish(up)).await {
                Ok(res) => res,
                Err(_) => {
                    warn!(
                        sink = self.sink.name(),
                        step = up.step,
                        bound_ms = bound.as_millis() as u64,
                        "progress publish exceeded bound; abandoned"
                    );
                    return;
                }
            },
            None => self.sink.publish(up).await,
        };
        match result {
            Ok(()) => debug!(
                trace_id = %up.trace_id,
                step = up.step,
                total = up.total,
                percentage = up.percentage,
                status = %up.status,
                "progress update"
            ),
            Err(e) => warn!(
                sink = self.sink.name(),
                step = up.step,
                error = %e,
                "progress publish failed"
            ),
        }
    }
}

impl Update {
    /// Merges a metadata map into the snapshot (later entries win).
    fn with_meta_entries(mut self, meta: Map<String, Value>) -> Self {
        for (k, v) in meta {
            self.meta.insert(k, v);
        }
        self
    }
}

/// Emits a synthetic liveness update whenever a full interval passes with no
/// publish and the run is not complete.
///
/// Heartbeats are throttle-exempt and carry `kind = "heartbeat"` so a
/// caller-side watchdog can tell a long step from a hang.
async fn heartbeat_loop(shared: Arc<Shared>, token: CancellationToken, interval: Duration) {
    loop {
        tokio::select! {
            _ = token.cancelled() => break,
            _ = tokio::time::sleep(interval) => {}
        }

        shared
            .publish_path(|st, sh| {
                if st.current >= sh.total {
                    return None;
                }
                let now = Instant::now();
                if now.duration_since(st.last_publish) < interval {
                    return None;
                }
                // Prevent immediate re-triggering on the next tick.
                st.last_publish = now;
                let (step, total) = (st.current, sh.total);
                Some(
                    sh.snapshot(
                        st,
                        step,
                        format!("Still working on step {step}/{total}..."),
                        UpdateStatus::Running,
                    )
                    .with_meta("kind", "heartbeat")
                    .with_meta(
                        "elapsed_ms",
                        st.started.elapsed().as_millis().min(u128::from(u64::MAX)) as u64,
                    ),
                )
            })
            .await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sinks::Sink;
    use async_trait::async_trait;

    /// Records every published update, in order.
    struct Recorder {
        updates: Mutex<Vec<Update>>,
        closed: AtomicBool,
    }

    impl Recorder {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                updates: Mutex::new(Vec::new()),
                closed: AtomicBool::new(false),
            })
        }

        fn updates(&self) -> Vec<Update> {
            self.updates.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl Sink for Recorder {
        async fn publish(&self, update: &Update) -> anyhow::Result<()> {
            self.updates.lock().unwrap().push(update.clone());
            Ok(())
        }

        async fn close(&self) -> anyhow::Result<()> {
            self.closed.store(true, Ordering::SeqCst);
            Ok(())
        }
    }

    fn quiet_config() -> TrackerConfig {
        TrackerConfig {
            heartbeat: Duration::ZERO,
            throttle: Duration::ZERO,
            ..TrackerConfig::default()
        }
    }

    #[tokio::test]
    async fn test_end_to_end_sequence() {
        let sink = Recorder::new();
        let tracker = Tracker::new(
            4,
            sink.clone(),
            TrackerConfig {
                heartbeat: Duration::ZERO,
                throttle: Duration::from_millis(100),
                ..TrackerConfig::default()
            },
        );

        tracker.begin("start").await;
        tracker.update(1, "a", None).await;
        tracker.update(2, "b", None).await;
        tracker.update(3, "c", None).await;
        tracker.complete("done").await;

        let ups = sink.updates();
        let first = ups.first().unwrap();
        assert_eq!(first.step, 0);
        assert_eq!(first.status, UpdateStatus::Started);

        let last = ups.last().unwrap();
        assert_eq!(last.step, 4);
        assert_eq!(last.status, UpdateStatus::Completed);
        assert_eq!(last.percentage, 100);

        // Steps never decrease; intermediate ones may have been throttled.
        let steps: Vec<u64> = ups.iter().map(|u| u.step).collect();
        assert!(steps.windows(2).all(|w| w[0] <= w[1]), "steps: {steps:?}");
    }

    #[tokio::test]
    async fn test_complete_publishes_final_update_despite_throttle() {
        let sink = Recorder::new();
        let tracker = Tracker::new(
            3,
            sink.clone(),
            TrackerConfig {
                heartbeat: Duration::ZERO,
                throttle: Duration::from_secs(3600),
                ..TrackerConfig::default()
            },
        );

        tracker.begin("start").await;
        tracker.update(1, "dropped", None).await;
        tracker.update(2, "dropped", None).await;
        tracker.complete("done").await;

        let ups = sink.updates();
        // begin + complete; the intermediate updates were throttled away.
        assert_eq!(ups.len(), 2);
        assert_eq!(ups.last().unwrap().step, 3);
        assert_eq!(ups.last().unwrap().status, UpdateStatus::Completed);
    }

    #[tokio::test]
    async fn test_final_step_bypasses_throttle_via_update() {
        let sink = Recorder::new();
        let tracker = Tracker::new(
            2,
            sink.clone(),
            TrackerConfig {
                heartbeat: Duration::ZERO,
                throttle: Duration::from_secs(3600),
                ..TrackerConfig::default()
            },
        );

        tracker.begin("start").await;
        tracker.update(2, "last", None).await;
        let ups = sink.updates();
        assert_eq!(ups.len(), 2);
        assert_eq!(ups.last().unwrap().step, 2);
    }

    #[tokio::test]
    async fn test_percentage_floor() {
        let sink = Recorder::new();
        let tracker = Tracker::new(3, sink.clone(), quiet_config());
        tracker.begin("start").await;
        tracker.update(1, "one", None).await;
        tracker.update(2, "two", None).await;
        tracker.update(3, "three", None).await;

        let pcts: Vec<u8> = sink.updates().iter().map(|u| u.percentage).collect();
        assert_eq!(pcts, vec![0, 33, 66, 100]);
    }

    #[tokio::test]
    async fn test_step_is_monotonic() {
        let sink = Recorder::new();
        let tracker = Tracker::new(10, sink.clone(), quiet_config());
        tracker.begin("start").await;
        tracker.update(5, "five", None).await;
        tracker.update(3, "stale", None).await;
        assert_eq!(tracker.current(), 5);
        let last = sink.updates().last().unwrap().clone();
        assert_eq!(last.step, 5);
    }

    #[tokio::test]
    async fn test_finish_is_idempotent() {
        let sink = Recorder::new();
        let tracker = Tracker::new(1, sink.clone(), quiet_config());
        tracker.begin("start").await;
        tracker.complete("done").await;
        // complete() already finished; further finishes are no-ops.
        tracker.finish().await;
        tracker.finish().await;
        assert!(sink.closed.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_heartbeat_emitted_during_long_step() {
        let sink = Recorder::new();
        let tracker = Tracker::new(
            4,
            sink.clone(),
            TrackerConfig {
                heartbeat: Duration::from_millis(50),
                throttle: Duration::ZERO,
                ..TrackerConfig::default()
            },
        );
        tracker.begin("start").await;
        tracker.update(1, "long step", None).await;

        // Throttle and heartbeat gating run on wall-clock time, so this
        // test sleeps for real.
        tokio::time::sleep(Duration::from_millis(180)).await;
        tracker.finish().await;

        let ups = sink.updates();
        let beats: Vec<&Update> = ups.iter().filter(|u| u.is_heartbeat()).collect();
        assert!(!beats.is_empty(), "expected heartbeat updates: {}", ups.len());
        for b in beats {
            assert_eq!(b.step, 1);
            assert_eq!(b.meta["kind"], "heartbeat");
        }
    }

    #[tokio::test]
    async fn test_no_heartbeat_when_updates_flow() {
        let sink = Recorder::new();
        let tracker = Tracker::new(
            100,
            sink.clone(),
            TrackerConfig {
                heartbeat: Duration::from_millis(250),
                throttle: Duration::ZERO,
                ..TrackerConfig::default()
            },
        );
        tracker.begin("start").await;
        for step in 1..=6 {
            tokio::time::sleep(Duration::from_millis(40)).await;
            tracker.update(step, "busy", None).await;
        }
        tracker.finish().await;

        assert!(sink.updates().iter().all(|u| !u.is_heartbeat()));
    }

    #[tokio::test]
    async fn test_update_with_error_handling_flags_budget() {
        let sink = Recorder::new();
        let tracker = Tracker::new(
            10,
            sink.clone(),
            TrackerConfig {
                max_errors: 2,
                reset_window: Duration::from_secs(600),
                ..quiet_config()
            },
        );
        tracker.begin("start").await;

        let boom = anyhow::anyhow!("step exploded");
        assert!(!tracker.update_with_error_handling(1, "a", None, Some(&boom)).await);
        assert!(!tracker.update_with_error_handling(2, "b", None, Some(&boom)).await);
        assert!(!tracker.is_circuit_open());

        // Third error blows the budget of 2.
        assert!(!tracker.update_with_error_handling(3, "c", None, Some(&boom)).await);
        assert!(tracker.is_circuit_open());

        let last = sink.updates().last().unwrap().clone();
        assert_eq!(last.status, UpdateStatus::Failed);
        assert_eq!(last.meta["error"], "step exploded");
        assert_eq!(last.meta["error_budget_exceeded"], true);
        assert_eq!(last.meta["circuit_open"], true);

        // Success publishes but the open circuit still says stop.
        assert!(!tracker.update_with_error_handling(4, "d", None, None).await);
    }

    #[tokio::test]
    async fn test_update_with_error_handling_success_path() {
        let sink = Recorder::new();
        let tracker = Tracker::new(4, sink.clone(), quiet_config());
        tracker.begin("start").await;
        assert!(tracker.update_with_error_handling(1, "ok", None, None).await);
        assert_eq!(tracker.budget_status(), BudgetStatus::Healthy);
        assert_eq!(
            sink.updates().last().unwrap().status,
            UpdateStatus::Running
        );
    }

    #[tokio::test]
    async fn test_slow_sink_publish_is_bounded() {
        struct StuckSink;

        #[async_trait]
        impl Sink for StuckSink {
            async fn publish(&self, _u: &Update) -> anyhow::Result<()> {
                // Dead consumer: never returns.
                futures::future::pending::<()>().await;
                unreachable!()
            }
        }

        let tracker = Tracker::new(
            2,
            Arc::new(StuckSink),
            TrackerConfig {
                heartbeat: Duration::ZERO,
                throttle: Duration::ZERO,
                publish_timeout: Duration::from_millis(50),
                ..TrackerConfig::default()
            },
        );

        let start = Instant::now();
        tracker.begin("start").await;
        tracker.update(1, "a", None).await;
        // Two abandoned publishes, each within ~50ms.
        assert!(start.elapsed() < Duration::from_secs(1));
    }

    #[tokio::test]
    async fn test_error_publishes_failed_status() {
        let sink = Recorder::new();
        let tracker = Tracker::new(4, sink.clone(), quiet_config());
        tracker.begin("start").await;
        tracker
            .error(2, "build failed", &anyhow::anyhow!("exit status 1"))
            .await;
        let last = sink.updates().last().unwrap().clone();
        assert_eq!(last.status, UpdateStatus::Failed);
        assert_eq!(last.meta["error"], "exit status 1");
    }

    #[tokio::test]
    async fn test_eta_present_mid_run_only() {
        let sink = Recorder::new();
        let tracker = Tracker::new(4, sink.clone(), quiet_config());
        tracker.begin("start").await;
        tracker.update(1, "a", None).await;
        tracker.update(4, "end", None).await;

        let ups = sink.updates();
        assert!(ups[0].eta.is_none(), "no ETA on step 0");
        assert!(ups[1].eta.is_some(), "ETA expected mid-run");
        assert!(ups[2].eta.is_none(), "no ETA at step == total");
    }

    #[tokio::test]
    async fn test_trace_id_stable_across_run() {
        let sink = Recorder::new();
        let tracker = Tracker::new(
            2,
            sink.clone(),
            TrackerConfig {
                trace_id: Some("trace-42".into()),
                ..quiet_config()
            },
        );
        tracker.begin("start").await;
        tracker.update(1, "a", None).await;
        tracker.complete("done").await;
        assert!(sink.updates().iter().all(|u| u.trace_id == "trace-42"));
        assert_eq!(tracker.trace_id(), "trace-42");
    }
}
