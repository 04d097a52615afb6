//! # WorkerPool: bounded fan-out over a fixed set of workers.
//!
//! A fixed number of workers pull jobs from one bounded queue. Submission
//! applies backpressure: when the queue is full, [`WorkerPool::submit`]
//! waits and [`WorkerPool::submit_with_timeout`] gives up after its bound.
//!
//! ## Flow
//! ```text
//! submit(job) ──► mpsc (capacity = 2 × workers) ──► worker 0..n-1
//!                                                      │
//!                         biased select: cancelled? ───┤
//!                                                      ▼
//!                                        job(child_token).await   (runs to
//!                                        completion; never raced against
//!                                        the token)
//! shutdown(grace):
//!   sender dropped, token cancelled
//!     ├─ in-flight jobs finish (their tokens fire)
//!     └─ workers exit on the next pull; queued jobs are dropped
//!   lifecycle.shutdown(grace) bounds the wait
//! ```
//!
//! ## Rules
//! - Execution is at-most-once: a job that has *started* runs to completion
//!   even during shutdown (cancellation is delivered through its token, not
//!   by dropping the future mid-poll), but a job still sitting in the queue
//!   when the pool cancels is never started.
//! - After [`WorkerPool::shutdown`], submissions fail immediately with
//!   [`SubmitError::Closed`].
//! - Jobs are not panic-isolated; wrap a job body in
//!   [`Lifecycle::go_with_recover`]-style recovery yourself if its failure
//!   must not take the worker down.

use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use futures::future::BoxFuture;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::error::{RuntimeError, SubmitError};
use crate::runtime::lifecycle::Lifecycle;

/// A unit of pool work. Receives a child token that fires on shutdown.
pub type Job = Box<dyn FnOnce(CancellationToken) -> BoxFuture<'static, ()> + Send>;

/// Fixed-size worker pool with a bounded queue.
pub struct WorkerPool {
    tx: Mutex<Option<mpsc::Sender<Job>>>,
    closed: AtomicBool,
    lifecycle: Lifecycle,
    workers: usize,
}

impl WorkerPool {
    /// Spawns `workers` workers sharing a queue of capacity `2 × workers`.
    ///
    /// `workers` is clamped to at least 1.
    #[must_use]
    pub fn new(workers: usize) -> Self {
        let workers = workers.max(1);
        let (tx, rx) = mpsc::channel::<Job>(workers * 2);
        let rx = Arc::new(tokio::sync::Mutex::new(rx));
        let lifecycle = Lifecycle::new();

        for id in 0..workers {
            let rx = Arc::clone(&rx);
            // Infallible: the lifecycle is freshly created and running.
            let _ = lifecycle.go(move |token| worker_loop(id, rx, token));
        }

        Self {
            tx: Mutex::new(Some(tx)),
            closed: AtomicBool::new(false),
            lifecycle,
            workers,
        }
    }

    /// Submits a job, waiting for queue space if the pool is saturated.
    ///
    /// Fails with [`SubmitError::Closed`] once the pool has shut down, or
    /// when shutdown begins while the submission is still waiting.
    pub async fn submit(&self, job: Job) -> Result<(), SubmitError> {
        let tx = self.sender()?;
        tokio::select! {
            sent = tx.send(job) => sent.map_err(|_| SubmitError::Closed),
            _ = self.lifecycle.token().cancelled() => Err(SubmitError::Closed),
        }
    }

    /// Submits a job, waiting at most `timeout` for queue space.
    pub async fn submit_with_timeout(&self, job: Job, timeout: Duration) -> Result<(), SubmitError> {
        match tokio::time::timeout(timeout, self.submit(job)).await {
            Ok(res) => res,
            Err(_) => Err(SubmitError::Timeout { timeout }),
        }
    }

    /// Closes the queue and waits up to `grace` for in-flight jobs.
    ///
    /// Jobs still queued when the workers see the cancellation are dropped,
    /// not started. Exactly-once; repeat calls fail with
    /// [`RuntimeError::AlreadyShutdown`].
    pub async fn shutdown(&self, grace: Duration) -> Result<(), RuntimeError> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Err(RuntimeError::AlreadyShutdown);
        }
        debug!(workers = self.workers, "worker pool shutdown");
        self.tx.lock().unwrap_or_else(|p| p.into_inner()).take();
        self.lifecycle.shutdown(grace).await
    }

    /// Number of workers in the pool.
    pub fn workers(&self) -> usize {
        self.workers
    }

    /// True once [`WorkerPool::shutdown`] has been called.
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    fn sender(&self) -> Result<mpsc::Sender<Job>, SubmitError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(SubmitError::Closed);
        }
        self.tx
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .clone()
            .ok_or(SubmitError::Closed)
    }
}

/// Pulls jobs until the queue closes or the token fires.
///
/// The token is checked before each pull, never mid-job: a started job
/// finishes, a queued one is abandoned.
async fn worker_loop(
    id: usize,
    rx: Arc<tokio::sync::Mutex<mpsc::Receiver<Job>>>,
    token: CancellationToken,
) {
    loop {
        let job = {
            let mut rx = rx.lock().await;
            tokio::select! {
                biased;
                _ = token.cancelled() => None,
                job = rx.recv() => job,
            }
        };

        match job {
            Some(job) => job(token.child_token()).await,
            None => {
                debug!(worker = id, "pool worker exiting");
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::time::Instant;

    fn counting_job(counter: Arc<AtomicUsize>) -> Job {
        Box::new(move |_token| {
            Box::pin(async move {
                counter.fetch_add(1, Ordering::SeqCst);
            })
        })
    }

    async fn wait_for_count(counter: &AtomicUsize, n: usize) {
        for _ in 0..200 {
            if counter.load(Ordering::SeqCst) == n {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("counter stuck at {}", counter.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_submitted_jobs_run_before_shutdown() {
        let pool = WorkerPool::new(2);
        let done = Arc::new(AtomicUsize::new(0));

        for _ in 0..10 {
            pool.submit(counting_job(done.clone())).await.unwrap();
        }
        wait_for_count(&done, 10).await;
        pool.shutdown(Duration::from_secs(1)).await.unwrap();
    }

    #[tokio::test]
    async fn test_queued_jobs_not_started_after_cancellation() {
        let pool = WorkerPool::new(1);
        let started = Arc::new(AtomicUsize::new(0));

        // Occupies the single worker until shutdown cancels it.
        pool.submit(Box::new(|token| {
            Box::pin(async move {
                token.cancelled().await;
            })
        }))
        .await
        .unwrap();
        // These wait in the queue behind the blocker.
        pool.submit(counting_job(started.clone())).await.unwrap();
        pool.submit(counting_job(started.clone())).await.unwrap();

        // Let the worker pick up the blocking job.
        tokio::time::sleep(Duration::from_millis(20)).await;
        pool.shutdown(Duration::from_secs(1)).await.unwrap();

        // The in-flight job finished; the queued ones were never started.
        assert_eq!(started.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_submit_blocks_until_slot_frees() {
        let pool = Arc::new(WorkerPool::new(1));
        let gate = Arc::new(tokio::sync::Semaphore::new(0));

        // 1 in-flight + 2 queued saturates the pool (capacity 2n = 2).
        for _ in 0..3 {
            let gate = gate.clone();
            pool.submit(Box::new(move |_token| {
                Box::pin(async move {
                    gate.acquire().await.unwrap().forget();
                })
            }))
            .await
            .unwrap();
        }

        let blocked = {
            let pool = Arc::clone(&pool);
            tokio::spawn(async move { pool.submit(Box::new(|_| Box::pin(async {}))).await })
        };
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!blocked.is_finished(), "submit must wait for a free slot");

        // Releasing the gated jobs frees queue slots; the pending submit
        // then completes successfully.
        gate.add_permits(3);
        blocked.await.unwrap().unwrap();
        pool.shutdown(Duration::from_secs(1)).await.unwrap();
    }

    #[tokio::test]
    async fn test_submit_after_shutdown_fails_immediately() {
        let pool = WorkerPool::new(1);
        pool.shutdown(Duration::from_secs(1)).await.unwrap();

        let start = Instant::now();
        let res = pool.submit(Box::new(|_| Box::pin(async {}))).await;
        assert_eq!(res, Err(SubmitError::Closed));
        assert!(start.elapsed() < Duration::from_millis(50));
    }

    #[tokio::test]
    async fn test_double_shutdown_fails() {
        let pool = WorkerPool::new(1);
        pool.shutdown(Duration::from_secs(1)).await.unwrap();
        let res = pool.shutdown(Duration::from_secs(1)).await;
        assert!(matches!(res, Err(RuntimeError::AlreadyShutdown)));
    }

    #[tokio::test]
    async fn test_saturated_pool_times_out_submission() {
        let pool = WorkerPool::new(1);
        let gate = Arc::new(tokio::sync::Notify::new());

        // One blocking job occupies the worker; 2 more fill the queue.
        for _ in 0..3 {
            let gate = gate.clone();
            pool.submit(Box::new(move |_| {
                Box::pin(async move {
                    gate.notified().await;
                })
            }))
            .await
            .unwrap();
        }

        let start = Instant::now();
        let res = pool
            .submit_with_timeout(Box::new(|_| Box::pin(async {})), Duration::from_millis(50))
            .await;
        assert!(matches!(res, Err(SubmitError::Timeout { .. })));
        assert!(start.elapsed() >= Duration::from_millis(50));

        // Release the stuck jobs so shutdown drains.
        gate.notify_waiters();
        gate.notify_one();
        gate.notify_one();
        let _ = pool.shutdown(Duration::from_secs(1)).await;
    }

    #[tokio::test]
    async fn test_accepted_job_token_fires_on_shutdown() {
        let pool = WorkerPool::new(1);
        let cancelled = Arc::new(AtomicUsize::new(0));
        let seen = cancelled.clone();

        pool.submit(Box::new(move |token| {
            Box::pin(async move {
                token.cancelled().await;
                seen.fetch_add(1, Ordering::SeqCst);
            })
        }))
        .await
        .unwrap();

        // Let the worker pick the job up before cancelling.
        tokio::time::sleep(Duration::from_millis(20)).await;
        pool.shutdown(Duration::from_secs(1)).await.unwrap();
        assert_eq!(cancelled.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_workers_clamped_to_one() {
        let pool = WorkerPool::new(0);
        assert_eq!(pool.workers(), 1);
        let done = Arc::new(AtomicUsize::new(0));
        pool.submit(counting_job(done.clone())).await.unwrap();
        wait_for_count(&done, 1).await;
        pool.shutdown(Duration::from_secs(1)).await.unwrap();
    }
}
