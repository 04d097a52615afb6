//! # Background workers and pool demo
//!
//! Demonstrates the runtime primitives:
//! - `WorkerPool` with backpressure on submit
//! - `WorkerManager` with interval workers and health probes
//! - Graceful shutdown within a grace period
//!
//! Run with: `cargo run --example workers`

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use stepvisor::{IntervalWorker, WorkerManager, WorkerPool};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // RUST_LOG=stepvisor=debug shows worker lifecycle and pool logs.
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    println!("🚀 Runtime demo\n");

    // Bounded fan-out: four workers, eight queue slots.
    let pool = WorkerPool::new(4);
    let processed = Arc::new(AtomicU64::new(0));

    for job_id in 0..16u64 {
        let processed = processed.clone();
        pool.submit(Box::new(move |_token| {
            Box::pin(async move {
                tokio::time::sleep(Duration::from_millis(50)).await;
                let n = processed.fetch_add(1, Ordering::SeqCst) + 1;
                println!("⚙️  job {job_id} done ({n} total)");
            })
        }))
        .await?;
    }

    pool.shutdown(Duration::from_secs(5)).await?;
    println!("\n✅ Pool drained: {} jobs\n", processed.load(Ordering::SeqCst));

    // Managed background workers with health reporting.
    let manager = WorkerManager::new();
    let beats = Arc::new(AtomicU64::new(0));
    let counter = beats.clone();

    manager.register(Arc::new(IntervalWorker::new(
        "heartbeat-logger",
        Duration::from_millis(200),
        move |_token| {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
        },
    )))?;
    manager.register(Arc::new(IntervalWorker::new(
        "flaky-sweeper",
        Duration::from_millis(300),
        |_token| async { anyhow::bail!("nothing to sweep") },
    )))?;

    manager.start_all()?;
    tokio::time::sleep(Duration::from_secs(1)).await;

    for (name, health) in manager.health_check().await {
        println!(
            "🩺 {name}: {} (runs={}, failed={})",
            health.status, health.tasks_total, health.tasks_failed
        );
    }

    match manager.stop_all(Duration::from_secs(3)).await {
        Ok(()) => println!("\n✅ Workers stopped cleanly"),
        Err(e) => println!("\n⚠️  Shutdown finished with error: {e}"),
    }
    println!("   heartbeat-logger ticked {} times", beats.load(Ordering::SeqCst));
    Ok(())
}
