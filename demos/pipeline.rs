//! # Multi-step pipeline with progress reporting
//!
//! Demonstrates the core progress features:
//! - Throttled updates with ETA estimation
//! - Heartbeats during a long step
//! - Error-budget integration (continue/stop decisions)
//! - Terminal rendering via `CliSink`
//!
//! Run with: `cargo run --example pipeline`

use std::sync::Arc;
use std::time::Duration;

use stepvisor::{CliSink, Tracker, TrackerConfig};

const STEPS: &[(&str, u64)] = &[
    ("analyzing repository", 400),
    ("generating dockerfile", 300),
    ("building image", 2500),
    ("scanning image", 900),
    ("pushing image", 700),
];

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // RUST_LOG=stepvisor=debug shows the structured publish/heartbeat logs.
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    println!("🚀 Pipeline progress demo");
    println!("   Five steps; the build step is slow enough to show a heartbeat\n");

    let cfg = TrackerConfig {
        heartbeat: Duration::from_secs(1),
        throttle: Duration::from_millis(100),
        ..TrackerConfig::default()
    };
    let tracker = Tracker::new(STEPS.len() as u64, Arc::new(CliSink::new()), cfg);

    tracker.begin("containerizing repository").await;

    for (i, (name, millis)) in STEPS.iter().enumerate() {
        tokio::time::sleep(Duration::from_millis(*millis)).await;

        // Simulate a transient failure on the scan step.
        let err = if *name == "scanning image" {
            Some(anyhow::anyhow!("scanner rate-limited, retrying"))
        } else {
            None
        };

        let proceed = tracker
            .update_with_error_handling(i as u64 + 1, *name, None, err.as_ref())
            .await;
        if !proceed && tracker.is_circuit_open() {
            tracker.finish().await;
            println!("\n⚠️  Circuit open, aborting pipeline");
            return Ok(());
        }
    }

    tracker.complete("image pushed").await;
    println!("\n✅ Pipeline finished");
    Ok(())
}
