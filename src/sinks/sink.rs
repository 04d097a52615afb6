//! # Core sink trait
//!
//! `Sink` is the single boundary between the tracker and progress
//! transports. A CLI renderer, a host-notification adapter, or a test
//! recorder implements it and is otherwise opaque to the core.
//!
//! ## Contract
//! - `publish` should be prompt. The tracker additionally bounds every
//!   publish with [`TrackerConfig::publish_timeout`](crate::TrackerConfig),
//!   so a slow or dead sink cannot stall workflow progress indefinitely.
//! - Publish failures are logged by the tracker and swallowed: progress
//!   reporting never fails the tool call that produced it.
//! - `close` is called exactly once, from `Tracker::finish`.
//!
//! ## Example (skeleton)
//! ```rust
//! use stepvisor::{Sink, Update};
//! use std::sync::Mutex;
//!
//! struct Recorder(Mutex<Vec<Update>>);
//!
//! #[async_trait::async_trait]
//! impl Sink for Recorder {
//!     async fn publish(&self, update: &Update) -> anyhow::Result<()> {
//!         self.0.lock().unwrap().push(update.clone());
//!         Ok(())
//!     }
//! }
//! ```

use async_trait::async_trait;

use crate::progress::Update;

/// Pluggable consumer of progress updates.
///
/// Called from the tracker's async context. Implementations should avoid
/// blocking the runtime (prefer async I/O and bounded buffers).
#[async_trait]
pub trait Sink: Send + Sync + 'static {
    /// Publishes one update snapshot.
    async fn publish(&self, update: &Update) -> anyhow::Result<()>;

    /// Releases transport resources. Called once, after the final update.
    async fn close(&self) -> anyhow::Result<()> {
        Ok(())
    }

    /// Human-readable name (for logs).
    fn name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }
}
