//! # NotificationSink — host progress notifications
//!
//! Bridges the tracker to a host session that understands
//! `notifications/progress`. The transport is abstracted behind
//! [`NotificationSender`], injected at construction, so the crate never
//! depends on a concrete protocol stack.
//!
//! ## Wire shape
//! ```json
//! {
//!   "progressToken": "token-from-request",
//!   "progress": 2.0,
//!   "total": 4.0,
//!   "message": "[50%] building image"
//! }
//! ```
//!
//! ## Rules
//! - The progress token is echoed verbatim from the originating request.
//! - Send failures propagate to the tracker, which logs and swallows them;
//!   this sink never retries.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Value, json};

use crate::progress::Update;
use crate::sinks::Sink;

/// Outbound notification channel to the host session.
///
/// Implementations wrap whatever session handle the embedding server has;
/// the sink only needs fire-and-forget delivery of one JSON payload.
#[async_trait]
pub trait NotificationSender: Send + Sync + 'static {
    /// Delivers one notification with the given method and parameters.
    async fn send(&self, method: &str, params: Value) -> anyhow::Result<()>;
}

/// Progress sink publishing `notifications/progress` to a host session.
pub struct NotificationSink {
    sender: Arc<dyn NotificationSender>,
    /// Token from the originating request, echoed on every notification.
    progress_token: Value,
}

impl NotificationSink {
    /// Creates a sink for one request, identified by its progress token.
    ///
    /// The token may be a string or a number, per the originating request.
    pub fn new(sender: Arc<dyn NotificationSender>, progress_token: impl Into<Value>) -> Self {
        Self {
            sender,
            progress_token: progress_token.into(),
        }
    }

    /// Token this sink echoes.
    pub fn progress_token(&self) -> &Value {
        &self.progress_token
    }
}

#[async_trait]
impl Sink for NotificationSink {
    async fn publish(&self, update: &Update) -> anyhow::Result<()> {
        let params = json!({
            "progressToken": self.progress_token,
            "progress": update.step as f64,
            "total": update.total as f64,
            "message": update.message,
        });
        self.sender.send("notifications/progress", params).await
    }

    fn name(&self) -> &'static str {
        "NotificationSink"
    }
}
