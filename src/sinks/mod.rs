//! # Sinks: where progress updates go.
//!
//! A [`Sink`] is the single seam between the tracker and the outside world.
//! The tracker is constructed with one; swapping a CLI renderer for a host
//! notification channel is a one-line change at the call site.
//!
//! Provided sinks:
//! - [`NotificationSink`] — `notifications/progress` to a host session via an
//!   injected [`NotificationSender`].
//! - [`CliSink`] *(feature `cli`)* — spinner and bar on an interactive
//!   terminal, plain lines under CI.

#[cfg(feature = "cli")]
pub mod cli;
pub mod notify;
pub mod sink;

#[cfg(feature = "cli")]
pub use cli::CliSink;
pub use notify::{NotificationSender, NotificationSink};
pub use sink::Sink;
