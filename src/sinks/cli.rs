//! # CliSink — terminal progress renderer
//!
//! Fallback sink for runs driven from a shell instead of a host channel.
//! Interactive terminals get an in-place line with a spinner and a bar;
//! CI environments (`CI=true`) get plain append-only lines so logs stay
//! readable.
//!
//! ## Example output
//! ```text
//! ⠹ [██████░░░░░░░░░░░░░░] [33%] building image
//! ✅ deployed (completed in 42s)
//! ```
//! and in CI mode:
//! ```text
//! [1/3] [33%] building image
//! [COMPLETE] deployed (completed in 42s)
//! ```

use std::io::Write;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;

use crate::progress::{Update, UpdateStatus};
use crate::sinks::Sink;

const BAR_WIDTH: usize = 20;
const SPINNER_FRAMES: [char; 10] = ['⠋', '⠙', '⠹', '⠸', '⠼', '⠴', '⠦', '⠧', '⠇', '⠏'];

/// Terminal progress sink.
///
/// Interactive mode rewrites one stderr line per update; CI mode emits a
/// plain line per update. The mode is picked from the `CI` environment
/// variable at construction.
pub struct CliSink {
    ci: bool,
    frame: AtomicUsize,
    out: Mutex<Box<dyn Write + Send>>,
}

impl CliSink {
    /// Constructs a sink writing to stderr, detecting CI from the
    /// environment (`CI=true`).
    #[must_use]
    pub fn new() -> Self {
        let ci = std::env::var("CI").is_ok_and(|v| v == "true");
        Self::with_writer(ci, Box::new(std::io::stderr()))
    }

    /// Constructs a sink with an explicit mode and writer.
    #[must_use]
    pub fn with_writer(ci: bool, out: Box<dyn Write + Send>) -> Self {
        Self {
            ci,
            frame: AtomicUsize::new(0),
            out: Mutex::new(out),
        }
    }

    fn write_line(&self, line: &str, terminal: bool) {
        let mut out = self.out.lock().unwrap_or_else(|p| p.into_inner());
        let res = if self.ci || terminal {
            // Terminal lines clear any in-place residue before printing.
            if !self.ci {
                let _ = write!(out, "\r\x1b[2K");
            }
            writeln!(out, "{line}")
        } else {
            write!(out, "\r\x1b[2K{line}")
        };
        let _ = res.and_then(|()| out.flush());
    }

    fn next_frame(&self) -> char {
        let i = self.frame.fetch_add(1, Ordering::Relaxed);
        SPINNER_FRAMES[i % SPINNER_FRAMES.len()]
    }
}

impl Default for CliSink {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Sink for CliSink {
    async fn publish(&self, update: &Update) -> anyhow::Result<()> {
        match update.status {
            UpdateStatus::Completed => {
                let line = if self.ci {
                    format!("[COMPLETE] {}", update.message)
                } else {
                    format!("✅ {}", update.message)
                };
                self.write_line(&line, true);
            }
            UpdateStatus::Failed => {
                let line = if self.ci {
                    format!("[FAILED] {}", update.message)
                } else {
                    format!("❌ {}", update.message)
                };
                self.write_line(&line, true);
            }
            UpdateStatus::Started | UpdateStatus::Running => {
                if self.ci {
                    // Heartbeats are noise in CI logs.
                    if !update.is_heartbeat() {
                        self.write_line(
                            &format!("[{}/{}] {}", update.step, update.total, update.message),
                            false,
                        );
                    }
                } else {
                    let line = format!(
                        "{} {} {}",
                        self.next_frame(),
                        render_bar(update.percentage),
                        update.message
                    );
                    self.write_line(&line, false);
                }
            }
        }
        Ok(())
    }

    async fn close(&self) -> anyhow::Result<()> {
        if !self.ci {
            // Leave the cursor on a fresh line.
            let mut out = self.out.lock().unwrap_or_else(|p| p.into_inner());
            let _ = writeln!(out);
            let _ = out.flush();
        }
        Ok(())
    }

    fn name(&self) -> &'static str {
        "CliSink"
    }
}

/// `[██████░░░░░░░░░░░░░░]` for a percentage in [0, 100].
fn render_bar(percentage: u8) -> String {
    let filled = usize::from(percentage.min(100)) * BAR_WIDTH / 100;
    let mut bar = String::with_capacity(BAR_WIDTH * 3 + 2);
    bar.push('[');
    for _ in 0..filled {
        bar.push('█');
    }
    for _ in filled..BAR_WIDTH {
        bar.push('░');
    }
    bar.push(']');
    bar
}
