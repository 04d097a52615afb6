//! # ETA estimation from observed step durations.
//!
//! [`EtaEstimator`] keeps an exponential moving average (α = 0.3) of
//! per-step durations and projects it over the remaining steps. Until the
//! first step completes it falls back to the simple linear projection
//! `elapsed × remaining / done`.
//!
//! The EMA degrades more gracefully than the linear projection when step
//! costs are uneven, e.g. a fast analyze step followed by a multi-minute
//! image build: one slow step shifts the average toward the recent cost
//! instead of being diluted by the whole history.

use std::time::Duration;

/// Smoothing factor: weight of the most recent step duration.
const ALPHA: f64 = 0.3;

/// Exponential-moving-average estimator of remaining run time.
#[derive(Debug, Clone, Default)]
pub struct EtaEstimator {
    /// EMA of per-step durations in seconds. `None` until the first sample.
    ema_secs: Option<f64>,
}

impl EtaEstimator {
    /// Creates an estimator with no history.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records the duration of `steps` just-completed steps.
    ///
    /// A single `update` call may advance several steps at once (the tracker
    /// throttles); the observed span is attributed evenly across them.
    pub fn record(&mut self, span: Duration, steps: u64) {
        if steps == 0 {
            return;
        }
        let per_step = span.as_secs_f64() / steps as f64;
        self.ema_secs = Some(match self.ema_secs {
            Some(prev) => ALPHA * per_step + (1.0 - ALPHA) * prev,
            None => per_step,
        });
    }

    /// Estimates time remaining for `done` of `total` steps.
    ///
    /// Returns `None` outside `0 < done < total`. Uses the linear projection
    /// of `elapsed` until the first per-step sample exists.
    pub fn estimate(&self, done: u64, total: u64, elapsed: Duration) -> Option<Duration> {
        if done == 0 || done >= total {
            return None;
        }
        let remaining = total - done;
        match self.ema_secs {
            Some(ema) => Some(Duration::from_secs_f64(ema * remaining as f64)),
            None => {
                // Linear bootstrap: average of everything seen so far.
                let per_step = elapsed.as_secs_f64() / done as f64;
                Some(Duration::from_secs_f64(per_step * remaining as f64))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_estimate_at_boundaries() {
        let eta = EtaEstimator::new();
        assert!(eta.estimate(0, 10, Duration::from_secs(5)).is_none());
        assert!(eta.estimate(10, 10, Duration::from_secs(5)).is_none());
        assert!(eta.estimate(12, 10, Duration::from_secs(5)).is_none());
    }

    #[test]
    fn test_linear_bootstrap_without_samples() {
        let eta = EtaEstimator::new();
        // 2 of 10 done in 4s → 8 remaining at 2s each = 16s.
        let est = eta.estimate(2, 10, Duration::from_secs(4)).unwrap();
        assert_eq!(est, Duration::from_secs(16));
    }

    #[test]
    fn test_first_sample_sets_ema_directly() {
        let mut eta = EtaEstimator::new();
        eta.record(Duration::from_secs(2), 1);
        let est = eta.estimate(1, 4, Duration::from_secs(2)).unwrap();
        assert_eq!(est, Duration::from_secs(6));
    }

    #[test]
    fn test_ema_tracks_recent_slow_steps() {
        let mut eta = EtaEstimator::new();
        // Fast steps at 1s each, then one 60s step.
        for _ in 0..5 {
            eta.record(Duration::from_secs(1), 1);
        }
        let before = eta.estimate(5, 10, Duration::from_secs(5)).unwrap();
        eta.record(Duration::from_secs(60), 1);
        let after = eta.estimate(6, 10, Duration::from_secs(65)).unwrap();

        // EMA after the slow step: 0.3*60 + 0.7*1 = 18.7s per step.
        assert!(after > before);
        assert!(after >= Duration::from_secs(4 * 18));
        // Still bounded below the naive "every remaining step takes 60s".
        assert!(after < Duration::from_secs(4 * 60));
    }

    #[test]
    fn test_multi_step_span_attributed_evenly() {
        let mut eta = EtaEstimator::new();
        // 3 steps in 9s → 3s per step.
        eta.record(Duration::from_secs(9), 3);
        let est = eta.estimate(3, 5, Duration::from_secs(9)).unwrap();
        assert_eq!(est, Duration::from_secs(6));
    }

    #[test]
    fn test_zero_step_record_ignored() {
        let mut eta = EtaEstimator::new();
        eta.record(Duration::from_secs(5), 0);
        // Still on the linear bootstrap path.
        let est = eta.estimate(1, 2, Duration::from_secs(3)).unwrap();
        assert_eq!(est, Duration::from_secs(3));
    }
}
