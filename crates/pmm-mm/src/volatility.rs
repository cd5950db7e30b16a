//! Rolling mid-price volatility with pause/resume hysteresis.
//!
//! Keeps a window of `(ts, mid)` samples and reports the range in basis
//! points: `(max - min) / latest * 10000`. Pausing triggers as soon as the
//! range exceeds the pause threshold; resuming requires the range to stay
//! below the (lower) resume threshold for a full stability period. The
//! asymmetry eliminates flap.

use std::collections::VecDeque;

use rust_decimal::Decimal;

use pmm_core::Price;

/// Rolling window volatility tracker.
#[derive(Debug)]
pub struct VolatilityTracker {
    window_ms: u64,
    pause_threshold_bps: Decimal,
    resume_threshold_bps: Decimal,
    stable_ms: u64,
    samples: VecDeque<(u64, Decimal)>,
    /// Since when the range has been continuously below the resume
    /// threshold.
    below_since_ms: Option<u64>,
}

impl VolatilityTracker {
    pub fn new(
        window_sec: u64,
        pause_threshold_bps: Decimal,
        resume_threshold_bps: Decimal,
        stable_seconds: u64,
    ) -> Self {
        Self {
            window_ms: window_sec * 1000,
            pause_threshold_bps,
            resume_threshold_bps,
            stable_ms: stable_seconds * 1000,
            samples: VecDeque::new(),
            below_since_ms: None,
        }
    }

    /// Update thresholds from a config change. The sample window is kept.
    pub fn set_params(
        &mut self,
        window_sec: u64,
        pause_threshold_bps: Decimal,
        resume_threshold_bps: Decimal,
        stable_seconds: u64,
    ) {
        self.window_ms = window_sec * 1000;
        self.pause_threshold_bps = pause_threshold_bps;
        self.resume_threshold_bps = resume_threshold_bps;
        self.stable_ms = stable_seconds * 1000;
    }

    /// Record a mid-price observation.
    pub fn record(&mut self, mid: Price, now_ms: u64) {
        if !mid.is_positive() {
            return;
        }
        let cutoff = now_ms.saturating_sub(self.window_ms);
        while let Some((ts, _)) = self.samples.front() {
            if *ts <= cutoff {
                self.samples.pop_front();
            } else {
                break;
            }
        }
        self.samples.push_back((now_ms, mid.inner()));

        // Hysteresis clock
        if self.range_bps() < self.resume_threshold_bps {
            self.below_since_ms.get_or_insert(now_ms);
        } else {
            self.below_since_ms = None;
        }
    }

    fn range_bps(&self) -> Decimal {
        if self.samples.len() < 2 {
            return Decimal::ZERO;
        }
        let latest = self.samples.back().map(|(_, p)| *p).unwrap_or_default();
        if latest.is_zero() {
            return Decimal::ZERO;
        }
        let mut max = Decimal::MIN;
        let mut min = Decimal::MAX;
        for (_, p) in &self.samples {
            if *p > max {
                max = *p;
            }
            if *p < min {
                min = *p;
            }
        }
        (max - min) / latest * Decimal::from(10000)
    }

    /// Current window range in basis points.
    pub fn current_bps(&self) -> Decimal {
        self.range_bps()
    }

    /// True when the range exceeds the pause threshold.
    pub fn should_pause(&self) -> bool {
        self.range_bps() > self.pause_threshold_bps
    }

    /// True when the range has stayed below the resume threshold for the
    /// full stability period.
    pub fn should_resume(&self, now_ms: u64) -> bool {
        match self.below_since_ms {
            Some(since) => now_ms.saturating_sub(since) >= self.stable_ms,
            None => false,
        }
    }

    pub fn sample_count(&self) -> usize {
        self.samples.len()
    }
}
