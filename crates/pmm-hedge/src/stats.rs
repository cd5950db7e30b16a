//! Hedge execution statistics.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

/// Lock-free hedge counters, shared across the hedge task and the status
/// reporter.
#[derive(Debug, Default)]
pub struct HedgeStats {
    attempts: AtomicU64,
    successes: AtomicU64,
    failures: AtomicU64,
    fallbacks: AtomicU64,
    sweeps: AtomicU64,
    total_latency_ms: AtomicU64,
}

impl HedgeStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_attempt(&self) {
        self.attempts.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_success(&self, latency_ms: u64) {
        self.successes.fetch_add(1, Ordering::Relaxed);
        self.total_latency_ms.fetch_add(latency_ms, Ordering::Relaxed);
    }

    pub fn record_failure(&self) {
        self.failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_fallback(&self) {
        self.fallbacks.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_sweep(&self) {
        self.sweeps.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> HedgeStatsSnapshot {
        let attempts = self.attempts.load(Ordering::Relaxed);
        let successes = self.successes.load(Ordering::Relaxed);
        let total_latency = self.total_latency_ms.load(Ordering::Relaxed);
        HedgeStatsSnapshot {
            attempts,
            successes,
            failures: self.failures.load(Ordering::Relaxed),
            fallbacks: self.fallbacks.load(Ordering::Relaxed),
            sweeps: self.sweeps.load(Ordering::Relaxed),
            success_rate_pct: if attempts == 0 {
                0.0
            } else {
                successes as f64 / attempts as f64 * 100.0
            },
            avg_latency_ms: if successes == 0 {
                0.0
            } else {
                total_latency as f64 / successes as f64
            },
        }
    }
}

/// Point-in-time copy for the status snapshot.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HedgeStatsSnapshot {
    pub attempts: u64,
    pub successes: u64,
    pub failures: u64,
    pub fallbacks: u64,
    pub sweeps: u64,
    pub success_rate_pct: f64,
    pub avg_latency_ms: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_math() {
        let stats = HedgeStats::new();
        stats.record_attempt();
        stats.record_attempt();
        stats.record_success(40);
        stats.record_failure();

        let snap = stats.snapshot();
        assert_eq!(snap.attempts, 2);
        assert_eq!(snap.successes, 1);
        assert_eq!(snap.failures, 1);
        assert!((snap.success_rate_pct - 50.0).abs() < f64::EPSILON);
        assert!((snap.avg_latency_ms - 40.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_empty_snapshot_has_no_nan() {
        let snap = HedgeStats::new().snapshot();
        assert_eq!(snap.success_rate_pct, 0.0);
        assert_eq!(snap.avg_latency_ms, 0.0);
    }
}
