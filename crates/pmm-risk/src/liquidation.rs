//! Liquidation guard: a one-shot latch over margin signals.
//!
//! Once triggered, the engine stays paused until an operator explicitly
//! clears the latch. Auto-reset is deliberately absent.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use parking_lot::RwLock;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use pmm_core::Price;

/// Guard thresholds.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GuardConfig {
    /// Maintenance-margin ratio at or above which the guard fires.
    #[serde(default = "default_margin_ratio_threshold")]
    pub margin_ratio_threshold: Decimal,
    /// Fire when the mark is within this percentage of the liquidation
    /// price.
    #[serde(default = "default_liq_distance_threshold_pct")]
    pub liq_distance_threshold_pct: Decimal,
}

fn default_margin_ratio_threshold() -> Decimal {
    Decimal::new(8, 1) // 0.8
}

fn default_liq_distance_threshold_pct() -> Decimal {
    Decimal::new(5, 0) // 5%
}

impl Default for GuardConfig {
    fn default() -> Self {
        Self {
            margin_ratio_threshold: default_margin_ratio_threshold(),
            liq_distance_threshold_pct: default_liq_distance_threshold_pct(),
        }
    }
}

/// Why the guard fired.
#[derive(Debug, Clone, PartialEq)]
pub enum LiquidationReason {
    /// Margin ratio breached the threshold.
    MarginRatio { ratio: Decimal },
    /// Mark price came within the distance threshold of liquidation.
    LiquidationDistance { distance_pct: Decimal },
}

impl std::fmt::Display for LiquidationReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MarginRatio { ratio } => write!(f, "margin ratio {ratio}"),
            Self::LiquidationDistance { distance_pct } => {
                write!(f, "{distance_pct}% from liquidation")
            }
        }
    }
}

/// One-shot liquidation latch.
///
/// Thread-safe: shared as `Arc<LiquidationGuard>` between the executor
/// tick and the control surface.
pub struct LiquidationGuard {
    config: RwLock<GuardConfig>,
    triggered: AtomicBool,
    triggered_at_ms: AtomicU64,
    reason: RwLock<Option<LiquidationReason>>,
}

impl LiquidationGuard {
    #[must_use]
    pub fn new(config: GuardConfig) -> Self {
        Self {
            config: RwLock::new(config),
            triggered: AtomicBool::new(false),
            triggered_at_ms: AtomicU64::new(0),
            reason: RwLock::new(None),
        }
    }

    pub fn set_config(&self, config: GuardConfig) {
        *self.config.write() = config;
    }

    /// Evaluate the latest margin signals. Returns the breach reason when
    /// this call trips the latch.
    pub fn check(
        &self,
        margin_ratio: Option<Decimal>,
        mark_price: Option<Price>,
        liquidation_price: Option<Price>,
        now_ms: u64,
    ) -> Option<LiquidationReason> {
        if self.is_triggered() {
            return None;
        }
        let cfg = self.config.read().clone();

        if let Some(ratio) = margin_ratio {
            if ratio >= cfg.margin_ratio_threshold {
                let reason = LiquidationReason::MarginRatio { ratio };
                self.trigger(reason.clone(), now_ms);
                return Some(reason);
            }
        }

        if let (Some(mark), Some(liq)) = (mark_price, liquidation_price) {
            if mark.is_positive() && liq.is_positive() {
                let distance_pct =
                    (mark.inner() - liq.inner()).abs() / mark.inner() * Decimal::from(100);
                if distance_pct <= cfg.liq_distance_threshold_pct {
                    let reason = LiquidationReason::LiquidationDistance { distance_pct };
                    self.trigger(reason.clone(), now_ms);
                    return Some(reason);
                }
            }
        }

        None
    }

    fn trigger(&self, reason: LiquidationReason, now_ms: u64) {
        if self
            .triggered
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
        {
            self.triggered_at_ms.store(now_ms, Ordering::SeqCst);
            *self.reason.write() = Some(reason.clone());
            error!(%reason, "LIQUIDATION GUARD TRIGGERED");
        } else {
            warn!(new_reason = %reason, "Liquidation guard already triggered");
        }
    }

    #[must_use]
    pub fn is_triggered(&self) -> bool {
        self.triggered.load(Ordering::SeqCst)
    }

    #[must_use]
    pub fn triggered_at_ms(&self) -> Option<u64> {
        if self.is_triggered() {
            Some(self.triggered_at_ms.load(Ordering::SeqCst))
        } else {
            None
        }
    }

    #[must_use]
    pub fn reason(&self) -> Option<LiquidationReason> {
        if self.is_triggered() {
            self.reason.read().clone()
        } else {
            None
        }
    }

    /// Operator-only reset after the margin situation has been resolved.
    pub fn clear(&self) {
        if self.is_triggered() {
            let prev = self.reason.read().clone();
            info!(previous = ?prev, "Liquidation guard cleared by operator");
            self.triggered.store(false, Ordering::SeqCst);
            self.triggered_at_ms.store(0, Ordering::SeqCst);
            *self.reason.write() = None;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn guard() -> LiquidationGuard {
        LiquidationGuard::new(GuardConfig {
            margin_ratio_threshold: dec!(0.8),
            liq_distance_threshold_pct: dec!(5),
        })
    }

    #[test]
    fn test_initially_clear() {
        let g = guard();
        assert!(!g.is_triggered());
        assert!(g.reason().is_none());
        assert!(g.triggered_at_ms().is_none());
    }

    #[test]
    fn test_margin_ratio_breach() {
        let g = guard();
        let reason = g.check(Some(dec!(0.85)), None, None, 1_000);

        assert!(matches!(reason, Some(LiquidationReason::MarginRatio { .. })));
        assert!(g.is_triggered());
        assert_eq!(g.triggered_at_ms(), Some(1_000));
    }

    #[test]
    fn test_margin_ratio_below_threshold_passes() {
        let g = guard();
        assert!(g.check(Some(dec!(0.5)), None, None, 1_000).is_none());
        assert!(!g.is_triggered());
    }

    #[test]
    fn test_liquidation_distance_breach() {
        let g = guard();
        // Mark 100000, liquidation 96000: 4% away, threshold 5%
        let reason = g.check(
            None,
            Some(Price::new(dec!(100000))),
            Some(Price::new(dec!(96000))),
            2_000,
        );

        assert!(matches!(
            reason,
            Some(LiquidationReason::LiquidationDistance { .. })
        ));
    }

    #[test]
    fn test_far_liquidation_passes() {
        let g = guard();
        let reason = g.check(
            None,
            Some(Price::new(dec!(100000))),
            Some(Price::new(dec!(80000))),
            2_000,
        );
        assert!(reason.is_none());
    }

    #[test]
    fn test_latch_keeps_first_reason() {
        let g = guard();
        g.check(Some(dec!(0.9)), None, None, 1_000);
        // A later breach does not overwrite
        g.check(
            None,
            Some(Price::new(dec!(100000))),
            Some(Price::new(dec!(99000))),
            2_000,
        );

        assert!(matches!(
            g.reason(),
            Some(LiquidationReason::MarginRatio { .. })
        ));
        assert_eq!(g.triggered_at_ms(), Some(1_000));
    }

    #[test]
    fn test_no_auto_reset() {
        let g = guard();
        g.check(Some(dec!(0.9)), None, None, 1_000);
        // Healthy margin afterwards does not release the latch
        assert!(g.check(Some(dec!(0.1)), None, None, 5_000).is_none());
        assert!(g.is_triggered());
    }

    #[test]
    fn test_operator_clear() {
        let g = guard();
        g.check(Some(dec!(0.9)), None, None, 1_000);
        g.clear();

        assert!(!g.is_triggered());
        assert!(g.reason().is_none());
        // Can fire again after clearing
        assert!(g.check(Some(dec!(0.9)), None, None, 6_000).is_some());
    }
}
