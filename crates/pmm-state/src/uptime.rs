//! Uptime-program tier accounting.
//!
//! Wall time is bucketed by the worse of the two quote distances from mid:
//! boosted (<= 10 bps, 1.0x), standard (<= 30 bps, 0.5x), basic
//! (<= 100 bps, 0.1x), out of range otherwise. The program requires both
//! sides quoted to qualify, so a missing side counts as out of range.

use serde::{Deserialize, Serialize};

use pmm_core::Price;

const BOOSTED_MAX_BPS: f64 = 10.0;
const STANDARD_MAX_BPS: f64 = 30.0;
const BASIC_MAX_BPS: f64 = 100.0;

/// Accumulated tier times.
#[derive(Debug, Clone, Default)]
pub struct UptimeMeter {
    boosted_ms: u64,
    standard_ms: u64,
    basic_ms: u64,
    out_of_range_ms: u64,
    total_ms: u64,
    last_check_ms: Option<u64>,
}

/// Snapshot of tier percentages.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UptimeStats {
    pub boosted_pct: f64,
    pub standard_pct: f64,
    pub basic_pct: f64,
    pub out_of_range_pct: f64,
    /// Weighted credit: boosted 1.0, standard 0.5, basic 0.1.
    pub effective_pts_pct: f64,
    pub total_time_ms: u64,
}

impl UptimeMeter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Accumulate the interval since the previous call into the tier the
    /// current quotes fall in.
    pub fn update(
        &mut self,
        mid: Price,
        bid_price: Option<Price>,
        ask_price: Option<Price>,
        now_ms: u64,
    ) {
        let last = match self.last_check_ms.replace(now_ms) {
            Some(last) => last,
            None => return,
        };
        let delta = now_ms.saturating_sub(last);
        self.total_ms += delta;

        if !mid.is_positive() {
            self.out_of_range_ms += delta;
            return;
        }

        // Both sides must be quoted to qualify at all
        let (bid, ask) = match (bid_price, ask_price) {
            (Some(b), Some(a)) => (b, a),
            _ => {
                self.out_of_range_ms += delta;
                return;
            }
        };

        let mid_d = mid.inner();
        let bid_bps = dec_to_f64((mid_d - bid.inner()) / mid_d) * 10_000.0;
        let ask_bps = dec_to_f64((ask.inner() - mid_d) / mid_d) * 10_000.0;
        let worst = bid_bps.max(ask_bps);

        if worst <= BOOSTED_MAX_BPS {
            self.boosted_ms += delta;
        } else if worst <= STANDARD_MAX_BPS {
            self.standard_ms += delta;
        } else if worst <= BASIC_MAX_BPS {
            self.basic_ms += delta;
        } else {
            self.out_of_range_ms += delta;
        }
    }

    pub fn stats(&self) -> UptimeStats {
        let total = self.total_ms.max(1) as f64;
        UptimeStats {
            boosted_pct: self.boosted_ms as f64 / total * 100.0,
            standard_pct: self.standard_ms as f64 / total * 100.0,
            basic_pct: self.basic_ms as f64 / total * 100.0,
            out_of_range_pct: self.out_of_range_ms as f64 / total * 100.0,
            effective_pts_pct: (self.boosted_ms as f64
                + self.standard_ms as f64 * 0.5
                + self.basic_ms as f64 * 0.1)
                / total
                * 100.0,
            total_time_ms: self.total_ms,
        }
    }
}

fn dec_to_f64(d: rust_decimal::Decimal) -> f64 {
    use rust_decimal::prelude::ToPrimitive;
    d.to_f64().unwrap_or(0.0)
}
