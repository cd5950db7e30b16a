//! Average-entry and realized-PnL tracking for the primary position.
//!
//! Feeds break-even reversion and the PnL counters. Weighted-average entry
//! while adding, PnL realization while reducing, reset on flat, fill price
//! becomes the new entry on a flip.

use rust_decimal::prelude::Signed;
use rust_decimal::Decimal;

use pmm_core::{OrderSide, Price, Qty};

/// Net position with average entry and realized PnL.
#[derive(Debug, Clone, Default)]
pub struct EntryTracker {
    net: Decimal,
    avg_entry: Decimal,
    realized_pnl: Decimal,
    fill_count: u64,
}

impl EntryTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a fill and update entry/PnL.
    pub fn record_fill(&mut self, side: OrderSide, price: Price, qty: Qty) {
        let fill_qty = qty.inner();
        let fill_price = price.inner();
        let signed = match side {
            OrderSide::Buy => fill_qty,
            OrderSide::Sell => -fill_qty,
        };

        let old = self.net;
        let new = old + signed;

        // Realize PnL on the reducing portion
        if (old > Decimal::ZERO && signed < Decimal::ZERO)
            || (old < Decimal::ZERO && signed > Decimal::ZERO)
        {
            let reduce = signed.abs().min(old.abs());
            let pnl = if old > Decimal::ZERO {
                (fill_price - self.avg_entry) * reduce
            } else {
                (self.avg_entry - fill_price) * reduce
            };
            self.realized_pnl += pnl;
        }

        if new.is_zero() {
            self.avg_entry = Decimal::ZERO;
        } else if !old.is_zero() && new.signum() != old.signum() {
            // Flipped through zero: the fill price is the new entry
            self.avg_entry = fill_price;
        } else if old.is_zero() || new.signum() == signed.signum() {
            // Opening or adding: weighted average
            let old_notional = old.abs() * self.avg_entry;
            let add_notional = fill_qty * fill_price;
            let total = new.abs();
            if !total.is_zero() {
                self.avg_entry = (old_notional + add_notional) / total;
            }
        }
        // Plain reduce: entry unchanged

        self.net = new;
        self.fill_count += 1;
    }

    pub fn net(&self) -> Decimal {
        self.net
    }

    /// Average entry of the open position, if any.
    pub fn entry_price(&self) -> Option<Price> {
        if self.net.is_zero() {
            None
        } else {
            Some(Price::new(self.avg_entry))
        }
    }

    pub fn realized_pnl(&self) -> Decimal {
        self.realized_pnl
    }

    pub fn fill_count(&self) -> u64 {
        self.fill_count
    }
}
