//! Session counters and rebate/fee accounting.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::warn;

use pmm_core::{OrderSide, Price, Qty};

/// Aggregate counters for one quoting session.
///
/// Plain data mutated by the executor tick; serialized wholesale into the
/// status snapshot.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SessionCounters {
    // Fills
    pub total_fills: u64,
    pub partial_fills: u64,
    pub maker_fills: u64,
    pub taker_fills: u64,
    /// Fills whose maker/taker flag the adapter could not report.
    pub unknown_flag_fills: u64,

    // Volumes and fees (quote currency)
    pub maker_volume: Decimal,
    pub taker_volume: Decimal,
    pub rebates_received: Decimal,
    pub fees_paid: Decimal,
    /// Signed fee sum as reported, kept for reconciliation.
    pub raw_fee_sum: Decimal,

    // Order flow
    pub orders_placed: u64,
    pub post_only_rejects: u64,
    pub bid_cancels: u64,
    pub ask_cancels: u64,
    pub bid_queue_cancels: u64,
    pub ask_queue_cancels: u64,
    pub bid_rebalances: u64,
    pub ask_rebalances: u64,
    pub orphans_cancelled: u64,

    // Order outcome classification
    pub orders_filled: u64,
    pub orders_canceled_or_unknown: u64,

    // Protection events
    pub volatility_pauses: u64,
    pub hard_stops: u64,
    pub safe_mode_ticks: u64,
    pub rest_failures: u64,

    // PnL
    pub realized_pnl: Decimal,
}

impl SessionCounters {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a fill with its fee semantics: negative fee = rebate.
    pub fn record_fill(&mut self, price: Price, qty: Qty, fee: Decimal, is_maker: Option<bool>) {
        self.total_fills += 1;
        let notional = qty.notional(price);
        self.raw_fee_sum += fee;

        match is_maker {
            Some(true) => {
                self.maker_fills += 1;
                self.maker_volume += notional;
            }
            Some(false) => {
                self.taker_fills += 1;
                self.taker_volume += notional;
            }
            None => {
                self.unknown_flag_fills += 1;
                warn!("Fill without maker/taker flag; adapter needs an update");
            }
        }

        if fee < Decimal::ZERO {
            self.rebates_received += -fee;
        } else {
            self.fees_paid += fee;
        }
    }

    pub fn record_cancel(&mut self, side: OrderSide, queue_cancel: bool) {
        match (side, queue_cancel) {
            (OrderSide::Buy, true) => self.bid_queue_cancels += 1,
            (OrderSide::Buy, false) => self.bid_cancels += 1,
            (OrderSide::Sell, true) => self.ask_queue_cancels += 1,
            (OrderSide::Sell, false) => self.ask_cancels += 1,
        }
    }

    pub fn record_rebalance(&mut self, side: OrderSide) {
        match side {
            OrderSide::Buy => self.bid_rebalances += 1,
            OrderSide::Sell => self.ask_rebalances += 1,
        }
    }

    /// Maker share of flagged fills, percent.
    pub fn maker_ratio_pct(&self) -> f64 {
        let flagged = self.maker_fills + self.taker_fills + self.unknown_flag_fills;
        if flagged == 0 {
            return 0.0;
        }
        self.maker_fills as f64 / flagged as f64 * 100.0
    }

    /// Rebates minus fees, before hedge costs.
    pub fn net_fee_income(&self) -> Decimal {
        self.rebates_received - self.fees_paid
    }
}
