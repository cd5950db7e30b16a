//! Quote price calculation.
//!
//! Pure function from market state, inventory and config to a target quote
//! pair. Applies, in order: base distance (by strategy mode), inventory
//! skew, break-even reversion, volatility widening, tick alignment, and
//! the soft position gates. All arithmetic stays in decimals.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use pmm_core::{Price, Qty, SymbolMeta};

use crate::config::{MmConfig, StrategyMode};

const BPS: Decimal = dec!(10000);

/// Inputs to one pricing pass.
#[derive(Debug, Clone)]
pub struct QuoteInputs {
    pub mid: Price,
    pub best_bid: Price,
    pub best_ask: Price,
    /// Signed primary-account position.
    pub position: Decimal,
    /// Current mid-range volatility in basis points.
    pub volatility_bps: Decimal,
    /// Weighted average entry price of the current position, if tracked.
    pub entry_price: Option<Price>,
}

/// Target quotes for one tick.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuotePlan {
    pub bid_price: Price,
    pub ask_price: Price,
    pub bid_qty: Qty,
    pub ask_qty: Qty,
    /// False when the side is suppressed: soft position gate, crossing
    /// after tick alignment, or quantity below the venue minimum.
    pub allow_bid: bool,
    pub allow_ask: bool,
}

/// Compute the target quote pair.
pub fn compute_quotes(inputs: &QuoteInputs, config: &MmConfig, meta: &SymbolMeta) -> QuotePlan {
    let mid = inputs.mid.inner();

    // 1. Base prices by strategy mode
    let d = config.order_distance_bps / BPS;
    let (mut bid, mut ask) = match config.strategy_mode {
        StrategyMode::Uptime => (mid * (Decimal::ONE - d), mid * (Decimal::ONE + d)),
        StrategyMode::Rebate => (inputs.best_bid.inner(), inputs.best_ask.inner()),
    };

    // 2. Inventory skew
    if config.inventory_skew_enabled && !config.max_position.is_zero() {
        let r = (inputs.position / config.max_position)
            .max(dec!(-1))
            .min(dec!(1));
        let short_part = r.min(Decimal::ZERO);
        bid *= Decimal::ONE - (r * config.push_bps - short_part * config.pull_bps) / BPS;
        ask *= Decimal::ONE + (r * config.push_bps + short_part * config.pull_bps) / BPS;
    }

    // 3. Break-even reversion: the closing side never quotes through the
    // average entry, so a round trip cannot lock in a loss.
    if config.breakeven_enabled {
        if let Some(entry) = inputs.entry_price {
            let margin = config.breakeven_margin_bps / BPS;
            if inputs.position > Decimal::ZERO {
                ask = ask.max(entry.inner() * (Decimal::ONE + margin));
            } else if inputs.position < Decimal::ZERO {
                bid = bid.min(entry.inner() * (Decimal::ONE - margin));
            }
        }
    }

    // 4. Volatility widening: linear from 1x at 0.7*pause to 2x at pause
    let widen = widening_factor(inputs.volatility_bps, config.pause_threshold_bps);
    if widen > Decimal::ONE {
        bid = mid - (mid - bid) * widen;
        ask = mid + (ask - mid) * widen;
    }

    // 5. Tick alignment: bid floors, ask ceils
    let bid_price = Price::new(bid).floor_to_tick(meta.tick_size);
    let ask_price = Price::new(ask).ceil_to_tick(meta.tick_size);

    let mut allow_bid = bid_price.is_positive() && bid_price < inputs.best_ask;
    let mut allow_ask = ask_price.is_positive() && ask_price > inputs.best_bid;

    // 6. Quantity
    let qty = Qty::new(config.order_size).floor_to_step(meta.qty_step);
    if qty < meta.min_qty {
        allow_bid = false;
        allow_ask = false;
    }

    // 7. Soft position gates: the wrong-way side stays open for de-risking
    if inputs.position >= config.max_position {
        allow_bid = false;
    }
    if inputs.position <= -config.max_position {
        allow_ask = false;
    }

    QuotePlan {
        bid_price,
        ask_price,
        bid_qty: qty,
        ask_qty: qty,
        allow_bid,
        allow_ask,
    }
}

/// Widening multiplier in [1, 2].
fn widening_factor(volatility_bps: Decimal, pause_threshold_bps: Decimal) -> Decimal {
    if pause_threshold_bps.is_zero() {
        return Decimal::ONE;
    }
    let knee = pause_threshold_bps * dec!(0.7);
    if volatility_bps <= knee {
        return Decimal::ONE;
    }
    let span = pause_threshold_bps - knee;
    let t = ((volatility_bps - knee) / span).min(Decimal::ONE);
    Decimal::ONE + t
}
