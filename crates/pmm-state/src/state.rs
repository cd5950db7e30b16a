//! The authoritative market-maker state.

use std::collections::{HashMap, VecDeque};

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::debug;

use pmm_core::{
    BookTop, EngineStatus, FillEvent, OrderInfo, OrderSide, Price, Qty, Symbol, VenueRole,
};

use crate::counters::SessionCounters;
use crate::entry::EntryTracker;
use crate::history::OperationLog;
use crate::uptime::UptimeMeter;

/// How many recent fills the snapshot retains.
const RECENT_FILLS_CAP: usize = 100;

/// Serializable summary of one order slot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderSlotSummary {
    pub client_order_id: String,
    pub order_id: Option<String>,
    pub side: OrderSide,
    pub price: Price,
    pub qty: Qty,
    pub cum_filled: Qty,
    pub status: String,
}

impl From<&OrderInfo> for OrderSlotSummary {
    fn from(o: &OrderInfo) -> Self {
        Self {
            client_order_id: o.client_order_id.to_string(),
            order_id: o.order_id.clone(),
            side: o.side,
            price: o.price,
            qty: o.qty,
            cum_filled: o.cum_filled,
            status: o.status.to_string(),
        }
    }
}

/// Authoritative in-process view of the quoting session.
///
/// Owned by the executor; mutated only inside the tick. The dashboard
/// façade sees copy-on-read snapshots assembled by the engine.
#[derive(Debug)]
pub struct MmState {
    symbol: Symbol,
    bid: Option<OrderInfo>,
    ask: Option<OrderInfo>,
    positions: HashMap<(VenueRole, Symbol), Decimal>,
    status: EngineStatus,
    last_book: Option<BookTop>,
    recent_fills: VecDeque<FillEvent>,
    pub entry: EntryTracker,
    pub counters: SessionCounters,
    pub uptime: UptimeMeter,
    pub ops: OperationLog,
}

impl MmState {
    pub fn new(symbol: Symbol) -> Self {
        Self {
            symbol,
            bid: None,
            ask: None,
            positions: HashMap::new(),
            status: EngineStatus::Stopped,
            last_book: None,
            recent_fills: VecDeque::with_capacity(RECENT_FILLS_CAP),
            entry: EntryTracker::new(),
            counters: SessionCounters::new(),
            uptime: UptimeMeter::new(),
            ops: OperationLog::default(),
        }
    }

    pub fn symbol(&self) -> &Symbol {
        &self.symbol
    }

    // --- order slots ---------------------------------------------------

    pub fn order(&self, side: OrderSide) -> Option<&OrderInfo> {
        match side {
            OrderSide::Buy => self.bid.as_ref(),
            OrderSide::Sell => self.ask.as_ref(),
        }
    }

    pub fn order_mut(&mut self, side: OrderSide) -> Option<&mut OrderInfo> {
        match side {
            OrderSide::Buy => self.bid.as_mut(),
            OrderSide::Sell => self.ask.as_mut(),
        }
    }

    /// Install an order into its side's slot. At most one per side: the
    /// caller must have cleared any previous active order first.
    pub fn set_order(&mut self, order: OrderInfo) {
        debug!(side = %order.side, cloid = %order.client_order_id, price = %order.price, "Order slot set");
        match order.side {
            OrderSide::Buy => self.bid = Some(order),
            OrderSide::Sell => self.ask = Some(order),
        }
    }

    pub fn clear_order(&mut self, side: OrderSide) -> Option<OrderInfo> {
        match side {
            OrderSide::Buy => self.bid.take(),
            OrderSide::Sell => self.ask.take(),
        }
    }

    /// True while the side has a Pending/Open/PartiallyFilled order.
    pub fn has_active(&self, side: OrderSide) -> bool {
        self.order(side).map(|o| o.status.is_active()).unwrap_or(false)
    }

    /// Active orders on both sides, bid first.
    pub fn active_orders(&self) -> Vec<&OrderInfo> {
        [OrderSide::Buy, OrderSide::Sell]
            .iter()
            .filter_map(|s| self.order(*s))
            .filter(|o| o.status.is_active())
            .collect()
    }

    /// Find the side holding the given venue order id.
    pub fn side_of_order_id(&self, order_id: &str) -> Option<OrderSide> {
        [OrderSide::Buy, OrderSide::Sell]
            .into_iter()
            .find(|s| self.order(*s).and_then(|o| o.order_id.as_deref()) == Some(order_id))
    }

    // --- positions -----------------------------------------------------

    pub fn position(&self, venue: VenueRole) -> Decimal {
        self.positions
            .get(&(venue, self.symbol.clone()))
            .copied()
            .unwrap_or(Decimal::ZERO)
    }

    pub fn set_position(&mut self, venue: VenueRole, symbol: Symbol, position: Decimal) {
        debug!(%venue, %symbol, %position, "Position set");
        self.positions.insert((venue, symbol), position);
    }

    pub fn apply_position_delta(&mut self, venue: VenueRole, delta: Decimal) {
        let key = (venue, self.symbol.clone());
        let entry = self.positions.entry(key).or_insert(Decimal::ZERO);
        *entry += delta;
    }

    /// Primary plus hedge position for this symbol.
    pub fn net_exposure(&self) -> Decimal {
        self.position(VenueRole::Primary) + self.position(VenueRole::Hedge)
    }

    pub fn positions(&self) -> impl Iterator<Item = (&(VenueRole, Symbol), &Decimal)> {
        self.positions.iter()
    }

    // --- status --------------------------------------------------------

    pub fn status(&self) -> EngineStatus {
        self.status
    }

    pub fn set_status(&mut self, status: EngineStatus) {
        self.status = status;
    }

    // --- market data ---------------------------------------------------

    pub fn set_book(&mut self, book: BookTop) {
        self.last_book = Some(book);
    }

    pub fn book(&self) -> Option<&BookTop> {
        self.last_book.as_ref()
    }

    pub fn last_mid(&self) -> Option<Price> {
        self.last_book.as_ref().and_then(|b| b.mid())
    }

    // --- fills ---------------------------------------------------------

    /// Account a deduplicated fill: position, entry tracking, counters,
    /// recent-fill ring. Does not touch the order slots; the executor owns
    /// that transition.
    pub fn account_fill(&mut self, fill: &FillEvent) {
        let delta = match fill.side {
            OrderSide::Buy => fill.qty.inner(),
            OrderSide::Sell => -fill.qty.inner(),
        };
        self.apply_position_delta(VenueRole::Primary, delta);
        self.entry.record_fill(fill.side, fill.price, fill.qty);
        self.counters
            .record_fill(fill.price, fill.qty, fill.fee, fill.is_maker);
        self.counters.realized_pnl = self.entry.realized_pnl();

        if self.recent_fills.len() == RECENT_FILLS_CAP {
            self.recent_fills.pop_front();
        }
        self.recent_fills.push_back(fill.clone());
    }

    pub fn recent_fills(&self) -> impl Iterator<Item = &FillEvent> {
        self.recent_fills.iter()
    }
}
