//! Stream events and engine status.
//!
//! All adapter streams deliver one tagged union, `StreamEvent`; the
//! executor's drain loop matches it exhaustively.

use crate::{BookTop, ClientOrderId, OrderSide, Price, Qty, Symbol, VenueRole};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A fill notification from a private stream.
///
/// The same fill may arrive on multiple channels or be replayed after a
/// reconnect; `EventDedup` collapses duplicates keyed by
/// `(order_id, cum_filled)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FillEvent {
    /// Venue-assigned order ID.
    pub order_id: String,
    /// Client order ID, if the venue echoes it.
    pub client_order_id: Option<ClientOrderId>,
    pub symbol: Symbol,
    pub side: OrderSide,
    /// Fill price.
    pub price: Price,
    /// Quantity of this fill.
    pub qty: Qty,
    /// Cumulative filled quantity of the order after this fill.
    pub cum_filled: Qty,
    /// Fee paid (positive) or rebate received (negative).
    pub fee: Decimal,
    /// Maker/taker flag. None when the adapter cannot report it.
    pub is_maker: Option<bool>,
    /// Event timestamp (Unix milliseconds). The stream is monotone in this.
    pub ts_ms: u64,
}

/// Kind of a private order-status transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderUpdateKind {
    /// Order accepted and resting.
    Open,
    /// Order cancelled.
    Canceled,
    /// Order rejected at submission.
    Rejected,
    /// Order completely filled (fills arrive separately).
    Filled,
}

/// A private order-status transition. Idempotent in effect.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderUpdateEvent {
    pub order_id: String,
    pub client_order_id: Option<ClientOrderId>,
    pub symbol: Symbol,
    pub side: OrderSide,
    pub kind: OrderUpdateKind,
    pub ts_ms: u64,
}

/// A private position update.
///
/// Margin fields feed the liquidation guard when the venue reports them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PositionEvent {
    pub venue: VenueRole,
    pub symbol: Symbol,
    /// Signed position, positive = long.
    pub position: Decimal,
    pub mark_price: Option<Price>,
    /// Maintenance-margin ratio, 0..1. Higher is closer to liquidation.
    pub margin_ratio: Option<Decimal>,
    pub liquidation_price: Option<Price>,
    pub ts_ms: u64,
}

/// Tagged union of every stream event the engine consumes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum StreamEvent {
    Depth(BookTop),
    Order(OrderUpdateEvent),
    Fill(FillEvent),
    Position(PositionEvent),
}

impl StreamEvent {
    /// Depth updates may be dropped under backpressure; fills and order
    /// transitions may not.
    pub fn is_droppable(&self) -> bool {
        matches!(self, Self::Depth(_))
    }
}

/// Why the engine is paused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PauseReason {
    VolatilityHigh,
    HardStop,
    LiquidationGuard,
    OperatorStop,
    AdapterUnhealthy,
}

impl fmt::Display for PauseReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::VolatilityHigh => write!(f, "volatility_high"),
            Self::HardStop => write!(f, "hard_stop"),
            Self::LiquidationGuard => write!(f, "liquidation_guard"),
            Self::OperatorStop => write!(f, "operator_stop"),
            Self::AdapterUnhealthy => write!(f, "adapter_unhealthy"),
        }
    }
}

/// Quoting state machine status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", content = "reason", rename_all = "snake_case")]
pub enum EngineStatus {
    Running,
    Paused(PauseReason),
    Stopped,
}

impl EngineStatus {
    pub fn is_running(&self) -> bool {
        matches!(self, Self::Running)
    }

    pub fn pause_reason(&self) -> Option<PauseReason> {
        match self {
            Self::Paused(r) => Some(*r),
            _ => None,
        }
    }
}

impl fmt::Display for EngineStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Running => write!(f, "running"),
            Self::Paused(r) => write!(f, "paused({r})"),
            Self::Stopped => write!(f, "stopped"),
        }
    }
}
