//! Order-side types and per-side order lifecycle tracking.

use crate::{Price, Qty};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Order side: buy or sell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderSide {
    Buy,
    Sell,
}

impl OrderSide {
    /// Returns the opposite side.
    pub fn opposite(&self) -> Self {
        match self {
            Self::Buy => Self::Sell,
            Self::Sell => Self::Buy,
        }
    }

    /// Returns 1 for buy, -1 for sell (for position calculations).
    pub fn sign(&self) -> i8 {
        match self {
            Self::Buy => 1,
            Self::Sell => -1,
        }
    }
}

impl fmt::Display for OrderSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Buy => write!(f, "buy"),
            Self::Sell => write!(f, "sell"),
        }
    }
}

/// Client order ID for idempotency.
///
/// Every submission carries a fresh cloid so that retries after an
/// `Unknown` outcome can be reconciled against the venue's view.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ClientOrderId(String);

impl ClientOrderId {
    /// Create a new unique client order ID.
    ///
    /// Format: `pmm_{timestamp_ms}_{uuid_short}`
    pub fn new() -> Self {
        let ts = chrono::Utc::now().timestamp_millis();
        let uuid_short = &Uuid::new_v4().to_string()[..8];
        Self(format!("pmm_{ts}_{uuid_short}"))
    }

    /// Create from an existing string (for parsing venue replies).
    pub fn from_string(s: String) -> Self {
        Self(s)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for ClientOrderId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ClientOrderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for ClientOrderId {
    fn from(s: String) -> Self {
        Self::from_string(s)
    }
}

impl AsRef<str> for ClientOrderId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// State of an order in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    /// Submission started, not yet acknowledged by the venue.
    #[default]
    Pending,
    /// Acknowledged or observed in a venue open-orders reply.
    Open,
    /// Partially filled, remainder still resting.
    PartiallyFilled,
    /// Completely filled.
    Filled,
    /// Explicitly cancelled, or missing from the venue beyond the
    /// disappearance grace window without an explanatory fill.
    CanceledOrUnknown,
}

impl OrderStatus {
    /// True while the order may still rest on (or reach) the book.
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Pending | Self::Open | Self::PartiallyFilled)
    }

    pub fn is_terminal(&self) -> bool {
        !self.is_active()
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Open => write!(f, "open"),
            Self::PartiallyFilled => write!(f, "partially_filled"),
            Self::Filled => write!(f, "filled"),
            Self::CanceledOrUnknown => write!(f, "canceled_or_unknown"),
        }
    }
}

/// Local view of one resting order (at most one per side).
///
/// Only the executor mutates this; every other component reads snapshots.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderInfo {
    /// Venue-assigned order ID, set on ack or first remote observation.
    pub order_id: Option<String>,
    /// Locally generated ID, always set.
    pub client_order_id: ClientOrderId,
    pub side: OrderSide,
    pub price: Price,
    /// Original order quantity.
    pub qty: Qty,
    /// Cumulative filled quantity.
    pub cum_filled: Qty,
    pub status: OrderStatus,
    /// Submission timestamp (Unix milliseconds).
    pub placed_at_ms: u64,
    /// Last time the order appeared in a venue open-orders reply.
    pub last_seen_remote_ms: Option<u64>,
    /// First time the order went missing from the remote view while
    /// locally active.
    pub disappeared_since_ms: Option<u64>,
}

impl OrderInfo {
    /// Create a new order in `Pending` state at submission time.
    pub fn new(
        side: OrderSide,
        price: Price,
        qty: Qty,
        client_order_id: ClientOrderId,
        now_ms: u64,
    ) -> Self {
        Self {
            order_id: None,
            client_order_id,
            side,
            price,
            qty,
            cum_filled: Qty::ZERO,
            status: OrderStatus::Pending,
            placed_at_ms: now_ms,
            last_seen_remote_ms: None,
            disappeared_since_ms: None,
        }
    }

    /// Remaining unfilled quantity.
    pub fn remaining(&self) -> Qty {
        self.qty - self.cum_filled
    }

    pub fn is_fully_filled(&self) -> bool {
        self.cum_filled >= self.qty
    }

    /// Transition to `Open` with the venue-assigned ID.
    pub fn mark_open(&mut self, order_id: Option<String>, now_ms: u64) {
        if self.order_id.is_none() {
            self.order_id = order_id;
        }
        if self.status == OrderStatus::Pending {
            self.status = OrderStatus::Open;
        }
        self.last_seen_remote_ms = Some(now_ms);
        self.disappeared_since_ms = None;
    }

    /// Apply a cumulative fill level. Returns the incremental fill quantity
    /// (zero for stale or duplicate levels).
    pub fn apply_cum_fill(&mut self, cum_filled: Qty) -> Qty {
        if cum_filled <= self.cum_filled {
            return Qty::ZERO;
        }
        let delta = cum_filled - self.cum_filled;
        self.cum_filled = cum_filled;
        self.status = if self.is_fully_filled() {
            OrderStatus::Filled
        } else {
            OrderStatus::PartiallyFilled
        };
        delta
    }

    /// Record an observation in a venue open-orders reply.
    pub fn note_seen_remote(&mut self, order_id: Option<String>, now_ms: u64) {
        self.mark_open(order_id, now_ms);
    }

    /// Record absence from a venue open-orders reply. Returns how long the
    /// order has been missing.
    pub fn note_missing_remote(&mut self, now_ms: u64) -> u64 {
        let since = *self.disappeared_since_ms.get_or_insert(now_ms);
        now_ms.saturating_sub(since)
    }
}
