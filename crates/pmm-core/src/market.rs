//! Instrument identification and top-of-book market data.

use crate::{Price, Qty};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Trading symbol, e.g. "BTC-USD".
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Symbol(String);

impl Symbol {
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for Symbol {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for Symbol {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Which account an adapter instance trades on.
///
/// The quoting loop runs on `Primary`; the hedge engine neutralises
/// exposure on `Hedge`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VenueRole {
    Primary,
    Hedge,
}

impl fmt::Display for VenueRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Primary => write!(f, "primary"),
            Self::Hedge => write!(f, "hedge"),
        }
    }
}

/// Static symbol metadata. Fetched once per session, immutable thereafter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SymbolMeta {
    /// Minimum price increment.
    pub tick_size: Price,
    /// Minimum quantity increment.
    pub qty_step: Qty,
    /// Minimum order quantity.
    pub min_qty: Qty,
}

impl SymbolMeta {
    pub fn new(tick_size: Price, qty_step: Qty, min_qty: Qty) -> Self {
        Self {
            tick_size,
            qty_step,
            min_qty,
        }
    }
}

/// One price level of the order book.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookLevel {
    pub price: Price,
    pub qty: Qty,
}

/// Snapshot validity classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BookState {
    /// Both sides present and `best_bid < best_ask`.
    Valid,
    /// No bid side.
    NoBid,
    /// No ask side.
    NoAsk,
    /// Both sides missing.
    Empty,
    /// Crossed or otherwise inconsistent book.
    Invalid,
}

impl BookState {
    pub fn is_tradeable(&self) -> bool {
        matches!(self, Self::Valid)
    }
}

impl fmt::Display for BookState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Valid => write!(f, "VALID"),
            Self::NoBid => write!(f, "NO_BID"),
            Self::NoAsk => write!(f, "NO_ASK"),
            Self::Empty => write!(f, "EMPTY"),
            Self::Invalid => write!(f, "INVALID"),
        }
    }
}

/// Top-of-book snapshot.
///
/// Carries best bid/ask plus optional top-N depth levels, which the
/// executor uses to approximate queue position. Consumed read-only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookTop {
    /// Best bid price.
    pub best_bid: Price,
    /// Best ask price.
    pub best_ask: Price,
    /// Bid levels, best first. May be empty if the adapter only reports BBO.
    #[serde(default)]
    pub bids: Vec<BookLevel>,
    /// Ask levels, best first.
    #[serde(default)]
    pub asks: Vec<BookLevel>,
    /// Receipt timestamp (Unix milliseconds).
    pub received_at_ms: u64,
}

impl BookTop {
    /// Create a BBO-only snapshot.
    pub fn new(best_bid: Price, best_ask: Price, received_at_ms: u64) -> Self {
        Self {
            best_bid,
            best_ask,
            bids: Vec::new(),
            asks: Vec::new(),
            received_at_ms,
        }
    }

    /// Create a snapshot with depth levels. Best level wins over the
    /// explicit BBO fields if they disagree.
    pub fn with_depth(
        bids: Vec<BookLevel>,
        asks: Vec<BookLevel>,
        received_at_ms: u64,
    ) -> Option<Self> {
        let best_bid = bids.first()?.price;
        let best_ask = asks.first()?.price;
        Some(Self {
            best_bid,
            best_ask,
            bids,
            asks,
            received_at_ms,
        })
    }

    /// Mid price: `(best_bid + best_ask) / 2`. None unless the book is valid.
    pub fn mid(&self) -> Option<Price> {
        if self.state() != BookState::Valid {
            return None;
        }
        Some(Price::new(
            (self.best_bid.inner() + self.best_ask.inner()) / rust_decimal::Decimal::TWO,
        ))
    }

    /// Spread in basis points relative to mid.
    pub fn spread_bps(&self) -> Option<rust_decimal::Decimal> {
        let mid = self.mid()?;
        if mid.is_zero() {
            return None;
        }
        Some(
            (self.best_ask.inner() - self.best_bid.inner()) / mid.inner()
                * rust_decimal::Decimal::from(10000),
        )
    }

    pub fn state(&self) -> BookState {
        let has_bid = self.best_bid.is_positive();
        let has_ask = self.best_ask.is_positive();

        match (has_bid, has_ask) {
            (false, false) => BookState::Empty,
            (true, false) => BookState::NoAsk,
            (false, true) => BookState::NoBid,
            (true, true) => {
                if self.best_bid < self.best_ask {
                    BookState::Valid
                } else {
                    BookState::Invalid
                }
            }
        }
    }

    pub fn is_valid(&self) -> bool {
        self.state() == BookState::Valid
    }

    /// Age of this snapshot in milliseconds.
    pub fn age_ms(&self, now_ms: u64) -> u64 {
        now_ms.saturating_sub(self.received_at_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn valid_book() -> BookTop {
        BookTop::new(Price::new(dec!(100000.0)), Price::new(dec!(100002.0)), 1000)
    }

    #[test]
    fn test_mid_price() {
        assert_eq!(valid_book().mid().unwrap().inner(), dec!(100001.0));
    }

    #[test]
    fn test_spread_bps() {
        let book = BookTop::new(Price::new(dec!(100)), Price::new(dec!(101)), 0);
        // Spread = 1, mid = 100.5, spread_bps = 1/100.5 * 10000 ~= 99.5
        let bps = book.spread_bps().unwrap();
        assert!(bps > dec!(99) && bps < dec!(100));
    }

    #[test]
    fn test_state_valid() {
        assert_eq!(valid_book().state(), BookState::Valid);
        assert!(valid_book().is_valid());
    }

    #[test]
    fn test_state_crossed_is_invalid() {
        let book = BookTop::new(Price::new(dec!(101)), Price::new(dec!(100)), 0);
        assert_eq!(book.state(), BookState::Invalid);
        assert!(book.mid().is_none());
    }

    #[test]
    fn test_state_missing_sides() {
        let no_bid = BookTop::new(Price::ZERO, Price::new(dec!(100)), 0);
        assert_eq!(no_bid.state(), BookState::NoBid);

        let no_ask = BookTop::new(Price::new(dec!(100)), Price::ZERO, 0);
        assert_eq!(no_ask.state(), BookState::NoAsk);

        let empty = BookTop::new(Price::ZERO, Price::ZERO, 0);
        assert_eq!(empty.state(), BookState::Empty);
    }

    #[test]
    fn test_with_depth_uses_best_levels() {
        let book = BookTop::with_depth(
            vec![
                BookLevel {
                    price: Price::new(dec!(100)),
                    qty: Qty::new(dec!(1)),
                },
                BookLevel {
                    price: Price::new(dec!(99.9)),
                    qty: Qty::new(dec!(2)),
                },
            ],
            vec![BookLevel {
                price: Price::new(dec!(100.2)),
                qty: Qty::new(dec!(1)),
            }],
            500,
        )
        .unwrap();

        assert_eq!(book.best_bid.inner(), dec!(100));
        assert_eq!(book.best_ask.inner(), dec!(100.2));
    }

    #[test]
    fn test_age() {
        assert_eq!(valid_book().age_ms(1500), 500);
        // Clock skew must not underflow
        assert_eq!(valid_book().age_ms(500), 0);
    }
}
