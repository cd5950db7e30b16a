//! The `ExchangeAdapter` trait.

use std::pin::Pin;
use std::sync::Arc;

use rust_decimal::Decimal;

use pmm_core::{BookTop, ClientOrderId, OrderSide, Price, Qty, Symbol, SymbolMeta};

use crate::error::AdapterResult;
use crate::streams::StreamQueue;

/// Boxed future for dyn-compatible async trait methods.
pub type BoxFuture<'a, T> = Pin<Box<dyn std::future::Future<Output = T> + Send + 'a>>;

/// Parameters for a limit-order submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlaceOrder {
    pub symbol: Symbol,
    pub side: OrderSide,
    pub price: Price,
    pub qty: Qty,
    /// Reject instead of crossing on arrival.
    pub post_only: bool,
    pub client_order_id: ClientOrderId,
}

/// Venue acknowledgement of an accepted order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderAck {
    /// Venue-assigned order ID. May be absent when the venue only echoes
    /// the client order ID on the ack path.
    pub order_id: Option<String>,
    pub client_order_id: ClientOrderId,
}

/// Cancel target: venue ID when known, client ID otherwise.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CancelRef {
    OrderId(String),
    ClientOrderId(ClientOrderId),
}

/// An open order as reported by the venue. Authoritative on disagreement
/// with the local view.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteOrder {
    pub order_id: String,
    pub client_order_id: Option<ClientOrderId>,
    pub side: OrderSide,
    pub price: Price,
    pub qty: Qty,
    pub cum_filled: Qty,
    /// Venue-reported creation time (Unix milliseconds).
    pub created_at_ms: u64,
}

/// Uniform capability surface exposed by a venue account.
///
/// All operations may fail with a categorised `AdapterError`. Timeouts
/// surface as `AdapterError::Unknown`; the caller reconciles on the next
/// tick. The adapter is not required to preserve ordering between the REST
/// and stream channels.
pub trait ExchangeAdapter: Send + Sync {
    /// Short adapter name for logging.
    fn name(&self) -> &str;

    /// Submit a limit order. On success the venue has accepted the order;
    /// on `PostOnlyRejected` no order exists.
    fn place_order(&self, req: PlaceOrder) -> BoxFuture<'_, AdapterResult<OrderAck>>;

    /// Submit a market order. Used by the hedge engine and flatten paths.
    fn place_market(
        &self,
        symbol: Symbol,
        side: OrderSide,
        qty: Qty,
        reduce_only: bool,
    ) -> BoxFuture<'_, AdapterResult<OrderAck>>;

    /// Cancel an order. Idempotent: cancelling an already-gone order
    /// succeeds (`OrderNotFound` is mapped to success by implementations).
    fn cancel_order(&self, symbol: Symbol, target: CancelRef)
        -> BoxFuture<'_, AdapterResult<()>>;

    /// Authoritative snapshot of open orders for the symbol.
    fn list_open_orders(&self, symbol: Symbol) -> BoxFuture<'_, AdapterResult<Vec<RemoteOrder>>>;

    /// Signed position for the symbol, positive = long.
    fn get_position(&self, symbol: Symbol) -> BoxFuture<'_, AdapterResult<Decimal>>;

    /// Top-of-book snapshot with up to `depth` levels per side.
    fn get_orderbook(&self, symbol: Symbol, depth: usize)
        -> BoxFuture<'_, AdapterResult<BookTop>>;

    /// Static symbol metadata. Fetched once per session.
    fn symbol_meta(&self, symbol: Symbol) -> BoxFuture<'_, AdapterResult<SymbolMeta>>;

    /// Close the whole position at market. Used by the hard stop and the
    /// liquidation guard.
    fn market_close_all(&self, symbol: Symbol) -> BoxFuture<'_, AdapterResult<()>>;

    /// Subscribe the queue to depth and private order/fill/position
    /// streams for the symbol.
    fn subscribe(
        &self,
        symbol: Symbol,
        queue: Arc<StreamQueue>,
    ) -> BoxFuture<'_, AdapterResult<()>>;
}

/// Arc wrapper for adapter trait objects.
pub type DynAdapter = Arc<dyn ExchangeAdapter>;
