//! Scripted adapter double for tests.
//!
//! Records every call, lets tests inject per-operation failures, and keeps
//! a self-consistent open-orders/position view so reconciliation paths can
//! be exercised end to end.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use pmm_core::{BookTop, OrderSide, Price, Qty, StreamEvent, Symbol, SymbolMeta};

use crate::adapter::{
    BoxFuture, CancelRef, ExchangeAdapter, OrderAck, PlaceOrder, RemoteOrder,
};
use crate::error::{AdapterError, AdapterResult};
use crate::streams::StreamQueue;

#[derive(Debug, Default)]
struct MockInner {
    book: Option<BookTop>,
    meta: Option<SymbolMeta>,
    open_orders: Vec<RemoteOrder>,
    position: Decimal,
    /// Scripted results consumed (front first) before the default behaviour.
    place_results: VecDeque<AdapterResult<()>>,
    list_results: VecDeque<AdapterResult<()>>,
    cancel_results: VecDeque<AdapterResult<()>>,
    market_results: VecDeque<AdapterResult<()>>,
    /// Call records.
    places: Vec<PlaceOrder>,
    cancels: Vec<CancelRef>,
    markets: Vec<(OrderSide, Qty, bool)>,
    close_all_calls: u64,
    queue: Option<Arc<StreamQueue>>,
}

/// Configurable mock adapter.
pub struct MockAdapter {
    name: String,
    inner: Mutex<MockInner>,
    next_oid: AtomicU64,
}

impl Default for MockAdapter {
    fn default() -> Self {
        Self::new("mock")
    }
}

impl MockAdapter {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            inner: Mutex::new(MockInner::default()),
            next_oid: AtomicU64::new(1),
        }
    }

    /// Mock with sensible BTC-USD style defaults: 0.1 tick, 0.001 step.
    pub fn with_defaults(name: impl Into<String>) -> Self {
        let mock = Self::new(name);
        mock.set_meta(SymbolMeta::new(
            Price::new(dec!(0.1)),
            Qty::new(dec!(0.001)),
            Qty::new(dec!(0.001)),
        ));
        mock.set_book(BookTop::new(
            Price::new(dec!(100000.0)),
            Price::new(dec!(100002.0)),
            0,
        ));
        mock
    }

    // --- scripting -----------------------------------------------------

    pub fn set_book(&self, book: BookTop) {
        self.inner.lock().book = Some(book);
    }

    pub fn set_meta(&self, meta: SymbolMeta) {
        self.inner.lock().meta = Some(meta);
    }

    pub fn set_position(&self, position: Decimal) {
        self.inner.lock().position = position;
    }

    pub fn set_open_orders(&self, orders: Vec<RemoteOrder>) {
        self.inner.lock().open_orders = orders;
    }

    /// Queue a failure for the next `place_order` call. An `Ok(())` entry
    /// means "use the default accept behaviour".
    pub fn script_place(&self, result: AdapterResult<()>) {
        self.inner.lock().place_results.push_back(result);
    }

    pub fn script_list_open_orders(&self, result: AdapterResult<()>) {
        self.inner.lock().list_results.push_back(result);
    }

    pub fn script_cancel(&self, result: AdapterResult<()>) {
        self.inner.lock().cancel_results.push_back(result);
    }

    pub fn script_market(&self, result: AdapterResult<()>) {
        self.inner.lock().market_results.push_back(result);
    }

    /// Emit a stream event as if it arrived from the venue.
    pub fn emit(&self, event: StreamEvent) {
        let queue = self.inner.lock().queue.clone();
        if let Some(q) = queue {
            q.push(event);
        }
    }

    // --- inspection ----------------------------------------------------

    pub fn placed_orders(&self) -> Vec<PlaceOrder> {
        self.inner.lock().places.clone()
    }

    pub fn cancel_calls(&self) -> Vec<CancelRef> {
        self.inner.lock().cancels.clone()
    }

    pub fn market_calls(&self) -> Vec<(OrderSide, Qty, bool)> {
        self.inner.lock().markets.clone()
    }

    pub fn close_all_calls(&self) -> u64 {
        self.inner.lock().close_all_calls
    }

    pub fn open_orders(&self) -> Vec<RemoteOrder> {
        self.inner.lock().open_orders.clone()
    }

    /// Remove an open order as if it was filled or cancelled out of band.
    pub fn remove_open_order(&self, order_id: &str) {
        self.inner
            .lock()
            .open_orders
            .retain(|o| o.order_id != order_id);
    }

    fn fresh_oid(&self) -> String {
        format!("m-{}", self.next_oid.fetch_add(1, Ordering::SeqCst))
    }
}

impl ExchangeAdapter for MockAdapter {
    fn name(&self) -> &str {
        &self.name
    }

    fn place_order(&self, req: PlaceOrder) -> BoxFuture<'_, AdapterResult<OrderAck>> {
        Box::pin(async move {
            let oid = self.fresh_oid();
            let mut inner = self.inner.lock();
            inner.places.push(req.clone());

            if let Some(scripted) = inner.place_results.pop_front() {
                scripted?;
            }

            inner.open_orders.push(RemoteOrder {
                order_id: oid.clone(),
                client_order_id: Some(req.client_order_id.clone()),
                side: req.side,
                price: req.price,
                qty: req.qty,
                cum_filled: Qty::ZERO,
                created_at_ms: 0,
            });

            Ok(OrderAck {
                order_id: Some(oid),
                client_order_id: req.client_order_id,
            })
        })
    }

    fn place_market(
        &self,
        _symbol: Symbol,
        side: OrderSide,
        qty: Qty,
        reduce_only: bool,
    ) -> BoxFuture<'_, AdapterResult<OrderAck>> {
        Box::pin(async move {
            let mut inner = self.inner.lock();
            inner.markets.push((side, qty, reduce_only));

            if let Some(scripted) = inner.market_results.pop_front() {
                scripted?;
            }

            let delta = match side {
                OrderSide::Buy => qty.inner(),
                OrderSide::Sell => -qty.inner(),
            };
            inner.position += delta;

            Ok(OrderAck {
                order_id: Some(self.fresh_oid()),
                client_order_id: pmm_core::ClientOrderId::new(),
            })
        })
    }

    fn cancel_order(
        &self,
        _symbol: Symbol,
        target: CancelRef,
    ) -> BoxFuture<'_, AdapterResult<()>> {
        Box::pin(async move {
            let mut inner = self.inner.lock();
            inner.cancels.push(target.clone());

            if let Some(scripted) = inner.cancel_results.pop_front() {
                // OrderNotFound is idempotent success at the trait boundary
                match scripted {
                    Err(AdapterError::OrderNotFound) => return Ok(()),
                    other => other?,
                }
            }

            inner.open_orders.retain(|o| match &target {
                CancelRef::OrderId(oid) => &o.order_id != oid,
                CancelRef::ClientOrderId(cloid) => {
                    o.client_order_id.as_ref() != Some(cloid)
                }
            });
            Ok(())
        })
    }

    fn list_open_orders(
        &self,
        _symbol: Symbol,
    ) -> BoxFuture<'_, AdapterResult<Vec<RemoteOrder>>> {
        Box::pin(async move {
            let mut inner = self.inner.lock();
            if let Some(scripted) = inner.list_results.pop_front() {
                scripted?;
            }
            Ok(inner.open_orders.clone())
        })
    }

    fn get_position(&self, _symbol: Symbol) -> BoxFuture<'_, AdapterResult<Decimal>> {
        Box::pin(async move { Ok(self.inner.lock().position) })
    }

    fn get_orderbook(
        &self,
        _symbol: Symbol,
        _depth: usize,
    ) -> BoxFuture<'_, AdapterResult<BookTop>> {
        Box::pin(async move {
            self.inner
                .lock()
                .book
                .clone()
                .ok_or_else(|| AdapterError::Transient("no book scripted".to_string()))
        })
    }

    fn symbol_meta(&self, _symbol: Symbol) -> BoxFuture<'_, AdapterResult<SymbolMeta>> {
        Box::pin(async move {
            self.inner
                .lock()
                .meta
                .clone()
                .ok_or_else(|| AdapterError::Transient("no meta scripted".to_string()))
        })
    }

    fn market_close_all(&self, _symbol: Symbol) -> BoxFuture<'_, AdapterResult<()>> {
        Box::pin(async move {
            let mut inner = self.inner.lock();
            inner.close_all_calls += 1;
            inner.position = Decimal::ZERO;
            inner.open_orders.clear();
            Ok(())
        })
    }

    fn subscribe(
        &self,
        _symbol: Symbol,
        queue: Arc<StreamQueue>,
    ) -> BoxFuture<'_, AdapterResult<()>> {
        Box::pin(async move {
            self.inner.lock().queue = Some(queue);
            Ok(())
        })
    }
}
