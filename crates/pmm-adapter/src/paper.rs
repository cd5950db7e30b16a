//! Paper-trading adapter for dry runs.
//!
//! Keeps a self-consistent venue view in memory: resting orders, a signed
//! position, and a synthetic book that callers can move. Market orders
//! execute immediately at the touch and emit fill events into the
//! subscribed stream queue. Resting limit orders fill when the touch
//! crosses their price.
//!
//! This lets the binary run end to end without venue connectivity.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use rust_decimal::Decimal;
use tracing::info;

use pmm_core::{
    BookTop, ClientOrderId, FillEvent, OrderSide, Price, Qty, StreamEvent, Symbol, SymbolMeta,
};

use crate::adapter::{
    BoxFuture, CancelRef, ExchangeAdapter, OrderAck, PlaceOrder, RemoteOrder,
};
use crate::error::{AdapterError, AdapterResult};
use crate::streams::StreamQueue;

struct PaperInner {
    book: BookTop,
    meta: SymbolMeta,
    open_orders: Vec<RemoteOrder>,
    position: Decimal,
    queue: Option<Arc<StreamQueue>>,
}

/// In-memory simulated venue account.
pub struct PaperAdapter {
    name: String,
    symbol: Symbol,
    inner: Mutex<PaperInner>,
    next_oid: AtomicU64,
}

impl PaperAdapter {
    pub fn new(name: impl Into<String>, symbol: Symbol, meta: SymbolMeta, book: BookTop) -> Self {
        Self {
            name: name.into(),
            symbol,
            inner: Mutex::new(PaperInner {
                book,
                meta,
                open_orders: Vec::new(),
                position: Decimal::ZERO,
                queue: None,
            }),
            next_oid: AtomicU64::new(1),
        }
    }

    /// Move the synthetic book and publish the depth update. Resting
    /// orders crossed by the new touch are filled.
    pub fn move_book(&self, book: BookTop) {
        let (events, queue) = {
            let mut inner = self.inner.lock();
            inner.book = book.clone();

            let mut fills = Vec::new();
            inner.open_orders.retain(|order| {
                let crossed = match order.side {
                    OrderSide::Buy => book.best_ask.is_positive() && book.best_ask <= order.price,
                    OrderSide::Sell => book.best_bid.is_positive() && book.best_bid >= order.price,
                };
                if crossed {
                    fills.push(order.clone());
                }
                !crossed
            });

            for filled in &fills {
                let delta = match filled.side {
                    OrderSide::Buy => filled.qty.inner(),
                    OrderSide::Sell => -filled.qty.inner(),
                };
                inner.position += delta;
            }

            let mut events: Vec<StreamEvent> = fills
                .into_iter()
                .map(|o| {
                    StreamEvent::Fill(FillEvent {
                        order_id: o.order_id,
                        client_order_id: o.client_order_id,
                        symbol: self.symbol.clone(),
                        side: o.side,
                        price: o.price,
                        qty: o.qty,
                        cum_filled: o.qty,
                        fee: Decimal::ZERO,
                        is_maker: Some(true),
                        ts_ms: book.received_at_ms,
                    })
                })
                .collect();
            events.push(StreamEvent::Depth(book));

            (events, inner.queue.clone())
        };

        if let Some(q) = queue {
            for ev in events {
                q.push(ev);
            }
        }
    }

    pub fn position(&self) -> Decimal {
        self.inner.lock().position
    }

    fn fresh_oid(&self) -> String {
        format!("paper-{}", self.next_oid.fetch_add(1, Ordering::SeqCst))
    }
}

impl ExchangeAdapter for PaperAdapter {
    fn name(&self) -> &str {
        &self.name
    }

    fn place_order(&self, req: PlaceOrder) -> BoxFuture<'_, AdapterResult<OrderAck>> {
        Box::pin(async move {
            let oid = self.fresh_oid();
            let mut inner = self.inner.lock();

            // Post-only orders that would cross are rejected, not converted
            let crosses = match req.side {
                OrderSide::Buy => req.price >= inner.book.best_ask,
                OrderSide::Sell => req.price <= inner.book.best_bid,
            };
            if req.post_only && crosses {
                return Err(AdapterError::PostOnlyRejected);
            }
            if !req.price.is_tick_aligned(inner.meta.tick_size) {
                return Err(AdapterError::InvalidRequest(format!(
                    "price {} off tick",
                    req.price
                )));
            }
            if req.qty < inner.meta.min_qty {
                return Err(AdapterError::InvalidRequest(format!(
                    "qty {} below minimum",
                    req.qty
                )));
            }

            let created_at_ms = inner.book.received_at_ms;
            inner.open_orders.push(RemoteOrder {
                order_id: oid.clone(),
                client_order_id: Some(req.client_order_id.clone()),
                side: req.side,
                price: req.price,
                qty: req.qty,
                cum_filled: Qty::ZERO,
                created_at_ms,
            });

            info!(
                adapter = %self.name,
                side = %req.side,
                price = %req.price,
                qty = %req.qty,
                "Paper order resting"
            );

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
        _reduce_only: bool,
    ) -> BoxFuture<'_, AdapterResult<OrderAck>> {
        Box::pin(async move {
            let (ack, fill, queue) = {
                let mut inner = self.inner.lock();
                let price = match side {
                    OrderSide::Buy => inner.book.best_ask,
                    OrderSide::Sell => inner.book.best_bid,
                };
                if !price.is_positive() {
                    return Err(AdapterError::Transient("empty touch".to_string()));
                }

                let delta = match side {
                    OrderSide::Buy => qty.inner(),
                    OrderSide::Sell => -qty.inner(),
                };
                inner.position += delta;

                let oid = self.fresh_oid();
                let cloid = ClientOrderId::new();
                let fill = FillEvent {
                    order_id: oid.clone(),
                    client_order_id: Some(cloid.clone()),
                    symbol: self.symbol.clone(),
                    side,
                    price,
                    qty,
                    cum_filled: qty,
                    fee: Decimal::ZERO,
                    is_maker: Some(false),
                    ts_ms: inner.book.received_at_ms,
                };
                (
                    OrderAck {
                        order_id: Some(oid),
                        client_order_id: cloid,
                    },
                    fill,
                    inner.queue.clone(),
                )
            };

            if let Some(q) = queue {
                q.push(StreamEvent::Fill(fill));
            }
            Ok(ack)
        })
    }

    fn cancel_order(
        &self,
        _symbol: Symbol,
        target: CancelRef,
    ) -> BoxFuture<'_, AdapterResult<()>> {
        Box::pin(async move {
            let mut inner = self.inner.lock();
            // Cancelling an already-gone order is success
            inner.open_orders.retain(|o| match &target {
                CancelRef::OrderId(oid) => &o.order_id != oid,
                CancelRef::ClientOrderId(cloid) => o.client_order_id.as_ref() != Some(cloid),
            });
            Ok(())
        })
    }

    fn list_open_orders(
        &self,
        _symbol: Symbol,
    ) -> BoxFuture<'_, AdapterResult<Vec<RemoteOrder>>> {
        Box::pin(async move { Ok(self.inner.lock().open_orders.clone()) })
    }

    fn get_position(&self, _symbol: Symbol) -> BoxFuture<'_, AdapterResult<Decimal>> {
        Box::pin(async move { Ok(self.inner.lock().position) })
    }

    fn get_orderbook(
        &self,
        _symbol: Symbol,
        _depth: usize,
    ) -> BoxFuture<'_, AdapterResult<BookTop>> {
        Box::pin(async move { Ok(self.inner.lock().book.clone()) })
    }

    fn symbol_meta(&self, _symbol: Symbol) -> BoxFuture<'_, AdapterResult<SymbolMeta>> {
        Box::pin(async move { Ok(self.inner.lock().meta.clone()) })
    }

    fn market_close_all(&self, _symbol: Symbol) -> BoxFuture<'_, AdapterResult<()>> {
        Box::pin(async move {
            let mut inner = self.inner.lock();
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
