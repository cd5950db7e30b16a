//! The executor: a single-owner tick state machine.
//!
//! One tick runs to completion at a time; every suspension point is an
//! adapter call. Stream events arriving mid-tick are queued and applied at
//! the next tick's drain, never in between. Tick sequence:
//!
//! 1. Stream drain (dedup fills, volatility update)
//! 2. Hard-stop auto-resume
//! 3. Hard-stop entry
//! 4. Liquidation guard
//! 5. Volatility pause/resume
//! 6. Early exit unless Running
//! 7. Order book refresh (stream cache, REST fallback when stale)
//! 8. Price calculation
//! 9. Per-side cancel checks (cancel distance, queue position, rebalance)
//! 10. REST reconciliation gate
//! 11. Placement
//!
//! Hard stop is checked before the volatility gate and therefore wins
//! when both fire in the same tick.

use std::sync::Arc;

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use tracing::{debug, error, info, warn};

use pmm_adapter::{AdapterError, CancelRef, DynAdapter, PlaceOrder, StreamQueue};
use pmm_core::{
    BookTop, ClientOrderId, EngineStatus, FillEvent, OrderInfo, OrderSide, OrderStatus,
    OrderUpdateEvent, OrderUpdateKind, PauseReason, PositionEvent, Price, Qty, StreamEvent,
    Symbol, SymbolMeta, VenueRole,
};
use pmm_hedge::{HedgeEngine, HedgeRequest};
use pmm_mm::{
    compute_quotes, EventDedup, MmConfig, OrderThrottle, QuoteInputs, QuotePlan,
    VolatilityTracker,
};
use pmm_risk::{GuardConfig, HardStopTracker, LiquidationGuard};
use pmm_state::{MmState, OperationKind};
use pmm_telemetry::{TradeLogWriter, TradeRecord};

use crate::control::{new_snapshot_handle, PositionEntry, SnapshotHandle, StatusSnapshot};
use crate::deadline::with_deadline;
use crate::error::{EngineError, EngineResult};
use crate::reconcile::{GateReport, ReconcileGate};

/// Margin signals carried from the latest primary position event into the
/// liquidation-guard check.
#[derive(Debug, Clone, Default)]
struct MarginSignals {
    margin_ratio: Option<Decimal>,
    mark_price: Option<Price>,
    liquidation_price: Option<Price>,
}

/// The quoting engine core. Owns `MmState`; all mutation happens inside
/// `tick` and the control methods called between ticks.
pub struct Executor {
    symbol: Symbol,
    primary: DynAdapter,
    queue: Arc<StreamQueue>,
    config: MmConfig,
    meta: Option<SymbolMeta>,

    state: MmState,
    throttle: OrderThrottle,
    dedup: EventDedup,
    volatility: VolatilityTracker,
    hard_stop: HardStopTracker,
    guard: Arc<LiquidationGuard>,
    gate: ReconcileGate,

    hedge: Option<Arc<HedgeEngine>>,
    fill_tx: Option<tokio::sync::mpsc::Sender<HedgeRequest>>,
    trade_log: Option<TradeLogWriter>,

    snapshot: SnapshotHandle,
    margin: MarginSignals,
    /// Placements suppressed until this instant after a rate-limit reply.
    rate_limited_until_ms: u64,
    /// When set, primary fills are flattened immediately on the primary
    /// account instead of hedged.
    instant_close_enabled: bool,
}

impl Executor {
    pub fn new(
        symbol: Symbol,
        primary: DynAdapter,
        queue: Arc<StreamQueue>,
        config: MmConfig,
        guard_config: GuardConfig,
    ) -> Self {
        let throttle = OrderThrottle::new(config.order_throttle_sec);
        let dedup = EventDedup::new(config.event_dedup_ttl_sec, 4096);
        let volatility = VolatilityTracker::new(
            config.volatility_window_sec,
            config.pause_threshold_bps,
            config.resume_threshold_bps,
            config.stable_seconds,
        );
        let hard_stop = HardStopTracker::new(
            config.hard_stop_position,
            config.resume_position,
            config.hard_stop_cooldown_sec,
            config.resume_confirm_count,
        );

        Self {
            state: MmState::new(symbol.clone()),
            symbol,
            primary,
            queue,
            config,
            meta: None,
            throttle,
            dedup,
            volatility,
            hard_stop,
            guard: Arc::new(LiquidationGuard::new(guard_config)),
            gate: ReconcileGate::new(),
            hedge: None,
            fill_tx: None,
            trade_log: None,
            snapshot: new_snapshot_handle(),
            margin: MarginSignals::default(),
            rate_limited_until_ms: 0,
            instant_close_enabled: false,
        }
    }

    /// Attach the hedge engine and its fill channel.
    pub fn with_hedge(
        mut self,
        hedge: Arc<HedgeEngine>,
        fill_tx: tokio::sync::mpsc::Sender<HedgeRequest>,
    ) -> Self {
        self.hedge = Some(hedge);
        self.fill_tx = Some(fill_tx);
        self
    }

    /// Attach the audit trade log.
    pub fn with_trade_log(mut self, trade_log: TradeLogWriter) -> Self {
        self.trade_log = Some(trade_log);
        self
    }

    pub fn snapshot_handle(&self) -> SnapshotHandle {
        self.snapshot.clone()
    }

    pub fn guard(&self) -> Arc<LiquidationGuard> {
        self.guard.clone()
    }

    pub fn hedge_engine(&self) -> Option<Arc<HedgeEngine>> {
        self.hedge.clone()
    }

    pub fn status(&self) -> EngineStatus {
        self.state.status()
    }

    pub fn config(&self) -> &MmConfig {
        &self.config
    }

    pub fn state(&self) -> &MmState {
        &self.state
    }

    /// Session start-up: fetch symbol metadata, subscribe streams, rebuild
    /// positions from the venue, and clear any leftover orders (existing
    /// remote orders are cancelled, never adopted).
    pub async fn initialize(&mut self, now_ms: u64) -> EngineResult<()> {
        let timeout = self.config.call_timeout_ms;

        let meta = with_deadline(timeout, self.primary.symbol_meta(self.symbol.clone())).await?;
        info!(
            symbol = %self.symbol,
            tick_size = %meta.tick_size,
            qty_step = %meta.qty_step,
            "Symbol metadata loaded"
        );
        self.meta = Some(meta);

        with_deadline(
            timeout,
            self.primary.subscribe(self.symbol.clone(), self.queue.clone()),
        )
        .await?;

        let position =
            with_deadline(timeout, self.primary.get_position(self.symbol.clone())).await?;
        self.state
            .set_position(VenueRole::Primary, self.symbol.clone(), position);
        info!(%position, "Primary position rebuilt from venue");

        // Leftover orders from a previous session are unknown quantities;
        // start from a clean book.
        let leftovers =
            with_deadline(timeout, self.primary.list_open_orders(self.symbol.clone())).await?;
        for order in leftovers {
            warn!(order_id = %order.order_id, "Cancelling leftover order from previous session");
            let _ = with_deadline(
                timeout,
                self.primary
                    .cancel_order(self.symbol.clone(), CancelRef::OrderId(order.order_id)),
            )
            .await;
        }

        self.state.set_status(EngineStatus::Running);
        self.state
            .ops
            .record(now_ms, OperationKind::Resume, None, None, "session start");
        self.publish_snapshot(now_ms);
        Ok(())
    }

    /// Merge a validated config and push the new parameters into the
    /// sub-components. Called between ticks.
    pub fn apply_config(&mut self, config: MmConfig) {
        self.throttle.set_cooldown_sec(config.order_throttle_sec);
        self.dedup.set_ttl_sec(config.event_dedup_ttl_sec);
        self.volatility.set_params(
            config.volatility_window_sec,
            config.pause_threshold_bps,
            config.resume_threshold_bps,
            config.stable_seconds,
        );
        self.hard_stop.set_params(
            config.hard_stop_position,
            config.resume_position,
            config.hard_stop_cooldown_sec,
            config.resume_confirm_count,
        );
        info!("Config updated");
        self.config = config;
    }

    /// Runtime toggle: flatten fills on the primary account instead of
    /// hedging them. The façade keeps this mutually exclusive with the
    /// hedge flag.
    pub fn set_instant_close(&mut self, enabled: bool) {
        info!(enabled, "Instant close flag changed");
        self.instant_close_enabled = enabled;
    }

    pub fn instant_close_enabled(&self) -> bool {
        self.instant_close_enabled
    }

    /// Operator clear of the liquidation latch. Resumes quoting when the
    /// pause belonged to the guard.
    pub fn clear_liquidation_halt(&mut self, now_ms: u64) {
        self.guard.clear();
        if self.state.status() == EngineStatus::Paused(PauseReason::LiquidationGuard) {
            self.state.set_status(EngineStatus::Running);
            self.state.ops.record(
                now_ms,
                OperationKind::Resume,
                None,
                None,
                "liquidation guard cleared",
            );
        }
        self.publish_snapshot(now_ms);
    }

    /// Graceful drain: cancel all, wait for the venue to confirm (or the
    /// grace window to lapse), then stop.
    pub async fn stop(&mut self, now_ms: u64) {
        info!("Stopping: draining open orders");
        self.cancel_all("operator stop", now_ms).await;

        let grace_ms = self.config.disappear_grace_sec * 1000;
        let deadline = now_ms + grace_ms;
        let mut waited = now_ms;
        while waited < deadline {
            match with_deadline(
                self.config.call_timeout_ms,
                self.primary.list_open_orders(self.symbol.clone()),
            )
            .await
            {
                Ok(remote) if remote.is_empty() => break,
                Ok(_) => {}
                Err(e) => warn!(error = %e, "Drain check failed"),
            }
            tokio::time::sleep(std::time::Duration::from_millis(200)).await;
            waited += 200;
        }

        self.state.set_status(EngineStatus::Stopped);
        self.state
            .ops
            .record(now_ms, OperationKind::Stop, None, None, "operator stop");
        if let Some(log) = self.trade_log.as_mut() {
            if let Err(e) = log.flush() {
                warn!(error = %e, "Trade log flush failed on stop");
            }
        }
        self.publish_snapshot(now_ms);
        info!("Stopped");
    }

    /// Restart quoting after a stop.
    pub fn start(&mut self, now_ms: u64) -> EngineResult<()> {
        if self.meta.is_none() {
            return Err(EngineError::NotInitialized);
        }
        if self.state.status() != EngineStatus::Stopped {
            return Err(EngineError::AlreadyRunning);
        }
        self.state.set_status(EngineStatus::Running);
        self.state
            .ops
            .record(now_ms, OperationKind::Resume, None, None, "operator start");
        self.publish_snapshot(now_ms);
        Ok(())
    }

    /// Market-close the primary account.
    pub async fn close_primary(&mut self, now_ms: u64) {
        self.cancel_all("close all", now_ms).await;
        if let Err(e) = with_deadline(
            self.config.call_timeout_ms,
            self.primary.market_close_all(self.symbol.clone()),
        )
        .await
        {
            error!(error = %e, "Primary close-all failed");
        } else {
            self.state
                .set_position(VenueRole::Primary, self.symbol.clone(), Decimal::ZERO);
        }
        self.publish_snapshot(now_ms);
    }

    // ------------------------------------------------------------------
    // Tick
    // ------------------------------------------------------------------

    /// One tick of the state machine.
    pub async fn tick(&mut self, now_ms: u64) {
        // 1. Stream drain
        self.drain_streams(now_ms).await;

        // 2. Hard-stop auto-resume
        if self.state.status() == EngineStatus::Paused(PauseReason::HardStop) {
            let position = self.state.position(VenueRole::Primary);
            if self.hard_stop.check_resume(position, now_ms) {
                self.state.set_status(EngineStatus::Running);
                self.state.ops.record(
                    now_ms,
                    OperationKind::Resume,
                    None,
                    None,
                    "hard stop released",
                );
            }
        }

        // 3. Hard-stop entry
        let position = self.state.position(VenueRole::Primary);
        if self.state.status().is_running() && self.hard_stop.should_enter(position) {
            self.hard_stop.enter(position, now_ms);
            self.state.counters.hard_stops += 1;
            self.state
                .set_status(EngineStatus::Paused(PauseReason::HardStop));
            self.state.ops.record(
                now_ms,
                OperationKind::Pause,
                None,
                None,
                format!("hard stop at {position}"),
            );
            self.cancel_all("hard stop", now_ms).await;
            self.finish_tick(now_ms);
            return;
        }

        // 4. Liquidation guard
        if let Some(reason) = self.guard.check(
            self.margin.margin_ratio,
            self.margin.mark_price,
            self.margin.liquidation_price,
            now_ms,
        ) {
            self.state
                .set_status(EngineStatus::Paused(PauseReason::LiquidationGuard));
            self.state.ops.record(
                now_ms,
                OperationKind::Pause,
                None,
                None,
                format!("liquidation guard: {reason}"),
            );
            self.cancel_all("liquidation guard", now_ms).await;
            if let Err(e) = with_deadline(
                self.config.call_timeout_ms,
                self.primary.market_close_all(self.symbol.clone()),
            )
            .await
            {
                error!(error = %e, "Forced flatten failed");
            } else {
                self.state
                    .set_position(VenueRole::Primary, self.symbol.clone(), Decimal::ZERO);
            }
            self.finish_tick(now_ms);
            return;
        }

        // 5. Volatility pause/resume
        match self.state.status() {
            EngineStatus::Running if self.volatility.should_pause() => {
                let bps = self.volatility.current_bps();
                self.state.counters.volatility_pauses += 1;
                self.state
                    .set_status(EngineStatus::Paused(PauseReason::VolatilityHigh));
                self.state.ops.record(
                    now_ms,
                    OperationKind::Pause,
                    None,
                    None,
                    format!("volatility {bps} bps"),
                );
                warn!(%bps, "High volatility, pausing");
                self.cancel_all("volatility pause", now_ms).await;
                self.finish_tick(now_ms);
                return;
            }
            EngineStatus::Paused(PauseReason::VolatilityHigh)
                if self.volatility.should_resume(now_ms) =>
            {
                info!("Volatility normalized, resuming");
                self.state.set_status(EngineStatus::Running);
                self.state.ops.record(
                    now_ms,
                    OperationKind::Resume,
                    None,
                    None,
                    "volatility normalized",
                );
            }
            _ => {}
        }

        // 6. Only a running engine quotes
        if !self.state.status().is_running() {
            self.finish_tick(now_ms);
            return;
        }

        // 7. Order book
        let book = match self.current_book(now_ms).await {
            Some(book) => book,
            None => {
                debug!("No tradeable book this tick");
                self.finish_tick(now_ms);
                return;
            }
        };
        let mid = match book.mid() {
            Some(mid) => mid,
            None => {
                self.finish_tick(now_ms);
                return;
            }
        };

        // 8. Target prices
        let meta = match self.meta.clone() {
            Some(meta) => meta,
            None => {
                self.finish_tick(now_ms);
                return;
            }
        };
        let inputs = QuoteInputs {
            mid,
            best_bid: book.best_bid,
            best_ask: book.best_ask,
            position: self.state.position(VenueRole::Primary),
            volatility_bps: self.volatility.current_bps(),
            entry_price: self.state.entry.entry_price(),
        };
        let plan = compute_quotes(&inputs, &self.config, &meta);

        // 9. Cancel checks against the resting orders
        for side in [OrderSide::Buy, OrderSide::Sell] {
            self.maybe_cancel_side(side, &book, mid, &plan, now_ms).await;
        }

        // 10. Reconciliation gate
        let report = self
            .gate
            .run(
                &self.primary,
                &mut self.state,
                &self.symbol,
                self.config.disappear_grace_sec * 1000,
                self.config.call_timeout_ms,
                now_ms,
            )
            .await;

        // 11. Placement
        if !report.safe_mode && now_ms >= self.rate_limited_until_ms {
            self.place_allowed_sides(&plan, &report, now_ms).await;
        }

        self.finish_tick_with(now_ms, report.safe_mode);
    }

    // ------------------------------------------------------------------
    // Stream handling
    // ------------------------------------------------------------------

    async fn drain_streams(&mut self, now_ms: u64) {
        for event in self.queue.drain() {
            match event {
                StreamEvent::Depth(book) => {
                    if book.is_valid() {
                        if let Some(mid) = book.mid() {
                            self.volatility.record(mid, now_ms);
                        }
                        self.state.set_book(book);
                    }
                }
                StreamEvent::Fill(fill) => self.handle_fill(fill, now_ms).await,
                StreamEvent::Order(update) => self.apply_order_update(update, now_ms),
                StreamEvent::Position(event) => self.apply_position_update(event),
            }
        }
    }

    async fn handle_fill(&mut self, fill: FillEvent, now_ms: u64) {
        if fill.symbol != self.symbol {
            return;
        }
        if self
            .dedup
            .is_duplicate(&fill.order_id, fill.cum_filled, now_ms)
        {
            debug!(order_id = %fill.order_id, cum = %fill.cum_filled, "Duplicate fill dropped");
            return;
        }

        info!(
            side = %fill.side,
            price = %fill.price,
            qty = %fill.qty,
            order_id = %fill.order_id,
            "Fill"
        );
        self.state.account_fill(&fill);
        self.state.ops.record(
            now_ms,
            OperationKind::Fill,
            Some(fill.side),
            Some(fill.price),
            "fill",
        );

        // Advance the owning order slot
        let slot_side = self
            .state
            .side_of_order_id(&fill.order_id)
            .or_else(|| {
                let cloid = fill.client_order_id.as_ref()?;
                [OrderSide::Buy, OrderSide::Sell].into_iter().find(|s| {
                    self.state
                        .order(*s)
                        .map(|o| &o.client_order_id == cloid)
                        .unwrap_or(false)
                })
            });
        if let Some(side) = slot_side {
            let fully_filled = {
                let order = self.state.order_mut(side).expect("slot side resolved");
                order.apply_cum_fill(fill.cum_filled);
                order.is_fully_filled()
            };
            if fully_filled {
                self.state.clear_order(side);
                self.state.counters.orders_filled += 1;
            } else {
                self.state.counters.partial_fills += 1;
            }
        }

        // Audit log
        if let Some(log) = self.trade_log.as_mut() {
            let record = TradeRecord {
                ts_ms: fill.ts_ms,
                venue: VenueRole::Primary,
                symbol: self.symbol.to_string(),
                side: fill.side,
                price: fill.price,
                qty: fill.qty,
                fee: fill.fee,
                is_maker: fill.is_maker,
                order_id: fill.order_id.clone(),
            };
            if let Err(e) = log.add_record(record) {
                warn!(error = %e, "Trade log write failed");
            }
        }

        if self.instant_close_enabled {
            // Flatten on the spot; exposure never reaches the hedge leg
            let close_side = fill.side.opposite();
            match with_deadline(
                self.config.call_timeout_ms,
                self.primary
                    .place_market(self.symbol.clone(), close_side, fill.qty, true),
            )
            .await
            {
                Ok(_) => {
                    self.state.ops.record(
                        now_ms,
                        OperationKind::Hedge,
                        Some(close_side),
                        Some(fill.price),
                        "instant close",
                    );
                }
                Err(e) => warn!(error = %e, "Instant close failed"),
            }
            return;
        }

        // Signal the hedge task; never block the tick on hedge I/O
        if let Some(tx) = &self.fill_tx {
            let request = HedgeRequest {
                source_order_id: fill.order_id.clone(),
                side: fill.side,
                qty: fill.qty,
                price: fill.price,
                ts_ms: fill.ts_ms,
            };
            if let Err(e) = tx.try_send(request) {
                warn!(error = %e, "Hedge channel full, dropping request");
            }
        }
    }

    fn apply_order_update(&mut self, update: OrderUpdateEvent, now_ms: u64) {
        let side = match self.state.side_of_order_id(&update.order_id).or_else(|| {
            let cloid = update.client_order_id.as_ref()?;
            [OrderSide::Buy, OrderSide::Sell].into_iter().find(|s| {
                self.state
                    .order(*s)
                    .map(|o| &o.client_order_id == cloid)
                    .unwrap_or(false)
            })
        }) {
            Some(side) => side,
            // Updates for orders we no longer (or never) track are
            // idempotent no-ops
            None => return,
        };

        match update.kind {
            OrderUpdateKind::Open => {
                if let Some(order) = self.state.order_mut(side) {
                    order.mark_open(Some(update.order_id), now_ms);
                }
            }
            OrderUpdateKind::Canceled => {
                if let Some(mut order) = self.state.clear_order(side) {
                    order.status = OrderStatus::CanceledOrUnknown;
                    self.state.counters.orders_canceled_or_unknown += 1;
                    debug!(%side, "Order cancelled (stream)");
                }
            }
            OrderUpdateKind::Rejected => {
                self.state.clear_order(side);
                debug!(%side, "Order rejected (stream)");
            }
            OrderUpdateKind::Filled => {
                // Terminal quantity accounting arrives via fill events;
                // only clear when those already marked the slot filled.
                let done = self
                    .state
                    .order(side)
                    .map(|o| o.is_fully_filled())
                    .unwrap_or(false);
                if done {
                    self.state.clear_order(side);
                }
            }
        }
    }

    fn apply_position_update(&mut self, event: PositionEvent) {
        self.state
            .set_position(event.venue, event.symbol.clone(), event.position);
        if event.venue == VenueRole::Primary && event.symbol == self.symbol {
            self.margin = MarginSignals {
                margin_ratio: event.margin_ratio,
                mark_price: event.mark_price,
                liquidation_price: event.liquidation_price,
            };
        }
    }

    // ------------------------------------------------------------------
    // Quoting helpers
    // ------------------------------------------------------------------

    /// Latest stream book, falling back to REST when stale.
    async fn current_book(&mut self, now_ms: u64) -> Option<BookTop> {
        let cached_fresh = self
            .state
            .book()
            .map(|b| b.is_valid() && b.age_ms(now_ms) <= self.config.book_stale_ms)
            .unwrap_or(false);
        if cached_fresh {
            return self.state.book().cloned();
        }

        match with_deadline(
            self.config.call_timeout_ms,
            self.primary.get_orderbook(self.symbol.clone(), 10),
        )
        .await
        {
            Ok(book) if book.is_valid() => {
                if let Some(mid) = book.mid() {
                    self.volatility.record(mid, now_ms);
                }
                self.state.set_book(book.clone());
                Some(book)
            }
            Ok(_) => None,
            Err(e) => {
                warn!(error = %e, "Order book fetch failed");
                None
            }
        }
    }

    /// Cancel-distance, queue-position and rebalance checks for one side.
    async fn maybe_cancel_side(
        &mut self,
        side: OrderSide,
        book: &BookTop,
        mid: Price,
        plan: &QuotePlan,
        now_ms: u64,
    ) {
        if !self.state.has_active(side) {
            return;
        }
        let (order_price, target) = {
            let order = self.state.order(side).expect("active side has an order");
            let target = match side {
                OrderSide::Buy => plan.bid_price,
                OrderSide::Sell => plan.ask_price,
            };
            (order.price, target)
        };
        let bps = Decimal::from(10000);

        // Too close to the adverse touch: cancel before it fills
        let adverse_distance_bps = match side {
            OrderSide::Buy => (book.best_ask.inner() - order_price.inner()) / mid.inner() * bps,
            OrderSide::Sell => (order_price.inner() - book.best_bid.inner()) / mid.inner() * bps,
        };
        if adverse_distance_bps <= self.config.cancel_distance_bps {
            self.cancel_side(side, "cancel distance", false, now_ms).await;
            return;
        }

        // Near the front of the same-side queue: cancel before it fills
        if self.config.queue_position_limit > 0 {
            let levels = match side {
                OrderSide::Buy => &book.bids,
                OrderSide::Sell => &book.asks,
            };
            if !levels.is_empty() {
                let better = levels
                    .iter()
                    .filter(|l| match side {
                        OrderSide::Buy => l.price > order_price,
                        OrderSide::Sell => l.price < order_price,
                    })
                    .count() as u32;
                if better < self.config.queue_position_limit {
                    self.cancel_side(side, "queue position", true, now_ms).await;
                    return;
                }
            }
        }

        // Drifted too far from the target: cancel, step 11 re-places
        let drift_bps =
            (target.inner() - order_price.inner()).abs() / mid.inner() * bps;
        if drift_bps >= self.config.rebalance_distance_bps {
            self.state.counters.record_rebalance(side);
            self.state.ops.record(
                now_ms,
                OperationKind::Rebalance,
                Some(side),
                Some(target),
                format!("drift {drift_bps} bps"),
            );
            self.cancel_side(side, "rebalance", false, now_ms).await;
        }
    }

    /// Cancel one side and clear the slot on confirmation. An unresolved
    /// outcome leaves the slot for the gate to settle; placement never
    /// races the cancel because both run inside this tick.
    async fn cancel_side(&mut self, side: OrderSide, reason: &str, queue_cancel: bool, now_ms: u64) {
        let target = {
            let order = match self.state.order(side) {
                Some(o) if o.status.is_active() => o,
                _ => return,
            };
            match &order.order_id {
                Some(oid) => CancelRef::OrderId(oid.clone()),
                None => CancelRef::ClientOrderId(order.client_order_id.clone()),
            }
        };

        match with_deadline(
            self.config.call_timeout_ms,
            self.primary.cancel_order(self.symbol.clone(), target),
        )
        .await
        {
            Ok(()) | Err(AdapterError::OrderNotFound) => {
                if let Some(order) = self.state.clear_order(side) {
                    self.state.counters.record_cancel(side, queue_cancel);
                    self.state.ops.record(
                        now_ms,
                        OperationKind::Cancel,
                        Some(side),
                        Some(order.price),
                        reason,
                    );
                    debug!(%side, price = %order.price, reason, "Order cancelled");
                }
            }
            Err(e) => {
                // Outcome unknown: keep the slot, reconcile next tick
                warn!(%side, error = %e, "Cancel unresolved");
            }
        }
    }

    async fn cancel_all(&mut self, reason: &str, now_ms: u64) {
        for side in [OrderSide::Buy, OrderSide::Sell] {
            self.cancel_side(side, reason, false, now_ms).await;
        }
    }

    async fn place_allowed_sides(&mut self, plan: &QuotePlan, report: &GateReport, now_ms: u64) {
        let sides = [
            (OrderSide::Buy, plan.allow_bid, plan.bid_price, plan.bid_qty),
            (OrderSide::Sell, plan.allow_ask, plan.ask_price, plan.ask_qty),
        ];
        for (side, allowed, price, qty) in sides {
            // A mid-loop pause or rate limit stops further placements
            if !self.state.status().is_running() || now_ms < self.rate_limited_until_ms {
                return;
            }
            if !allowed
                || self.state.has_active(side)
                || report.remote_on(side)
                || !self.throttle.can_place(side, now_ms)
            {
                continue;
            }
            self.place_side(side, price, qty, now_ms).await;
        }
    }

    /// Submit one side. The throttle is acquired *before* the request goes
    /// out so a slow reply cannot let a second attempt through.
    async fn place_side(&mut self, side: OrderSide, price: Price, qty: Qty, now_ms: u64) {
        if !self.throttle.try_acquire(side, now_ms) {
            return;
        }

        let client_order_id = ClientOrderId::new();
        self.state.set_order(OrderInfo::new(
            side,
            price,
            qty,
            client_order_id.clone(),
            now_ms,
        ));

        let request = PlaceOrder {
            symbol: self.symbol.clone(),
            side,
            price,
            qty,
            post_only: true,
            client_order_id,
        };
        let result = with_deadline(
            self.config.call_timeout_ms,
            self.primary.place_order(request),
        )
        .await;

        match result {
            Ok(ack) => {
                if let Some(order) = self.state.order_mut(side) {
                    order.mark_open(ack.order_id, now_ms);
                }
                self.state.counters.orders_placed += 1;
                self.state
                    .ops
                    .record(now_ms, OperationKind::Place, Some(side), Some(price), "quote");
                info!(%side, %price, %qty, "Order placed");
            }
            Err(AdapterError::PostOnlyRejected) => {
                // Non-error: clear the side, next tick decides again
                self.state.clear_order(side);
                self.state.counters.post_only_rejects += 1;
                debug!(%side, %price, "Post-only rejected");
            }
            Err(AdapterError::Unknown(msg)) => {
                // Keep the Pending slot; the gate resolves it next tick
                warn!(%side, %msg, "Place outcome unknown, awaiting reconciliation");
            }
            Err(AdapterError::RateLimited { retry_after_ms }) => {
                self.state.clear_order(side);
                let delay = retry_after_ms.unwrap_or(1000);
                self.rate_limited_until_ms = now_ms + delay;
                warn!(%side, delay_ms = delay, "Rate limited, pausing placements");
            }
            Err(AdapterError::InvalidRequest(msg)) => {
                self.state.clear_order(side);
                error!(%side, %price, %msg, "Invalid order dropped");
                self.state.ops.record(
                    now_ms,
                    OperationKind::Cancel,
                    Some(side),
                    Some(price),
                    format!("invalid request: {msg}"),
                );
            }
            Err(e) if e.is_unhealthy() => {
                self.state.clear_order(side);
                error!(%side, error = %e, "Adapter unhealthy, pausing");
                self.state
                    .set_status(EngineStatus::Paused(PauseReason::AdapterUnhealthy));
                self.state.ops.record(
                    now_ms,
                    OperationKind::Pause,
                    Some(side),
                    None,
                    format!("adapter unhealthy: {e}"),
                );
                self.cancel_all("adapter unhealthy", now_ms).await;
            }
            Err(e) => {
                // Transient failure with a definitive (negative) reply
                self.state.clear_order(side);
                warn!(%side, error = %e, "Place failed");
            }
        }
    }

    // ------------------------------------------------------------------
    // Snapshot
    // ------------------------------------------------------------------

    fn finish_tick(&mut self, now_ms: u64) {
        self.finish_tick_with(now_ms, false);
    }

    fn finish_tick_with(&mut self, now_ms: u64, safe_mode: bool) {
        // Uptime accounting over the active quotes
        if let Some(mid) = self.state.last_mid() {
            let bid = self
                .state
                .order(OrderSide::Buy)
                .filter(|o| o.status.is_active())
                .map(|o| o.price);
            let ask = self
                .state
                .order(OrderSide::Sell)
                .filter(|o| o.status.is_active())
                .map(|o| o.price);
            self.state.uptime.update(mid, bid, ask, now_ms);
        }
        self.publish_snapshot_with(now_ms, safe_mode);
    }

    fn publish_snapshot(&self, now_ms: u64) {
        self.publish_snapshot_with(now_ms, false);
    }

    fn publish_snapshot_with(&self, now_ms: u64, safe_mode: bool) {
        let positions = self
            .state
            .positions()
            .map(|((venue, symbol), qty)| PositionEntry {
                venue: *venue,
                symbol: symbol.to_string(),
                qty: *qty,
            })
            .collect();

        let snapshot = StatusSnapshot {
            status: self.state.status(),
            symbol: self.symbol.to_string(),
            positions,
            net_exposure: self.state.net_exposure(),
            bid_order: self.state.order(OrderSide::Buy).map(Into::into),
            ask_order: self.state.order(OrderSide::Sell).map(Into::into),
            volatility_bps: self.volatility.current_bps().to_f64().unwrap_or(0.0),
            counters: self.state.counters.clone(),
            uptime: self.state.uptime.stats(),
            operations: self.state.ops.to_vec(),
            recent_fills: self.state.recent_fills().cloned().collect(),
            hedge: self.hedge.as_ref().map(|h| h.stats()),
            hedge_paused: self.hedge.as_ref().map(|h| h.is_paused()).unwrap_or(false),
            instant_close: self.instant_close_enabled,
            safe_mode,
            consecutive_rest_failures: self.gate.consecutive_failures(),
            last_tick_ms: now_ms,
        };
        *self.snapshot.write() = snapshot;
    }
}
