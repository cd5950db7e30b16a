//! Application orchestration.
//!
//! Builds the adapter pair, wires the executor, hedge engine, control
//! channel and status reporter, and runs until ctrl-c.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tracing::{info, warn};

use pmm_adapter::{DynAdapter, PaperAdapter, StreamQueue};
use pmm_core::{BookTop, Price, Qty, Symbol, SymbolMeta};
use pmm_engine::{ControlCommand, Engine, Executor, SnapshotHandle};
use pmm_hedge::{HedgeEngine, HedgeRequest};
use pmm_telemetry::TradeLogWriter;

use crate::config::{AppConfig, RunMode};
use crate::error::{AppError, AppResult};

/// Queue capacity for adapter stream events.
const STREAM_QUEUE_CAPACITY: usize = 1024;
/// Queue capacity for hedge fill requests.
const HEDGE_CHANNEL_CAPACITY: usize = 256;

/// The assembled application.
pub struct Application {
    config: AppConfig,
    primary: DynAdapter,
    hedge_adapter: DynAdapter,
}

impl Application {
    pub fn new(config: AppConfig) -> AppResult<Self> {
        let (primary, hedge_adapter) = match config.mode {
            RunMode::Paper => Self::build_paper_adapters(&config),
            RunMode::Live => {
                return Err(AppError::Config(
                    "live venue adapters are supplied by venue-specific builds; \
                     run in paper mode or wire an ExchangeAdapter here"
                        .to_string(),
                ));
            }
        };

        Ok(Self {
            config,
            primary,
            hedge_adapter,
        })
    }

    fn build_paper_adapters(config: &AppConfig) -> (DynAdapter, DynAdapter) {
        let meta = SymbolMeta::new(
            Price::new(config.paper.tick_size),
            Qty::new(config.paper.qty_step),
            Qty::new(config.paper.min_qty),
        );
        let book = BookTop::new(
            Price::new(config.paper.initial_bid),
            Price::new(config.paper.initial_ask),
            0,
        );

        let primary: DynAdapter = Arc::new(PaperAdapter::new(
            "paper-primary",
            Symbol::from(config.symbol.as_str()),
            meta.clone(),
            book.clone(),
        ));
        let hedge: DynAdapter = Arc::new(PaperAdapter::new(
            "paper-hedge",
            Symbol::from(config.hedge_symbol().as_str()),
            meta,
            book,
        ));
        (primary, hedge)
    }

    /// Run the engine, reporter and hedge tasks until shutdown.
    pub async fn run(self) -> AppResult<()> {
        let symbol = Symbol::from(self.config.symbol.as_str());
        let queue = Arc::new(StreamQueue::new(STREAM_QUEUE_CAPACITY));

        let trade_log = TradeLogWriter::new(
            &self.config.telemetry.trade_log_dir,
            self.config.telemetry.trade_log_buffer,
        );

        let mut executor = Executor::new(
            symbol.clone(),
            self.primary.clone(),
            queue.clone(),
            self.config.mm.clone(),
            self.config.guard.clone(),
        )
        .with_trade_log(trade_log);

        // Hedge engine on its own task, fed through the fill channel
        let mut hedge_handle = None;
        if self.config.hedge.enabled {
            let hedge_engine = Arc::new(HedgeEngine::new(
                self.primary.clone(),
                self.hedge_adapter.clone(),
                symbol.clone(),
                Symbol::from(self.config.hedge_symbol().as_str()),
                self.config.hedge.clone(),
            ));
            let (fill_tx, fill_rx) = mpsc::channel::<HedgeRequest>(HEDGE_CHANNEL_CAPACITY);
            executor = executor.with_hedge(hedge_engine.clone(), fill_tx);
            hedge_handle = Some(tokio::spawn(hedge_engine.run(fill_rx)));
            info!("Hedge engine enabled");
        }

        let snapshot = executor.snapshot_handle();
        let (control_tx, control_rx) = mpsc::channel::<ControlCommand>(16);

        let reporter = tokio::spawn(Self::report_status(
            snapshot,
            self.config.telemetry.snapshot_interval_ms,
        ));

        let engine = Engine::new(executor, control_rx);
        let engine_handle = tokio::spawn(engine.run());

        // Shutdown path: ctrl-c triggers a graceful drain, closing the
        // control channel halts the runner.
        tokio::signal::ctrl_c()
            .await
            .map_err(|e| AppError::Config(format!("signal handler failed: {e}")))?;
        info!("Shutdown signal received");

        if control_tx.send(ControlCommand::Stop).await.is_err() {
            warn!("Engine already gone at shutdown");
        }
        drop(control_tx);

        engine_handle.await??;
        reporter.abort();
        if let Some(handle) = hedge_handle {
            // The fill channel sender lives in the executor; the engine
            // task dropping it ends the hedge loop.
            handle.await?;
        }

        info!("Shutdown complete");
        Ok(())
    }

    /// Periodic one-line status summary from the snapshot handle.
    async fn report_status(snapshot: SnapshotHandle, interval_ms: u64) {
        let mut interval = tokio::time::interval(Duration::from_millis(interval_ms.max(100)));
        loop {
            interval.tick().await;
            let snap = snapshot.read().clone();
            info!(
                status = %snap.status,
                net = %snap.net_exposure,
                vol_bps = snap.volatility_bps,
                fills = snap.counters.total_fills,
                placed = snap.counters.orders_placed,
                bid = ?snap.bid_order.as_ref().map(|o| o.price.to_string()),
                ask = ?snap.ask_order.as_ref().map(|o| o.price.to_string()),
                safe_mode = snap.safe_mode,
                "Status"
            );
        }
    }
}
