//! Hedge execution: fill mirroring, retries, fallback, periodic sweep.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::RwLock;
use rust_decimal::Decimal;
use tokio::sync::mpsc;
use tracing::{error, info, warn};

use pmm_adapter::DynAdapter;
use pmm_core::{OrderSide, Price, Qty, Symbol};

use crate::config::HedgeConfig;
use crate::stats::{HedgeStats, HedgeStatsSnapshot};

/// A primary-account fill to mirror on the hedge account.
#[derive(Debug, Clone)]
pub struct HedgeRequest {
    /// Order that produced the primary fill.
    pub source_order_id: String,
    /// Primary fill side; the hedge order takes the opposite side.
    pub side: OrderSide,
    pub qty: Qty,
    pub price: Price,
    pub ts_ms: u64,
}

/// Outcome of one hedge execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HedgeOutcome {
    /// Hedge order filled on the hedge account.
    Hedged,
    /// Hedge failed; the position was closed on the primary account
    /// instead.
    FallbackClosed,
    /// Hedge and fallback both failed; the subsystem is paused.
    Failed,
    /// Skipped: hedging disabled or paused.
    Skipped,
}

/// Keeps net exposure near zero across the two accounts.
///
/// Runs on its own task; the executor publishes fills into the request
/// channel and never waits on hedge I/O.
pub struct HedgeEngine {
    primary: DynAdapter,
    hedge: DynAdapter,
    primary_symbol: Symbol,
    hedge_symbol: Symbol,
    config: RwLock<HedgeConfig>,
    enabled: AtomicBool,
    /// Latched after a terminal failure; cleared by the operator.
    paused: AtomicBool,
    stats: HedgeStats,
}

impl HedgeEngine {
    pub fn new(
        primary: DynAdapter,
        hedge: DynAdapter,
        primary_symbol: Symbol,
        hedge_symbol: Symbol,
        config: HedgeConfig,
    ) -> Self {
        let enabled = config.enabled;
        Self {
            primary,
            hedge,
            primary_symbol,
            hedge_symbol,
            config: RwLock::new(config),
            enabled: AtomicBool::new(enabled),
            paused: AtomicBool::new(false),
            stats: HedgeStats::new(),
        }
    }

    pub fn set_enabled(&self, enabled: bool) {
        info!(enabled, "Hedge enabled flag changed");
        self.enabled.store(enabled, Ordering::SeqCst);
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::SeqCst)
    }

    pub fn is_paused(&self) -> bool {
        self.paused.load(Ordering::SeqCst)
    }

    /// Operator reset after investigating a hedge failure.
    pub fn clear_pause(&self) {
        self.paused.store(false, Ordering::SeqCst);
    }

    pub fn set_config(&self, config: HedgeConfig) {
        *self.config.write() = config;
    }

    pub fn stats(&self) -> HedgeStatsSnapshot {
        self.stats.snapshot()
    }

    /// Consume fill requests and run the periodic sweep until the channel
    /// closes.
    pub async fn run(self: Arc<Self>, mut rx: mpsc::Receiver<HedgeRequest>) {
        let sweep_interval = {
            let cfg = self.config.read();
            Duration::from_secs(cfg.sweep_interval_sec.max(1))
        };
        let mut sweep = tokio::time::interval(sweep_interval);
        sweep.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                req = rx.recv() => {
                    match req {
                        Some(req) => {
                            self.execute_hedge(req).await;
                        }
                        None => {
                            info!("Fill channel closed, hedge engine exiting");
                            return;
                        }
                    }
                }
                _ = sweep.tick() => {
                    self.sweep().await;
                }
            }
        }
    }

    /// Mirror a primary fill with an opposing market order on the hedge
    /// account. Retries with exponential backoff; falls back to a
    /// reduce-only close on the primary account when every attempt fails.
    pub async fn execute_hedge(&self, req: HedgeRequest) -> HedgeOutcome {
        if !self.is_enabled() || self.is_paused() {
            return HedgeOutcome::Skipped;
        }
        let cfg = self.config.read().clone();
        let hedge_side = req.side.opposite();
        let started = Instant::now();

        info!(
            source = %req.source_order_id,
            side = %hedge_side,
            qty = %req.qty,
            "Hedge execution started"
        );

        for attempt in 1..=cfg.max_retries.max(1) {
            self.stats.record_attempt();

            let call = self.hedge.place_market(
                self.hedge_symbol.clone(),
                hedge_side,
                req.qty,
                false,
            );
            match tokio::time::timeout(Duration::from_millis(cfg.timeout_ms), call).await {
                Ok(Ok(ack)) => {
                    let latency_ms = started.elapsed().as_millis() as u64;
                    self.stats.record_success(latency_ms);
                    info!(
                        order_id = ?ack.order_id,
                        attempt,
                        latency_ms,
                        "Hedge filled"
                    );
                    return HedgeOutcome::Hedged;
                }
                Ok(Err(e)) => {
                    warn!(attempt, error = %e, "Hedge attempt failed");
                }
                Err(_) => {
                    warn!(attempt, timeout_ms = cfg.timeout_ms, "Hedge attempt timed out");
                }
            }

            if attempt < cfg.max_retries {
                let backoff = cfg.retry_delay_ms.saturating_mul(1 << (attempt - 1));
                tokio::time::sleep(Duration::from_millis(backoff)).await;
            }
        }

        // Terminal failure: pause the subsystem and try to flatten the
        // exposure on the primary account instead.
        self.stats.record_failure();
        self.paused.store(true, Ordering::SeqCst);
        error!(
            source = %req.source_order_id,
            retries = cfg.max_retries,
            "Hedge failed after all retries, closing on primary"
        );

        let fallback = self.primary.place_market(
            self.primary_symbol.clone(),
            req.side.opposite(),
            req.qty,
            true,
        );
        match tokio::time::timeout(Duration::from_millis(cfg.timeout_ms), fallback).await {
            Ok(Ok(_)) => {
                self.stats.record_fallback();
                info!("Fallback close on primary succeeded");
                HedgeOutcome::FallbackClosed
            }
            Ok(Err(e)) => {
                error!(error = %e, "Fallback close failed; manual intervention required");
                HedgeOutcome::Failed
            }
            Err(_) => {
                error!("Fallback close timed out; manual intervention required");
                HedgeOutcome::Failed
            }
        }
    }

    /// Market-close the hedge account.
    pub async fn close_all(&self) -> bool {
        match self.hedge.market_close_all(self.hedge_symbol.clone()).await {
            Ok(()) => {
                info!("Hedge account closed");
                true
            }
            Err(e) => {
                error!(error = %e, "Hedge close-all failed");
                false
            }
        }
    }

    /// Reduce residual net exposure across the two accounts.
    pub async fn sweep(&self) -> Option<Qty> {
        if !self.is_enabled() || self.is_paused() {
            return None;
        }
        let cfg = self.config.read().clone();

        let primary_pos = match self.primary.get_position(self.primary_symbol.clone()).await {
            Ok(p) => p,
            Err(e) => {
                warn!(error = %e, "Sweep: primary position query failed");
                return None;
            }
        };
        let hedge_pos = match self.hedge.get_position(self.hedge_symbol.clone()).await {
            Ok(p) => p,
            Err(e) => {
                warn!(error = %e, "Sweep: hedge position query failed");
                return None;
            }
        };

        let net = primary_pos + hedge_pos;
        self.stats.record_sweep();
        if net.abs() <= cfg.max_unhedged {
            return None;
        }

        // Long net exposure is sold down on the hedge account, short is
        // bought back.
        let side = if net > Decimal::ZERO {
            OrderSide::Sell
        } else {
            OrderSide::Buy
        };
        let qty = Qty::new(net.abs());

        info!(%net, %side, %qty, "Sweep placing reducing hedge order");
        match self
            .hedge
            .place_market(self.hedge_symbol.clone(), side, qty, false)
            .await
        {
            Ok(_) => Some(qty),
            Err(e) => {
                warn!(error = %e, "Sweep order failed");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pmm_adapter::{AdapterError, MockAdapter};
    use rust_decimal_macros::dec;

    fn engine_with(cfg: HedgeConfig) -> (Arc<HedgeEngine>, Arc<MockAdapter>, Arc<MockAdapter>) {
        let primary = Arc::new(MockAdapter::with_defaults("primary"));
        let hedge = Arc::new(MockAdapter::with_defaults("hedge"));
        let engine = Arc::new(HedgeEngine::new(
            primary.clone(),
            hedge.clone(),
            Symbol::from("BTC-USD"),
            Symbol::from("BTC-USD-PERP"),
            cfg,
        ));
        (engine, primary, hedge)
    }

    fn fast_config() -> HedgeConfig {
        HedgeConfig {
            enabled: true,
            max_unhedged: dec!(0.005),
            sweep_interval_sec: 30,
            timeout_ms: 200,
            max_retries: 3,
            retry_delay_ms: 5,
        }
    }

    fn request() -> HedgeRequest {
        HedgeRequest {
            source_order_id: "oid-1".to_string(),
            side: OrderSide::Buy,
            qty: Qty::new(dec!(0.01)),
            price: Price::new(dec!(99920.9)),
            ts_ms: 1_000,
        }
    }

    #[tokio::test]
    async fn test_hedge_opposes_primary_fill() {
        let (engine, _primary, hedge) = engine_with(fast_config());

        let outcome = engine.execute_hedge(request()).await;

        assert_eq!(outcome, HedgeOutcome::Hedged);
        let calls = hedge.market_calls();
        assert_eq!(calls.len(), 1);
        // Primary buy fill -> hedge sells
        assert_eq!(calls[0].0, OrderSide::Sell);
        assert_eq!(calls[0].1.inner(), dec!(0.01));
        assert_eq!(engine.stats().successes, 1);
    }

    #[tokio::test]
    async fn test_retry_then_success() {
        let (engine, _primary, hedge) = engine_with(fast_config());
        hedge.script_market(Err(AdapterError::Transient("503".to_string())));

        let outcome = engine.execute_hedge(request()).await;

        assert_eq!(outcome, HedgeOutcome::Hedged);
        assert_eq!(hedge.market_calls().len(), 2);
        assert_eq!(engine.stats().attempts, 2);
        assert!(!engine.is_paused());
    }

    #[tokio::test]
    async fn test_exhausted_retries_fall_back_to_primary_close() {
        let (engine, primary, hedge) = engine_with(fast_config());
        for _ in 0..3 {
            hedge.script_market(Err(AdapterError::Transient("down".to_string())));
        }

        let outcome = engine.execute_hedge(request()).await;

        assert_eq!(outcome, HedgeOutcome::FallbackClosed);
        // Fallback is an opposing reduce-only close on the primary account
        let calls = primary.market_calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].0, OrderSide::Sell);
        assert!(calls[0].2);
        // The subsystem pauses after a terminal failure
        assert!(engine.is_paused());
        assert_eq!(engine.stats().failures, 1);
        assert_eq!(engine.stats().fallbacks, 1);
    }

    #[tokio::test]
    async fn test_paused_engine_skips() {
        let (engine, _primary, hedge) = engine_with(fast_config());
        for _ in 0..3 {
            hedge.script_market(Err(AdapterError::Transient("down".to_string())));
        }
        engine.execute_hedge(request()).await;
        assert!(engine.is_paused());

        let outcome = engine.execute_hedge(request()).await;
        assert_eq!(outcome, HedgeOutcome::Skipped);

        engine.clear_pause();
        assert_eq!(engine.execute_hedge(request()).await, HedgeOutcome::Hedged);
    }

    #[tokio::test]
    async fn test_disabled_engine_skips() {
        let (engine, _primary, hedge) = engine_with(HedgeConfig {
            enabled: false,
            ..fast_config()
        });

        assert_eq!(engine.execute_hedge(request()).await, HedgeOutcome::Skipped);
        assert!(hedge.market_calls().is_empty());
    }

    #[tokio::test]
    async fn test_sweep_reduces_net_exposure() {
        let (engine, primary, hedge) = engine_with(fast_config());
        primary.set_position(dec!(0.03));
        hedge.set_position(dec!(-0.01)); // net +0.02 > 0.005

        let reduced = engine.sweep().await;

        assert_eq!(reduced.unwrap().inner(), dec!(0.02));
        let calls = hedge.market_calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].0, OrderSide::Sell);
    }

    #[tokio::test]
    async fn test_sweep_ignores_balanced_books() {
        let (engine, primary, hedge) = engine_with(fast_config());
        primary.set_position(dec!(0.01));
        hedge.set_position(dec!(-0.008)); // net 0.002 <= 0.005

        assert!(engine.sweep().await.is_none());
        assert!(hedge.market_calls().is_empty());
    }

    #[tokio::test]
    async fn test_sweep_buys_back_short_exposure() {
        let (engine, primary, hedge) = engine_with(fast_config());
        primary.set_position(dec!(-0.02));
        hedge.set_position(dec!(0));

        let reduced = engine.sweep().await;

        assert_eq!(reduced.unwrap().inner(), dec!(0.02));
        assert_eq!(hedge.market_calls()[0].0, OrderSide::Buy);
    }

    #[tokio::test]
    async fn test_run_processes_channel_and_exits_on_close() {
        let (engine, _primary, hedge) = engine_with(fast_config());
        let (tx, rx) = mpsc::channel(8);

        let handle = tokio::spawn(engine.clone().run(rx));
        tx.send(request()).await.unwrap();
        drop(tx);

        handle.await.unwrap();
        assert_eq!(hedge.market_calls().len(), 1);
    }
}
