//! Control surface and status snapshots.
//!
//! Commands arrive from the dashboard façade over a channel and are
//! handled between ticks; status flows the other way through a shared
//! copy-on-read snapshot updated at the end of every tick and read by the
//! reporter task at >= 1 Hz.

use std::sync::Arc;

use parking_lot::RwLock;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use pmm_core::{EngineStatus, FillEvent, VenueRole};
use pmm_hedge::HedgeStatsSnapshot;
use pmm_mm::MmConfigPatch;
use pmm_state::{OperationRecord, OrderSlotSummary, SessionCounters, UptimeStats};

/// Which account(s) a close-all targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CloseScope {
    Primary,
    Hedge,
    Both,
}

/// Operator commands consumed by the engine runner between ticks.
#[derive(Debug, Clone)]
pub enum ControlCommand {
    /// Begin quoting. Precondition: not already running.
    Start,
    /// Graceful drain: cancel everything, wait for acks, halt.
    Stop,
    /// Merge a partial config; effective next tick.
    UpdateConfig(MmConfigPatch),
    SetHedgeEnabled(bool),
    /// When enabled, primary fills are immediately closed at market on
    /// the primary account instead of hedged. The façade enforces mutual
    /// exclusion with hedging.
    SetInstantCloseEnabled(bool),
    /// Market-close the selected account(s).
    CloseAll(CloseScope),
    /// Operator reset of the liquidation guard latch.
    ClearLiquidationHalt,
}

/// One venue position for the snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PositionEntry {
    pub venue: VenueRole,
    pub symbol: String,
    pub qty: Decimal,
}

/// Point-in-time engine status for the façade.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusSnapshot {
    pub status: EngineStatus,
    pub symbol: String,
    pub positions: Vec<PositionEntry>,
    pub net_exposure: Decimal,
    pub bid_order: Option<OrderSlotSummary>,
    pub ask_order: Option<OrderSlotSummary>,
    pub volatility_bps: f64,
    pub counters: SessionCounters,
    pub uptime: UptimeStats,
    /// Oldest-first recent operations.
    pub operations: Vec<OperationRecord>,
    /// Oldest-first recent fills.
    pub recent_fills: Vec<FillEvent>,
    pub hedge: Option<HedgeStatsSnapshot>,
    pub hedge_paused: bool,
    pub instant_close: bool,
    pub safe_mode: bool,
    pub consecutive_rest_failures: u32,
    pub last_tick_ms: u64,
}

impl Default for StatusSnapshot {
    fn default() -> Self {
        Self {
            status: EngineStatus::Stopped,
            symbol: String::new(),
            positions: Vec::new(),
            net_exposure: Decimal::ZERO,
            bid_order: None,
            ask_order: None,
            volatility_bps: 0.0,
            counters: SessionCounters::default(),
            uptime: UptimeStats::default(),
            operations: Vec::new(),
            recent_fills: Vec::new(),
            hedge: None,
            hedge_paused: false,
            instant_close: false,
            safe_mode: false,
            consecutive_rest_failures: 0,
            last_tick_ms: 0,
        }
    }
}

/// Shared copy-on-read snapshot handle.
pub type SnapshotHandle = Arc<RwLock<StatusSnapshot>>;

/// Fresh handle holding a default (stopped) snapshot.
pub fn new_snapshot_handle() -> SnapshotHandle {
    Arc::new(RwLock::new(StatusSnapshot::default()))
}
