//! Market-making configuration.
//!
//! A flat config object snapshotted at tick start; mid-tick changes take
//! effect on the next tick. Runtime updates arrive as an `MmConfigPatch`
//! merged through the control surface.

use pmm_core::{CoreError, Result};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

/// Quoting strategy.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StrategyMode {
    /// Quote at a fixed distance from mid. Targets uptime-program credit.
    #[default]
    Uptime,
    /// Join the top of book on both sides. Targets maker rebates.
    Rebate,
}

/// Market-making configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MmConfig {
    // --- Quote ---
    /// Quote distance from mid in basis points (uptime mode).
    #[serde(default = "default_order_distance_bps")]
    pub order_distance_bps: Decimal,
    /// Cancel when the adverse top of book comes within this distance.
    #[serde(default = "default_cancel_distance_bps")]
    pub cancel_distance_bps: Decimal,
    /// Cancel and re-place when the target drifts this far from the
    /// resting price.
    #[serde(default = "default_rebalance_distance_bps")]
    pub rebalance_distance_bps: Decimal,
    /// Cancel when the resting order sits within the top N levels of the
    /// adverse side (0 disables the check).
    #[serde(default = "default_queue_position_limit")]
    pub queue_position_limit: u32,
    #[serde(default)]
    pub strategy_mode: StrategyMode,

    // --- Position ---
    /// Per-side order quantity.
    #[serde(default = "default_order_size")]
    pub order_size: Decimal,
    /// Soft cap: the growing side stops quoting at this position.
    #[serde(default = "default_max_position")]
    pub max_position: Decimal,
    /// Hard stop: pause and cancel everything at this position.
    #[serde(default = "default_hard_stop_position")]
    pub hard_stop_position: Decimal,
    /// Position below which hard-stop resume confirmation begins.
    #[serde(default = "default_resume_position")]
    pub resume_position: Decimal,
    #[serde(default = "default_hard_stop_cooldown_sec")]
    pub hard_stop_cooldown_sec: u64,
    /// Consecutive confirming ticks required to leave the hard stop.
    #[serde(default = "default_resume_confirm_count")]
    pub resume_confirm_count: u32,

    // --- Volatility ---
    #[serde(default = "default_volatility_window_sec")]
    pub volatility_window_sec: u64,
    #[serde(default = "default_pause_threshold_bps")]
    pub pause_threshold_bps: Decimal,
    #[serde(default = "default_resume_threshold_bps")]
    pub resume_threshold_bps: Decimal,
    /// Volatility must stay below the resume threshold for this long.
    #[serde(default = "default_stable_seconds")]
    pub stable_seconds: u64,

    // --- Execution ---
    #[serde(default = "default_tick_interval_ms")]
    pub tick_interval_ms: u64,
    /// Per-side cool-down between placement attempts.
    #[serde(default = "default_order_throttle_sec")]
    pub order_throttle_sec: u64,
    /// Grace window before a remotely-missing order is declared gone.
    #[serde(default = "default_disappear_grace_sec")]
    pub disappear_grace_sec: u64,
    #[serde(default = "default_event_dedup_ttl_sec")]
    pub event_dedup_ttl_sec: u64,
    /// Depth snapshot age beyond which the tick falls back to REST.
    #[serde(default = "default_book_stale_ms")]
    pub book_stale_ms: u64,
    /// Deadline applied to every adapter call.
    #[serde(default = "default_call_timeout_ms")]
    pub call_timeout_ms: u64,

    // --- Inventory skew ---
    #[serde(default = "default_true")]
    pub inventory_skew_enabled: bool,
    /// Pushes the growing side away per unit of inventory ratio.
    #[serde(default = "default_push_bps")]
    pub push_bps: Decimal,
    /// Pulls the reducing side closer per unit of inventory ratio.
    #[serde(default = "default_pull_bps")]
    pub pull_bps: Decimal,

    // --- Break-even reversion ---
    #[serde(default)]
    pub breakeven_enabled: bool,
    /// Margin above/below the average entry kept by the closing side.
    #[serde(default = "default_breakeven_margin_bps")]
    pub breakeven_margin_bps: Decimal,
}

fn default_order_distance_bps() -> Decimal {
    dec!(8)
}
fn default_cancel_distance_bps() -> Decimal {
    dec!(3)
}
fn default_rebalance_distance_bps() -> Decimal {
    dec!(20)
}
fn default_queue_position_limit() -> u32 {
    0
}
fn default_order_size() -> Decimal {
    dec!(0.01)
}
fn default_max_position() -> Decimal {
    dec!(0.05)
}
fn default_hard_stop_position() -> Decimal {
    dec!(0.035)
}
fn default_resume_position() -> Decimal {
    dec!(0.02)
}
fn default_hard_stop_cooldown_sec() -> u64 {
    30
}
fn default_resume_confirm_count() -> u32 {
    3
}
fn default_volatility_window_sec() -> u64 {
    5
}
fn default_pause_threshold_bps() -> Decimal {
    dec!(5)
}
fn default_resume_threshold_bps() -> Decimal {
    dec!(3)
}
fn default_stable_seconds() -> u64 {
    3
}
fn default_tick_interval_ms() -> u64 {
    100
}
fn default_order_throttle_sec() -> u64 {
    2
}
fn default_disappear_grace_sec() -> u64 {
    5
}
fn default_event_dedup_ttl_sec() -> u64 {
    60
}
fn default_book_stale_ms() -> u64 {
    1500
}
fn default_call_timeout_ms() -> u64 {
    2000
}
fn default_push_bps() -> Decimal {
    dec!(6)
}
fn default_pull_bps() -> Decimal {
    dec!(2)
}
fn default_breakeven_margin_bps() -> Decimal {
    dec!(1)
}
fn default_true() -> bool {
    true
}

impl Default for MmConfig {
    fn default() -> Self {
        Self {
            order_distance_bps: default_order_distance_bps(),
            cancel_distance_bps: default_cancel_distance_bps(),
            rebalance_distance_bps: default_rebalance_distance_bps(),
            queue_position_limit: default_queue_position_limit(),
            strategy_mode: StrategyMode::default(),
            order_size: default_order_size(),
            max_position: default_max_position(),
            hard_stop_position: default_hard_stop_position(),
            resume_position: default_resume_position(),
            hard_stop_cooldown_sec: default_hard_stop_cooldown_sec(),
            resume_confirm_count: default_resume_confirm_count(),
            volatility_window_sec: default_volatility_window_sec(),
            pause_threshold_bps: default_pause_threshold_bps(),
            resume_threshold_bps: default_resume_threshold_bps(),
            stable_seconds: default_stable_seconds(),
            tick_interval_ms: default_tick_interval_ms(),
            order_throttle_sec: default_order_throttle_sec(),
            disappear_grace_sec: default_disappear_grace_sec(),
            event_dedup_ttl_sec: default_event_dedup_ttl_sec(),
            book_stale_ms: default_book_stale_ms(),
            call_timeout_ms: default_call_timeout_ms(),
            inventory_skew_enabled: default_true(),
            push_bps: default_push_bps(),
            pull_bps: default_pull_bps(),
            breakeven_enabled: false,
            breakeven_margin_bps: default_breakeven_margin_bps(),
        }
    }
}

impl MmConfig {
    /// Validate cross-field consistency.
    pub fn validate(&self) -> Result<()> {
        if !self.order_size.is_sign_positive() || self.order_size.is_zero() {
            return Err(CoreError::InvalidConfig(
                "order_size must be positive".to_string(),
            ));
        }
        if self.max_position < self.order_size {
            return Err(CoreError::InvalidConfig(
                "max_position must be at least order_size".to_string(),
            ));
        }
        if self.hard_stop_position > self.max_position {
            return Err(CoreError::InvalidConfig(
                "hard_stop_position must not exceed max_position".to_string(),
            ));
        }
        if self.resume_position >= self.hard_stop_position {
            return Err(CoreError::InvalidConfig(
                "resume_position must be below hard_stop_position".to_string(),
            ));
        }
        if self.resume_threshold_bps >= self.pause_threshold_bps {
            return Err(CoreError::InvalidConfig(
                "resume_threshold_bps must be below pause_threshold_bps".to_string(),
            ));
        }
        if self.tick_interval_ms == 0 {
            return Err(CoreError::InvalidConfig(
                "tick_interval_ms must be positive".to_string(),
            ));
        }
        if self.resume_confirm_count == 0 {
            return Err(CoreError::InvalidConfig(
                "resume_confirm_count must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Partial config for runtime updates. Unset fields keep their value.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MmConfigPatch {
    pub order_distance_bps: Option<Decimal>,
    pub cancel_distance_bps: Option<Decimal>,
    pub rebalance_distance_bps: Option<Decimal>,
    pub queue_position_limit: Option<u32>,
    pub strategy_mode: Option<StrategyMode>,
    pub order_size: Option<Decimal>,
    pub max_position: Option<Decimal>,
    pub hard_stop_position: Option<Decimal>,
    pub resume_position: Option<Decimal>,
    pub hard_stop_cooldown_sec: Option<u64>,
    pub resume_confirm_count: Option<u32>,
    pub volatility_window_sec: Option<u64>,
    pub pause_threshold_bps: Option<Decimal>,
    pub resume_threshold_bps: Option<Decimal>,
    pub stable_seconds: Option<u64>,
    pub tick_interval_ms: Option<u64>,
    pub order_throttle_sec: Option<u64>,
    pub disappear_grace_sec: Option<u64>,
    pub event_dedup_ttl_sec: Option<u64>,
    pub book_stale_ms: Option<u64>,
    pub call_timeout_ms: Option<u64>,
    pub inventory_skew_enabled: Option<bool>,
    pub push_bps: Option<Decimal>,
    pub pull_bps: Option<Decimal>,
    pub breakeven_enabled: Option<bool>,
    pub breakeven_margin_bps: Option<Decimal>,
}

macro_rules! merge_field {
    ($cfg:ident, $patch:ident, $($field:ident),+ $(,)?) => {
        $(
            if let Some(v) = $patch.$field {
                $cfg.$field = v;
            }
        )+
    };
}

impl MmConfigPatch {
    /// Merge into a config, returning the merged copy after validation.
    pub fn apply(&self, base: &MmConfig) -> Result<MmConfig> {
        let mut cfg = base.clone();
        let patch = self.clone();
        merge_field!(
            cfg,
            patch,
            order_distance_bps,
            cancel_distance_bps,
            rebalance_distance_bps,
            queue_position_limit,
            strategy_mode,
            order_size,
            max_position,
            hard_stop_position,
            resume_position,
            hard_stop_cooldown_sec,
            resume_confirm_count,
            volatility_window_sec,
            pause_threshold_bps,
            resume_threshold_bps,
            stable_seconds,
            tick_interval_ms,
            order_throttle_sec,
            disappear_grace_sec,
            event_dedup_ttl_sec,
            book_stale_ms,
            call_timeout_ms,
            inventory_skew_enabled,
            push_bps,
            pull_bps,
            breakeven_enabled,
            breakeven_margin_bps,
        );
        cfg.validate()?;
        Ok(cfg)
    }
}
