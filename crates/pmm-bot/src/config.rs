//! Application configuration.

use std::path::Path;

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use tracing::warn;

use pmm_hedge::HedgeConfig;
use pmm_mm::MmConfig;
use pmm_risk::GuardConfig;

use crate::error::{AppError, AppResult};

/// Operating mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunMode {
    /// Simulated venue in memory; no connectivity required.
    #[default]
    Paper,
    /// Live venue adapters, provided by a venue-specific build.
    Live,
}

/// Synthetic venue parameters for paper mode.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PaperConfig {
    #[serde(default = "default_initial_bid")]
    pub initial_bid: Decimal,
    #[serde(default = "default_initial_ask")]
    pub initial_ask: Decimal,
    #[serde(default = "default_tick_size")]
    pub tick_size: Decimal,
    #[serde(default = "default_qty_step")]
    pub qty_step: Decimal,
    #[serde(default = "default_min_qty")]
    pub min_qty: Decimal,
}

fn default_initial_bid() -> Decimal {
    dec!(100000.0)
}
fn default_initial_ask() -> Decimal {
    dec!(100002.0)
}
fn default_tick_size() -> Decimal {
    dec!(0.1)
}
fn default_qty_step() -> Decimal {
    dec!(0.001)
}
fn default_min_qty() -> Decimal {
    dec!(0.001)
}

impl Default for PaperConfig {
    fn default() -> Self {
        Self {
            initial_bid: default_initial_bid(),
            initial_ask: default_initial_ask(),
            tick_size: default_tick_size(),
            qty_step: default_qty_step(),
            min_qty: default_min_qty(),
        }
    }
}

/// Telemetry configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TelemetryConfig {
    /// Directory for the append-only trade log.
    #[serde(default = "default_trade_log_dir")]
    pub trade_log_dir: String,
    /// Records buffered before a flush.
    #[serde(default = "default_trade_log_buffer")]
    pub trade_log_buffer: usize,
    /// Status snapshot reporting interval.
    #[serde(default = "default_snapshot_interval_ms")]
    pub snapshot_interval_ms: u64,
}

fn default_trade_log_dir() -> String {
    "./data/trades".to_string()
}
fn default_trade_log_buffer() -> usize {
    64
}
fn default_snapshot_interval_ms() -> u64 {
    1000
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            trade_log_dir: default_trade_log_dir(),
            trade_log_buffer: default_trade_log_buffer(),
            snapshot_interval_ms: default_snapshot_interval_ms(),
        }
    }
}

/// Application configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub mode: RunMode,
    /// Primary-account symbol.
    #[serde(default = "default_symbol")]
    pub symbol: String,
    /// Hedge-account symbol; defaults to the primary symbol.
    #[serde(default)]
    pub hedge_symbol: Option<String>,
    #[serde(default)]
    pub mm: MmConfig,
    #[serde(default)]
    pub hedge: HedgeConfig,
    #[serde(default)]
    pub guard: GuardConfig,
    #[serde(default)]
    pub paper: PaperConfig,
    #[serde(default)]
    pub telemetry: TelemetryConfig,
}

fn default_symbol() -> String {
    "BTC-USD".to_string()
}

impl AppConfig {
    /// Load from a file, falling back to defaults when it does not exist.
    pub fn load(path: &str) -> AppResult<Self> {
        if Path::new(path).exists() {
            Self::from_file(path)
        } else {
            warn!(path = %path, "Config file not found, using defaults");
            let config = Self::default_with_symbol();
            config.validate()?;
            Ok(config)
        }
    }

    fn default_with_symbol() -> Self {
        Self {
            symbol: default_symbol(),
            ..Self::default()
        }
    }

    pub fn from_file(path: &str) -> AppResult<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| AppError::Config(format!("Failed to read config: {e}")))?;
        let config: Self = toml::from_str(&content)
            .map_err(|e| AppError::Config(format!("Failed to parse config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> AppResult<()> {
        if self.symbol.is_empty() {
            return Err(AppError::Config("symbol must not be empty".to_string()));
        }
        self.mm.validate()?;
        if self.paper.initial_bid >= self.paper.initial_ask {
            return Err(AppError::Config(
                "paper.initial_bid must be below paper.initial_ask".to_string(),
            ));
        }
        Ok(())
    }

    /// Hedge-account symbol, defaulting to the primary one.
    pub fn hedge_symbol(&self) -> String {
        self.hedge_symbol
            .clone()
            .unwrap_or_else(|| self.symbol.clone())
    }
}
