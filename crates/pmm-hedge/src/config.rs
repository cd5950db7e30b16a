//! Hedge engine configuration.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Hedge engine knobs.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HedgeConfig {
    #[serde(default)]
    pub enabled: bool,
    /// Net exposure magnitude above which the sweep places a reducing
    /// order.
    #[serde(default = "default_max_unhedged")]
    pub max_unhedged: Decimal,
    #[serde(default = "default_sweep_interval_sec")]
    pub sweep_interval_sec: u64,
    /// Deadline for each hedge order attempt.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// Base delay between retries; doubles each attempt.
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,
}

fn default_max_unhedged() -> Decimal {
    Decimal::new(5, 3) // 0.005
}
fn default_sweep_interval_sec() -> u64 {
    30
}
fn default_timeout_ms() -> u64 {
    1000
}
fn default_max_retries() -> u32 {
    3
}
fn default_retry_delay_ms() -> u64 {
    100
}

impl Default for HedgeConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            max_unhedged: default_max_unhedged(),
            sweep_interval_sec: default_sweep_interval_sec(),
            timeout_ms: default_timeout_ms(),
            max_retries: default_max_retries(),
            retry_delay_ms: default_retry_delay_ms(),
        }
    }
}
