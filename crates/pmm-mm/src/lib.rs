//! Market-making primitives: configuration, quote pricing, volatility
//! tracking, fill deduplication and per-side order throttling.
//!
//! Everything here is pure, synchronous state driven by the executor tick;
//! no I/O happens in this crate.

pub mod config;
pub mod dedup;
pub mod quote_engine;
pub mod throttle;
pub mod volatility;

pub use config::{MmConfig, MmConfigPatch, StrategyMode};
pub use dedup::EventDedup;
pub use quote_engine::{compute_quotes, QuoteInputs, QuotePlan};
pub use throttle::OrderThrottle;
pub use volatility::VolatilityTracker;
