//! Second-account hedge engine.
//!
//! Subscribes to the executor's fill channel (no back-reference) and keeps
//! net exposure near zero: every primary fill is mirrored by an opposing
//! market order on the hedge account, and a periodic sweep reduces any
//! residual imbalance. Hedge failures never touch the quoting loop; they
//! pause this subsystem only.

pub mod config;
pub mod engine;
pub mod stats;

pub use config::HedgeConfig;
pub use engine::{HedgeEngine, HedgeOutcome, HedgeRequest};
pub use stats::{HedgeStats, HedgeStatsSnapshot};
