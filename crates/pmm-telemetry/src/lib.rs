//! Telemetry: structured logging setup and the per-session audit trade
//! log.

pub mod error;
pub mod logging;
pub mod trade_log;

pub use error::{TelemetryError, TelemetryResult};
pub use logging::init_logging;
pub use trade_log::{TradeLogWriter, TradeRecord};
