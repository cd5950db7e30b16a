//! Authoritative in-process state for the PMM quoting engine.
//!
//! `MmState` is owned and mutated exclusively by the executor tick; every
//! other component consumes read-only snapshots. Alongside the per-side
//! orders and position map it carries session counters, uptime-program
//! tier accounting, average-entry tracking and the bounded operation log.

pub mod counters;
pub mod entry;
pub mod history;
pub mod state;
pub mod uptime;

pub use counters::SessionCounters;
pub use entry::EntryTracker;
pub use history::{OperationKind, OperationLog, OperationRecord};
pub use state::{MmState, OrderSlotSummary};
pub use uptime::{UptimeMeter, UptimeStats};
