//! The PMM quoting engine core.
//!
//! `Executor` owns all state mutation and runs the tick state machine:
//! stream drain, protection gates (hard stop, liquidation guard,
//! volatility), pricing, per-side cancel checks, REST reconciliation and
//! placement. `Engine` wraps it in a fixed-cadence loop fed by a control
//! channel; status flows out through a copy-on-read snapshot handle.

pub mod control;
pub mod deadline;
pub mod error;
pub mod executor;
pub mod reconcile;
pub mod runner;

pub use control::{CloseScope, ControlCommand, PositionEntry, SnapshotHandle, StatusSnapshot};
pub use error::{EngineError, EngineResult};
pub use executor::Executor;
pub use reconcile::{GateReport, ReconcileGate};
pub use runner::Engine;
