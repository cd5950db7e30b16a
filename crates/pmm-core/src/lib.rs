//! Core domain types for the PMM quoting engine.
//!
//! This crate provides fundamental types used throughout the market maker:
//! - `Price`, `Qty`: precision-safe decimal newtypes
//! - `Symbol`, `VenueRole`, `SymbolMeta`: instrument identification
//! - `BookTop`: top-of-book snapshot with validity checks
//! - `OrderInfo`, `OrderStatus`: per-side order lifecycle tracking
//! - `StreamEvent`: tagged union of all private/public stream events
//! - `EngineStatus`, `PauseReason`: quoting state machine status

pub mod decimal;
pub mod error;
pub mod events;
pub mod market;
pub mod order;

pub use decimal::{Price, Qty};
pub use error::{CoreError, Result};
pub use events::{
    EngineStatus, FillEvent, OrderUpdateEvent, OrderUpdateKind, PauseReason, PositionEvent,
    StreamEvent,
};
pub use market::{BookLevel, BookState, BookTop, Symbol, SymbolMeta, VenueRole};
pub use order::{ClientOrderId, OrderInfo, OrderSide, OrderStatus};
