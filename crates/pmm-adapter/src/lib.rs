//! Exchange adapter abstraction for the PMM quoting engine.
//!
//! A venue is represented by one `ExchangeAdapter` instance per account
//! (primary and hedge). Implementations encapsulate signing, endpoint
//! mapping, symbol translation and stream framing; the core only depends
//! on the operations defined here.
//!
//! The trait is dyn-compatible via the `BoxFuture` pattern so that the
//! executor can hold `Arc<dyn ExchangeAdapter>` and tests can inject
//! doubles.

pub mod adapter;
pub mod error;
pub mod mock;
pub mod paper;
pub mod streams;

pub use adapter::{
    BoxFuture, CancelRef, DynAdapter, ExchangeAdapter, OrderAck, PlaceOrder, RemoteOrder,
};
pub use error::{AdapterError, AdapterResult};
pub use mock::MockAdapter;
pub use paper::PaperAdapter;
pub use streams::StreamQueue;
