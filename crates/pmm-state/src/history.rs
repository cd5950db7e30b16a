//! Bounded operation history.
//!
//! Every externally-visible action gets one record; the façade reads the
//! most recent entries from the status snapshot.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use pmm_core::{OrderSide, Price};

/// What happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperationKind {
    Place,
    Cancel,
    Rebalance,
    Fill,
    Hedge,
    Pause,
    Resume,
    Stop,
}

/// One operation-log entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperationRecord {
    pub ts_ms: u64,
    pub action: OperationKind,
    pub side: Option<OrderSide>,
    pub price: Option<Price>,
    pub reason: String,
}

/// Ring of the most recent operations.
#[derive(Debug)]
pub struct OperationLog {
    records: VecDeque<OperationRecord>,
    max_size: usize,
}

impl Default for OperationLog {
    fn default() -> Self {
        Self::new(50)
    }
}

impl OperationLog {
    pub fn new(max_size: usize) -> Self {
        Self {
            records: VecDeque::with_capacity(max_size),
            max_size,
        }
    }

    pub fn record(
        &mut self,
        ts_ms: u64,
        action: OperationKind,
        side: Option<OrderSide>,
        price: Option<Price>,
        reason: impl Into<String>,
    ) {
        if self.records.len() == self.max_size {
            self.records.pop_front();
        }
        self.records.push_back(OperationRecord {
            ts_ms,
            action,
            side,
            price,
            reason: reason.into(),
        });
    }

    /// Oldest-first copy of the retained records.
    pub fn to_vec(&self) -> Vec<OperationRecord> {
        self.records.iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_records_in_order() {
        let mut log = OperationLog::new(10);
        log.record(1, OperationKind::Place, Some(OrderSide::Buy), None, "quote");
        log.record(2, OperationKind::Cancel, Some(OrderSide::Buy), None, "drift");

        let v = log.to_vec();
        assert_eq!(v.len(), 2);
        assert_eq!(v[0].action, OperationKind::Place);
        assert_eq!(v[1].action, OperationKind::Cancel);
    }

    #[test]
    fn test_ring_evicts_oldest() {
        let mut log = OperationLog::new(3);
        for i in 0..5u64 {
            log.record(i, OperationKind::Fill, None, None, format!("f{i}"));
        }

        let v = log.to_vec();
        assert_eq!(v.len(), 3);
        assert_eq!(v[0].ts_ms, 2);
        assert_eq!(v[2].ts_ms, 4);
    }

    #[test]
    fn test_record_carries_price() {
        let mut log = OperationLog::new(3);
        log.record(
            9,
            OperationKind::Place,
            Some(OrderSide::Sell),
            Some(Price::new(dec!(100081.1))),
            "quote",
        );
        assert_eq!(log.to_vec()[0].price.unwrap().inner(), dec!(100081.1));
    }
}
