//! Fill-event deduplication.
//!
//! The same fill can arrive on several channels or be replayed on a
//! reconnect. Entries are keyed by `(order_id, cumulative_filled_qty)` with
//! a TTL so that memory stays bounded; expiry is lazy. Applied to fills
//! only; order-status events are idempotent in effect.

use std::collections::HashMap;

use rust_decimal::Decimal;

use pmm_core::Qty;

/// Bounded duplicate-fill filter.
#[derive(Debug)]
pub struct EventDedup {
    ttl_ms: u64,
    capacity: usize,
    seen: HashMap<(String, Decimal), u64>,
}

impl EventDedup {
    pub fn new(ttl_sec: u64, capacity: usize) -> Self {
        Self {
            ttl_ms: ttl_sec * 1000,
            capacity,
            seen: HashMap::new(),
        }
    }

    pub fn set_ttl_sec(&mut self, ttl_sec: u64) {
        self.ttl_ms = ttl_sec * 1000;
    }

    /// Check-and-record: true iff this `(order_id, cum_filled)` was already
    /// seen within the TTL. A fresh key is recorded as seen.
    pub fn is_duplicate(&mut self, order_id: &str, cum_filled: Qty, now_ms: u64) -> bool {
        let ttl = self.ttl_ms;
        self.seen.retain(|_, t| now_ms.saturating_sub(*t) < ttl);

        let key = (order_id.to_string(), cum_filled.inner());
        if self.seen.contains_key(&key) {
            return true;
        }

        if self.seen.len() >= self.capacity {
            // Evict the oldest entry to stay bounded
            if let Some(oldest) = self
                .seen
                .iter()
                .min_by_key(|(_, t)| **t)
                .map(|(k, _)| k.clone())
            {
                self.seen.remove(&oldest);
            }
        }

        self.seen.insert(key, now_ms);
        false
    }

    pub fn len(&self) -> usize {
        self.seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }

    pub fn clear(&mut self) {
        self.seen.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn qty(v: Decimal) -> Qty {
        Qty::new(v)
    }

    #[test]
    fn test_first_occurrence_is_fresh() {
        let mut d = EventDedup::new(60, 1024);
        assert!(!d.is_duplicate("oid-x", qty(dec!(0.01)), 1_000));
    }

    #[test]
    fn test_replay_within_ttl_is_duplicate() {
        let mut d = EventDedup::new(60, 1024);
        assert!(!d.is_duplicate("oid-x", qty(dec!(0.01)), 1_000));
        assert!(d.is_duplicate("oid-x", qty(dec!(0.01)), 1_500));
        assert!(d.is_duplicate("oid-x", qty(dec!(0.01)), 60_999));
    }

    #[test]
    fn test_distinct_cum_levels_are_fresh() {
        let mut d = EventDedup::new(60, 1024);
        assert!(!d.is_duplicate("oid-x", qty(dec!(0.01)), 1_000));
        assert!(!d.is_duplicate("oid-x", qty(dec!(0.02)), 1_100));
    }

    #[test]
    fn test_expired_key_is_fresh_again() {
        let mut d = EventDedup::new(60, 1024);
        assert!(!d.is_duplicate("oid-x", qty(dec!(0.01)), 1_000));
        // 60s later the entry has expired; same key counts as new
        assert!(!d.is_duplicate("oid-x", qty(dec!(0.01)), 61_000));
    }

    #[test]
    fn test_capacity_evicts_oldest() {
        let mut d = EventDedup::new(3600, 2);
        assert!(!d.is_duplicate("a", qty(dec!(1)), 1));
        assert!(!d.is_duplicate("b", qty(dec!(1)), 2));
        assert!(!d.is_duplicate("c", qty(dec!(1)), 3)); // evicts "a"

        assert_eq!(d.len(), 2);
        assert!(!d.is_duplicate("a", qty(dec!(1)), 4)); // fresh again
    }

    #[test]
    fn test_clear() {
        let mut d = EventDedup::new(60, 16);
        d.is_duplicate("a", qty(dec!(1)), 1);
        d.clear();
        assert!(d.is_empty());
        assert!(!d.is_duplicate("a", qty(dec!(1)), 2));
    }
}
