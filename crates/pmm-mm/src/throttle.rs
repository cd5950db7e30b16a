//! Per-side order throttle.
//!
//! Prevents rapid re-submission of the same side. The contract that
//! matters: `try_acquire` records the attempt atomically with the check and
//! is called *before* the async place request is issued, closing the race
//! where two nearly-simultaneous ticks both see `can_place` true.

use std::collections::HashMap;

use pmm_core::OrderSide;

/// Per-side placement cool-down.
#[derive(Debug)]
pub struct OrderThrottle {
    cooldown_ms: u64,
    last_attempt: HashMap<OrderSide, u64>,
}

impl OrderThrottle {
    pub fn new(cooldown_sec: u64) -> Self {
        Self {
            cooldown_ms: cooldown_sec * 1000,
            last_attempt: HashMap::new(),
        }
    }

    pub fn set_cooldown_sec(&mut self, cooldown_sec: u64) {
        self.cooldown_ms = cooldown_sec * 1000;
    }

    /// Check only; does not record.
    pub fn can_place(&self, side: OrderSide, now_ms: u64) -> bool {
        match self.last_attempt.get(&side) {
            Some(last) => now_ms.saturating_sub(*last) >= self.cooldown_ms,
            None => true,
        }
    }

    /// Check and record in one step. Returns false when still cooling down.
    pub fn try_acquire(&mut self, side: OrderSide, now_ms: u64) -> bool {
        if !self.can_place(side, now_ms) {
            return false;
        }
        self.last_attempt.insert(side, now_ms);
        true
    }

    /// Reset one side, or both when `side` is `None`.
    pub fn reset(&mut self, side: Option<OrderSide>) {
        match side {
            Some(s) => {
                self.last_attempt.remove(&s);
            }
            None => self.last_attempt.clear(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fresh_throttle_allows_both_sides() {
        let t = OrderThrottle::new(2);
        assert!(t.can_place(OrderSide::Buy, 0));
        assert!(t.can_place(OrderSide::Sell, 0));
    }

    #[test]
    fn test_acquire_starts_cooldown() {
        let mut t = OrderThrottle::new(2);
        assert!(t.try_acquire(OrderSide::Buy, 1_000));
        assert!(!t.can_place(OrderSide::Buy, 2_500));
        assert!(!t.try_acquire(OrderSide::Buy, 2_500));
        assert!(t.try_acquire(OrderSide::Buy, 3_000));
    }

    #[test]
    fn test_sides_are_independent() {
        let mut t = OrderThrottle::new(2);
        assert!(t.try_acquire(OrderSide::Buy, 1_000));
        assert!(t.try_acquire(OrderSide::Sell, 1_000));
    }

    #[test]
    fn test_successive_attempts_spaced_by_cooldown() {
        let mut t = OrderThrottle::new(2);
        let mut granted = Vec::new();
        for now in (0..10_000).step_by(100) {
            if t.try_acquire(OrderSide::Buy, now) {
                granted.push(now);
            }
        }
        for pair in granted.windows(2) {
            assert!(pair[1] - pair[0] >= 2_000);
        }
    }

    #[test]
    fn test_reset_single_side() {
        let mut t = OrderThrottle::new(2);
        t.try_acquire(OrderSide::Buy, 1_000);
        t.try_acquire(OrderSide::Sell, 1_000);

        t.reset(Some(OrderSide::Buy));
        assert!(t.can_place(OrderSide::Buy, 1_001));
        assert!(!t.can_place(OrderSide::Sell, 1_001));
    }

    #[test]
    fn test_reset_all() {
        let mut t = OrderThrottle::new(2);
        t.try_acquire(OrderSide::Buy, 1_000);
        t.try_acquire(OrderSide::Sell, 1_000);

        t.reset(None);
        assert!(t.can_place(OrderSide::Buy, 1_001));
        assert!(t.can_place(OrderSide::Sell, 1_001));
    }
}
