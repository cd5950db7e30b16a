//! Hard-stop entry and auto-resume hysteresis.
//!
//! Entry: `|position| >= hard_stop_position` while running. Resume needs
//! all of: the cooldown elapsed since entry, and `resume_confirm_count`
//! *consecutive* ticks observing `|position| < resume_position`. A single
//! failing tick resets the confirmation counter.

use rust_decimal::Decimal;
use tracing::{info, warn};

/// Hard-stop state machine. Driven once per tick by the executor.
#[derive(Debug)]
pub struct HardStopTracker {
    hard_stop_position: Decimal,
    resume_position: Decimal,
    cooldown_ms: u64,
    confirm_count: u32,

    entered_at_ms: Option<u64>,
    confirm_counter: u32,
}

impl HardStopTracker {
    pub fn new(
        hard_stop_position: Decimal,
        resume_position: Decimal,
        cooldown_sec: u64,
        confirm_count: u32,
    ) -> Self {
        Self {
            hard_stop_position,
            resume_position,
            cooldown_ms: cooldown_sec * 1000,
            confirm_count,
            entered_at_ms: None,
            confirm_counter: 0,
        }
    }

    pub fn set_params(
        &mut self,
        hard_stop_position: Decimal,
        resume_position: Decimal,
        cooldown_sec: u64,
        confirm_count: u32,
    ) {
        self.hard_stop_position = hard_stop_position;
        self.resume_position = resume_position;
        self.cooldown_ms = cooldown_sec * 1000;
        self.confirm_count = confirm_count;
    }

    pub fn is_active(&self) -> bool {
        self.entered_at_ms.is_some()
    }

    pub fn entered_at_ms(&self) -> Option<u64> {
        self.entered_at_ms
    }

    /// True when the position magnitude breaches the hard stop.
    pub fn should_enter(&self, position: Decimal) -> bool {
        !self.is_active() && position.abs() >= self.hard_stop_position
    }

    /// Latch the hard stop.
    pub fn enter(&mut self, position: Decimal, now_ms: u64) {
        warn!(%position, threshold = %self.hard_stop_position, "Hard stop entered");
        self.entered_at_ms = Some(now_ms);
        self.confirm_counter = 0;
    }

    /// One resume-check tick. Returns true exactly once, when the resume
    /// conditions are fully met; the tracker then resets to inactive.
    pub fn check_resume(&mut self, position: Decimal, now_ms: u64) -> bool {
        let entered = match self.entered_at_ms {
            Some(ts) => ts,
            None => return false,
        };

        if now_ms.saturating_sub(entered) < self.cooldown_ms {
            return false;
        }

        if position.abs() < self.resume_position {
            self.confirm_counter += 1;
        } else {
            self.confirm_counter = 0;
            return false;
        }

        if self.confirm_counter >= self.confirm_count {
            info!(%position, confirmations = self.confirm_counter, "Hard stop released");
            self.entered_at_ms = None;
            self.confirm_counter = 0;
            return true;
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn tracker() -> HardStopTracker {
        // Hard stop 0.035, resume 0.02, 30s cooldown, 3 confirming ticks
        HardStopTracker::new(dec!(0.035), dec!(0.02), 30, 3)
    }

    #[test]
    fn test_entry_threshold() {
        let t = tracker();
        assert!(!t.should_enter(dec!(0.034)));
        assert!(t.should_enter(dec!(0.035)));
        assert!(t.should_enter(dec!(0.044)));
        assert!(t.should_enter(dec!(-0.04))); // magnitude, not sign
    }

    #[test]
    fn test_no_resume_during_cooldown() {
        let mut t = tracker();
        t.enter(dec!(0.044), 0);

        // Flat immediately, but inside the 30s cooldown
        assert!(!t.check_resume(dec!(0), 10_000));
        assert!(!t.check_resume(dec!(0), 29_999));
        assert!(t.is_active());
    }

    #[test]
    fn test_resume_needs_consecutive_confirmations() {
        let mut t = tracker();
        t.enter(dec!(0.044), 0);

        assert!(!t.check_resume(dec!(0.01), 31_000)); // 1
        assert!(!t.check_resume(dec!(0.01), 31_100)); // 2
        assert!(t.check_resume(dec!(0.01), 31_200)); // 3 -> released
        assert!(!t.is_active());
    }

    #[test]
    fn test_failing_tick_resets_counter() {
        let mut t = tracker();
        t.enter(dec!(0.044), 0);

        assert!(!t.check_resume(dec!(0.01), 31_000)); // 1
        assert!(!t.check_resume(dec!(0.03), 31_100)); // above resume -> reset
        assert!(!t.check_resume(dec!(0.01), 31_200)); // 1
        assert!(!t.check_resume(dec!(0.01), 31_300)); // 2
        assert!(t.check_resume(dec!(0.01), 31_400)); // 3
    }

    #[test]
    fn test_boundary_position_does_not_confirm() {
        let mut t = tracker();
        t.enter(dec!(0.044), 0);

        // Exactly at resume_position: strict inequality required
        assert!(!t.check_resume(dec!(0.02), 31_000));
        assert!(!t.check_resume(dec!(0.02), 31_100));
        assert!(!t.check_resume(dec!(0.02), 31_200));
        assert!(t.is_active());
    }

    #[test]
    fn test_released_tracker_can_reenter() {
        let mut t = tracker();
        t.enter(dec!(0.044), 0);
        for i in 0..3 {
            t.check_resume(dec!(0.01), 31_000 + i * 100);
        }
        assert!(!t.is_active());
        assert!(t.should_enter(dec!(0.04)));
    }
}
