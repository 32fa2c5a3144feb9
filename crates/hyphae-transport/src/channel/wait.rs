//! Tiered waiting for ring channel producers and consumers.
//!
//! A waiter first busy-spins (lowest wake-up latency), then yields its time
//! slice, then falls back to short timed parks so an idle consumer does not
//! peg a core indefinitely.

use hyphae_config::WaitTiers;
use std::thread;
use std::time::Instant;

/// Progressive backoff driven by [`WaitTiers`]
#[derive(Debug, Clone)]
pub struct Backoff {
    tiers: WaitTiers,
    step: u64,
}

impl Backoff {
    pub fn new(tiers: WaitTiers) -> Self {
        Self { tiers, step: 0 }
    }

    /// Wait for one step of the current tier
    pub fn snooze(&mut self) {
        if self.step < self.spin_limit() {
            std::hint::spin_loop();
        } else if self.step < self.yield_limit() {
            thread::yield_now();
        } else {
            thread::park_timeout(self.tiers.park_duration());
        }
        self.step = self.step.saturating_add(1);
    }

    /// Wait for one step without sleeping past `deadline`.
    ///
    /// Returns `false` once the deadline has passed.
    pub fn snooze_until(&mut self, deadline: Instant) -> bool {
        let now = Instant::now();
        if now >= deadline {
            return false;
        }

        if self.is_parking() {
            let remaining = deadline - now;
            thread::park_timeout(remaining.min(self.tiers.park_duration()));
            self.step = self.step.saturating_add(1);
        } else {
            self.snooze();
        }
        true
    }

    /// Whether the spin and yield tiers are exhausted
    pub fn is_parking(&self) -> bool {
        self.step >= self.yield_limit()
    }

    /// Start again from the spin tier
    pub fn reset(&mut self) {
        self.step = 0;
    }

    fn spin_limit(&self) -> u64 {
        u64::from(self.tiers.spin_iters)
    }

    fn yield_limit(&self) -> u64 {
        self.spin_limit() + u64::from(self.tiers.yield_iters)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn tiers() -> WaitTiers {
        WaitTiers {
            spin_iters: 3,
            yield_iters: 2,
            park_ns: 1_000,
        }
    }

    #[test]
    fn test_backoff_progresses_through_tiers() {
        let mut backoff = Backoff::new(tiers());

        for _ in 0..5 {
            assert!(!backoff.is_parking());
            backoff.snooze();
        }
        assert!(backoff.is_parking());

        backoff.reset();
        assert!(!backoff.is_parking());
    }

    #[test]
    fn test_snooze_until_respects_deadline() {
        let mut backoff = Backoff::new(tiers());
        let deadline = Instant::now() + Duration::from_millis(5);

        let start = Instant::now();
        while backoff.snooze_until(deadline) {}

        assert!(start.elapsed() >= Duration::from_millis(5));
        assert!(start.elapsed() < Duration::from_secs(1));
    }

    #[test]
    fn test_snooze_until_past_deadline() {
        let mut backoff = Backoff::new(tiers());
        assert!(!backoff.snooze_until(Instant::now() - Duration::from_millis(1)));
    }
}
