//! Time utilities for cooldowns and script budgets

use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

/// Get current Unix timestamp in milliseconds
pub fn unix_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or(Duration::ZERO)
        .as_millis() as u64
}

/// Simulated match time covered by `ticks` steps of `tick_interval_ms`
pub fn simulated_millis(ticks: u64, tick_interval_ms: u64) -> u64 {
    ticks.saturating_mul(tick_interval_ms)
}

/// A simple timer for measuring durations
#[derive(Debug, Clone)]
pub struct Timer {
    start: Instant,
}

impl Timer {
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }

    pub fn elapsed_micros(&self) -> u64 {
        self.start.elapsed().as_micros() as u64
    }

    /// Deadline `budget` after the timer started
    pub fn deadline(&self, budget: Duration) -> Instant {
        self.start + budget
    }
}

impl Default for Timer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn simulated_time_scales_with_ticks() {
        assert_eq!(simulated_millis(0, 100), 0);
        assert_eq!(simulated_millis(25, 100), 2_500);
        assert_eq!(simulated_millis(u64::MAX, 2), u64::MAX);
    }

    #[test]
    fn deadline_is_after_start() {
        let timer = Timer::new();
        let deadline = timer.deadline(Duration::from_millis(50));
        assert!(deadline > Instant::now() - Duration::from_millis(1));
    }
}
