//! Rate limiting utilities

use governor::{
    clock::DefaultClock,
    state::{InMemoryState, NotKeyed},
    Quota, RateLimiter,
};
use std::num::NonZeroU32;
use std::sync::Arc;

/// Rate limiter type alias
pub type Limiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock>;

/// Create a rate limiter with the specified requests per second
pub fn create_limiter(requests_per_second: u32) -> Arc<Limiter> {
    let quota = Quota::per_second(NonZeroU32::new(requests_per_second).unwrap_or(NonZeroU32::MIN));
    Arc::new(RateLimiter::direct(quota))
}

/// Action button trigger flood limit (per participant)
pub const TRIGGER_RATE_LIMIT: u32 = 10; // Max 10 trigger requests per second

/// Per-participant rate limiter state
#[derive(Clone)]
pub struct PlayerRateLimiter {
    trigger_limiter: Arc<Limiter>,
}

impl PlayerRateLimiter {
    pub fn new(triggers_per_second: u32) -> Self {
        Self {
            trigger_limiter: create_limiter(triggers_per_second),
        }
    }

    /// Check if a trigger request is allowed (returns true if allowed)
    pub fn check_trigger(&self) -> bool {
        self.trigger_limiter.check().is_ok()
    }
}

impl Default for PlayerRateLimiter {
    fn default() -> Self {
        Self::new(TRIGGER_RATE_LIMIT)
    }
}

impl std::fmt::Debug for PlayerRateLimiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlayerRateLimiter").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn burst_beyond_quota_is_rejected() {
        let limiter = PlayerRateLimiter::new(3);
        let allowed = (0..10).filter(|_| limiter.check_trigger()).count();
        assert_eq!(allowed, 3);
    }

    #[test]
    fn zero_quota_falls_back_to_one() {
        let limiter = PlayerRateLimiter::new(0);
        assert!(limiter.check_trigger());
        assert!(!limiter.check_trigger());
    }
}
