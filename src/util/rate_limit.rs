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

/// Max WebSocket messages per second per connection
pub const MESSAGE_RATE_LIMIT: u32 = 30;

/// Max find_match requests per second per connection
pub const MATCHMAKING_RATE_LIMIT: u32 = 2;

/// Per-connection rate limiter state
#[derive(Clone)]
pub struct ConnectionRateLimiter {
    messages: Arc<Limiter>,
    matchmaking: Arc<Limiter>,
}

impl ConnectionRateLimiter {
    pub fn new() -> Self {
        Self {
            messages: create_limiter(MESSAGE_RATE_LIMIT),
            matchmaking: create_limiter(MATCHMAKING_RATE_LIMIT),
        }
    }

    /// Check if an incoming message is allowed (returns true if allowed)
    pub fn check_message(&self) -> bool {
        self.messages.check().is_ok()
    }

    pub fn check_matchmaking(&self) -> bool {
        self.matchmaking.check().is_ok()
    }
}

impl Default for ConnectionRateLimiter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn burst_is_capped() {
        let limiter = ConnectionRateLimiter::new();
        let allowed = (0..100).filter(|_| limiter.check_message()).count();
        assert!(allowed >= MESSAGE_RATE_LIMIT as usize);
        assert!(allowed < 100);
    }
}
