//! Time utilities for the match simulation

use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

/// Get current Unix timestamp in milliseconds
pub fn unix_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or(Duration::ZERO)
        .as_millis() as u64
}

/// Server start time for uptime tracking
static SERVER_START: std::sync::OnceLock<Instant> = std::sync::OnceLock::new();

/// Initialize server start time (call once at startup)
pub fn init_server_time() {
    SERVER_START.get_or_init(Instant::now);
}

/// Get server uptime in seconds
pub fn uptime_secs() -> u64 {
    SERVER_START
        .get()
        .map(|start| start.elapsed().as_secs())
        .unwrap_or(0)
}

/// Tick rate configuration
pub const SIMULATION_TPS: u32 = 5; // 5 ticks per second during live play
pub const TICK_MILLIS: u64 = 1_000 / SIMULATION_TPS as u64;
/// Phase countdowns advance once per second in every phase
pub const PHASE_MILLIS: u64 = 1_000;

pub fn tick_interval() -> Duration {
    Duration::from_millis(TICK_MILLIS)
}

pub fn phase_interval() -> Duration {
    Duration::from_millis(PHASE_MILLIS)
}

/// Delta time of one simulation tick (in seconds)
pub fn tick_delta() -> f32 {
    1.0 / SIMULATION_TPS as f32
}

/// Whole ticks in `secs` seconds
pub const fn secs_to_ticks(secs: u32) -> u32 {
    secs * SIMULATION_TPS
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tick_constants_agree() {
        assert_eq!(TICK_MILLIS, 200);
        assert!((tick_delta() - 0.2).abs() < f32::EPSILON);
        assert_eq!(secs_to_ticks(40), 200);
        assert_eq!(tick_interval(), Duration::from_millis(200));
    }
}
