//! Matchmaking - FIFO pairing of connected players into rooms

pub mod queue;
pub mod service;

pub use service::{MatchmakingError, MatchmakingService};
