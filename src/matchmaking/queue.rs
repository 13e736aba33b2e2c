//! Matchmaking queue implementation

use std::collections::{HashSet, VecDeque};
use std::time::{Duration, Instant};
use uuid::Uuid;

/// Player in the matchmaking queue
#[derive(Debug, Clone)]
pub struct QueuedPlayer {
    pub player_id: Uuid,
    pub queued_at: Instant,
}

impl QueuedPlayer {
    pub fn new(player_id: Uuid) -> Self {
        Self {
            player_id,
            queued_at: Instant::now(),
        }
    }

    /// How long this player has been waiting
    pub fn wait_time(&self) -> Duration {
        self.queued_at.elapsed()
    }
}

/// First-in first-out queue of players waiting for a 1v1
#[derive(Debug, Default)]
pub struct MatchmakingQueue {
    queue: VecDeque<QueuedPlayer>,
}

impl MatchmakingQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a player and return their 1-based position. Re-queueing keeps the
    /// original place.
    pub fn enqueue(&mut self, player: QueuedPlayer) -> usize {
        if let Some(pos) = self.position(&player.player_id) {
            return pos;
        }
        self.queue.push_back(player);
        self.queue.len()
    }

    /// Remove a player from the queue
    pub fn dequeue(&mut self, player_id: Uuid) -> Option<QueuedPlayer> {
        let pos = self.queue.iter().position(|p| p.player_id == player_id)?;
        self.queue.remove(pos)
    }

    /// 1-based position of a queued player
    pub fn position(&self, player_id: &Uuid) -> Option<usize> {
        self.queue
            .iter()
            .position(|p| &p.player_id == player_id)
            .map(|i| i + 1)
    }

    /// Check if a player is in the queue
    pub fn contains(&self, player_id: &Uuid) -> bool {
        self.position(player_id).is_some()
    }

    /// Get queue length
    pub fn len(&self) -> usize {
        self.queue.len()
    }

    /// Check if queue is empty
    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// Longest current wait
    pub fn oldest_wait(&self) -> Option<Duration> {
        self.queue.front().map(QueuedPlayer::wait_time)
    }

    /// Drop players that are no longer connected
    pub fn retain_connected(&mut self, connected: &HashSet<Uuid>) -> usize {
        let before = self.queue.len();
        self.queue.retain(|p| connected.contains(&p.player_id));
        before - self.queue.len()
    }

    /// Take the two oldest players, if there are two
    pub fn pop_pair(&mut self) -> Option<(QueuedPlayer, QueuedPlayer)> {
        if self.queue.len() < 2 {
            return None;
        }
        let first = self.queue.pop_front()?;
        let second = self.queue.pop_front()?;
        Some((first, second))
    }
}
