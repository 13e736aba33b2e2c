//! Matchmaking service - tracks connections, pairs players and creates rooms

use dashmap::DashMap;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::MatchConfig;
use crate::game::map::MapData;
use crate::game::room::{spawn_room, RoomCommand, RoomHandle, RoomRegistry};
use crate::game::soldier::PlayerNumber;
use crate::ws::protocol::ServerMsg;

use super::queue::{MatchmakingQueue, QueuedPlayer};

/// How often the queue is scanned for pairs
pub const PAIRING_INTERVAL: Duration = Duration::from_millis(500);

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MatchmakingError {
    #[error("Already in a match")]
    AlreadyInMatch,

    #[error("Not connected")]
    NotConnected,
}

/// A live WebSocket connection for a player id
#[derive(Debug, Clone)]
struct Connection {
    /// Distinguishes a reconnect from the socket it replaced
    token: Uuid,
    outbound: mpsc::Sender<ServerMsg>,
}

/// Matchmaking service
#[derive(Clone)]
pub struct MatchmakingService {
    queue: Arc<Mutex<MatchmakingQueue>>,
    registry: Arc<RoomRegistry>,
    connections: Arc<DashMap<Uuid, Connection>>,
    map: Arc<MapData>,
    match_config: MatchConfig,
}

impl MatchmakingService {
    pub fn new(registry: Arc<RoomRegistry>, map: Arc<MapData>, match_config: MatchConfig) -> Self {
        Self {
            queue: Arc::new(Mutex::new(MatchmakingQueue::new())),
            registry,
            connections: Arc::new(DashMap::new()),
            map,
            match_config,
        }
    }

    /// Register a connection (called when a WebSocket connects). If the
    /// player still holds a seat in a room, the room is told to reattach.
    /// Returns the connection token needed to unregister.
    pub async fn register_player(
        &self,
        player_id: Uuid,
        outbound: mpsc::Sender<ServerMsg>,
    ) -> Uuid {
        let token = Uuid::new_v4();
        self.connections.insert(
            player_id,
            Connection {
                token,
                outbound: outbound.clone(),
            },
        );

        if let Some((room, player)) = self.registry.room_of(&player_id) {
            info!(player_id = %player_id, room_id = %room.id, "Reattaching to room");
            if room
                .tx
                .send(RoomCommand::Reconnected { player, outbound })
                .await
                .is_err()
            {
                debug!(player_id = %player_id, "Room already closed");
            }
        }
        token
    }

    /// Unregister a connection (called when a WebSocket closes)
    pub async fn unregister_player(&self, player_id: Uuid, token: Uuid) {
        // A newer socket for the same player replaced this one
        if self
            .connections
            .remove_if(&player_id, |_, c| c.token == token)
            .is_none()
        {
            return;
        }

        self.queue.lock().await.dequeue(player_id);

        if let Some((room, player)) = self.registry.room_of(&player_id) {
            let _ = room.tx.send(RoomCommand::Disconnected { player }).await;
        }
        info!(player_id = %player_id, "Player unregistered from matchmaking");
    }

    /// Join matchmaking queue, returning the queue position
    pub async fn join_queue(&self, player_id: Uuid) -> Result<usize, MatchmakingError> {
        if self.registry.contains_player(&player_id) {
            return Err(MatchmakingError::AlreadyInMatch);
        }
        if !self.connections.contains_key(&player_id) {
            return Err(MatchmakingError::NotConnected);
        }

        let mut queue = self.queue.lock().await;
        let position = queue.enqueue(QueuedPlayer::new(player_id));
        info!(player_id = %player_id, position, "Player joined matchmaking queue");
        Ok(position)
    }

    /// Leave matchmaking queue
    pub async fn leave_queue(&self, player_id: Uuid) -> bool {
        self.queue.lock().await.dequeue(player_id).is_some()
    }

    /// Pair the oldest connected players into rooms
    pub async fn form_matches(&self) -> Vec<RoomHandle> {
        let connected: HashSet<Uuid> = self.connections.iter().map(|c| *c.key()).collect();
        let mut queue = self.queue.lock().await;
        let dropped = queue.retain_connected(&connected);
        if dropped > 0 {
            debug!(dropped, "Removed disconnected players from queue");
        }

        let mut rooms = Vec::new();
        let mut requeue = Vec::new();
        while let Some((first, second)) = queue.pop_pair() {
            let players = [first.player_id, second.player_id];
            let outbound = match (self.outbound(&players[0]), self.outbound(&players[1])) {
                (Some(a), Some(b)) => [a, b],
                _ => {
                    warn!("Paired player vanished, requeueing");
                    requeue.extend([first, second]);
                    continue;
                }
            };

            let handle = spawn_room(
                self.registry.clone(),
                (*self.map).clone(),
                self.match_config.clone(),
                players,
                outbound,
            );
            info!(
                room_id = %handle.id,
                player_one = %players[PlayerNumber::One.index()],
                player_two = %players[PlayerNumber::Two.index()],
                "Created new room"
            );
            rooms.push(handle);
        }
        for player in requeue {
            if self.connections.contains_key(&player.player_id) {
                queue.enqueue(player);
            }
        }
        rooms
    }

    /// Run the matchmaking service (periodic queue processing)
    pub async fn run(self) {
        let mut interval = tokio::time::interval(PAIRING_INTERVAL);
        loop {
            interval.tick().await;
            self.form_matches().await;
        }
    }

    fn outbound(&self, player_id: &Uuid) -> Option<mpsc::Sender<ServerMsg>> {
        self.connections.get(player_id).map(|c| c.outbound.clone())
    }

    /// Get current queue size
    pub async fn queue_size(&self) -> usize {
        self.queue.lock().await.len()
    }

    /// Check if player is in queue
    pub async fn is_in_queue(&self, player_id: &Uuid) -> bool {
        self.queue.lock().await.contains(player_id)
    }

    pub fn connected_players(&self) -> usize {
        self.connections.len()
    }

    pub fn registry(&self) -> &Arc<RoomRegistry> {
        &self.registry
    }
}
