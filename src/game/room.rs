//! Game room - one task per match, owning the round state machine
//!
//! Everything that touches the match arrives through the room inbox: client
//! messages, connection changes and timer firings. Outbound traffic goes
//! through one bounded channel per player and is never awaited, so a slow
//! client cannot stall the simulation.

use dashmap::DashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::MatchConfig;
use crate::util::time::{phase_interval, tick_interval};
use crate::ws::protocol::{ClientMsg, ServerMsg};

use super::events::TickResult;
use super::map::MapData;
use super::round::{MatchEvent, Phase, RoundStateMachine};
use super::snapshot::SnapshotBuilder;
use super::soldier::PlayerNumber;

/// Per-player outbound queue depth
pub const OUTBOUND_BUFFER: usize = 64;
/// Room inbox depth
pub const ROOM_INBOX: usize = 256;

/// Input to a room task
#[derive(Debug)]
pub enum RoomCommand {
    Client {
        player: PlayerNumber,
        msg: ClientMsg,
    },
    Disconnected {
        player: PlayerNumber,
    },
    Reconnected {
        player: PlayerNumber,
        outbound: mpsc::Sender<ServerMsg>,
    },
    TickElapsed,
    SecondElapsed,
    ReconnectExpired {
        player: PlayerNumber,
        generation: u64,
    },
}

/// A spawned timer feeding the room inbox. Cancelling is idempotent and
/// dropping the handle cancels it.
#[derive(Debug, Default)]
pub struct TimerHandle {
    task: Option<JoinHandle<()>>,
}

impl TimerHandle {
    pub fn idle() -> Self {
        Self { task: None }
    }

    /// Fire once after `delay`
    pub fn after(delay: Duration, tx: mpsc::Sender<RoomCommand>, cmd: RoomCommand) -> Self {
        let task = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = tx.send(cmd).await;
        });
        Self { task: Some(task) }
    }

    /// Fire every `period`, first after one full period
    pub fn every(
        period: Duration,
        tx: mpsc::Sender<RoomCommand>,
        make: fn() -> RoomCommand,
    ) -> Self {
        let task = tokio::spawn(async move {
            let mut interval = interval_at(Instant::now() + period, period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                interval.tick().await;
                if tx.send(make()).await.is_err() {
                    break;
                }
            }
        });
        Self { task: Some(task) }
    }

    pub fn is_active(&self) -> bool {
        self.task.is_some()
    }

    pub fn cancel(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

impl Drop for TimerHandle {
    fn drop(&mut self) {
        self.cancel();
    }
}

/// Handle to a running room
#[derive(Debug, Clone)]
pub struct RoomHandle {
    pub id: Uuid,
    pub seed: u64,
    /// Connection ids of player one and player two
    pub players: [Uuid; 2],
    pub tx: mpsc::Sender<RoomCommand>,
}

impl RoomHandle {
    pub fn player_number(&self, player_id: Uuid) -> Option<PlayerNumber> {
        PlayerNumber::ALL
            .into_iter()
            .find(|p| self.players[p.index()] == player_id)
    }
}

/// Registry of all active rooms
#[derive(Debug, Default)]
pub struct RoomRegistry {
    rooms: DashMap<Uuid, RoomHandle>,
    /// player id -> room id
    player_rooms: DashMap<Uuid, Uuid>,
}

impl RoomRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, handle: RoomHandle) {
        for player in handle.players {
            self.player_rooms.insert(player, handle.id);
        }
        self.rooms.insert(handle.id, handle);
    }

    pub fn get(&self, id: &Uuid) -> Option<RoomHandle> {
        self.rooms.get(id).map(|r| r.value().clone())
    }

    pub fn remove(&self, id: &Uuid) -> Option<RoomHandle> {
        let (_, handle) = self.rooms.remove(id)?;
        for player in handle.players {
            self.player_rooms.remove_if(&player, |_, room| room == id);
        }
        Some(handle)
    }

    /// The room a player belongs to, with their seat
    pub fn room_of(&self, player_id: &Uuid) -> Option<(RoomHandle, PlayerNumber)> {
        let room_id = *self.player_rooms.get(player_id)?;
        let handle = self.get(&room_id)?;
        let number = handle.player_number(*player_id)?;
        Some((handle, number))
    }

    pub fn contains_player(&self, player_id: &Uuid) -> bool {
        self.player_rooms.contains_key(player_id)
    }

    pub fn active_rooms(&self) -> usize {
        self.rooms.len()
    }

    pub fn players_in_rooms(&self) -> usize {
        self.player_rooms.len()
    }
}

/// The authoritative room task
pub struct GameRoom {
    id: Uuid,
    seed: u64,
    machine: RoundStateMachine,
    inbox: mpsc::Receiver<RoomCommand>,
    self_tx: mpsc::Sender<RoomCommand>,
    outbound: [Option<mpsc::Sender<ServerMsg>>; 2],
    reconnect_generation: [u64; 2],
    reconnect_timeout: Duration,
    tick_timer: TimerHandle,
    phase_timer: TimerHandle,
    reconnect_timers: [TimerHandle; 2],
}

impl GameRoom {
    pub fn new(
        id: Uuid,
        seed: u64,
        map: MapData,
        config: MatchConfig,
        players: [Uuid; 2],
        outbound: [mpsc::Sender<ServerMsg>; 2],
    ) -> (Self, RoomHandle) {
        let (tx, inbox) = mpsc::channel(ROOM_INBOX);
        let handle = RoomHandle {
            id,
            seed,
            players,
            tx: tx.clone(),
        };
        let [p1, p2] = outbound;
        let room = Self {
            id,
            seed,
            reconnect_timeout: config.reconnect_timeout,
            machine: RoundStateMachine::new(seed, map, config),
            inbox,
            self_tx: tx,
            outbound: [Some(p1), Some(p2)],
            reconnect_generation: [0; 2],
            tick_timer: TimerHandle::idle(),
            phase_timer: TimerHandle::idle(),
            reconnect_timers: [TimerHandle::idle(), TimerHandle::idle()],
        };
        (room, handle)
    }

    /// Run the room until the match ends
    pub async fn run(mut self) {
        info!(room_id = %self.id, seed = self.seed, "Room started");

        for player in PlayerNumber::ALL {
            self.send(
                player,
                ServerMsg::MatchFound {
                    room_id: self.id,
                    player,
                    seed: self.seed,
                },
            );
        }
        let events = self.machine.start();
        self.dispatch(&events);
        self.phase_timer = TimerHandle::every(phase_interval(), self.self_tx.clone(), || {
            RoomCommand::SecondElapsed
        });

        while let Some(cmd) = self.inbox.recv().await {
            self.handle(cmd);
            if self.machine.phase() == Phase::MatchEnd {
                break;
            }
        }

        self.tick_timer.cancel();
        self.phase_timer.cancel();
        for timer in self.reconnect_timers.iter_mut() {
            timer.cancel();
        }
        info!(room_id = %self.id, winner = ?self.machine.winner(), "Room closed");
    }

    fn handle(&mut self, cmd: RoomCommand) {
        let events = match cmd {
            RoomCommand::Client { player, msg } => self.handle_client(player, msg),
            RoomCommand::TickElapsed => self.machine.on_tick(),
            RoomCommand::SecondElapsed => {
                let events = self.machine.on_second();
                if events.is_empty() {
                    self.broadcast_phase();
                }
                events
            }
            RoomCommand::Disconnected { player } => {
                self.handle_disconnect(player);
                Vec::new()
            }
            RoomCommand::Reconnected { player, outbound } => {
                self.handle_reconnect(player, outbound);
                Vec::new()
            }
            RoomCommand::ReconnectExpired { player, generation } => {
                if self.outbound[player.index()].is_none()
                    && self.reconnect_generation[player.index()] == generation
                {
                    warn!(room_id = %self.id, ?player, "Reconnect window expired");
                    self.machine.forfeit(player)
                } else {
                    Vec::new()
                }
            }
        };
        self.dispatch(&events);
        self.sync_tick_timer();
    }

    fn handle_client(&mut self, player: PlayerNumber, msg: ClientMsg) -> Vec<MatchEvent> {
        match msg {
            ClientMsg::Ready => self.machine.set_ready(player),
            ClientMsg::Command(raw) => {
                if let Err(e) = self.machine.submit_command(player, &raw) {
                    self.send(
                        player,
                        ServerMsg::CommandRejected {
                            reason: e.to_string(),
                        },
                    );
                }
                Vec::new()
            }
            ClientMsg::Buy {
                soldier_index,
                item,
            } => {
                match self.machine.buy(player, soldier_index, item) {
                    Ok(money) => {
                        let loadout = self
                            .machine
                            .loadout(player, soldier_index)
                            .cloned()
                            .unwrap_or_default();
                        self.send(
                            player,
                            ServerMsg::Purchase {
                                soldier_index,
                                loadout,
                                money,
                            },
                        );
                    }
                    Err(e) => {
                        debug!(room_id = %self.id, ?player, error = %e, "Purchase refused");
                        self.send(player, ServerMsg::error("buy_rejected", e.to_string()));
                    }
                }
                Vec::new()
            }
            ClientMsg::Leave => self.machine.forfeit(player),
            ClientMsg::Ping { t } => {
                self.send(player, ServerMsg::Pong { t });
                Vec::new()
            }
            ClientMsg::FindMatch => {
                self.send(player, ServerMsg::error("already_in_match", "Already in a match"));
                Vec::new()
            }
        }
    }

    fn handle_disconnect(&mut self, player: PlayerNumber) {
        let idx = player.index();
        if self.outbound[idx].take().is_none() {
            return;
        }
        self.reconnect_generation[idx] += 1;
        self.reconnect_timers[idx] = TimerHandle::after(
            self.reconnect_timeout,
            self.self_tx.clone(),
            RoomCommand::ReconnectExpired {
                player,
                generation: self.reconnect_generation[idx],
            },
        );
        warn!(
            room_id = %self.id,
            ?player,
            timeout_secs = self.reconnect_timeout.as_secs(),
            "Player disconnected, holding seat"
        );
        self.send(
            player.other(),
            ServerMsg::OpponentDisconnected {
                timeout_secs: self.reconnect_timeout.as_secs(),
            },
        );
    }

    fn handle_reconnect(&mut self, player: PlayerNumber, outbound: mpsc::Sender<ServerMsg>) {
        let idx = player.index();
        let was_away = self.outbound[idx].is_none();
        self.outbound[idx] = Some(outbound);
        self.reconnect_timers[idx].cancel();
        info!(room_id = %self.id, ?player, "Player reattached");

        self.send(
            player,
            ServerMsg::MatchFound {
                room_id: self.id,
                player,
                seed: self.seed,
            },
        );
        self.send(player, SnapshotBuilder::phase(&self.machine, player));
        let current = TickResult {
            tick: self.machine.engine().tick(),
            ..Default::default()
        };
        self.send(player, SnapshotBuilder::state(&self.machine, player, &current));
        if was_away {
            self.send(player.other(), ServerMsg::OpponentReconnected);
        }
    }

    fn sync_tick_timer(&mut self) {
        let ticking = self.machine.is_ticking();
        if ticking && !self.tick_timer.is_active() {
            self.tick_timer =
                TimerHandle::every(tick_interval(), self.self_tx.clone(), || RoomCommand::TickElapsed);
        } else if !ticking && self.tick_timer.is_active() {
            self.tick_timer.cancel();
        }
    }

    fn dispatch(&self, events: &[MatchEvent]) {
        if events.is_empty() {
            return;
        }
        for player in PlayerNumber::ALL {
            for msg in SnapshotBuilder::build(&self.machine, player, events) {
                self.send(player, msg);
            }
        }
    }

    fn broadcast_phase(&self) {
        for player in PlayerNumber::ALL {
            self.send(player, SnapshotBuilder::phase(&self.machine, player));
        }
    }

    fn send(&self, player: PlayerNumber, msg: ServerMsg) {
        let Some(tx) = &self.outbound[player.index()] else {
            return;
        };
        match tx.try_send(msg) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => {
                warn!(room_id = %self.id, ?player, "Outbound queue full, dropping message");
            }
            Err(TrySendError::Closed(_)) => {
                debug!(room_id = %self.id, ?player, "Outbound channel closed");
            }
        }
    }
}

/// Spawn a room task and register it; the room unregisters itself on exit
pub fn spawn_room(
    registry: Arc<RoomRegistry>,
    map: MapData,
    config: MatchConfig,
    players: [Uuid; 2],
    outbound: [mpsc::Sender<ServerMsg>; 2],
) -> RoomHandle {
    let id = Uuid::new_v4();
    let seed = rand::random::<u64>();
    let (room, handle) = GameRoom::new(id, seed, map, config, players, outbound);
    registry.insert(handle.clone());

    tokio::spawn(async move {
        room.run().await;
        registry.remove(&id);
        info!(room_id = %id, "Room removed from registry");
    });
    handle
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::timeout;

    async fn next_matching(
        rx: &mut mpsc::Receiver<ServerMsg>,
        pred: impl Fn(&ServerMsg) -> bool,
    ) -> ServerMsg {
        timeout(Duration::from_secs(5), async {
            loop {
                let msg = rx.recv().await.expect("channel open");
                if pred(&msg) {
                    return msg;
                }
            }
        })
        .await
        .expect("message in time")
    }

    fn start_room(
        config: MatchConfig,
    ) -> (
        RoomHandle,
        mpsc::Receiver<ServerMsg>,
        mpsc::Receiver<ServerMsg>,
        Arc<RoomRegistry>,
    ) {
        let registry = Arc::new(RoomRegistry::new());
        let (tx1, rx1) = mpsc::channel(OUTBOUND_BUFFER);
        let (tx2, rx2) = mpsc::channel(OUTBOUND_BUFFER);
        let handle = spawn_room(
            registry.clone(),
            MapData::builtin(),
            config,
            [Uuid::new_v4(), Uuid::new_v4()],
            [tx1, tx2],
        );
        (handle, rx1, rx2, registry)
    }

    async fn ready_both(handle: &RoomHandle) {
        for player in PlayerNumber::ALL {
            handle
                .tx
                .send(RoomCommand::Client {
                    player,
                    msg: ClientMsg::Ready,
                })
                .await
                .unwrap();
        }
    }

    #[test]
    fn timer_cancel_is_idempotent() {
        let mut timer = TimerHandle::idle();
        timer.cancel();
        timer.cancel();
        assert!(!timer.is_active());
    }

    #[tokio::test]
    async fn one_shot_timer_delivers_its_command() {
        let (tx, mut rx) = mpsc::channel(4);
        let _timer = TimerHandle::after(Duration::from_millis(10), tx, RoomCommand::TickElapsed);
        let cmd = tokio_test::assert_ok!(timeout(Duration::from_secs(2), rx.recv()).await);
        assert!(matches!(cmd, Some(RoomCommand::TickElapsed)));
    }

    #[tokio::test]
    async fn cancelled_timer_stays_silent() {
        let (tx, mut rx) = mpsc::channel(4);
        let mut timer = TimerHandle::every(Duration::from_millis(10), tx, || RoomCommand::SecondElapsed);
        assert!(timer.is_active());
        timer.cancel();
        assert!(!timer.is_active());
        // Aborting drops the sender, or nothing arrives in time
        let got = timeout(Duration::from_millis(50), rx.recv()).await;
        assert!(!matches!(got, Ok(Some(_))));
    }

    #[test]
    fn registry_tracks_players() {
        let registry = RoomRegistry::new();
        let (tx, _rx) = mpsc::channel(1);
        let players = [Uuid::new_v4(), Uuid::new_v4()];
        let handle = RoomHandle {
            id: Uuid::new_v4(),
            seed: 1,
            players,
            tx,
        };
        registry.insert(handle.clone());
        let (found, number) = registry.room_of(&players[1]).unwrap();
        assert_eq!(found.id, handle.id);
        assert_eq!(number, PlayerNumber::Two);
        assert_eq!(registry.players_in_rooms(), 2);
        registry.remove(&handle.id);
        assert!(!registry.contains_player(&players[0]));
        assert_eq!(registry.active_rooms(), 0);
    }

    #[tokio::test]
    async fn room_announces_and_goes_live() {
        let (handle, mut rx1, mut rx2, _registry) = start_room(MatchConfig::default());
        let found = next_matching(&mut rx2, |m| matches!(m, ServerMsg::MatchFound { .. })).await;
        assert!(matches!(found, ServerMsg::MatchFound { player: PlayerNumber::Two, .. }));
        next_matching(&mut rx1, |m| {
            matches!(m, ServerMsg::Phase { phase: Phase::BuyPhase, .. })
        })
        .await;

        ready_both(&handle).await;
        ready_both(&handle).await;
        let state = next_matching(&mut rx1, |m| matches!(m, ServerMsg::State { .. })).await;
        match state {
            ServerMsg::State { tick, phase, state, .. } => {
                assert_eq!(tick, 1);
                assert_eq!(phase, Phase::LivePhase);
                assert_eq!(state.player, PlayerNumber::One);
            }
            _ => unreachable!(),
        }
    }

    #[tokio::test]
    async fn rejected_commands_are_reported() {
        let (handle, mut rx1, _rx2, _registry) = start_room(MatchConfig::default());
        let raw = serde_json::from_value(serde_json::json!({
            "command_type": "move",
            "soldier_index": 0,
            "target_position": {"x": 1.0, "z": 1.0}
        }))
        .unwrap();
        handle
            .tx
            .send(RoomCommand::Client {
                player: PlayerNumber::One,
                msg: ClientMsg::Command(raw),
            })
            .await
            .unwrap();
        let msg = next_matching(&mut rx1, |m| matches!(m, ServerMsg::CommandRejected { .. })).await;
        assert!(matches!(msg, ServerMsg::CommandRejected { reason } if reason.contains("buy_phase")));
    }

    #[tokio::test]
    async fn reconnect_timeout_forfeits() {
        let config = MatchConfig {
            reconnect_timeout: Duration::from_millis(50),
            ..Default::default()
        };
        let (handle, _rx1, mut rx2, registry) = start_room(config);
        handle
            .tx
            .send(RoomCommand::Disconnected {
                player: PlayerNumber::One,
            })
            .await
            .unwrap();
        next_matching(&mut rx2, |m| matches!(m, ServerMsg::OpponentDisconnected { .. })).await;
        let end = next_matching(&mut rx2, |m| matches!(m, ServerMsg::MatchEnd { .. })).await;
        assert!(matches!(
            end,
            ServerMsg::MatchEnd {
                winner: PlayerNumber::Two,
                forfeit: true,
                ..
            }
        ));
        // The room unregisters itself once the task exits
        timeout(Duration::from_secs(2), async {
            while registry.active_rooms() > 0 {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn reconnecting_in_time_keeps_the_match() {
        let config = MatchConfig {
            reconnect_timeout: Duration::from_millis(300),
            ..Default::default()
        };
        let (handle, _rx1, mut rx2, _registry) = start_room(config);
        handle
            .tx
            .send(RoomCommand::Disconnected {
                player: PlayerNumber::One,
            })
            .await
            .unwrap();
        let (tx1, mut rx1) = mpsc::channel(OUTBOUND_BUFFER);
        handle
            .tx
            .send(RoomCommand::Reconnected {
                player: PlayerNumber::One,
                outbound: tx1,
            })
            .await
            .unwrap();
        next_matching(&mut rx2, |m| matches!(m, ServerMsg::OpponentReconnected)).await;
        next_matching(&mut rx1, |m| matches!(m, ServerMsg::State { .. })).await;

        tokio::time::sleep(Duration::from_millis(500)).await;
        handle
            .tx
            .send(RoomCommand::Client {
                player: PlayerNumber::One,
                msg: ClientMsg::Ping { t: 9 },
            })
            .await
            .unwrap();
        let pong = next_matching(&mut rx1, |m| {
            matches!(m, ServerMsg::Pong { .. } | ServerMsg::MatchEnd { .. })
        })
        .await;
        assert_eq!(pong, ServerMsg::Pong { t: 9 });
    }
}
