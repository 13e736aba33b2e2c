//! Round state machine - phases, score, economy and side swaps
//!
//! Owns the simulation engine for the whole match. The room drives it with
//! one `on_second` per wall-clock second and one `on_tick` per simulation
//! tick; both return the match events the room must broadcast.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;
use tracing::{debug, info, warn};

use super::command::{Command, CommandRejection, CommandValidator, RawCommand};
use super::economy::{BuyError, Economy, RoundOutcome};
use super::equipment::{BuyItem, Loadout};
use super::events::{EventKind, KillRecord, TickResult};
use super::fog::FilteredGameState;
use super::map::MapData;
use super::replay::{ReplayEntry, ReplayLog};
use super::simulation::SimulationEngine;
use super::soldier::{PlayerNumber, Side, SoldierId, SoldierProfile, SQUAD_SIZE};
use crate::config::MatchConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    BuyPhase,
    StrategyPhase,
    LivePhase,
    PostPlant,
    RoundEnd,
    MatchEnd,
}

impl Phase {
    pub fn name(self) -> &'static str {
        match self {
            Phase::BuyPhase => "buy_phase",
            Phase::StrategyPhase => "strategy_phase",
            Phase::LivePhase => "live_phase",
            Phase::PostPlant => "post_plant",
            Phase::RoundEnd => "round_end",
            Phase::MatchEnd => "match_end",
        }
    }

    /// The simulation only advances in these phases
    pub fn is_ticking(self) -> bool {
        matches!(self, Phase::LivePhase | Phase::PostPlant)
    }

    pub fn accepts_commands(self) -> bool {
        matches!(
            self,
            Phase::StrategyPhase | Phase::LivePhase | Phase::PostPlant
        )
    }

    /// Phases both players can skip by readying up
    pub fn skippable(self) -> bool {
        matches!(self, Phase::BuyPhase | Phase::StrategyPhase | Phase::RoundEnd)
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CommandError {
    #[error("commands are not accepted during {0}")]
    NotAccepting(Phase),

    #[error(transparent)]
    Rejected(#[from] CommandRejection),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Score {
    pub player1: u32,
    pub player2: u32,
}

impl Score {
    pub fn get(&self, player: PlayerNumber) -> u32 {
        match player {
            PlayerNumber::One => self.player1,
            PlayerNumber::Two => self.player2,
        }
    }

    fn add(&mut self, player: PlayerNumber) {
        match player {
            PlayerNumber::One => self.player1 += 1,
            PlayerNumber::Two => self.player2 += 1,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoundEndReason {
    Elimination,
    BombExploded,
    BombDefused,
    TimeExpired,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoundSummary {
    pub round: u32,
    pub winner: PlayerNumber,
    pub winning_side: Side,
    pub reason: RoundEndReason,
    pub kills: Vec<KillRecord>,
    /// Money credited to player 1 and player 2
    pub payouts: [u32; 2],
    pub score: Score,
}

#[derive(Debug, Clone, PartialEq)]
pub enum MatchEvent {
    PhaseChanged {
        phase: Phase,
        round: u32,
        time_remaining: u32,
    },
    RoundStarted {
        round: u32,
        attacker: PlayerNumber,
    },
    Tick(TickResult),
    RoundEnded(RoundSummary),
    SidesSwapped {
        attacker: PlayerNumber,
    },
    MatchEnded {
        winner: PlayerNumber,
        score: Score,
        forfeit: bool,
        replay_digest: String,
    },
}

/// Drives one match from the first buy phase to the final score
#[derive(Debug)]
pub struct RoundStateMachine {
    config: MatchConfig,
    engine: SimulationEngine,
    validator: CommandValidator,
    economy: Economy,
    phase: Phase,
    round: u32,
    time_remaining: u32,
    score: Score,
    ready: [bool; 2],
    loadouts: [Vec<Loadout>; 2],
    replay: ReplayLog,
    winner: Option<PlayerNumber>,
    started: bool,
}

impl RoundStateMachine {
    pub fn new(seed: u64, map: MapData, config: MatchConfig) -> Self {
        let validator = CommandValidator::new(map.bounds);
        let economy = Economy::new(config.economy.clone());
        Self {
            engine: SimulationEngine::new(seed, map),
            validator,
            economy,
            phase: Phase::BuyPhase,
            round: 0,
            time_remaining: config.buy_phase_secs,
            score: Score::default(),
            ready: [false; 2],
            loadouts: Default::default(),
            replay: ReplayLog::new(seed),
            winner: None,
            started: false,
            config,
        }
    }

    /// Install a host-supplied roster; only before `start`
    pub fn set_squad(&mut self, player: PlayerNumber, profiles: Vec<SoldierProfile>) {
        if self.started {
            warn!(?player, "squad change after match start ignored");
            return;
        }
        self.replay.record(ReplayEntry::Squad {
            player,
            profiles: profiles.clone(),
        });
        self.engine.set_squad(player, profiles);
    }

    /// Begin round one
    pub fn start(&mut self) -> Vec<MatchEvent> {
        if self.started {
            return Vec::new();
        }
        self.started = true;
        for player in PlayerNumber::ALL {
            self.loadouts[player.index()] = vec![Loadout::default(); SQUAD_SIZE];
        }
        let mut events = Vec::new();
        self.begin_round(&mut events);
        events
    }

    /// One wall-clock second elapsed
    pub fn on_second(&mut self) -> Vec<MatchEvent> {
        let mut events = Vec::new();
        if !self.started || self.phase == Phase::MatchEnd {
            return events;
        }
        self.time_remaining = self.time_remaining.saturating_sub(1);
        if self.time_remaining == 0 {
            self.expire_phase(&mut events);
        }
        events
    }

    /// One simulation tick elapsed; no-op outside LIVE and POST_PLANT
    pub fn on_tick(&mut self) -> Vec<MatchEvent> {
        let mut events = Vec::new();
        if !self.phase.is_ticking() {
            return events;
        }

        self.replay.record(ReplayEntry::Tick);
        let result = self.engine.run_tick();
        let planted = result.bomb_planted();
        let ended = result.winning_side.filter(|_| result.round_ended);
        let reason = round_end_reason(&result);
        events.push(MatchEvent::Tick(result));

        if let Some(side) = ended {
            self.finish_round(side, reason, &mut events);
        } else if planted && self.phase == Phase::LivePhase {
            self.enter_phase(Phase::PostPlant, &mut events);
        }
        events
    }

    pub fn set_ready(&mut self, player: PlayerNumber) -> Vec<MatchEvent> {
        let mut events = Vec::new();
        if !self.started || !self.phase.skippable() {
            debug!(?player, phase = %self.phase, "ready ignored");
            return events;
        }
        self.ready[player.index()] = true;
        if self.ready.iter().all(|r| *r) {
            debug!(phase = %self.phase, "both players ready, skipping phase");
            self.expire_phase(&mut events);
        }
        events
    }

    /// Validate and queue a command for the next tick
    pub fn submit_command(
        &mut self,
        player: PlayerNumber,
        raw: &RawCommand,
    ) -> Result<Command, CommandError> {
        if !self.phase.accepts_commands() {
            warn!(?player, phase = %self.phase, "command outside command phases");
            return Err(CommandError::NotAccepting(self.phase));
        }
        let command = self.validator.validate(raw).map_err(|e| {
            warn!(?player, error = %e, "command rejected");
            CommandError::from(e)
        })?;
        self.replay.record(ReplayEntry::Command { player, command });
        self.engine.queue_command(player, command);
        Ok(command)
    }

    /// Buy an item for one soldier, returning the money left
    pub fn buy(
        &mut self,
        player: PlayerNumber,
        soldier_index: usize,
        item: BuyItem,
    ) -> Result<u32, BuyError> {
        if self.phase != Phase::BuyPhase {
            return Err(BuyError::WrongPhase);
        }
        if soldier_index >= SQUAD_SIZE {
            return Err(BuyError::SoldierIndexOutOfRange(soldier_index));
        }
        let side = self.engine.side_of(player);
        let loadout = &mut self.loadouts[player.index()][soldier_index];
        let money = self.economy.purchase(player, side, loadout, item)?;

        let bought = loadout.clone();
        if let Some(soldier) = self.engine.soldier_mut(SoldierId::new(player, soldier_index)) {
            soldier.loadout = bought;
        }
        debug!(?player, soldier_index, ?item, money, "purchase");
        Ok(money)
    }

    /// The given player lost the match by leaving
    pub fn forfeit(&mut self, loser: PlayerNumber) -> Vec<MatchEvent> {
        let mut events = Vec::new();
        if self.phase != Phase::MatchEnd {
            info!(?loser, "match forfeited");
            self.end_match(loser.other(), true, &mut events);
        }
        events
    }

    fn begin_round(&mut self, events: &mut Vec<MatchEvent>) {
        self.round += 1;
        let attacker = self.attacker_for(self.round);
        self.spawn_round(attacker);
        info!(round = self.round, ?attacker, "round started");
        events.push(MatchEvent::RoundStarted {
            round: self.round,
            attacker,
        });
        self.enter_phase(Phase::BuyPhase, events);
    }

    fn attacker_for(&self, round: u32) -> PlayerNumber {
        if round <= self.config.halftime_round {
            PlayerNumber::One
        } else {
            PlayerNumber::Two
        }
    }

    fn spawn_round(&mut self, attacker: PlayerNumber) {
        for player in PlayerNumber::ALL {
            self.engine
                .set_loadouts(player, self.loadouts[player.index()].clone());
        }
        let map = self.engine.map();
        let (a, d) = (map.attacker_spawn, map.defender_spawn);
        self.engine.initialize_round(attacker, a, d);
    }

    fn enter_phase(&mut self, phase: Phase, events: &mut Vec<MatchEvent>) {
        self.phase = phase;
        self.ready = [false; 2];
        self.time_remaining = match phase {
            Phase::BuyPhase => self.config.buy_phase_secs,
            Phase::StrategyPhase => self.config.strategy_phase_secs,
            Phase::LivePhase => self.config.live_phase_secs,
            Phase::PostPlant => self.config.post_plant_secs,
            Phase::RoundEnd => self.config.round_end_secs,
            Phase::MatchEnd => 0,
        };
        debug!(round = self.round, phase = %phase, secs = self.time_remaining, "phase changed");
        events.push(MatchEvent::PhaseChanged {
            phase,
            round: self.round,
            time_remaining: self.time_remaining,
        });
    }

    fn expire_phase(&mut self, events: &mut Vec<MatchEvent>) {
        match self.phase {
            Phase::BuyPhase => {
                // Purchases are final; respawn with them and start recording
                let attacker = self.engine.attacker();
                self.replay.record(ReplayEntry::RoundStart {
                    attacker,
                    loadouts: self.loadouts.clone(),
                });
                self.spawn_round(attacker);
                self.enter_phase(Phase::StrategyPhase, events);
            }
            Phase::StrategyPhase => self.enter_phase(Phase::LivePhase, events),
            Phase::LivePhase => self.finish_round(Side::Defender, RoundEndReason::TimeExpired, events),
            // Display only; the engine's bomb timer ends the round
            Phase::PostPlant => {}
            Phase::RoundEnd => {
                if self.round == self.config.halftime_round {
                    self.swap_sides(events);
                }
                self.begin_round(events);
            }
            Phase::MatchEnd => {}
        }
    }

    fn finish_round(&mut self, side: Side, reason: RoundEndReason, events: &mut Vec<MatchEvent>) {
        self.engine.end_round(side);
        let winner = if self.engine.side_of(PlayerNumber::One) == side {
            PlayerNumber::One
        } else {
            PlayerNumber::Two
        };
        self.score.add(winner);

        let kills = self.engine.get_round_kills().to_vec();
        let bomb = self.engine.bomb();
        let payouts = self.economy.settle_round(&RoundOutcome {
            winner,
            attacker: self.engine.attacker(),
            bomb_planted: bomb.planted,
            bomb_defused: bomb.defused,
            kills: &kills,
        });

        // Survivors keep what they carry; the dead start over
        for soldier in self.engine.soldiers() {
            self.loadouts[soldier.owner.index()][soldier.index] = if soldier.alive {
                soldier.loadout.clone()
            } else {
                Loadout::default()
            };
        }

        info!(
            round = self.round,
            ?winner,
            ?side,
            ?reason,
            p1 = self.score.player1,
            p2 = self.score.player2,
            "round ended"
        );
        events.push(MatchEvent::RoundEnded(RoundSummary {
            round: self.round,
            winner,
            winning_side: side,
            reason,
            kills,
            payouts,
            score: self.score,
        }));

        if self.score.get(winner) >= self.config.rounds_to_win {
            self.end_match(winner, false, events);
        } else {
            self.enter_phase(Phase::RoundEnd, events);
        }
    }

    fn swap_sides(&mut self, events: &mut Vec<MatchEvent>) {
        self.economy.reset();
        for player in PlayerNumber::ALL {
            self.loadouts[player.index()] = vec![Loadout::default(); SQUAD_SIZE];
        }
        let attacker = self.attacker_for(self.round + 1);
        info!(?attacker, "sides swapped");
        events.push(MatchEvent::SidesSwapped { attacker });
    }

    fn end_match(&mut self, winner: PlayerNumber, forfeit: bool, events: &mut Vec<MatchEvent>) {
        self.winner = Some(winner);
        self.enter_phase(Phase::MatchEnd, events);
        let replay_digest = self.replay.digest();
        info!(
            ?winner,
            forfeit,
            p1 = self.score.player1,
            p2 = self.score.player2,
            ticks = self.replay.tick_count(),
            replay = %replay_digest,
            "match ended"
        );
        events.push(MatchEvent::MatchEnded {
            winner,
            score: self.score,
            forfeit,
            replay_digest,
        });
    }

    // Accessors

    pub fn filtered_state(&self, player: PlayerNumber) -> FilteredGameState {
        self.engine.get_filtered_state(player)
    }

    pub fn is_ticking(&self) -> bool {
        self.phase.is_ticking()
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn round(&self) -> u32 {
        self.round
    }

    pub fn time_remaining(&self) -> u32 {
        self.time_remaining
    }

    pub fn score(&self) -> Score {
        self.score
    }

    pub fn winner(&self) -> Option<PlayerNumber> {
        self.winner
    }

    pub fn money(&self, player: PlayerNumber) -> u32 {
        self.economy.money(player)
    }

    pub fn attacker(&self) -> PlayerNumber {
        self.engine.attacker()
    }

    /// Loadout the soldier will carry into the next spawn
    pub fn loadout(&self, player: PlayerNumber, soldier_index: usize) -> Option<&Loadout> {
        self.loadouts[player.index()].get(soldier_index)
    }

    pub fn engine(&self) -> &SimulationEngine {
        &self.engine
    }

    /// Direct engine access for scenario setup in tests and tools
    pub fn engine_mut(&mut self) -> &mut SimulationEngine {
        &mut self.engine
    }

    pub fn replay(&self) -> &ReplayLog {
        &self.replay
    }

    pub fn config(&self) -> &MatchConfig {
        &self.config
    }
}

fn round_end_reason(result: &TickResult) -> RoundEndReason {
    for event in &result.events {
        match event.kind {
            EventKind::BombExploded => return RoundEndReason::BombExploded,
            EventKind::BombDefused { .. } => return RoundEndReason::BombDefused,
            _ => {}
        }
    }
    RoundEndReason::Elimination
}
