//! Simulation engine - the deterministic per-tick core
//!
//! Tick order: drain queued commands, utility, movement, detection, combat,
//! bomb, round check, invariant enforcement. The engine never fails a tick;
//! bad commands become no-ops and broken invariants are clamped.

use std::collections::VecDeque;
use std::f32::consts::FRAC_PI_2;

use super::bomb::{BombState, BombSystem};
use super::combat::{CombatContext, CombatResolver, CoverState, PerTickCombatResolver};
use super::command::{Command, CommandKind};
use super::detection::{DetectionSystem, Sight};
use super::equipment::Loadout;
use super::events::{EventKind, KillRecord, TickEvent, TickResult};
use super::fog::{FilteredGameState, FogFilter};
use super::geometry::{Rect, Vec2};
use super::map::MapData;
use super::movement::MovementSystem;
use super::rng::MatchRng;
use super::soldier::{
    Intent, PlayerNumber, Side, Soldier, SoldierId, SoldierProfile, Stance, SQUAD_SIZE,
};
use super::utility::{PendingThrow, SmokeCloud, UtilitySystem};

/// Deterministic tick engine for one match
#[derive(Debug)]
pub struct SimulationEngine {
    map: MapData,
    walls: Vec<Rect>,
    rng: MatchRng,
    resolver: Box<dyn CombatResolver>,

    squads: [Vec<SoldierProfile>; 2],
    loadouts: [Vec<Loadout>; 2],

    // Round state
    soldiers: Vec<Soldier>,
    attacker: PlayerNumber,
    spawns: [Rect; 2],
    cover: Vec<CoverState>,
    smokes: Vec<SmokeCloud>,
    bomb: BombState,
    tick: u32,
    queue: VecDeque<(PlayerNumber, Command)>,
    throws: Vec<PendingThrow>,
    round_kills: Vec<KillRecord>,
    winner: Option<Side>,
}

impl SimulationEngine {
    pub fn new(seed: u64, map: MapData) -> Self {
        let walls = map.walls.clone();
        let spawns = [map.attacker_spawn, map.defender_spawn];
        let mut engine = Self {
            map,
            walls,
            rng: MatchRng::new(seed),
            resolver: Box::new(PerTickCombatResolver),
            squads: [
                SoldierProfile::default_squad(PlayerNumber::One),
                SoldierProfile::default_squad(PlayerNumber::Two),
            ],
            loadouts: [
                vec![Loadout::default(); SQUAD_SIZE],
                vec![Loadout::default(); SQUAD_SIZE],
            ],
            soldiers: Vec::new(),
            attacker: PlayerNumber::One,
            spawns,
            cover: Vec::new(),
            smokes: Vec::new(),
            bomb: BombState::default(),
            tick: 0,
            queue: VecDeque::new(),
            throws: Vec::new(),
            round_kills: Vec::new(),
            winner: None,
        };
        engine.initialize_round(PlayerNumber::One, spawns[0], spawns[1]);
        engine
    }

    /// Swap the combat resolver (the engagement model is for offline use)
    pub fn with_resolver(mut self, resolver: Box<dyn CombatResolver>) -> Self {
        self.resolver = resolver;
        self
    }

    pub fn set_walls(&mut self, walls: Vec<Rect>) {
        self.walls = walls.into_iter().filter(Rect::is_valid).collect();
    }

    /// Replace a player's roster; missing slots keep the default profile
    pub fn set_squad(&mut self, player: PlayerNumber, profiles: Vec<SoldierProfile>) {
        let mut squad = SoldierProfile::default_squad(player);
        for (slot, profile) in squad.iter_mut().zip(profiles) {
            *slot = profile;
        }
        self.squads[player.index()] = squad;
    }

    /// Loadouts used by the next `initialize_round`
    pub fn set_loadouts(&mut self, player: PlayerNumber, loadouts: Vec<Loadout>) {
        let mut slots = vec![Loadout::default(); SQUAD_SIZE];
        for (slot, loadout) in slots.iter_mut().zip(loadouts) {
            *slot = loadout;
        }
        self.loadouts[player.index()] = slots;
    }

    /// Reset round state and spawn both squads. Spawning draws nothing from
    /// the match stream.
    pub fn initialize_round(
        &mut self,
        attacker: PlayerNumber,
        attacker_spawn: Rect,
        defender_spawn: Rect,
    ) {
        self.attacker = attacker;
        self.spawns = [attacker_spawn, defender_spawn];
        self.cover = self.map.cover.iter().map(CoverState::from).collect();
        self.smokes.clear();
        self.bomb = BombState::default();
        self.tick = 0;
        self.queue.clear();
        self.throws.clear();
        self.round_kills.clear();
        self.winner = None;

        let center = self.map.center();
        let mut soldiers = Vec::with_capacity(SQUAD_SIZE * 2);
        for player in PlayerNumber::ALL {
            let side = self.side_of(player);
            let zone = self.spawn_zone(side);
            for index in 0..SQUAD_SIZE {
                let position = spawn_slot(zone, index);
                let to_center = center - position;
                let facing = if to_center.length_sq() > f32::EPSILON {
                    to_center.angle()
                } else {
                    FRAC_PI_2
                };
                soldiers.push(Soldier::new(
                    player,
                    side,
                    index,
                    &self.squads[player.index()][index],
                    self.loadouts[player.index()][index].clone(),
                    position,
                    facing,
                ));
            }
        }
        self.soldiers = soldiers;
        tracing::trace!(attacker = ?attacker, "round initialized");
    }

    /// Enqueue a validated command; consumed at the start of the next tick
    pub fn queue_command(&mut self, player: PlayerNumber, command: Command) {
        self.queue.push_back((player, command));
    }

    pub fn pending_commands(&self) -> usize {
        self.queue.len()
    }

    /// Advance the round by one tick
    pub fn run_tick(&mut self) -> TickResult {
        if let Some(side) = self.winner {
            return TickResult {
                tick: self.tick,
                round_ended: true,
                winning_side: Some(side),
                ..Default::default()
            };
        }

        self.tick += 1;
        let tick = self.tick;
        let mut events: Vec<EventKind> = Vec::new();
        let mut kills: Vec<KillRecord> = Vec::new();

        for s in self.soldiers.iter_mut() {
            s.damaged_this_tick = false;
        }

        // Commands
        while let Some((player, command)) = self.queue.pop_front() {
            self.apply_command(player, command);
        }

        // Utility
        UtilitySystem::decay(&mut self.smokes, &mut self.soldiers);
        let throws = std::mem::take(&mut self.throws);
        let utility = UtilitySystem::resolve(
            &throws,
            &mut self.soldiers,
            &mut self.smokes,
            &self.walls,
            self.map.bounds,
            tick,
        );
        events.extend(utility.events);
        kills.extend(utility.kills);

        // Movement
        MovementSystem::run(&mut self.soldiers, &self.walls, self.map.bounds);

        // Detection
        let sight = Sight::new(&self.walls, &self.smokes);
        events.extend(DetectionSystem::run(&mut self.soldiers, &sight, &mut self.rng, tick));

        // Combat
        let mut ctx = CombatContext {
            tick,
            soldiers: &mut self.soldiers,
            cover: &mut self.cover,
            sight,
            rng: &mut self.rng,
        };
        let combat = self.resolver.resolve(&mut ctx);
        events.extend(combat.events);
        kills.extend(combat.kills);

        // Nobody keeps a dead enemy in sight
        let dead: Vec<SoldierId> = self
            .soldiers
            .iter()
            .filter(|s| !s.alive)
            .map(|s| s.id)
            .collect();
        for s in self.soldiers.iter_mut() {
            for id in &dead {
                s.detected.remove(id);
            }
            if s.target.map_or(false, |t| dead.contains(&t)) {
                s.target = None;
                s.shots_fired = 0;
            }
        }

        // Bomb
        events.extend(BombSystem::run(&mut self.bomb, &mut self.soldiers, &self.map));

        // Round check
        self.winner = self.check_round_end();

        for s in self.soldiers.iter_mut() {
            s.enforce_invariants();
        }

        self.round_kills.extend(kills.iter().cloned());
        if let Some(side) = self.winner {
            tracing::debug!(tick, winner = ?side, "round decided");
        }

        TickResult {
            tick,
            events: events
                .into_iter()
                .map(|kind| TickEvent { tick, kind })
                .collect(),
            kills,
            round_ended: self.winner.is_some(),
            winning_side: self.winner,
        }
    }

    fn check_round_end(&self) -> Option<Side> {
        if self.bomb.exploded {
            return Some(Side::Attacker);
        }
        if self.bomb.defused {
            return Some(Side::Defender);
        }
        let attackers = self.alive_count(Side::Attacker);
        let defenders = self.alive_count(Side::Defender);
        match (attackers, defenders) {
            (0, 0) if self.bomb.planted => Some(Side::Attacker),
            (0, 0) => Some(Side::Defender),
            (_, 0) => Some(Side::Attacker),
            (0, _) if !self.bomb.planted => Some(Side::Defender),
            _ => None,
        }
    }

    /// Force a round result from outside the tick (phase timer expiry)
    pub fn end_round(&mut self, winner: Side) {
        if self.winner.is_none() {
            self.winner = Some(winner);
        }
    }

    fn apply_command(&mut self, player: PlayerNumber, command: Command) {
        let id = SoldierId::new(player, command.soldier_index);
        let side = self.side_of(player);
        let own_spawn = self.spawn_zone(side).center();
        let bomb_position = self.bomb.position.filter(|_| self.bomb.is_live());
        let bomb_planted = self.bomb.planted;
        let regroup_point = self.regroup_point(player, id);
        let plant_point = self.soldier(id).and_then(|s| {
            if self.map.plant_site_at(s.position).is_some() {
                None
            } else {
                self.map.nearest_plant_point(s.position)
            }
        });

        let Some(soldier) = self.soldiers.get_mut(id.0 as usize) else {
            return;
        };
        if !soldier.alive {
            tracing::debug!(soldier = ?id, command = command.kind.name(), "command for dead soldier ignored");
            return;
        }

        let walk_to = |soldier: &mut Soldier, target: Vec2, intent: Intent| {
            soldier.waypoints.clear();
            soldier.waypoints.push_back(target);
            soldier.stuck_ticks = 0;
            soldier.stance = Stance::Standing;
            soldier.intent = intent;
            soldier.action_progress_ticks = 0;
        };

        match command.kind {
            CommandKind::Move { target } => walk_to(soldier, target, Intent::Move),
            CommandKind::Rush { target } => walk_to(soldier, target, Intent::Rush),
            CommandKind::Hold { facing } => {
                soldier.waypoints.clear();
                soldier.stance = Stance::Crouching;
                soldier.intent = Intent::Hold;
                soldier.action_progress_ticks = 0;
                if let Some(p) = facing {
                    let dir = p - soldier.position;
                    if dir.length_sq() > f32::EPSILON {
                        soldier.facing = dir.angle();
                    }
                }
            }
            CommandKind::Retreat { target } => {
                walk_to(soldier, target.unwrap_or(own_spawn), Intent::Retreat)
            }
            CommandKind::UseUtility { utility, target } => {
                self.throws.push(PendingThrow {
                    thrower: id,
                    utility,
                    target,
                });
            }
            CommandKind::PlantBomb { target } => {
                if side != Side::Attacker || bomb_planted {
                    tracing::debug!(soldier = ?id, "plant order not applicable");
                    return;
                }
                match target.or(plant_point) {
                    Some(p) => walk_to(soldier, p, Intent::Plant),
                    None => {
                        soldier.waypoints.clear();
                        soldier.intent = Intent::Plant;
                        soldier.stance = Stance::Standing;
                    }
                }
            }
            CommandKind::DefuseBomb { target } => {
                if side != Side::Defender {
                    tracing::debug!(soldier = ?id, "defuse order not applicable");
                    return;
                }
                match target.or(bomb_position) {
                    Some(p) => walk_to(soldier, p, Intent::Defuse),
                    None => {
                        soldier.waypoints.clear();
                        soldier.intent = Intent::Defuse;
                        soldier.stance = Stance::Standing;
                    }
                }
            }
            CommandKind::Regroup => match regroup_point {
                Some(p) => walk_to(soldier, p, Intent::Regroup),
                None => tracing::debug!(soldier = ?id, "nobody to regroup with"),
            },
        }
    }

    /// Centroid of the other living squad members
    fn regroup_point(&self, player: PlayerNumber, except: SoldierId) -> Option<Vec2> {
        let mates: Vec<Vec2> = self
            .soldiers
            .iter()
            .filter(|s| s.owner == player && s.alive && s.id != except)
            .map(|s| s.position)
            .collect();
        if mates.is_empty() {
            return None;
        }
        let sum = mates.iter().fold(Vec2::ZERO, |acc, p| acc + *p);
        Some(self.map.clamp_to_bounds(sum * (1.0 / mates.len() as f32)))
    }

    // Accessors

    pub fn get_filtered_state(&self, player: PlayerNumber) -> FilteredGameState {
        FogFilter::project(self, player)
    }

    pub fn get_round_kills(&self) -> &[KillRecord] {
        &self.round_kills
    }

    pub fn soldiers(&self) -> &[Soldier] {
        &self.soldiers
    }

    pub fn soldier(&self, id: SoldierId) -> Option<&Soldier> {
        self.soldiers.get(id.0 as usize)
    }

    /// Direct soldier access for scenario setup in tests and tools
    pub fn soldier_mut(&mut self, id: SoldierId) -> Option<&mut Soldier> {
        self.soldiers.get_mut(id.0 as usize)
    }

    pub fn map(&self) -> &MapData {
        &self.map
    }

    pub fn walls(&self) -> &[Rect] {
        &self.walls
    }

    pub fn smokes(&self) -> &[SmokeCloud] {
        &self.smokes
    }

    pub fn bomb(&self) -> &BombState {
        &self.bomb
    }

    pub fn bomb_mut(&mut self) -> &mut BombState {
        &mut self.bomb
    }

    pub fn tick(&self) -> u32 {
        self.tick
    }

    pub fn rng(&self) -> &MatchRng {
        &self.rng
    }

    pub fn attacker(&self) -> PlayerNumber {
        self.attacker
    }

    pub fn side_of(&self, player: PlayerNumber) -> Side {
        if player == self.attacker {
            Side::Attacker
        } else {
            Side::Defender
        }
    }

    pub fn spawn_zone(&self, side: Side) -> Rect {
        match side {
            Side::Attacker => self.spawns[0],
            Side::Defender => self.spawns[1],
        }
    }

    pub fn winner(&self) -> Option<Side> {
        self.winner
    }

    pub fn alive_count(&self, side: Side) -> usize {
        self.soldiers
            .iter()
            .filter(|s| s.side == side && s.alive)
            .count()
    }

    pub fn resolver_name(&self) -> &'static str {
        self.resolver.name()
    }
}

/// Spread five spawn points along the long axis of the zone
pub fn spawn_slot(zone: Rect, index: usize) -> Vec2 {
    let t = (index as f32 + 1.0) / (SQUAD_SIZE as f32 + 1.0);
    let c = zone.center();
    if zone.width >= zone.height {
        Vec2::new(zone.x + zone.width * t, c.z)
    } else {
        Vec2::new(c.x, zone.z + zone.height * t)
    }
}
