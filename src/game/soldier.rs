//! Soldier runtime state, identities and attributes

use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, VecDeque};

use super::equipment::Loadout;
use super::geometry::Vec2;

/// Soldiers per squad
pub const SQUAD_SIZE: usize = 5;
/// Full health
pub const MAX_HEALTH: f32 = 100.0;

/// Which of the two players in a room
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlayerNumber {
    One,
    Two,
}

impl PlayerNumber {
    pub const ALL: [PlayerNumber; 2] = [PlayerNumber::One, PlayerNumber::Two];

    pub fn index(self) -> usize {
        match self {
            PlayerNumber::One => 0,
            PlayerNumber::Two => 1,
        }
    }

    pub fn other(self) -> PlayerNumber {
        match self {
            PlayerNumber::One => PlayerNumber::Two,
            PlayerNumber::Two => PlayerNumber::One,
        }
    }
}

/// Objective side for the current half
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Side {
    Attacker,
    Defender,
}

impl Side {
    pub fn opposite(self) -> Side {
        match self {
            Side::Attacker => Side::Defender,
            Side::Defender => Side::Attacker,
        }
    }
}

/// Match-unique soldier id: player one owns 0-4, player two owns 5-9
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SoldierId(pub u8);

impl SoldierId {
    pub fn new(owner: PlayerNumber, index: usize) -> Self {
        Self((owner.index() * SQUAD_SIZE + index) as u8)
    }

    pub fn owner(self) -> PlayerNumber {
        if (self.0 as usize) < SQUAD_SIZE {
            PlayerNumber::One
        } else {
            PlayerNumber::Two
        }
    }

    pub fn index(self) -> usize {
        self.0 as usize % SQUAD_SIZE
    }
}

/// The ten 1-100 soldier attributes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attributes {
    pub accuracy: u8,
    pub reaction: u8,
    pub speed: u8,
    pub stealth: u8,
    pub awareness: u8,
    pub recoil_control: u8,
    pub composure: u8,
    pub clutch: u8,
    pub utility: u8,
    pub teamwork: u8,
}

impl Attributes {
    /// Every attribute set to the same value
    pub const fn uniform(value: u8) -> Self {
        Self {
            accuracy: value,
            reaction: value,
            speed: value,
            stealth: value,
            awareness: value,
            recoil_control: value,
            composure: value,
            clutch: value,
            utility: value,
            teamwork: value,
        }
    }

    /// Copy with every attribute forced into 1..=100
    pub fn clamped(self) -> Self {
        let c = |v: u8| v.clamp(1, 100);
        Self {
            accuracy: c(self.accuracy),
            reaction: c(self.reaction),
            speed: c(self.speed),
            stealth: c(self.stealth),
            awareness: c(self.awareness),
            recoil_control: c(self.recoil_control),
            composure: c(self.composure),
            clutch: c(self.clutch),
            utility: c(self.utility),
            teamwork: c(self.teamwork),
        }
    }
}

impl Default for Attributes {
    fn default() -> Self {
        Self::uniform(50)
    }
}

/// Roster entry supplied by the host for each squad slot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SoldierProfile {
    pub name: String,
    pub attributes: Attributes,
}

impl SoldierProfile {
    /// Average five-soldier squad used when the host supplies no roster
    pub fn default_squad(owner: PlayerNumber) -> Vec<SoldierProfile> {
        let tag = match owner {
            PlayerNumber::One => "A",
            PlayerNumber::Two => "B",
        };
        (0..SQUAD_SIZE)
            .map(|i| SoldierProfile {
                name: format!("{tag}{}", i + 1),
                attributes: Attributes::default(),
            })
            .collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stance {
    Standing,
    Crouching,
}

/// Standing order derived from the last command consumed for a soldier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Intent {
    Idle,
    Move,
    Rush,
    Hold,
    Retreat,
    Plant,
    Defuse,
    Regroup,
}

/// Authoritative per-round soldier state
#[derive(Debug, Clone, PartialEq)]
pub struct Soldier {
    pub id: SoldierId,
    pub owner: PlayerNumber,
    pub side: Side,
    pub index: usize,
    pub name: String,
    pub attributes: Attributes,

    // Position and movement
    pub position: Vec2,
    pub facing: f32,
    pub stance: Stance,
    pub intent: Intent,
    pub waypoints: VecDeque<Vec2>,
    pub stuck_ticks: u32,
    pub moved_this_tick: bool,

    // Combat
    pub health: f32,
    pub alive: bool,
    pub loadout: Loadout,
    /// Weak reference by id, resolved through the engine each tick
    pub target: Option<SoldierId>,
    pub detected: BTreeSet<SoldierId>,
    pub shots_fired: u32,
    pub weapon_cooldown: u32,
    /// First tick on which the soldier may fire after acquiring a target
    pub ready_at_tick: u32,
    pub blinded_ticks: u32,
    pub in_combat: bool,
    pub damaged_this_tick: bool,

    // Objective
    pub action_progress_ticks: u32,

    // Stats
    pub kills: u32,
    pub damage_dealt: f32,
}

impl Soldier {
    pub fn new(
        owner: PlayerNumber,
        side: Side,
        index: usize,
        profile: &SoldierProfile,
        loadout: Loadout,
        position: Vec2,
        facing: f32,
    ) -> Self {
        Self {
            id: SoldierId::new(owner, index),
            owner,
            side,
            index,
            name: profile.name.clone(),
            attributes: profile.attributes.clamped(),
            position,
            facing,
            stance: Stance::Standing,
            intent: Intent::Idle,
            waypoints: VecDeque::new(),
            stuck_ticks: 0,
            moved_this_tick: false,
            health: MAX_HEALTH,
            alive: true,
            loadout,
            target: None,
            detected: BTreeSet::new(),
            shots_fired: 0,
            weapon_cooldown: 0,
            ready_at_tick: 0,
            blinded_ticks: 0,
            in_combat: false,
            damaged_this_tick: false,
            action_progress_ticks: 0,
            kills: 0,
            damage_dealt: 0.0,
        }
    }

    pub fn is_blinded(&self) -> bool {
        self.blinded_ticks > 0
    }

    pub fn has_waypoints(&self) -> bool {
        !self.waypoints.is_empty()
    }

    /// Subtract damage, returning true when this hit killed the soldier.
    /// Damage to an already-dead soldier is ignored.
    pub fn apply_damage(&mut self, amount: f32) -> bool {
        if !self.alive {
            return false;
        }
        let amount = if amount.is_finite() { amount.max(0.0) } else { 0.0 };
        if amount > 0.0 {
            self.damaged_this_tick = true;
        }
        self.health = (self.health - amount).clamp(0.0, MAX_HEALTH);
        if self.health <= 0.0 {
            self.kill();
            return true;
        }
        false
    }

    /// Mark dead and drop everything that only a living soldier holds
    pub fn kill(&mut self) {
        self.health = 0.0;
        self.alive = false;
        self.waypoints.clear();
        self.target = None;
        self.detected.clear();
        self.shots_fired = 0;
        self.action_progress_ticks = 0;
        self.in_combat = false;
    }

    /// Health and liveness invariants. Panics in debug builds, repairs the
    /// state in release builds.
    pub fn enforce_invariants(&mut self) {
        let consistent = self.health >= 0.0
            && self.health <= MAX_HEALTH
            && self.alive == (self.health > 0.0);
        debug_assert!(
            consistent,
            "soldier {:?} invariant violated: health={} alive={}",
            self.id, self.health, self.alive
        );
        if !consistent {
            self.health = if self.health.is_finite() {
                self.health.clamp(0.0, MAX_HEALTH)
            } else {
                0.0
            };
            if self.health <= 0.0 {
                self.kill();
            } else {
                self.alive = true;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn soldier() -> Soldier {
        let profile = SoldierProfile {
            name: "T".into(),
            attributes: Attributes::default(),
        };
        Soldier::new(
            PlayerNumber::Two,
            Side::Defender,
            3,
            &profile,
            Loadout::default(),
            Vec2::ZERO,
            0.0,
        )
    }

    #[test]
    fn ids_encode_owner_and_index() {
        let id = SoldierId::new(PlayerNumber::Two, 3);
        assert_eq!(id, SoldierId(8));
        assert_eq!(id.owner(), PlayerNumber::Two);
        assert_eq!(id.index(), 3);
        assert_eq!(SoldierId::new(PlayerNumber::One, 4).owner(), PlayerNumber::One);
    }

    #[test]
    fn lethal_damage_kills_once() {
        let mut s = soldier();
        assert!(!s.apply_damage(60.0));
        assert!(s.alive);
        assert!(s.apply_damage(60.0));
        assert_eq!(s.health, 0.0);
        assert!(!s.alive);
        assert!(!s.apply_damage(10.0), "already dead");
    }

    #[test]
    fn damage_never_heals() {
        let mut s = soldier();
        s.apply_damage(-50.0);
        s.apply_damage(f32::NAN);
        assert_eq!(s.health, MAX_HEALTH);
    }

    #[test]
    fn attributes_are_clamped_on_spawn() {
        let profile = SoldierProfile {
            name: "X".into(),
            attributes: Attributes::uniform(0),
        };
        let s = Soldier::new(
            PlayerNumber::One,
            Side::Attacker,
            0,
            &profile,
            Loadout::default(),
            Vec2::ZERO,
            0.0,
        );
        assert_eq!(s.attributes, Attributes::uniform(1));
    }
}
