//! Tick events and results

use serde::{Deserialize, Serialize};

use super::equipment::{DamageSource, UtilityKind};
use super::formulas::HitLocation;
use super::geometry::Vec2;
use super::soldier::{PlayerNumber, Side, SoldierId};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EventKind {
    Detected {
        observer: SoldierId,
        target: SoldierId,
    },
    ShotFired {
        shooter: SoldierId,
        target: SoldierId,
    },
    Hit {
        shooter: SoldierId,
        target: SoldierId,
        damage: f32,
        location: HitLocation,
        source: DamageSource,
    },
    Kill {
        killer: SoldierId,
        victim: SoldierId,
        source: DamageSource,
        headshot: bool,
    },
    CoverAbsorbed {
        shooter: SoldierId,
        cover: usize,
    },
    CoverDestroyed {
        cover: usize,
    },
    UtilityThrown {
        thrower: SoldierId,
        utility: UtilityKind,
        position: Vec2,
    },
    Blinded {
        soldier: SoldierId,
        ticks: u32,
    },
    /// Planter and position are withheld from players who cannot see the bomb
    BombPlanted {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        planter: Option<SoldierId>,
        site_id: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        position: Option<Vec2>,
    },
    BombDefused {
        defuser: SoldierId,
    },
    BombExploded,
}

impl EventKind {
    /// Soldiers named by the event
    pub fn soldiers(&self) -> Vec<SoldierId> {
        match self {
            EventKind::Detected { observer, target } => vec![*observer, *target],
            EventKind::ShotFired { shooter, target } | EventKind::Hit { shooter, target, .. } => {
                vec![*shooter, *target]
            }
            EventKind::Kill { killer, victim, .. } => vec![*killer, *victim],
            EventKind::CoverAbsorbed { shooter, .. } => vec![*shooter],
            EventKind::UtilityThrown { thrower, .. } => vec![*thrower],
            EventKind::Blinded { soldier, .. } => vec![*soldier],
            EventKind::BombPlanted { planter, .. } => planter.iter().copied().collect(),
            EventKind::BombDefused { defuser } => vec![*defuser],
            EventKind::CoverDestroyed { .. } | EventKind::BombExploded => Vec::new(),
        }
    }

    /// Events every player receives regardless of what they can see
    pub fn is_public(&self) -> bool {
        matches!(
            self,
            EventKind::Kill { .. }
                | EventKind::CoverDestroyed { .. }
                | EventKind::BombPlanted { .. }
                | EventKind::BombDefused { .. }
                | EventKind::BombExploded
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TickEvent {
    pub tick: u32,
    #[serde(flatten)]
    pub kind: EventKind,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KillRecord {
    pub killer: SoldierId,
    pub victim: SoldierId,
    pub weapon: DamageSource,
    pub headshot: bool,
    pub tick: u32,
}

impl KillRecord {
    pub fn killer_owner(&self) -> PlayerNumber {
        self.killer.owner()
    }
}

/// Everything that happened during one tick
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct TickResult {
    pub tick: u32,
    pub events: Vec<TickEvent>,
    pub kills: Vec<KillRecord>,
    pub round_ended: bool,
    pub winning_side: Option<Side>,
}

impl TickResult {
    pub fn bomb_planted(&self) -> bool {
        self.events
            .iter()
            .any(|e| matches!(e.kind, EventKind::BombPlanted { .. }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn events_serialize_flat_with_tick() {
        let ev = TickEvent {
            tick: 12,
            kind: EventKind::ShotFired {
                shooter: SoldierId(1),
                target: SoldierId(7),
            },
        };
        let json = serde_json::to_value(&ev).unwrap();
        assert_eq!(json["type"], "shot_fired");
        assert_eq!(json["tick"], 12);
        assert_eq!(json["target"], 7);
    }

    #[test]
    fn kills_and_bomb_events_are_public() {
        assert!(EventKind::BombExploded.is_public());
        assert!(!EventKind::Detected {
            observer: SoldierId(0),
            target: SoldierId(5)
        }
        .is_public());
    }
}
