//! Thrown utility - smokes, flashbangs and frag grenades

use serde::{Deserialize, Serialize};

use super::equipment::{DamageSource, UtilityKind};
use super::events::{EventKind, KillRecord};
use super::formulas::HitLocation;
use super::geometry::{has_line_of_sight, in_cone, Rect, Vec2};
use super::soldier::{Soldier, SoldierId};

/// Longest throw distance
pub const THROW_RANGE: f32 = 25.0;

pub const SMOKE_RADIUS: f32 = 4.0;
pub const SMOKE_BASE_TICKS: u32 = 60;
pub const SMOKE_SKILL_TICKS: f32 = 30.0;

pub const FLASH_RADIUS: f32 = 10.0;
pub const FLASH_BASE_TICKS: f32 = 5.0;
pub const FLASH_SKILL_TICKS: f32 = 10.0;
pub const MIN_FLASH_TICKS: u32 = 2;
/// Flashes only blind soldiers facing the burst within this half-angle
pub const FLASH_HALF_ANGLE_DEG: f32 = 60.0;

pub const FRAG_RADIUS: f32 = 6.0;
pub const FRAG_BASE_DAMAGE: f32 = 60.0;

/// Active smoke cloud
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SmokeCloud {
    pub center: Vec2,
    pub radius: f32,
    pub remaining_ticks: u32,
}

/// A utility throw waiting for the utility step of the current tick
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PendingThrow {
    pub thrower: SoldierId,
    pub utility: UtilityKind,
    pub target: Vec2,
}

pub fn smoke_duration_ticks(utility_skill: u8) -> u32 {
    SMOKE_BASE_TICKS + (SMOKE_SKILL_TICKS * utility_skill.clamp(1, 100) as f32 / 100.0).round() as u32
}

pub fn flash_duration_ticks(utility_skill: u8, distance: f32) -> u32 {
    let skill = utility_skill.clamp(1, 100) as f32;
    let falloff = (1.0 - distance / FLASH_RADIUS).clamp(0.0, 1.0);
    let ticks = ((FLASH_BASE_TICKS + FLASH_SKILL_TICKS * skill / 100.0) * falloff).round() as u32;
    ticks.max(MIN_FLASH_TICKS)
}

pub fn frag_damage(utility_skill: u8, distance: f32) -> f32 {
    let skill = utility_skill.clamp(1, 100) as f32;
    let falloff = (1.0 - distance / FRAG_RADIUS).clamp(0.0, 1.0);
    FRAG_BASE_DAMAGE * falloff * (0.75 + skill / 400.0)
}

/// Where a throw actually lands: no further than `THROW_RANGE` from the
/// thrower, inside the map
pub fn landing_point(from: Vec2, target: Vec2, bounds: Rect) -> Vec2 {
    let offset = target - from;
    let landing = if offset.length() > THROW_RANGE {
        from + offset.normalize_or_zero() * THROW_RANGE
    } else {
        target
    };
    bounds.clamp_point(landing)
}

/// Outcome of the utility step
#[derive(Debug, Default)]
pub struct UtilityOutcome {
    pub events: Vec<EventKind>,
    pub kills: Vec<KillRecord>,
}

/// Utility system for timers and throw resolution
pub struct UtilitySystem;

impl UtilitySystem {
    /// Age smokes and flash blindness by one tick
    pub fn decay(smokes: &mut Vec<SmokeCloud>, soldiers: &mut [Soldier]) {
        for smoke in smokes.iter_mut() {
            smoke.remaining_ticks = smoke.remaining_ticks.saturating_sub(1);
        }
        smokes.retain(|s| s.remaining_ticks > 0);
        for soldier in soldiers.iter_mut() {
            soldier.blinded_ticks = soldier.blinded_ticks.saturating_sub(1);
        }
    }

    /// Resolve this tick's throws in submission order
    pub fn resolve(
        throws: &[PendingThrow],
        soldiers: &mut [Soldier],
        smokes: &mut Vec<SmokeCloud>,
        walls: &[Rect],
        bounds: Rect,
        tick: u32,
    ) -> UtilityOutcome {
        let mut outcome = UtilityOutcome::default();

        for throw in throws {
            let Some(thrower) = soldiers.get_mut(throw.thrower.0 as usize) else {
                continue;
            };
            if !thrower.alive || !thrower.loadout.take_utility(throw.utility) {
                tracing::debug!(soldier = ?throw.thrower, utility = ?throw.utility, "utility throw ignored");
                continue;
            }
            let skill = thrower.attributes.utility;
            let position = landing_point(thrower.position, throw.target, bounds);
            outcome.events.push(EventKind::UtilityThrown {
                thrower: throw.thrower,
                utility: throw.utility,
                position,
            });

            match throw.utility {
                UtilityKind::Smoke => smokes.push(SmokeCloud {
                    center: position,
                    radius: SMOKE_RADIUS,
                    remaining_ticks: smoke_duration_ticks(skill),
                }),
                UtilityKind::Flashbang => {
                    Self::flash(position, skill, soldiers, walls, &mut outcome);
                }
                UtilityKind::Frag => {
                    Self::frag(throw.thrower, position, skill, soldiers, walls, tick, &mut outcome);
                }
            }
        }

        outcome
    }

    fn flash(
        burst: Vec2,
        skill: u8,
        soldiers: &mut [Soldier],
        walls: &[Rect],
        outcome: &mut UtilityOutcome,
    ) {
        let half_angle = FLASH_HALF_ANGLE_DEG.to_radians();
        for soldier in soldiers.iter_mut().filter(|s| s.alive) {
            let d = soldier.position.distance(burst);
            if d > FLASH_RADIUS
                || !in_cone(soldier.position, soldier.facing, burst, half_angle)
                || !has_line_of_sight(soldier.position, burst, walls)
            {
                continue;
            }
            let ticks = flash_duration_ticks(skill, d);
            soldier.blinded_ticks = soldier.blinded_ticks.max(ticks);
            outcome.events.push(EventKind::Blinded {
                soldier: soldier.id,
                ticks,
            });
        }
    }

    fn frag(
        thrower: SoldierId,
        burst: Vec2,
        skill: u8,
        soldiers: &mut [Soldier],
        walls: &[Rect],
        tick: u32,
        outcome: &mut UtilityOutcome,
    ) {
        let source = DamageSource::Utility(UtilityKind::Frag);
        let mut credited = 0u32;
        let mut dealt = 0.0f32;

        for soldier in soldiers.iter_mut().filter(|s| s.alive) {
            let d = soldier.position.distance(burst);
            if d > FRAG_RADIUS || !has_line_of_sight(burst, soldier.position, walls) {
                continue;
            }
            let reduction = soldier.loadout.armor.stats().body_reduction;
            let damage = frag_damage(skill, d) * (1.0 - reduction);
            if damage <= 0.0 {
                continue;
            }
            let killed = soldier.apply_damage(damage);
            dealt += damage;
            outcome.events.push(EventKind::Hit {
                shooter: thrower,
                target: soldier.id,
                damage,
                location: HitLocation::Body,
                source,
            });
            if killed {
                // Team kills are recorded but not credited
                if soldier.owner != thrower.owner() {
                    credited += 1;
                }
                outcome.events.push(EventKind::Kill {
                    killer: thrower,
                    victim: soldier.id,
                    source,
                    headshot: false,
                });
                outcome.kills.push(KillRecord {
                    killer: thrower,
                    victim: soldier.id,
                    weapon: source,
                    headshot: false,
                    tick,
                });
            }
        }

        if let Some(t) = soldiers.get_mut(thrower.0 as usize) {
            t.kills += credited;
            t.damage_dealt += dealt;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::equipment::Loadout;
    use crate::game::soldier::{PlayerNumber, Side, SoldierProfile};

    fn squad_member(owner: PlayerNumber, index: usize, position: Vec2, facing: f32) -> Soldier {
        let side = match owner {
            PlayerNumber::One => Side::Attacker,
            PlayerNumber::Two => Side::Defender,
        };
        Soldier::new(
            owner,
            side,
            index,
            &SoldierProfile::default_squad(owner)[index],
            Loadout::default(),
            position,
            facing,
        )
    }

    fn ten_soldiers() -> Vec<Soldier> {
        let mut soldiers = Vec::new();
        for owner in PlayerNumber::ALL {
            for i in 0..5 {
                soldiers.push(squad_member(owner, i, Vec2::new(90.0, 90.0), 0.0));
            }
        }
        soldiers
    }

    #[test]
    fn throws_are_limited_by_range_and_bounds() {
        let bounds = Rect::new(0.0, 0.0, 100.0, 100.0);
        let p = landing_point(Vec2::new(10.0, 10.0), Vec2::new(80.0, 10.0), bounds);
        assert!((p.x - 35.0).abs() < 1e-4);
        let q = landing_point(Vec2::new(1.0, 1.0), Vec2::new(-5.0, 1.0), bounds);
        assert_eq!(q, Vec2::new(0.0, 1.0));
    }

    #[test]
    fn smoke_is_consumed_and_decays() {
        let mut soldiers = ten_soldiers();
        soldiers[0].loadout.utility = vec![UtilityKind::Smoke];
        let mut smokes = Vec::new();
        let throws = [PendingThrow {
            thrower: SoldierId(0),
            utility: UtilityKind::Smoke,
            target: Vec2::new(80.0, 90.0),
        }];
        let bounds = Rect::new(0.0, 0.0, 100.0, 100.0);
        let out = UtilitySystem::resolve(&throws, &mut soldiers, &mut smokes, &[], bounds, 1);
        assert_eq!(out.events.len(), 1);
        assert_eq!(smokes.len(), 1);
        assert_eq!(smokes[0].remaining_ticks, smoke_duration_ticks(50));
        assert!(soldiers[0].loadout.utility.is_empty());

        // Second throw without the item is a no-op
        let out = UtilitySystem::resolve(&throws, &mut soldiers, &mut smokes, &[], bounds, 2);
        assert!(out.events.is_empty());

        for _ in 0..smoke_duration_ticks(50) {
            UtilitySystem::decay(&mut smokes, &mut soldiers);
        }
        assert!(smokes.is_empty());
    }

    #[test]
    fn flash_blinds_only_soldiers_facing_it() {
        let mut soldiers = ten_soldiers();
        soldiers[0].loadout.utility = vec![UtilityKind::Flashbang];
        soldiers[0].position = Vec2::new(50.0, 50.0);
        // Facing +x toward the burst
        soldiers[5].position = Vec2::new(55.0, 50.0);
        soldiers[5].facing = 0.0;
        // Facing away from the burst
        soldiers[6].position = Vec2::new(55.0, 52.0);
        soldiers[6].facing = std::f32::consts::PI;

        let throws = [PendingThrow {
            thrower: SoldierId(0),
            utility: UtilityKind::Flashbang,
            target: Vec2::new(58.0, 50.0),
        }];
        let mut smokes = Vec::new();
        let bounds = Rect::new(0.0, 0.0, 100.0, 100.0);
        UtilitySystem::resolve(&throws, &mut soldiers, &mut smokes, &[], bounds, 1);
        assert!(soldiers[5].is_blinded());
        assert!(!soldiers[6].is_blinded());
    }

    #[test]
    fn frag_damage_falls_off_and_credits_kills() {
        assert!(frag_damage(50, 0.0) > frag_damage(50, 3.0));
        assert_eq!(frag_damage(50, 6.0), 0.0);

        let mut soldiers = ten_soldiers();
        soldiers[0].loadout.utility = vec![UtilityKind::Frag];
        soldiers[0].position = Vec2::new(10.0, 10.0);
        soldiers[5].position = Vec2::new(20.0, 10.0);
        soldiers[5].health = 5.0;

        let throws = [PendingThrow {
            thrower: SoldierId(0),
            utility: UtilityKind::Frag,
            target: Vec2::new(20.0, 10.0),
        }];
        let mut smokes = Vec::new();
        let bounds = Rect::new(0.0, 0.0, 100.0, 100.0);
        let out = UtilitySystem::resolve(&throws, &mut soldiers, &mut smokes, &[], bounds, 4);
        assert!(!soldiers[5].alive);
        assert_eq!(out.kills.len(), 1);
        assert_eq!(out.kills[0].weapon, DamageSource::Utility(UtilityKind::Frag));
        assert_eq!(soldiers[0].kills, 1);
    }

    #[test]
    fn walls_shield_from_frags() {
        let mut soldiers = ten_soldiers();
        soldiers[0].loadout.utility = vec![UtilityKind::Frag];
        soldiers[0].position = Vec2::new(10.0, 10.0);
        soldiers[5].position = Vec2::new(24.0, 10.0);
        let walls = [Rect::new(21.0, 5.0, 1.0, 10.0)];
        let throws = [PendingThrow {
            thrower: SoldierId(0),
            utility: UtilityKind::Frag,
            target: Vec2::new(20.0, 10.0),
        }];
        let mut smokes = Vec::new();
        let bounds = Rect::new(0.0, 0.0, 100.0, 100.0);
        UtilitySystem::resolve(&throws, &mut soldiers, &mut smokes, &walls, bounds, 1);
        assert_eq!(soldiers[5].health, 100.0);
    }
}
