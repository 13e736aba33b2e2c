//! Detection - who sees whom this tick
//!
//! Detection is asymmetric: every observer rolls against every enemy on its
//! own, so one-sided ambushes happen. Once acquired, a detection persists for
//! as long as line of sight holds and does not flicker on cone misses.

use super::events::EventKind;
use super::formulas::{
    detection_chance, effective_detection_radius, ms_to_ticks, peripheral_detection_chance,
    roll_reaction_ms,
};
use super::geometry::{angle_between, has_line_of_sight, segment_intersects_circle, Rect, Vec2};
use super::rng::MatchRng;
use super::soldier::{Soldier, SoldierId};
use super::utility::SmokeCloud;

/// Half-angle of the forward vision cone (120 degrees total)
pub const VISION_HALF_ANGLE_DEG: f32 = 60.0;
/// Half-angle of the outer edge of the peripheral band (180 degrees total)
pub const PERIPHERAL_HALF_ANGLE_DEG: f32 = 90.0;

/// Occluders for one tick: walls always, smoke clouds while active
#[derive(Debug, Clone, Copy)]
pub struct Sight<'a> {
    pub walls: &'a [Rect],
    pub smokes: &'a [SmokeCloud],
}

impl<'a> Sight<'a> {
    pub fn new(walls: &'a [Rect], smokes: &'a [SmokeCloud]) -> Self {
        Self { walls, smokes }
    }

    pub fn is_clear(&self, a: Vec2, b: Vec2) -> bool {
        has_line_of_sight(a, b, self.walls)
            && !self
                .smokes
                .iter()
                .any(|s| segment_intersects_circle(a, b, s.center, s.radius))
    }
}

/// Band of the observer's field of view a target falls in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VisionBand {
    Forward,
    Peripheral,
    Outside,
}

pub fn vision_band(observer: Vec2, facing: f32, target: Vec2) -> VisionBand {
    let to_target = target - observer;
    if to_target.length_sq() <= f32::EPSILON {
        return VisionBand::Forward;
    }
    let off = angle_between(to_target.angle(), facing);
    if off <= VISION_HALF_ANGLE_DEG.to_radians() {
        VisionBand::Forward
    } else if off <= PERIPHERAL_HALF_ANGLE_DEG.to_radians() {
        VisionBand::Peripheral
    } else {
        VisionBand::Outside
    }
}

/// Read-only view of a potential detection target
#[derive(Debug, Clone, Copy)]
struct Candidate {
    id: SoldierId,
    position: Vec2,
    alive: bool,
    stealth: u8,
}

/// Detection system run once per tick after movement
pub struct DetectionSystem;

impl DetectionSystem {
    /// Update every soldier's detected set, target and facing. Soldiers must
    /// be stored in id order.
    pub fn run(
        soldiers: &mut [Soldier],
        sight: &Sight<'_>,
        rng: &mut MatchRng,
        tick: u32,
    ) -> Vec<EventKind> {
        let candidates: Vec<Candidate> = soldiers
            .iter()
            .map(|s| Candidate {
                id: s.id,
                position: s.position,
                alive: s.alive,
                stealth: s.attributes.stealth,
            })
            .collect();

        let mut events = Vec::new();
        for observer in soldiers.iter_mut() {
            if !observer.alive {
                continue;
            }
            Self::update_observer(observer, &candidates, sight, rng, tick, &mut events);
        }
        events
    }

    fn update_observer(
        observer: &mut Soldier,
        candidates: &[Candidate],
        sight: &Sight<'_>,
        rng: &mut MatchRng,
        tick: u32,
        events: &mut Vec<EventKind>,
    ) {
        let origin = observer.position;

        // Persistence: keep only living enemies still in clear sight
        observer.detected.retain(|id| {
            candidates
                .get(id.0 as usize)
                .map_or(false, |c| c.alive && sight.is_clear(origin, c.position))
        });
        if let Some(t) = observer.target {
            if !observer.detected.contains(&t) {
                observer.target = None;
                observer.shots_fired = 0;
            }
        }

        let engaged = observer.target.is_some() || observer.in_combat;

        // Acquisition
        if !observer.is_blinded() {
            for enemy in candidates
                .iter()
                .filter(|c| c.alive && c.id.owner() != observer.owner)
            {
                if observer.detected.contains(&enemy.id) {
                    continue;
                }
                let radius =
                    effective_detection_radius(observer.attributes.awareness, enemy.stealth);
                if origin.distance(enemy.position) > radius {
                    continue;
                }
                let chance = match vision_band(origin, observer.facing, enemy.position) {
                    VisionBand::Forward => {
                        detection_chance(observer.attributes.awareness, enemy.stealth)
                    }
                    VisionBand::Peripheral => {
                        peripheral_detection_chance(observer.attributes.awareness, enemy.stealth)
                    }
                    VisionBand::Outside => continue,
                };
                if !sight.is_clear(origin, enemy.position) {
                    continue;
                }
                if !rng.chance(chance) {
                    continue;
                }

                observer.detected.insert(enemy.id);
                let reaction_ms = roll_reaction_ms(observer.attributes.reaction, rng);
                if !engaged {
                    let ready = tick + ms_to_ticks(reaction_ms);
                    observer.ready_at_tick = observer.ready_at_tick.max(ready);
                }
                tracing::trace!(tick, observer = ?observer.id, target = ?enemy.id, reaction_ms, "detected");
                events.push(EventKind::Detected {
                    observer: observer.id,
                    target: enemy.id,
                });
            }
        }

        Self::select_target(observer, candidates);
    }

    /// Keep the current target while detected, otherwise take the nearest
    /// detected enemy (lower id on ties)
    fn select_target(observer: &mut Soldier, candidates: &[Candidate]) {
        let origin = observer.position;
        let current = observer.target.filter(|t| observer.detected.contains(t));
        let next = current.or_else(|| {
            let mut best: Option<(f32, SoldierId)> = None;
            for id in &observer.detected {
                let Some(c) = candidates.get(id.0 as usize) else {
                    continue;
                };
                let d = origin.distance(c.position);
                if best.map_or(true, |(bd, _)| d < bd) {
                    best = Some((d, *id));
                }
            }
            best.map(|(_, id)| id)
        });

        if next != observer.target {
            observer.shots_fired = 0;
        }
        observer.target = next;

        if !observer.moved_this_tick {
            if let Some(c) = next.and_then(|id| candidates.get(id.0 as usize)) {
                let dir = c.position - origin;
                if dir.length_sq() > f32::EPSILON {
                    observer.facing = dir.angle();
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::equipment::Loadout;
    use crate::game::soldier::{Attributes, PlayerNumber, Side, SoldierProfile};

    fn squads(attrs: Attributes) -> Vec<Soldier> {
        let mut soldiers = Vec::new();
        for owner in PlayerNumber::ALL {
            let side = match owner {
                PlayerNumber::One => Side::Attacker,
                PlayerNumber::Two => Side::Defender,
            };
            for i in 0..5 {
                let profile = SoldierProfile {
                    name: format!("s{i}"),
                    attributes: attrs,
                };
                // Parked far apart in corners so only the soldiers a test
                // moves can see each other
                let park = match owner {
                    PlayerNumber::One => Vec2::new(0.0, i as f32),
                    PlayerNumber::Two => Vec2::new(1000.0, i as f32),
                };
                soldiers.push(Soldier::new(owner, side, i, &profile, Loadout::default(), park, 0.0));
            }
        }
        soldiers
    }

    #[test]
    fn vision_bands() {
        let o = Vec2::ZERO;
        assert_eq!(vision_band(o, 0.0, Vec2::new(10.0, 1.0)), VisionBand::Forward);
        assert_eq!(vision_band(o, 0.0, Vec2::new(1.0, 10.0)), VisionBand::Peripheral);
        assert_eq!(vision_band(o, 0.0, Vec2::new(-10.0, 0.0)), VisionBand::Outside);
    }

    #[test]
    fn smoke_blocks_sight() {
        let smokes = [SmokeCloud {
            center: Vec2::new(5.0, 0.0),
            radius: 4.0,
            remaining_ticks: 10,
        }];
        let sight = Sight::new(&[], &smokes);
        assert!(!sight.is_clear(Vec2::ZERO, Vec2::new(10.0, 0.0)));
        assert!(sight.is_clear(Vec2::new(0.0, 20.0), Vec2::new(10.0, 20.0)));
    }

    #[test]
    fn facing_enemy_in_range_is_eventually_detected() {
        let mut soldiers = squads(Attributes::uniform(100));
        soldiers[0].position = Vec2::new(10.0, 10.0);
        soldiers[0].facing = 0.0;
        soldiers[5].position = Vec2::new(20.0, 10.0);
        // Enemy faces away so the detection is one-sided
        soldiers[5].facing = 0.0;

        let mut rng = MatchRng::new(1);
        let sight = Sight::new(&[], &[]);
        for tick in 1..=50 {
            DetectionSystem::run(&mut soldiers, &sight, &mut rng, tick);
            if soldiers[0].detected.contains(&SoldierId(5)) {
                break;
            }
        }
        assert!(soldiers[0].detected.contains(&SoldierId(5)));
        assert_eq!(soldiers[0].target, Some(SoldierId(5)));
        assert!(soldiers[5].detected.is_empty());
        assert!(soldiers[0].ready_at_tick > 0);
    }

    #[test]
    fn enemies_behind_walls_are_never_detected() {
        let mut soldiers = squads(Attributes::uniform(100));
        soldiers[0].position = Vec2::new(10.0, 10.0);
        soldiers[5].position = Vec2::new(20.0, 10.0);
        soldiers[5].facing = std::f32::consts::PI;
        let walls = [Rect::new(14.0, 0.0, 2.0, 20.0)];
        let sight = Sight::new(&walls, &[]);
        let mut rng = MatchRng::new(1);
        for tick in 1..=100 {
            DetectionSystem::run(&mut soldiers, &sight, &mut rng, tick);
        }
        assert!(soldiers[0].detected.is_empty());
        assert!(soldiers[5].detected.is_empty());
        // Nobody was a candidate, so nothing was drawn
        assert_eq!(rng.draws(), 0);
    }

    #[test]
    fn detection_persists_outside_cone_until_sight_breaks() {
        let mut soldiers = squads(Attributes::default());
        soldiers[0].position = Vec2::new(10.0, 10.0);
        soldiers[0].facing = std::f32::consts::PI;
        soldiers[5].position = Vec2::new(20.0, 10.0);
        soldiers[0].detected.insert(SoldierId(5));
        soldiers[0].moved_this_tick = true;

        let mut rng = MatchRng::new(3);
        DetectionSystem::run(&mut soldiers, &Sight::new(&[], &[]), &mut rng, 1);
        assert!(soldiers[0].detected.contains(&SoldierId(5)));

        let walls = [Rect::new(14.0, 0.0, 2.0, 20.0)];
        DetectionSystem::run(&mut soldiers, &Sight::new(&walls, &[]), &mut rng, 2);
        assert!(!soldiers[0].detected.contains(&SoldierId(5)));
        assert_eq!(soldiers[0].target, None);
    }

    #[test]
    fn dead_enemies_are_purged() {
        let mut soldiers = squads(Attributes::default());
        soldiers[0].detected.insert(SoldierId(6));
        soldiers[0].target = Some(SoldierId(6));
        soldiers[6].kill();
        let mut rng = MatchRng::new(3);
        DetectionSystem::run(&mut soldiers, &Sight::new(&[], &[]), &mut rng, 1);
        assert!(soldiers[0].detected.is_empty());
        assert_eq!(soldiers[0].target, None);
    }

    #[test]
    fn stationary_soldier_faces_target() {
        let mut soldiers = squads(Attributes::default());
        soldiers[0].position = Vec2::new(10.0, 10.0);
        soldiers[0].facing = 0.0;
        soldiers[5].position = Vec2::new(10.0, 20.0);
        soldiers[0].detected.insert(SoldierId(5));
        let mut rng = MatchRng::new(3);
        DetectionSystem::run(&mut soldiers, &Sight::new(&[], &[]), &mut rng, 1);
        assert!((soldiers[0].facing - std::f32::consts::FRAC_PI_2).abs() < 1e-4);
    }
}
