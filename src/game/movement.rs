//! Soldier movement and wall collision

use super::formulas::movement_speed;
use super::geometry::{Rect, Vec2};
use super::soldier::{Intent, Soldier};
use crate::util::time::tick_delta;

/// Soldier collision radius against walls
pub const SOLDIER_RADIUS: f32 = 0.5;
/// Distance at which a waypoint counts as reached
pub const WAYPOINT_EPSILON: f32 = 0.25;
/// Multiplier while rushing
pub const RUSH_MULTIPLIER: f32 = 1.25;
/// Multiplier while exchanging fire
pub const SUPPRESSION_MULTIPLIER: f32 = 0.5;
/// Ticks without progress before a soldier gives up on its path
pub const STUCK_TICK_LIMIT: u32 = 10;
/// Smallest displacement that counts as having moved
const MIN_PROGRESS: f32 = 1e-4;
const SEARCH_STEPS: usize = 8;

/// Movement system for advancing soldiers along their waypoints
pub struct MovementSystem;

impl MovementSystem {
    /// Distance a soldier covers this tick
    pub fn step_distance(soldier: &Soldier) -> f32 {
        let weapon = soldier.loadout.weapon.stats();
        let armor = soldier.loadout.armor.stats();
        let mut speed = movement_speed(
            soldier.attributes.speed,
            weapon.speed_modifier,
            armor.speed_penalty,
        );
        if soldier.intent == Intent::Rush {
            speed *= RUSH_MULTIPLIER;
        }
        if soldier.in_combat {
            speed *= SUPPRESSION_MULTIPLIER;
        }
        speed * tick_delta()
    }

    /// Move every living soldier one tick along its queue
    pub fn run(soldiers: &mut [Soldier], walls: &[Rect], bounds: Rect) {
        for soldier in soldiers.iter_mut() {
            soldier.moved_this_tick = false;
            if soldier.alive {
                Self::update_soldier(soldier, walls, bounds);
            }
        }
    }

    fn update_soldier(soldier: &mut Soldier, walls: &[Rect], bounds: Rect) {
        let Some(&waypoint) = soldier.waypoints.front() else {
            return;
        };

        let start = soldier.position;
        let to_waypoint = waypoint - start;
        let remaining = to_waypoint.length();
        if remaining <= WAYPOINT_EPSILON {
            Self::arrive(soldier);
            return;
        }

        let step = Self::step_distance(soldier).min(remaining);
        let desired = bounds.clamp_point(start + to_waypoint.normalize_or_zero() * step);
        let reached = Self::resolve_collision(start, desired, walls);
        let moved = reached - start;

        if moved.length() > MIN_PROGRESS {
            soldier.position = reached;
            soldier.facing = moved.angle();
            soldier.moved_this_tick = true;
            soldier.stuck_ticks = 0;
        } else {
            soldier.stuck_ticks += 1;
            if soldier.stuck_ticks >= STUCK_TICK_LIMIT {
                tracing::debug!(soldier = ?soldier.id, ?waypoint, "path blocked, clearing waypoints");
                soldier.waypoints.clear();
                soldier.stuck_ticks = 0;
                Self::settle_intent(soldier);
                return;
            }
        }

        if soldier.position.distance(waypoint) <= WAYPOINT_EPSILON {
            Self::arrive(soldier);
        }
    }

    fn arrive(soldier: &mut Soldier) {
        soldier.waypoints.pop_front();
        soldier.stuck_ticks = 0;
        if soldier.waypoints.is_empty() {
            Self::settle_intent(soldier);
        }
    }

    /// Travel orders finish when the queue empties; objective and hold
    /// orders keep their intent
    fn settle_intent(soldier: &mut Soldier) {
        if matches!(
            soldier.intent,
            Intent::Move | Intent::Rush | Intent::Retreat | Intent::Regroup
        ) {
            soldier.intent = Intent::Idle;
        }
    }

    /// Furthest point toward `desired` that does not cross a wall. Tries the
    /// full step, then each axis alone, then searches along the step.
    pub fn resolve_collision(from: Vec2, desired: Vec2, walls: &[Rect]) -> Vec2 {
        if Self::path_clear(from, desired, walls) {
            return desired;
        }

        let slide_x = Vec2::new(desired.x, from.z);
        let slide_z = Vec2::new(from.x, desired.z);
        let sx = slide_x.distance(from);
        let sz = slide_z.distance(from);
        // Prefer the longer slide
        let slides = if sx >= sz { [slide_x, slide_z] } else { [slide_z, slide_x] };
        for candidate in slides {
            if candidate.distance(from) > MIN_PROGRESS && Self::path_clear(from, candidate, walls) {
                return candidate;
            }
        }

        let mut lo = 0.0f32;
        let mut hi = 1.0f32;
        for _ in 0..SEARCH_STEPS {
            let mid = (lo + hi) * 0.5;
            if Self::path_clear(from, from.lerp(desired, mid), walls) {
                lo = mid;
            } else {
                hi = mid;
            }
        }
        from.lerp(desired, lo)
    }

    /// A segment is walkable when it crosses no wall and does not enter a
    /// wall's radius margin (unless it starts inside that margin)
    pub fn path_clear(from: Vec2, to: Vec2, walls: &[Rect]) -> bool {
        walls.iter().all(|wall| {
            if wall.intersects_segment(from, to) {
                return false;
            }
            let margin = wall.expanded(SOLDIER_RADIUS);
            margin.contains(from) || !margin.intersects_segment(from, to)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::equipment::{ArmorKind, Loadout, WeaponKind};
    use crate::game::soldier::{PlayerNumber, Side, SoldierProfile};

    fn soldier_at(p: Vec2) -> Soldier {
        Soldier::new(
            PlayerNumber::One,
            Side::Attacker,
            0,
            &SoldierProfile::default_squad(PlayerNumber::One)[0],
            Loadout::default(),
            p,
            0.0,
        )
    }

    fn bounds() -> Rect {
        Rect::new(0.0, 0.0, 100.0, 100.0)
    }

    #[test]
    fn moves_toward_waypoint_at_formula_speed() {
        let mut s = soldier_at(Vec2::new(10.0, 10.0));
        s.intent = Intent::Move;
        s.waypoints.push_back(Vec2::new(50.0, 10.0));
        let step = MovementSystem::step_distance(&s);
        MovementSystem::run(std::slice::from_mut(&mut s), &[], bounds());
        assert!((s.position.x - (10.0 + step)).abs() < 1e-4);
        assert!(s.moved_this_tick);
        assert!(s.facing.abs() < 1e-4);
    }

    #[test]
    fn rush_is_faster_and_suppression_slower() {
        let mut s = soldier_at(Vec2::ZERO);
        s.intent = Intent::Move;
        let walk = MovementSystem::step_distance(&s);
        s.intent = Intent::Rush;
        assert!((MovementSystem::step_distance(&s) - walk * RUSH_MULTIPLIER).abs() < 1e-5);
        s.intent = Intent::Move;
        s.in_combat = true;
        assert!((MovementSystem::step_distance(&s) - walk * SUPPRESSION_MULTIPLIER).abs() < 1e-5);
    }

    #[test]
    fn heavy_gear_slows_soldiers() {
        let mut s = soldier_at(Vec2::ZERO);
        let light = MovementSystem::step_distance(&s);
        s.loadout.weapon = WeaponKind::Awp;
        s.loadout.armor = ArmorKind::Heavy;
        assert!(MovementSystem::step_distance(&s) < light);
    }

    #[test]
    fn arrival_pops_waypoint_and_settles_intent() {
        let mut s = soldier_at(Vec2::new(10.0, 10.0));
        s.intent = Intent::Move;
        s.waypoints.push_back(Vec2::new(10.5, 10.0));
        MovementSystem::run(std::slice::from_mut(&mut s), &[], bounds());
        assert!(s.waypoints.is_empty());
        assert_eq!(s.intent, Intent::Idle);
        assert_eq!(s.position, Vec2::new(10.5, 10.0));
    }

    #[test]
    fn never_tunnels_through_walls() {
        let wall = Rect::new(20.0, 0.0, 1.0, 100.0);
        let mut s = soldier_at(Vec2::new(18.0, 50.0));
        s.intent = Intent::Rush;
        s.waypoints.push_back(Vec2::new(40.0, 50.0));
        for _ in 0..40 {
            MovementSystem::run(std::slice::from_mut(&mut s), &[wall], bounds());
            assert!(s.position.x < 20.0, "crossed wall at {:?}", s.position);
        }
        // Pinned against the wall long enough to give up
        assert!(s.waypoints.is_empty());
    }

    #[test]
    fn slides_along_walls() {
        let wall = Rect::new(20.0, 0.0, 1.0, 50.0);
        let mut s = soldier_at(Vec2::new(19.0, 48.0));
        s.intent = Intent::Move;
        s.waypoints.push_back(Vec2::new(25.0, 60.0));
        for _ in 0..60 {
            MovementSystem::run(std::slice::from_mut(&mut s), &[wall], bounds());
        }
        assert!(s.position.distance(Vec2::new(25.0, 60.0)) <= WAYPOINT_EPSILON + 1e-3);
    }

    #[test]
    fn hold_intent_does_not_move() {
        let mut s = soldier_at(Vec2::new(10.0, 10.0));
        s.intent = Intent::Hold;
        MovementSystem::run(std::slice::from_mut(&mut s), &[], bounds());
        assert_eq!(s.position, Vec2::new(10.0, 10.0));
        assert!(!s.moved_this_tick);
    }

    #[test]
    fn dead_soldiers_stay_put() {
        let mut s = soldier_at(Vec2::new(10.0, 10.0));
        s.waypoints.push_back(Vec2::new(50.0, 10.0));
        s.kill();
        s.waypoints.push_back(Vec2::new(50.0, 10.0));
        MovementSystem::run(std::slice::from_mut(&mut s), &[], bounds());
        assert_eq!(s.position, Vec2::new(10.0, 10.0));
    }
}
