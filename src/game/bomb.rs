//! Bomb objective - plant and defuse progress, bomb timer

use serde::{Deserialize, Serialize};

use super::events::EventKind;
use super::geometry::Vec2;
use super::map::MapData;
use super::soldier::{Intent, Side, Soldier, SoldierId};
use crate::util::time::secs_to_ticks;

/// Ticks an attacker must hold still in a plant zone (3s)
pub const PLANT_TICKS: u32 = secs_to_ticks(3);
/// Ticks to defuse without a kit (5s)
pub const DEFUSE_TICKS: u32 = secs_to_ticks(5);
/// Ticks to defuse with a kit (3s)
pub const KIT_DEFUSE_TICKS: u32 = secs_to_ticks(3);
/// Bomb timer after plant (40s)
pub const BOMB_TIMER_TICKS: u32 = secs_to_ticks(40);
/// How close a defender must stand to the bomb
pub const DEFUSE_RADIUS: f32 = 2.0;

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct BombState {
    pub planted: bool,
    pub site_id: Option<String>,
    pub position: Option<Vec2>,
    pub ticks_remaining: u32,
    pub planted_by: Option<SoldierId>,
    pub defused: bool,
    pub defused_by: Option<SoldierId>,
    pub exploded: bool,
}

impl BombState {
    /// Planted and still ticking
    pub fn is_live(&self) -> bool {
        self.planted && !self.defused && !self.exploded
    }
}

pub fn defuse_ticks(has_kit: bool) -> u32 {
    if has_kit {
        KIT_DEFUSE_TICKS
    } else {
        DEFUSE_TICKS
    }
}

/// Whether the soldier is currently working on the objective
pub fn is_planting(soldier: &Soldier, map: &MapData, bomb: &BombState) -> bool {
    soldier.alive
        && soldier.side == Side::Attacker
        && soldier.intent == Intent::Plant
        && !bomb.planted
        && !soldier.has_waypoints()
        && map.plant_site_at(soldier.position).is_some()
}

pub fn is_defusing(soldier: &Soldier, bomb: &BombState) -> bool {
    soldier.alive
        && soldier.side == Side::Defender
        && soldier.intent == Intent::Defuse
        && bomb.is_live()
        && !soldier.has_waypoints()
        && bomb
            .position
            .map_or(false, |p| soldier.position.distance(p) <= DEFUSE_RADIUS)
}

/// Bomb system run once per tick after combat
pub struct BombSystem;

impl BombSystem {
    pub fn run(bomb: &mut BombState, soldiers: &mut [Soldier], map: &MapData) -> Vec<EventKind> {
        let mut events = Vec::new();

        if !bomb.planted {
            Self::progress_plant(bomb, soldiers, map, &mut events);
            return events;
        }

        if bomb.is_live() {
            Self::progress_defuse(bomb, soldiers, &mut events);
        }
        if bomb.is_live() {
            bomb.ticks_remaining = bomb.ticks_remaining.saturating_sub(1);
            if bomb.ticks_remaining == 0 {
                bomb.exploded = true;
                tracing::debug!(site = ?bomb.site_id, "bomb exploded");
                events.push(EventKind::BombExploded);
            }
        }
        events
    }

    fn progress_plant(
        bomb: &mut BombState,
        soldiers: &mut [Soldier],
        map: &MapData,
        events: &mut Vec<EventKind>,
    ) {
        for soldier in soldiers.iter_mut() {
            if !is_planting(soldier, map, bomb)
                || soldier.moved_this_tick
                || soldier.damaged_this_tick
            {
                soldier.action_progress_ticks = 0;
                continue;
            }
            soldier.action_progress_ticks += 1;
            if soldier.action_progress_ticks < PLANT_TICKS {
                continue;
            }

            let Some(site) = map.plant_site_at(soldier.position) else {
                continue;
            };
            bomb.planted = true;
            bomb.site_id = Some(site.id.clone());
            bomb.position = Some(soldier.position);
            bomb.ticks_remaining = BOMB_TIMER_TICKS;
            bomb.planted_by = Some(soldier.id);
            soldier.action_progress_ticks = 0;
            soldier.intent = Intent::Hold;
            events.push(EventKind::BombPlanted {
                planter: Some(soldier.id),
                site_id: site.id.clone(),
                position: Some(soldier.position),
            });
        }
    }

    fn progress_defuse(bomb: &mut BombState, soldiers: &mut [Soldier], events: &mut Vec<EventKind>) {
        for soldier in soldiers.iter_mut() {
            if !bomb.is_live() {
                break;
            }
            if !is_defusing(soldier, bomb) || soldier.moved_this_tick || soldier.damaged_this_tick {
                soldier.action_progress_ticks = 0;
                continue;
            }
            soldier.action_progress_ticks += 1;
            if soldier.action_progress_ticks >= defuse_ticks(soldier.loadout.defuse_kit) {
                bomb.defused = true;
                bomb.defused_by = Some(soldier.id);
                soldier.action_progress_ticks = 0;
                soldier.intent = Intent::Hold;
                events.push(EventKind::BombDefused { defuser: soldier.id });
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::equipment::Loadout;
    use crate::game::soldier::{PlayerNumber, SoldierProfile};

    fn soldier(owner: PlayerNumber, side: Side, index: usize, p: Vec2) -> Soldier {
        Soldier::new(
            owner,
            side,
            index,
            &SoldierProfile::default_squad(owner)[index],
            Loadout::default(),
            p,
            0.0,
        )
    }

    fn plant_ready(map: &MapData) -> Vec<Soldier> {
        let site = map.bomb_sites[0].plant_zone.center();
        let mut planter = soldier(PlayerNumber::One, Side::Attacker, 0, site);
        planter.intent = Intent::Plant;
        vec![planter]
    }

    #[test]
    fn plant_completes_after_three_seconds() {
        let map = MapData::builtin();
        let mut soldiers = plant_ready(&map);
        let mut bomb = BombState::default();
        for _ in 0..PLANT_TICKS - 1 {
            assert!(BombSystem::run(&mut bomb, &mut soldiers, &map).is_empty());
        }
        let events = BombSystem::run(&mut bomb, &mut soldiers, &map);
        assert!(matches!(events[0], EventKind::BombPlanted { .. }));
        assert!(bomb.planted);
        assert_eq!(bomb.site_id.as_deref(), Some("A"));
        assert_eq!(bomb.ticks_remaining, BOMB_TIMER_TICKS);
    }

    #[test]
    fn damage_resets_plant_progress() {
        let map = MapData::builtin();
        let mut soldiers = plant_ready(&map);
        let mut bomb = BombState::default();
        for _ in 0..PLANT_TICKS - 1 {
            BombSystem::run(&mut bomb, &mut soldiers, &map);
        }
        soldiers[0].damaged_this_tick = true;
        BombSystem::run(&mut bomb, &mut soldiers, &map);
        assert_eq!(soldiers[0].action_progress_ticks, 0);
        assert!(!bomb.planted);
    }

    #[test]
    fn defenders_cannot_plant() {
        let map = MapData::builtin();
        let site = map.bomb_sites[0].plant_zone.center();
        let mut d = soldier(PlayerNumber::Two, Side::Defender, 0, site);
        d.intent = Intent::Plant;
        let mut soldiers = vec![d];
        let mut bomb = BombState::default();
        for _ in 0..PLANT_TICKS * 2 {
            BombSystem::run(&mut bomb, &mut soldiers, &map);
        }
        assert!(!bomb.planted);
    }

    fn planted_bomb() -> BombState {
        BombState {
            planted: true,
            site_id: Some("A".into()),
            position: Some(Vec2::new(14.0, 86.0)),
            ticks_remaining: BOMB_TIMER_TICKS,
            planted_by: Some(SoldierId(0)),
            ..Default::default()
        }
    }

    #[test]
    fn kit_speeds_up_defuse() {
        let map = MapData::builtin();
        for (kit, needed) in [(false, DEFUSE_TICKS), (true, KIT_DEFUSE_TICKS)] {
            let mut d = soldier(PlayerNumber::Two, Side::Defender, 0, Vec2::new(15.0, 86.0));
            d.intent = Intent::Defuse;
            d.loadout.defuse_kit = kit;
            let mut soldiers = vec![d];
            let mut bomb = planted_bomb();
            for _ in 0..needed - 1 {
                BombSystem::run(&mut bomb, &mut soldiers, &map);
            }
            assert!(!bomb.defused);
            let events = BombSystem::run(&mut bomb, &mut soldiers, &map);
            assert!(bomb.defused, "kit={kit}");
            assert!(matches!(events[0], EventKind::BombDefused { .. }));
        }
    }

    #[test]
    fn timer_expiry_explodes() {
        let map = MapData::builtin();
        let mut soldiers = Vec::new();
        let mut bomb = planted_bomb();
        for _ in 0..BOMB_TIMER_TICKS - 1 {
            assert!(BombSystem::run(&mut bomb, &mut soldiers, &map).is_empty());
        }
        let events = BombSystem::run(&mut bomb, &mut soldiers, &map);
        assert_eq!(events, vec![EventKind::BombExploded]);
        assert!(bomb.exploded);
        // No further events once resolved
        assert!(BombSystem::run(&mut bomb, &mut soldiers, &map).is_empty());
    }

    #[test]
    fn defuse_needs_proximity() {
        let map = MapData::builtin();
        let mut d = soldier(PlayerNumber::Two, Side::Defender, 0, Vec2::new(20.0, 86.0));
        d.intent = Intent::Defuse;
        d.loadout.defuse_kit = true;
        let mut soldiers = vec![d];
        let mut bomb = planted_bomb();
        for _ in 0..KIT_DEFUSE_TICKS * 2 {
            BombSystem::run(&mut bomb, &mut soldiers, &map);
        }
        assert!(!bomb.defused);
    }
}
