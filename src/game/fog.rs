//! Fog of war - per-player projection of the authoritative state
//!
//! Own soldiers are sent in full. Enemies appear only while some living
//! soldier of the player has them detected, and their records never carry
//! attribute values.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use super::bomb::{is_defusing, is_planting};
use super::detection::Sight;
use super::equipment::{ArmorKind, UtilityKind, WeaponKind};
use super::events::{EventKind, TickEvent};
use super::formulas::detection_radius;
use super::geometry::Vec2;
use super::simulation::SimulationEngine;
use super::soldier::{Attributes, Intent, PlayerNumber, Side, SoldierId, Stance};
use super::utility::SmokeCloud;
use crate::util::time::tick_delta;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OwnSoldierView {
    pub id: SoldierId,
    pub index: usize,
    pub name: String,
    pub position: Vec2,
    pub rotation: f32,
    pub health: f32,
    pub alive: bool,
    pub weapon: WeaponKind,
    pub armor: ArmorKind,
    pub helmet: bool,
    pub defuse_kit: bool,
    pub utility: Vec<UtilityKind>,
    pub stance: Stance,
    pub intent: Intent,
    pub waypoints: Vec<Vec2>,
    pub target: Option<SoldierId>,
    pub is_moving: bool,
    pub is_in_combat: bool,
    pub is_planting: bool,
    pub is_defusing: bool,
    pub is_blinded: bool,
    pub action_progress_ticks: u32,
    pub kills: u32,
    pub attributes: Attributes,
}

/// Enemy record; deliberately has no attribute fields
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnemySoldierView {
    pub id: SoldierId,
    pub index: usize,
    pub position: Vec2,
    pub rotation: f32,
    pub health: f32,
    pub alive: bool,
    pub weapon: WeaponKind,
    pub stance: Stance,
    pub is_moving: bool,
    pub is_in_combat: bool,
    pub is_planting: bool,
    pub is_defusing: bool,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct BombView {
    pub planted: bool,
    pub site_id: Option<String>,
    pub position: Option<Vec2>,
    /// Seconds left on the bomb timer
    pub time_remaining: Option<f32>,
    pub defused: bool,
    pub exploded: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilteredGameState {
    pub tick: u32,
    pub player: PlayerNumber,
    pub side: Side,
    pub own_soldiers: Vec<OwnSoldierView>,
    pub visible_enemies: Vec<EnemySoldierView>,
    pub bomb: BombView,
    pub smokes: Vec<SmokeCloud>,
}

/// Fog-of-war projection
pub struct FogFilter;

impl FogFilter {
    /// Enemy ids visible to the player: the union of the detected sets of
    /// its living soldiers
    pub fn visible_enemies(engine: &SimulationEngine, player: PlayerNumber) -> BTreeSet<SoldierId> {
        let soldiers = engine.soldiers();
        soldiers
            .iter()
            .filter(|s| s.owner == player && s.alive)
            .flat_map(|s| s.detected.iter().copied())
            .filter(|id| {
                soldiers
                    .get(id.0 as usize)
                    .map_or(false, |e| e.alive && e.owner != player)
            })
            .collect()
    }

    pub fn project(engine: &SimulationEngine, player: PlayerNumber) -> FilteredGameState {
        let map = engine.map();
        let bomb = engine.bomb();
        let visible = Self::visible_enemies(engine, player);

        let own_soldiers = engine
            .soldiers()
            .iter()
            .filter(|s| s.owner == player)
            .map(|s| OwnSoldierView {
                id: s.id,
                index: s.index,
                name: s.name.clone(),
                position: s.position,
                rotation: s.facing,
                health: s.health,
                alive: s.alive,
                weapon: s.loadout.weapon,
                armor: s.loadout.armor,
                helmet: s.loadout.helmet,
                defuse_kit: s.loadout.defuse_kit,
                utility: s.loadout.utility.clone(),
                stance: s.stance,
                intent: s.intent,
                waypoints: s.waypoints.iter().copied().collect(),
                target: s.target,
                is_moving: s.moved_this_tick,
                is_in_combat: s.in_combat,
                is_planting: is_planting(s, map, bomb),
                is_defusing: is_defusing(s, bomb),
                is_blinded: s.is_blinded(),
                action_progress_ticks: s.action_progress_ticks,
                kills: s.kills,
                attributes: s.attributes,
            })
            .collect();

        let visible_enemies = visible
            .iter()
            .filter_map(|id| engine.soldier(*id))
            .map(|s| EnemySoldierView {
                id: s.id,
                index: s.index,
                position: s.position,
                rotation: s.facing,
                health: s.health,
                alive: s.alive,
                weapon: s.loadout.weapon,
                stance: s.stance,
                is_moving: s.moved_this_tick,
                is_in_combat: s.in_combat,
                is_planting: is_planting(s, map, bomb),
                is_defusing: is_defusing(s, bomb),
            })
            .collect();

        FilteredGameState {
            tick: engine.tick(),
            player,
            side: engine.side_of(player),
            own_soldiers,
            visible_enemies,
            bomb: Self::bomb_view(engine, player),
            smokes: engine.smokes().to_vec(),
        }
    }

    fn bomb_view(engine: &SimulationEngine, player: PlayerNumber) -> BombView {
        let bomb = engine.bomb();
        if !bomb.planted {
            return BombView::default();
        }

        let sees_bomb = Self::sees_bomb(engine, player);
        BombView {
            planted: true,
            site_id: bomb.site_id.clone(),
            position: if sees_bomb { bomb.position } else { None },
            time_remaining: if sees_bomb && bomb.is_live() {
                Some(bomb.ticks_remaining as f32 * tick_delta())
            } else {
                None
            },
            defused: bomb.defused,
            exploded: bomb.exploded,
        }
    }

    /// Whether the player may know where the planted bomb is
    pub fn sees_bomb(engine: &SimulationEngine, player: PlayerNumber) -> bool {
        let bomb = engine.bomb();
        engine.side_of(player) == Side::Attacker
            || bomb.defused
            || bomb.exploded
            || bomb.position.map_or(false, |p| Self::defender_sees(engine, player, p))
    }

    fn defender_sees(engine: &SimulationEngine, player: PlayerNumber, bomb: Vec2) -> bool {
        let sight = Sight::new(engine.walls(), engine.smokes());
        engine
            .soldiers()
            .iter()
            .filter(|s| s.owner == player && s.alive)
            .any(|s| {
                s.position.distance(bomb) <= detection_radius(s.attributes.awareness)
                    && sight.is_clear(s.position, bomb)
            })
    }

    /// Events the player may learn about. Public bomb events are redacted to
    /// what the bomb view would show.
    pub fn filter_events(
        engine: &SimulationEngine,
        events: &[TickEvent],
        player: PlayerNumber,
        visible: &BTreeSet<SoldierId>,
    ) -> Vec<TickEvent> {
        let known = |id: &SoldierId| id.owner() == player || visible.contains(id);
        let sees_bomb = Self::sees_bomb(engine, player);
        events
            .iter()
            .filter(|e| e.kind.is_public() || e.kind.soldiers().iter().all(known))
            .map(|e| match &e.kind {
                EventKind::BombPlanted {
                    planter,
                    site_id,
                    position,
                } => TickEvent {
                    tick: e.tick,
                    kind: EventKind::BombPlanted {
                        planter: planter.filter(known),
                        site_id: site_id.clone(),
                        position: position.filter(|_| sees_bomb),
                    },
                },
                _ => e.clone(),
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::map::MapData;

    fn engine() -> SimulationEngine {
        SimulationEngine::new(9, MapData::builtin())
    }

    #[test]
    fn undetected_enemies_are_absent() {
        let e = engine();
        let view = e.get_filtered_state(PlayerNumber::One);
        assert_eq!(view.own_soldiers.len(), 5);
        assert!(view.visible_enemies.is_empty());
    }

    #[test]
    fn detected_enemies_appear_without_attributes() {
        let mut e = engine();
        if let Some(s) = e.soldier_mut(SoldierId(0)) {
            s.detected.insert(SoldierId(7));
        }
        let view = e.get_filtered_state(PlayerNumber::One);
        assert_eq!(view.visible_enemies.len(), 1);
        assert_eq!(view.visible_enemies[0].id, SoldierId(7));

        let json = serde_json::to_value(&view.visible_enemies[0]).unwrap();
        for field in ["attributes", "accuracy", "awareness", "stealth"] {
            assert!(json.get(field).is_none(), "leaked {field}");
        }
        // The opponent's view is unaffected
        assert!(e.get_filtered_state(PlayerNumber::Two).visible_enemies.is_empty());
    }

    #[test]
    fn dead_observers_reveal_nothing() {
        let mut e = engine();
        if let Some(s) = e.soldier_mut(SoldierId(0)) {
            s.detected.insert(SoldierId(7));
            s.kill();
        }
        assert!(e.get_filtered_state(PlayerNumber::One).visible_enemies.is_empty());
    }

    #[test]
    fn bomb_position_hidden_from_distant_defenders() {
        let mut e = engine();
        {
            let bomb = e.bomb_mut();
            bomb.planted = true;
            bomb.site_id = Some("A".into());
            bomb.position = Some(Vec2::new(14.0, 86.0));
            bomb.ticks_remaining = 100;
        }
        let attacker = e.get_filtered_state(PlayerNumber::One).bomb;
        assert_eq!(attacker.position, Some(Vec2::new(14.0, 86.0)));
        assert_eq!(attacker.time_remaining, Some(20.0));

        // Park every defender far from site A
        for i in 5..10 {
            if let Some(s) = e.soldier_mut(SoldierId(i)) {
                s.position = Vec2::new(90.0, 10.0 + i as f32);
            }
        }
        let defender = e.get_filtered_state(PlayerNumber::Two).bomb;
        assert!(defender.planted);
        assert_eq!(defender.site_id.as_deref(), Some("A"));
        assert_eq!(defender.position, None);
        assert_eq!(defender.time_remaining, None);

        if let Some(s) = e.soldier_mut(SoldierId(5)) {
            s.position = Vec2::new(14.0, 80.0);
        }
        let close = e.get_filtered_state(PlayerNumber::Two).bomb;
        assert_eq!(close.position, Some(Vec2::new(14.0, 86.0)));
    }

    #[test]
    fn bomb_planted_event_is_redacted_for_defenders_out_of_sight() {
        let mut e = engine();
        {
            let bomb = e.bomb_mut();
            bomb.planted = true;
            bomb.site_id = Some("A".into());
            bomb.position = Some(Vec2::new(14.0, 86.0));
            bomb.ticks_remaining = 100;
        }
        for i in 5..10 {
            if let Some(s) = e.soldier_mut(SoldierId(i)) {
                s.position = Vec2::new(90.0, 10.0 + i as f32);
            }
        }
        let events = vec![TickEvent {
            tick: 15,
            kind: EventKind::BombPlanted {
                planter: Some(SoldierId(0)),
                site_id: "A".into(),
                position: Some(Vec2::new(14.0, 86.0)),
            },
        }];

        let defender = FogFilter::filter_events(&e, &events, PlayerNumber::Two, &BTreeSet::new());
        assert_eq!(
            defender[0].kind,
            EventKind::BombPlanted {
                planter: None,
                site_id: "A".into(),
                position: None,
            }
        );
        let json = serde_json::to_string(&defender[0]).unwrap();
        assert!(!json.contains("planter") && !json.contains("position"), "{json}");

        let attacker = FogFilter::filter_events(&e, &events, PlayerNumber::One, &BTreeSet::new());
        assert_eq!(attacker, events);

        // A spotted planter is named even while the bomb itself is out of sight
        let seen: BTreeSet<SoldierId> = [SoldierId(0)].into_iter().collect();
        let spotted = FogFilter::filter_events(&e, &events, PlayerNumber::Two, &seen);
        assert!(matches!(
            spotted[0].kind,
            EventKind::BombPlanted { planter: Some(SoldierId(0)), position: None, .. }
        ));
    }

    #[test]
    fn events_about_hidden_soldiers_are_dropped() {
        let events = vec![
            TickEvent {
                tick: 1,
                kind: EventKind::ShotFired {
                    shooter: SoldierId(6),
                    target: SoldierId(8),
                },
            },
            TickEvent {
                tick: 1,
                kind: EventKind::Detected {
                    observer: SoldierId(0),
                    target: SoldierId(5),
                },
            },
            TickEvent {
                tick: 1,
                kind: EventKind::Kill {
                    killer: SoldierId(6),
                    victim: SoldierId(1),
                    source: crate::game::equipment::DamageSource::Weapon(WeaponKind::Rifle),
                    headshot: true,
                },
            },
        ];
        let visible: BTreeSet<SoldierId> = [SoldierId(5)].into_iter().collect();
        let filtered = FogFilter::filter_events(&engine(), &events, PlayerNumber::One, &visible);
        assert_eq!(filtered.len(), 2);
        assert!(matches!(filtered[0].kind, EventKind::Detected { .. }));
        assert!(matches!(filtered[1].kind, EventKind::Kill { .. }));
    }

    #[test]
    fn filtered_state_is_idempotent() {
        let mut e = engine();
        for _ in 0..3 {
            e.run_tick();
        }
        assert_eq!(
            e.get_filtered_state(PlayerNumber::One),
            e.get_filtered_state(PlayerNumber::One)
        );
    }
}
