//! Combat system - shot resolution, damage, kills and cover
//!
//! Two resolvers share the same shot model. [`PerTickCombatResolver`] drives
//! live matches: every eligible shooter fires against the world as it stood
//! at the start of the combat step and hits land together, so mutual
//! detection means both soldiers get their shot off. [`EngagementCombatResolver`]
//! is the offline duel model: shooters act in reaction order and each hit
//! lands immediately, so the faster soldier can kill before the slower one
//! fires.

use std::fmt;

use super::detection::Sight;
use super::equipment::DamageSource;
use super::events::{EventKind, KillRecord};
use super::formulas::{
    calculate_damage, headshot_chance, roll_hit_location, shot_hit_chance, HitLocation,
    ShotContext, TEAMWORK_RADIUS,
};
use super::geometry::{Rect, Vec2};
use super::map::CoverDef;
use super::rng::MatchRng;
use super::soldier::{Soldier, SoldierId};

/// Runtime state of one cover rectangle
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CoverState {
    pub rect: Rect,
    /// Remaining health; `None` for indestructible cover
    pub health: Option<f32>,
}

impl CoverState {
    pub fn is_intact(&self) -> bool {
        self.health.map_or(true, |h| h > 0.0)
    }

    /// Whether this cover sits between a shooter and a target. Cover that
    /// contains either endpoint does not block.
    pub fn blocks(&self, from: Vec2, to: Vec2) -> bool {
        self.is_intact()
            && !self.rect.contains(from)
            && !self.rect.contains(to)
            && self.rect.intersects_segment(from, to)
    }
}

impl From<&CoverDef> for CoverState {
    fn from(def: &CoverDef) -> Self {
        Self {
            rect: def.rect,
            health: def.health,
        }
    }
}

/// Mutable world slice handed to a resolver for one combat step
pub struct CombatContext<'a> {
    pub tick: u32,
    /// All soldiers in id order
    pub soldiers: &'a mut [Soldier],
    pub cover: &'a mut [CoverState],
    pub sight: Sight<'a>,
    pub rng: &'a mut MatchRng,
}

/// Events and kills produced by one combat step
#[derive(Debug, Default, Clone, PartialEq)]
pub struct CombatOutcome {
    pub events: Vec<EventKind>,
    pub kills: Vec<KillRecord>,
}

/// Strategy for resolving a combat step
pub trait CombatResolver: Send + Sync + fmt::Debug {
    fn name(&self) -> &'static str;

    fn resolve(&self, ctx: &mut CombatContext<'_>) -> CombatOutcome;
}

/// What a shot did once rolled
#[derive(Debug, Clone, Copy, PartialEq)]
enum ShotEffect {
    Miss,
    Absorbed {
        cover: usize,
        damage: f32,
    },
    Hit {
        target: SoldierId,
        damage: f32,
        location: HitLocation,
    },
}

#[derive(Debug, Clone, Copy)]
struct Shot {
    shooter: SoldierId,
    source: DamageSource,
    effect: ShotEffect,
}

/// Combat system helpers shared by both resolvers
pub struct CombatSystem;

impl CombatSystem {
    /// Tick down weapon cooldowns and clear last tick's engagement flags
    pub fn begin_step(soldiers: &mut [Soldier]) {
        for s in soldiers.iter_mut() {
            s.weapon_cooldown = s.weapon_cooldown.saturating_sub(1);
            s.in_combat = false;
        }
    }

    /// Target the soldier would fire at this tick, if it may fire at all
    pub fn ready_target(soldiers: &[Soldier], shooter: usize, tick: u32) -> Option<SoldierId> {
        let s = soldiers.get(shooter)?;
        if !s.alive || s.is_blinded() || s.weapon_cooldown > 0 || tick < s.ready_at_tick {
            return None;
        }
        let target = s.target?;
        let t = soldiers.get(target.0 as usize)?;
        (t.alive && t.owner != s.owner && s.detected.contains(&target)).then_some(target)
    }

    /// Build the shot context from the shooter's situation
    pub fn shot_context(soldiers: &[Soldier], shooter: &Soldier, target: &Soldier) -> ShotContext {
        let allies: Vec<&Soldier> = soldiers
            .iter()
            .filter(|s| s.alive && s.owner == shooter.owner && s.id != shooter.id)
            .collect();
        let nearby_allies = allies
            .iter()
            .filter(|a| a.position.distance(shooter.position) <= TEAMWORK_RADIUS)
            .count();

        ShotContext {
            accuracy: shooter.attributes.accuracy,
            recoil_control: shooter.attributes.recoil_control,
            composure: shooter.attributes.composure,
            clutch: shooter.attributes.clutch,
            teamwork: shooter.attributes.teamwork,
            weapon: shooter.loadout.weapon.stats(),
            distance: shooter.position.distance(target.position),
            moving: shooter.moved_this_tick,
            shots_fired: shooter.shots_fired,
            health: shooter.health,
            visible_enemies: shooter.detected.len(),
            nearby_allies,
            is_last_alive: allies.is_empty(),
        }
    }

    /// Roll one shot. Draws the hit roll, then the location rolls on a hit.
    fn roll_shot(
        soldiers: &[Soldier],
        cover: &[CoverState],
        rng: &mut MatchRng,
        shooter_idx: usize,
        target_id: SoldierId,
    ) -> Option<Shot> {
        let shooter = soldiers.get(shooter_idx)?;
        let target = soldiers.get(target_id.0 as usize)?;
        let source = DamageSource::Weapon(shooter.loadout.weapon);

        let ctx = Self::shot_context(soldiers, shooter, target);
        let hit = rng.chance(shot_hit_chance(&ctx));
        if !hit {
            return Some(Shot {
                shooter: shooter.id,
                source,
                effect: ShotEffect::Miss,
            });
        }

        let location = roll_hit_location(headshot_chance(shooter.attributes.accuracy), rng);
        let weapon = shooter.loadout.weapon.stats();
        let damage = calculate_damage(
            &weapon,
            location,
            &target.loadout.armor.stats(),
            target.loadout.helmet,
        );

        let blocking = cover
            .iter()
            .position(|c| c.blocks(shooter.position, target.position));
        let effect = match blocking {
            Some(cover) => ShotEffect::Absorbed {
                cover,
                damage: weapon.body_damage,
            },
            None => ShotEffect::Hit {
                target: target_id,
                damage,
                location,
            },
        };
        Some(Shot {
            shooter: shooter.id,
            source,
            effect,
        })
    }

    /// Drop the target when the sight line closed since detection ran.
    /// Returns true when the shot cannot be taken.
    fn sight_lost(
        soldiers: &mut [Soldier],
        sight: &Sight<'_>,
        shooter: usize,
        target: SoldierId,
    ) -> bool {
        let Some(to) = soldiers.get(target.0 as usize).map(|t| t.position) else {
            return true;
        };
        let Some(s) = soldiers.get_mut(shooter) else {
            return true;
        };
        if sight.is_clear(s.position, to) {
            return false;
        }
        s.target = None;
        s.shots_fired = 0;
        true
    }

    /// Bookkeeping on the shooter and target for a fired shot
    fn mark_fired(soldiers: &mut [Soldier], shooter: SoldierId, target: SoldierId) {
        if let Some(s) = soldiers.get_mut(shooter.0 as usize) {
            s.weapon_cooldown = s.loadout.weapon.stats().cooldown_ticks;
            s.shots_fired += 1;
            s.in_combat = true;
        }
        if let Some(t) = soldiers.get_mut(target.0 as usize) {
            t.in_combat = true;
        }
    }

    /// Apply a rolled shot to the world
    fn apply_shot(
        soldiers: &mut [Soldier],
        cover: &mut [CoverState],
        shot: Shot,
        tick: u32,
        out: &mut CombatOutcome,
    ) {
        match shot.effect {
            ShotEffect::Miss => {}
            ShotEffect::Absorbed { cover: idx, damage } => {
                out.events.push(EventKind::CoverAbsorbed {
                    shooter: shot.shooter,
                    cover: idx,
                });
                if let Some(c) = cover.get_mut(idx) {
                    if let Some(h) = c.health.as_mut() {
                        let was_intact = *h > 0.0;
                        *h = (*h - damage).max(0.0);
                        if was_intact && *h <= 0.0 {
                            tracing::debug!(cover = idx, "cover destroyed");
                            out.events.push(EventKind::CoverDestroyed { cover: idx });
                        }
                    }
                }
            }
            ShotEffect::Hit {
                target,
                damage,
                location,
            } => {
                let Some(victim) = soldiers.get_mut(target.0 as usize) else {
                    return;
                };
                if !victim.alive {
                    return;
                }
                let killed = victim.apply_damage(damage);
                out.events.push(EventKind::Hit {
                    shooter: shot.shooter,
                    target,
                    damage,
                    location,
                    source: shot.source,
                });
                if let Some(s) = soldiers.get_mut(shot.shooter.0 as usize) {
                    s.damage_dealt += damage;
                    if killed {
                        s.kills += 1;
                    }
                }
                if killed {
                    let headshot = location == HitLocation::Head;
                    out.events.push(EventKind::Kill {
                        killer: shot.shooter,
                        victim: target,
                        source: shot.source,
                        headshot,
                    });
                    out.kills.push(KillRecord {
                        killer: shot.shooter,
                        victim: target,
                        weapon: shot.source,
                        headshot,
                        tick,
                    });
                }
            }
        }
    }
}

/// Live resolver: simultaneous fire within a tick
#[derive(Debug, Default, Clone, Copy)]
pub struct PerTickCombatResolver;

impl CombatResolver for PerTickCombatResolver {
    fn name(&self) -> &'static str {
        "per_tick"
    }

    fn resolve(&self, ctx: &mut CombatContext<'_>) -> CombatOutcome {
        CombatSystem::begin_step(ctx.soldiers);
        let mut out = CombatOutcome::default();

        // Every shooter sees the same pre-combat world
        let mut shots = Vec::new();
        for idx in 0..ctx.soldiers.len() {
            let Some(target) = CombatSystem::ready_target(ctx.soldiers, idx, ctx.tick) else {
                continue;
            };
            if CombatSystem::sight_lost(ctx.soldiers, &ctx.sight, idx, target) {
                continue;
            }
            if let Some(shot) = CombatSystem::roll_shot(ctx.soldiers, ctx.cover, ctx.rng, idx, target) {
                out.events.push(EventKind::ShotFired {
                    shooter: shot.shooter,
                    target,
                });
                shots.push((shot, target));
            }
        }

        for (shot, target) in &shots {
            CombatSystem::mark_fired(ctx.soldiers, shot.shooter, *target);
        }
        for (shot, _) in shots {
            CombatSystem::apply_shot(ctx.soldiers, ctx.cover, shot, ctx.tick, &mut out);
        }
        out
    }
}

/// Offline duel resolver: fastest reaction fires first, hits land at once
#[derive(Debug, Default, Clone, Copy)]
pub struct EngagementCombatResolver;

impl CombatResolver for EngagementCombatResolver {
    fn name(&self) -> &'static str {
        "engagement"
    }

    fn resolve(&self, ctx: &mut CombatContext<'_>) -> CombatOutcome {
        CombatSystem::begin_step(ctx.soldiers);
        let mut out = CombatOutcome::default();

        let mut order: Vec<usize> = (0..ctx.soldiers.len()).collect();
        order.sort_by_key(|&i| (ctx.soldiers[i].ready_at_tick, i));

        for idx in order {
            let Some(target) = CombatSystem::ready_target(ctx.soldiers, idx, ctx.tick) else {
                continue;
            };
            if CombatSystem::sight_lost(ctx.soldiers, &ctx.sight, idx, target) {
                continue;
            }
            let Some(shot) = CombatSystem::roll_shot(ctx.soldiers, ctx.cover, ctx.rng, idx, target)
            else {
                continue;
            };
            out.events.push(EventKind::ShotFired {
                shooter: shot.shooter,
                target,
            });
            CombatSystem::mark_fired(ctx.soldiers, shot.shooter, target);
            CombatSystem::apply_shot(ctx.soldiers, ctx.cover, shot, ctx.tick, &mut out);
        }
        out
    }
}
