//! Stat formula library
//!
//! Pure functions mapping soldier attributes and situational context to the
//! numbers the tick subsystems use. Attribute inputs are clamped to 1..=100
//! and every probability output is clamped away from 0% and 100%.

use serde::{Deserialize, Serialize};

use super::equipment::{ArmorStats, WeaponStats};
use super::rng::MatchRng;
use crate::util::time::TICK_MILLIS;

fn attr(value: u8) -> f32 {
    value.clamp(1, 100) as f32
}

// ---------------------------------------------------------------------------
// Movement
// ---------------------------------------------------------------------------

/// Units per second at speed attribute ~50 with no equipment modifiers
pub const BASE_MOVE_SPEED: f32 = 5.0;

/// `BASE_MOVE_SPEED * (0.5 + (speed-1)/99) * weapon_modifier * armor_penalty`
///
/// Speed 1 moves at 50% of base, speed 100 at 150%.
pub fn movement_speed(speed: u8, weapon_speed_modifier: f32, armor_speed_penalty: f32) -> f32 {
    let factor = 0.5 + (attr(speed) - 1.0) / 99.0;
    BASE_MOVE_SPEED * factor * weapon_speed_modifier * armor_speed_penalty
}

// ---------------------------------------------------------------------------
// Detection
// ---------------------------------------------------------------------------

pub const BASE_DETECTION_RADIUS: f32 = 30.0;
pub const BASE_DETECTION_CHANCE: f32 = 0.40;
pub const DETECTION_CHANCE_PER_POINT: f32 = 0.004;
pub const MIN_DETECTION_CHANCE: f32 = 0.05;
pub const MAX_DETECTION_CHANCE: f32 = 0.80;
/// Detection chance multiplier in the peripheral band
pub const PERIPHERAL_DETECTION_FACTOR: f32 = 0.5;
pub const MIN_STEALTH_MODIFIER: f32 = 0.5;

/// `BASE_DETECTION_RADIUS * (1 + (awareness - 50)/100)`; awareness 50 gives
/// the base radius exactly.
pub fn detection_radius(awareness: u8) -> f32 {
    BASE_DETECTION_RADIUS * (1.0 + (attr(awareness) - 50.0) / 100.0)
}

/// `max(1 - stealth/200, 0.5)` applied to the observer's radius
pub fn stealth_modifier(stealth: u8) -> f32 {
    (1.0 - attr(stealth) / 200.0).max(MIN_STEALTH_MODIFIER)
}

/// Radius within which `observer_awareness` can spot a target with `target_stealth`
pub fn effective_detection_radius(observer_awareness: u8, target_stealth: u8) -> f32 {
    detection_radius(observer_awareness) * stealth_modifier(target_stealth)
}

/// Per-tick chance to spot a candidate in the forward cone:
/// `0.40 + (awareness - stealth) * 0.004`, clamped to `[0.05, 0.80]`
pub fn detection_chance(observer_awareness: u8, target_stealth: u8) -> f32 {
    let diff = attr(observer_awareness) - attr(target_stealth);
    (BASE_DETECTION_CHANCE + diff * DETECTION_CHANCE_PER_POINT)
        .clamp(MIN_DETECTION_CHANCE, MAX_DETECTION_CHANCE)
}

/// Per-tick chance for a candidate in the peripheral band
pub fn peripheral_detection_chance(observer_awareness: u8, target_stealth: u8) -> f32 {
    (detection_chance(observer_awareness, target_stealth) * PERIPHERAL_DETECTION_FACTOR)
        .clamp(MIN_DETECTION_CHANCE, MAX_DETECTION_CHANCE)
}

// ---------------------------------------------------------------------------
// Reaction
// ---------------------------------------------------------------------------

pub const BASE_REACTION_MS: f32 = 400.0;
/// Reduction from reaction 1 to reaction 100
pub const REACTION_RANGE_MS: f32 = 250.0;
pub const REACTION_JITTER_MS: f32 = 50.0;
pub const MIN_REACTION_MS: f32 = 150.0;

/// `400 - 250*(reaction-1)/99 + jitter`, floored at 150ms
pub fn reaction_time_ms(reaction: u8, jitter_ms: f32) -> f32 {
    let base = BASE_REACTION_MS - REACTION_RANGE_MS * (attr(reaction) - 1.0) / 99.0;
    (base + jitter_ms).max(MIN_REACTION_MS)
}

/// Reaction time with jitter drawn from the match stream (one draw)
pub fn roll_reaction_ms(reaction: u8, rng: &mut MatchRng) -> f32 {
    let jitter = rng.jitter(REACTION_JITTER_MS);
    reaction_time_ms(reaction, jitter)
}

/// Whole ticks needed to cover a delay
pub fn ms_to_ticks(ms: f32) -> u32 {
    (ms / TICK_MILLIS as f32).ceil().max(0.0) as u32
}

// ---------------------------------------------------------------------------
// Accuracy
// ---------------------------------------------------------------------------

pub const MIN_BASE_HIT_CHANCE: f32 = 0.20;
pub const MAX_BASE_HIT_CHANCE: f32 = 0.90;
pub const MIN_DISTANCE_MODIFIER: f32 = 0.30;
pub const MOVING_PENALTY: f32 = 0.5;
pub const MIN_HIT_CHANCE: f32 = 0.05;
pub const MAX_HIT_CHANCE: f32 = 0.95;
pub const MIN_HEADSHOT_CHANCE: f32 = 0.10;
pub const MAX_HEADSHOT_CHANCE: f32 = 0.30;
pub const SPRAY_DECAY_PER_SHOT: f32 = 0.12;
/// Share of the per-shot decay that perfect recoil control removes
pub const RECOIL_MITIGATION: f32 = 0.7;
pub const MIN_SPRAY_MODIFIER: f32 = 0.30;

/// `0.35 + accuracy * 0.005`, clamped to `[0.20, 0.90]`
pub fn base_hit_chance(accuracy: u8) -> f32 {
    (0.35 + attr(accuracy) * 0.005).clamp(MIN_BASE_HIT_CHANCE, MAX_BASE_HIT_CHANCE)
}

/// `max(1 - 0.5 * distance / effective_range, 0.3)`
pub fn distance_modifier(distance: f32, effective_range: f32) -> f32 {
    if !(effective_range > 0.0) || !distance.is_finite() {
        return MIN_DISTANCE_MODIFIER;
    }
    (1.0 - 0.5 * distance.max(0.0) / effective_range).clamp(MIN_DISTANCE_MODIFIER, 1.0)
}

pub fn movement_modifier(moving: bool) -> f32 {
    if moving {
        MOVING_PENALTY
    } else {
        1.0
    }
}

fn clamp_hit_chance(chance: f32) -> f32 {
    if chance.is_finite() {
        chance.clamp(MIN_HIT_CHANCE, MAX_HIT_CHANCE)
    } else {
        MIN_HIT_CHANCE
    }
}

/// `base * distance * movement * weapon`, clamped to `[0.05, 0.95]`
pub fn final_hit_chance(
    base_hit_chance: f32,
    distance_modifier: f32,
    moving: bool,
    weapon_accuracy_modifier: f32,
) -> f32 {
    clamp_hit_chance(
        base_hit_chance * distance_modifier * movement_modifier(moving) * weapon_accuracy_modifier,
    )
}

/// `0.10 + accuracy * 0.002`, clamped to `[0.10, 0.30]`
pub fn headshot_chance(accuracy: u8) -> f32 {
    (0.10 + attr(accuracy) * 0.002).clamp(MIN_HEADSHOT_CHANCE, MAX_HEADSHOT_CHANCE)
}

/// Accuracy multiplier for the next shot of a burst that has already fired
/// `shots_fired` shots: `max(1 - shots * 0.12 * (1 - 0.7*recoil/100), 0.3)`
pub fn spray_modifier(shots_fired: u32, recoil_control: u8) -> f32 {
    let per_shot = SPRAY_DECAY_PER_SHOT * (1.0 - RECOIL_MITIGATION * attr(recoil_control) / 100.0);
    (1.0 - per_shot * shots_fired as f32).max(MIN_SPRAY_MODIFIER)
}

// ---------------------------------------------------------------------------
// Situational modifiers
// ---------------------------------------------------------------------------

pub const STRESS_HEALTH_THRESHOLD: f32 = 30.0;
pub const MIN_COMPOSURE_MODIFIER: f32 = 0.6;
pub const MAX_CLUTCH_BONUS: f32 = 0.3;
pub const MAX_TEAMWORK_BONUS: f32 = 0.2;
/// Ally distance that counts as "nearby" for teamwork and stress
pub const TEAMWORK_RADIUS: f32 = 10.0;

/// Health below 30 or more visible enemies than nearby allies + 1
pub fn is_under_stress(health: f32, visible_enemies: usize, nearby_allies: usize) -> bool {
    health < STRESS_HEALTH_THRESHOLD || visible_enemies > nearby_allies + 1
}

/// 1.0 when calm, otherwise `0.6 + 0.4 * composure/100`
pub fn composure_modifier(composure: u8, under_stress: bool) -> f32 {
    if !under_stress {
        return 1.0;
    }
    MIN_COMPOSURE_MODIFIER + (1.0 - MIN_COMPOSURE_MODIFIER) * attr(composure) / 100.0
}

/// 1.0 unless last ally alive, then `1 + 0.3 * clutch/100`
pub fn clutch_modifier(clutch: u8, is_last_alive: bool) -> f32 {
    if is_last_alive {
        1.0 + MAX_CLUTCH_BONUS * attr(clutch) / 100.0
    } else {
        1.0
    }
}

/// 1.0 unless an ally is within `TEAMWORK_RADIUS`, then `1 + 0.2 * teamwork/100`
pub fn teamwork_modifier(teamwork: u8, ally_nearby: bool) -> f32 {
    if ally_nearby {
        1.0 + MAX_TEAMWORK_BONUS * attr(teamwork) / 100.0
    } else {
        1.0
    }
}

/// Everything the hit-chance chain needs about one shot
#[derive(Debug, Clone, Copy)]
pub struct ShotContext {
    pub accuracy: u8,
    pub recoil_control: u8,
    pub composure: u8,
    pub clutch: u8,
    pub teamwork: u8,
    pub weapon: WeaponStats,
    pub distance: f32,
    pub moving: bool,
    /// Shots already fired in the current uninterrupted burst
    pub shots_fired: u32,
    pub health: f32,
    pub visible_enemies: usize,
    pub nearby_allies: usize,
    pub is_last_alive: bool,
}

/// Full hit-chance chain in fixed order: base, distance, movement, weapon,
/// spray (when sustained), composure, clutch, teamwork, then clamp.
pub fn shot_hit_chance(ctx: &ShotContext) -> f32 {
    let mut chance = base_hit_chance(ctx.accuracy);
    chance *= distance_modifier(ctx.distance, ctx.weapon.effective_range);
    chance *= movement_modifier(ctx.moving);
    chance *= ctx.weapon.accuracy_modifier;
    if ctx.shots_fired > 0 {
        chance *= spray_modifier(ctx.shots_fired, ctx.recoil_control);
    }
    let stressed = is_under_stress(ctx.health, ctx.visible_enemies, ctx.nearby_allies);
    chance *= composure_modifier(ctx.composure, stressed);
    chance *= clutch_modifier(ctx.clutch, ctx.is_last_alive);
    chance *= teamwork_modifier(ctx.teamwork, ctx.nearby_allies > 0);
    clamp_hit_chance(chance)
}

// ---------------------------------------------------------------------------
// Damage
// ---------------------------------------------------------------------------

pub const LEG_MULTIPLIER: f32 = 0.75;
/// Share of the headshot bonus that survives a helmet
pub const HELMET_BONUS_RETAINED: f32 = 0.5;
/// Share of non-head hits that land on the body (the rest are legs)
pub const BODY_SHARE: f32 = 0.8;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HitLocation {
    Head,
    Body,
    Legs,
}

impl ArmorStats {
    /// Fraction of damage absorbed at a hit location. Heads are never
    /// armor-reduced.
    pub fn reduction_for(&self, location: HitLocation) -> f32 {
        match location {
            HitLocation::Head => 0.0,
            HitLocation::Body => self.body_reduction,
            HitLocation::Legs => self.leg_reduction,
        }
    }
}

/// Roll where a hit lands: headshot chance first, then an 80/20 body/legs
/// split of the remainder (one or two draws)
pub fn roll_hit_location(headshot_chance: f32, rng: &mut MatchRng) -> HitLocation {
    if rng.chance(headshot_chance) {
        HitLocation::Head
    } else if rng.chance(BODY_SHARE) {
        HitLocation::Body
    } else {
        HitLocation::Legs
    }
}

/// Location multiplier for a hit
pub fn location_multiplier(
    headshot_multiplier: f32,
    pierces_helmet: bool,
    location: HitLocation,
    helmet: bool,
) -> f32 {
    match location {
        HitLocation::Head if helmet && !pierces_helmet => {
            1.0 + (headshot_multiplier - 1.0) * HELMET_BONUS_RETAINED
        }
        HitLocation::Head => headshot_multiplier,
        HitLocation::Body => 1.0,
        HitLocation::Legs => LEG_MULTIPLIER,
    }
}

/// Damage from raw parts: `body_damage * location_multiplier * (1 - reduction)`
pub fn damage_from_parts(
    body_damage: f32,
    headshot_multiplier: f32,
    pierces_helmet: bool,
    location: HitLocation,
    armor_reduction: f32,
    helmet: bool,
) -> f32 {
    let reduction = match location {
        HitLocation::Head => 0.0,
        _ => armor_reduction.clamp(0.0, 1.0),
    };
    let multiplier = location_multiplier(headshot_multiplier, pierces_helmet, location, helmet);
    (body_damage.max(0.0) * multiplier * (1.0 - reduction)).max(0.0)
}

/// Damage a weapon deals to a target wearing `armor` (and maybe a helmet)
pub fn calculate_damage(
    weapon: &WeaponStats,
    location: HitLocation,
    armor: &ArmorStats,
    helmet: bool,
) -> f32 {
    damage_from_parts(
        weapon.body_damage,
        weapon.headshot_multiplier,
        weapon.pierces_helmet,
        location,
        armor.reduction_for(location),
        helmet,
    )
}
