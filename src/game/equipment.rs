//! Equipment catalogue - weapons, armor, utility and soldier loadouts

use serde::{Deserialize, Serialize};

/// Most utility items a single soldier may carry
pub const MAX_UTILITY_ITEMS: usize = 3;

/// Purchasable firearms
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WeaponKind {
    Pistol,
    Smg,
    Shotgun,
    Rifle,
    Awp,
}

impl Default for WeaponKind {
    fn default() -> Self {
        Self::Pistol
    }
}

/// Weapon stats per weapon kind
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WeaponStats {
    /// Damage of an unarmored body hit
    pub body_damage: f32,
    /// Multiplier applied to body damage on a headshot
    pub headshot_multiplier: f32,
    /// Multiplier on hit chance
    pub accuracy_modifier: f32,
    /// Multiplier on movement speed while carried
    pub speed_modifier: f32,
    /// Distance over which accuracy falls off
    pub effective_range: f32,
    /// Ticks between shots
    pub cooldown_ticks: u32,
    pub price: u32,
    /// Money awarded per kill
    pub kill_reward: u32,
    /// Headshots ignore helmets
    pub pierces_helmet: bool,
}

impl WeaponStats {
    pub fn for_kind(kind: WeaponKind) -> Self {
        match kind {
            WeaponKind::Pistol => Self {
                body_damage: 25.0,
                headshot_multiplier: 3.0,
                accuracy_modifier: 0.9,
                speed_modifier: 1.0,
                effective_range: 20.0,
                cooldown_ticks: 1,
                price: 0,
                kill_reward: 300,
                pierces_helmet: false,
            },
            WeaponKind::Smg => Self {
                body_damage: 22.0,
                headshot_multiplier: 2.5,
                accuracy_modifier: 0.85,
                speed_modifier: 1.05,
                effective_range: 18.0,
                cooldown_ticks: 1,
                price: 1250,
                kill_reward: 600,
                pierces_helmet: false,
            },
            WeaponKind::Shotgun => Self {
                body_damage: 55.0,
                headshot_multiplier: 1.5,
                accuracy_modifier: 0.7,
                speed_modifier: 0.95,
                effective_range: 8.0,
                cooldown_ticks: 3,
                price: 1200,
                kill_reward: 900,
                pierces_helmet: false,
            },
            WeaponKind::Rifle => Self {
                body_damage: 30.0,
                headshot_multiplier: 4.0,
                accuracy_modifier: 1.0,
                speed_modifier: 0.9,
                effective_range: 35.0,
                cooldown_ticks: 1,
                price: 2700,
                kill_reward: 300,
                pierces_helmet: false,
            },
            WeaponKind::Awp => Self {
                body_damage: 85.0,
                headshot_multiplier: 1.2,
                accuracy_modifier: 1.2,
                speed_modifier: 0.8,
                effective_range: 60.0,
                cooldown_ticks: 5,
                price: 4750,
                kill_reward: 100,
                pierces_helmet: true,
            },
        }
    }
}

impl WeaponKind {
    pub fn stats(self) -> WeaponStats {
        WeaponStats::for_kind(self)
    }
}

/// Body armor tiers. Helmets are bought separately.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArmorKind {
    None,
    Kevlar,
    Heavy,
}

impl Default for ArmorKind {
    fn default() -> Self {
        Self::None
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ArmorStats {
    /// Fraction of body damage absorbed
    pub body_reduction: f32,
    /// Fraction of leg damage absorbed
    pub leg_reduction: f32,
    /// Multiplier on movement speed
    pub speed_penalty: f32,
    pub price: u32,
}

impl ArmorKind {
    pub fn stats(self) -> ArmorStats {
        match self {
            ArmorKind::None => ArmorStats {
                body_reduction: 0.0,
                leg_reduction: 0.0,
                speed_penalty: 1.0,
                price: 0,
            },
            ArmorKind::Kevlar => ArmorStats {
                body_reduction: 0.30,
                leg_reduction: 0.0,
                speed_penalty: 0.97,
                price: 650,
            },
            ArmorKind::Heavy => ArmorStats {
                body_reduction: 0.45,
                leg_reduction: 0.25,
                speed_penalty: 0.85,
                price: 1000,
            },
        }
    }
}

/// Throwable utility
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UtilityKind {
    Flashbang,
    Smoke,
    Frag,
}

impl UtilityKind {
    pub fn price(self) -> u32 {
        match self {
            UtilityKind::Flashbang => 200,
            UtilityKind::Smoke => 300,
            UtilityKind::Frag => 300,
        }
    }

    pub fn kill_reward(self) -> u32 {
        300
    }

    /// Parse a wire name (`"flashbang"`, `"smoke"`, `"frag"`)
    pub fn parse(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "flashbang" | "flash" => Some(Self::Flashbang),
            "smoke" => Some(Self::Smoke),
            "frag" | "grenade" | "he" => Some(Self::Frag),
            _ => None,
        }
    }
}

/// What dealt a hit or a kill
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DamageSource {
    Weapon(WeaponKind),
    Utility(UtilityKind),
}

impl DamageSource {
    pub fn kill_reward(self) -> u32 {
        match self {
            DamageSource::Weapon(w) => w.stats().kill_reward,
            DamageSource::Utility(u) => u.kill_reward(),
        }
    }
}

pub const HELMET_PRICE: u32 = 350;
pub const DEFUSE_KIT_PRICE: u32 = 400;

/// Items that can be bought during the buy phase
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BuyItem {
    Weapon(WeaponKind),
    Armor(ArmorKind),
    Helmet,
    DefuseKit,
    Utility(UtilityKind),
}

impl BuyItem {
    pub fn price(self) -> u32 {
        match self {
            BuyItem::Weapon(w) => w.stats().price,
            BuyItem::Armor(a) => a.stats().price,
            BuyItem::Helmet => HELMET_PRICE,
            BuyItem::DefuseKit => DEFUSE_KIT_PRICE,
            BuyItem::Utility(u) => u.price(),
        }
    }
}

/// Everything a soldier carries into a round
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Loadout {
    pub weapon: WeaponKind,
    pub armor: ArmorKind,
    pub helmet: bool,
    pub defuse_kit: bool,
    pub utility: Vec<UtilityKind>,
}

impl Loadout {
    /// Remove one utility item of the given kind, returning whether it was held
    pub fn take_utility(&mut self, kind: UtilityKind) -> bool {
        match self.utility.iter().position(|u| *u == kind) {
            Some(pos) => {
                self.utility.remove(pos);
                true
            }
            None => false,
        }
    }
}
