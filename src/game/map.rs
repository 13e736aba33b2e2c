//! Map geometry: walls, cover, bomb sites and spawn zones

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

use super::geometry::{Rect, Vec2};
use super::soldier::Side;

#[derive(Debug, Error)]
pub enum MapError {
    #[error("failed to read map file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse map file: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("invalid map: {0}")]
    Invalid(String),
}

/// Cover rectangle. Cover absorbs shots but never blocks movement or sight.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CoverDef {
    #[serde(flatten)]
    pub rect: Rect,
    /// Health pool for destructible cover; `None` is indestructible
    #[serde(default)]
    pub health: Option<f32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BombSite {
    pub id: String,
    /// Outer site zone
    pub zone: Rect,
    /// Inner rectangle in which the bomb can be planted
    pub plant_zone: Rect,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MapData {
    pub name: String,
    pub bounds: Rect,
    #[serde(default)]
    pub walls: Vec<Rect>,
    #[serde(default)]
    pub cover: Vec<CoverDef>,
    pub bomb_sites: Vec<BombSite>,
    pub attacker_spawn: Rect,
    pub defender_spawn: Rect,
}

impl MapData {
    /// Load and validate a JSON map file
    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Self, MapError> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_json(&raw)
    }

    pub fn from_json(raw: &str) -> Result<Self, MapError> {
        let map: MapData = serde_json::from_str(raw)?;
        map.validate()?;
        Ok(map)
    }

    /// Check the geometric sanity of every rectangle
    pub fn validate(&self) -> Result<(), MapError> {
        if !self.bounds.is_valid() {
            return Err(MapError::Invalid("bounds must have positive area".into()));
        }
        for (i, wall) in self.walls.iter().enumerate() {
            if !wall.is_valid() {
                return Err(MapError::Invalid(format!("wall {i} is degenerate")));
            }
        }
        for (i, cover) in self.cover.iter().enumerate() {
            if !cover.rect.is_valid() {
                return Err(MapError::Invalid(format!("cover {i} is degenerate")));
            }
            if matches!(cover.health, Some(h) if !(h > 0.0)) {
                return Err(MapError::Invalid(format!("cover {i} health must be positive")));
            }
        }
        if self.bomb_sites.is_empty() {
            return Err(MapError::Invalid("at least one bomb site is required".into()));
        }
        for site in &self.bomb_sites {
            if !site.zone.is_valid() || !site.plant_zone.is_valid() {
                return Err(MapError::Invalid(format!("bomb site {} is degenerate", site.id)));
            }
            if !self.bounds.contains(site.plant_zone.center()) {
                return Err(MapError::Invalid(format!(
                    "bomb site {} lies outside the map",
                    site.id
                )));
            }
        }
        for (name, zone) in [("attacker", &self.attacker_spawn), ("defender", &self.defender_spawn)] {
            if !zone.is_valid() || !self.bounds.contains(zone.center()) {
                return Err(MapError::Invalid(format!("{name} spawn is invalid")));
            }
        }
        Ok(())
    }

    pub fn spawn_for(&self, side: Side) -> Rect {
        match side {
            Side::Attacker => self.attacker_spawn,
            Side::Defender => self.defender_spawn,
        }
    }

    pub fn clamp_to_bounds(&self, p: Vec2) -> Vec2 {
        self.bounds.clamp_point(p)
    }

    pub fn center(&self) -> Vec2 {
        self.bounds.center()
    }

    /// Site whose plant zone contains the point
    pub fn plant_site_at(&self, p: Vec2) -> Option<&BombSite> {
        self.bomb_sites.iter().find(|s| s.plant_zone.contains(p))
    }

    /// Plant zone centre closest to the point (first site wins ties)
    pub fn nearest_plant_point(&self, p: Vec2) -> Option<Vec2> {
        let mut best: Option<(f32, Vec2)> = None;
        for site in &self.bomb_sites {
            let c = site.plant_zone.center();
            let d = p.distance(c);
            if best.map_or(true, |(bd, _)| d < bd) {
                best = Some((d, c));
            }
        }
        best.map(|(_, c)| c)
    }

    /// Two-site practice map used when no map file is configured
    pub fn builtin() -> Self {
        Self {
            name: "foundry".into(),
            bounds: Rect::new(0.0, 0.0, 100.0, 100.0),
            walls: vec![
                // Mid divider with a doorway
                Rect::new(45.0, 20.0, 10.0, 22.0),
                Rect::new(45.0, 58.0, 10.0, 22.0),
                // Site A shell
                Rect::new(10.0, 72.0, 14.0, 2.0),
                // Site B shell
                Rect::new(76.0, 72.0, 14.0, 2.0),
                // Attacker lane blockers
                Rect::new(25.0, 30.0, 4.0, 12.0),
                Rect::new(71.0, 30.0, 4.0, 12.0),
            ],
            cover: vec![
                CoverDef {
                    rect: Rect::new(18.0, 80.0, 3.0, 3.0),
                    health: Some(200.0),
                },
                CoverDef {
                    rect: Rect::new(79.0, 80.0, 3.0, 3.0),
                    health: Some(200.0),
                },
                CoverDef {
                    rect: Rect::new(48.0, 46.0, 4.0, 2.0),
                    health: None,
                },
            ],
            bomb_sites: vec![
                BombSite {
                    id: "A".into(),
                    zone: Rect::new(5.0, 75.0, 25.0, 20.0),
                    plant_zone: Rect::new(10.0, 82.0, 8.0, 8.0),
                },
                BombSite {
                    id: "B".into(),
                    zone: Rect::new(70.0, 75.0, 25.0, 20.0),
                    plant_zone: Rect::new(82.0, 82.0, 8.0, 8.0),
                },
            ],
            attacker_spawn: Rect::new(40.0, 2.0, 20.0, 8.0),
            defender_spawn: Rect::new(40.0, 88.0, 20.0, 8.0),
        }
    }
}

impl Default for MapData {
    fn default() -> Self {
        Self::builtin()
    }
}
