//! Geometry kernel - vectors, axis-aligned rectangles, vision cones and
//! line-of-sight occlusion on the XZ ground plane

use serde::{Deserialize, Serialize};
use std::f32::consts::{PI, TAU};
use std::ops::{Add, Mul, Sub};

/// Point or direction on the ground plane
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Vec2 {
    pub x: f32,
    pub z: f32,
}

impl Vec2 {
    pub const ZERO: Vec2 = Vec2 { x: 0.0, z: 0.0 };

    pub const fn new(x: f32, z: f32) -> Self {
        Self { x, z }
    }

    pub fn length_sq(self) -> f32 {
        self.x * self.x + self.z * self.z
    }

    pub fn length(self) -> f32 {
        self.length_sq().sqrt()
    }

    pub fn distance(self, other: Vec2) -> f32 {
        (other - self).length()
    }

    pub fn dot(self, other: Vec2) -> f32 {
        self.x * other.x + self.z * other.z
    }

    /// Unit vector in the same direction, or zero for degenerate input
    pub fn normalize_or_zero(self) -> Vec2 {
        let len = self.length();
        if len <= f32::EPSILON || !len.is_finite() {
            Vec2::ZERO
        } else {
            Vec2::new(self.x / len, self.z / len)
        }
    }

    /// Heading of this vector in radians, measured from +x toward +z
    pub fn angle(self) -> f32 {
        self.z.atan2(self.x)
    }

    pub fn from_angle(angle: f32) -> Vec2 {
        Vec2::new(angle.cos(), angle.sin())
    }

    pub fn lerp(self, other: Vec2, t: f32) -> Vec2 {
        self + (other - self) * t
    }

    pub fn is_finite(self) -> bool {
        self.x.is_finite() && self.z.is_finite()
    }
}

impl Add for Vec2 {
    type Output = Vec2;

    fn add(self, rhs: Vec2) -> Vec2 {
        Vec2::new(self.x + rhs.x, self.z + rhs.z)
    }
}

impl Sub for Vec2 {
    type Output = Vec2;

    fn sub(self, rhs: Vec2) -> Vec2 {
        Vec2::new(self.x - rhs.x, self.z - rhs.z)
    }
}

impl Mul<f32> for Vec2 {
    type Output = Vec2;

    fn mul(self, rhs: f32) -> Vec2 {
        Vec2::new(self.x * rhs, self.z * rhs)
    }
}

/// Axis-aligned rectangle; `(x, z)` is the minimum corner
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rect {
    pub x: f32,
    pub z: f32,
    pub width: f32,
    pub height: f32,
}

impl Rect {
    pub const fn new(x: f32, z: f32, width: f32, height: f32) -> Self {
        Self { x, z, width, height }
    }

    pub fn min_x(&self) -> f32 {
        self.x
    }

    pub fn max_x(&self) -> f32 {
        self.x + self.width
    }

    pub fn min_z(&self) -> f32 {
        self.z
    }

    pub fn max_z(&self) -> f32 {
        self.z + self.height
    }

    pub fn center(&self) -> Vec2 {
        Vec2::new(self.x + self.width * 0.5, self.z + self.height * 0.5)
    }

    /// Finite, positive-area rectangle
    pub fn is_valid(&self) -> bool {
        self.x.is_finite()
            && self.z.is_finite()
            && self.width.is_finite()
            && self.height.is_finite()
            && self.width > 0.0
            && self.height > 0.0
    }

    /// Inclusive point containment
    pub fn contains(&self, p: Vec2) -> bool {
        p.x >= self.min_x() && p.x <= self.max_x() && p.z >= self.min_z() && p.z <= self.max_z()
    }

    pub fn clamp_point(&self, p: Vec2) -> Vec2 {
        Vec2::new(
            p.x.clamp(self.min_x(), self.max_x()),
            p.z.clamp(self.min_z(), self.max_z()),
        )
    }

    /// Grow the rectangle by `margin` on every side
    pub fn expanded(&self, margin: f32) -> Rect {
        Rect::new(
            self.x - margin,
            self.z - margin,
            self.width + margin * 2.0,
            self.height + margin * 2.0,
        )
    }

    /// Segment-rectangle test (Liang-Barsky clipping). Touching an edge counts
    /// as an intersection.
    pub fn intersects_segment(&self, a: Vec2, b: Vec2) -> bool {
        let d = b - a;
        let mut t0 = 0.0f32;
        let mut t1 = 1.0f32;

        let edges = [
            (-d.x, a.x - self.min_x()),
            (d.x, self.max_x() - a.x),
            (-d.z, a.z - self.min_z()),
            (d.z, self.max_z() - a.z),
        ];

        for (p, q) in edges {
            if p == 0.0 {
                // Parallel to this edge pair and outside the slab
                if q < 0.0 {
                    return false;
                }
                continue;
            }

            let r = q / p;
            if p < 0.0 {
                if r > t1 {
                    return false;
                }
                t0 = t0.max(r);
            } else {
                if r < t0 {
                    return false;
                }
                t1 = t1.min(r);
            }
        }

        t0 <= t1
    }
}

/// Wrap an angle into `(-PI, PI]`
pub fn normalize_angle(angle: f32) -> f32 {
    let wrapped = (angle + PI).rem_euclid(TAU) - PI;
    if wrapped <= -PI {
        wrapped + TAU
    } else {
        wrapped
    }
}

/// Absolute angular distance between two headings, in `[0, PI]`
pub fn angle_between(a: f32, b: f32) -> f32 {
    normalize_angle(a - b).abs()
}

/// Whether `target` lies within `half_angle` radians of `facing` as seen from
/// `origin`. A target on top of the origin is always inside.
pub fn in_cone(origin: Vec2, facing: f32, target: Vec2, half_angle: f32) -> bool {
    let to_target = target - origin;
    if to_target.length_sq() <= f32::EPSILON {
        return true;
    }
    angle_between(to_target.angle(), facing) <= half_angle
}

/// Segment-circle intersection (closest point on the segment within radius)
pub fn segment_intersects_circle(a: Vec2, b: Vec2, center: Vec2, radius: f32) -> bool {
    let ab = b - a;
    let len_sq = ab.length_sq();
    let t = if len_sq <= f32::EPSILON {
        0.0
    } else {
        ((center - a).dot(ab) / len_sq).clamp(0.0, 1.0)
    };
    let closest = a + ab * t;
    closest.distance(center) <= radius
}

/// True when no wall rectangle intersects the segment `a`-`b`
pub fn has_line_of_sight(a: Vec2, b: Vec2, walls: &[Rect]) -> bool {
    !walls.iter().any(|wall| wall.intersects_segment(a, b))
}
