//! Scripted obstacle service.
//!
//! [`WallObstacles`] answers obstacle queries against a hand-placed list of
//! axis-aligned walls, so navigation and projectile tests can set up exact
//! geometry without building a grid.

use glam::{Vec2, Vec3};
use tactics_core::navigation::ObstacleQuery;

/// Step used when sampling a segment for collisions.
const SAMPLE_STEP: f32 = 0.5;

/// Clearance kept from wall corners when routing around them.
const CORNER_CLEARANCE: f32 = 1.0;

/// Axis-aligned wall on the ground plane.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Wall {
    /// Minimum (x, z) corner.
    pub min: Vec2,
    /// Maximum (x, z) corner.
    pub max: Vec2,
}

impl Wall {
    fn overlaps_circle(&self, center: Vec2, radius: f32) -> bool {
        let nearest = center.clamp(self.min, self.max);
        nearest.distance_squared(center) < radius * radius || self.contains(center)
    }

    fn contains(&self, p: Vec2) -> bool {
        p.x >= self.min.x && p.x <= self.max.x && p.y >= self.min.y && p.y <= self.max.y
    }

    fn corners(&self, margin: f32) -> [Vec2; 4] {
        let (lo, hi) = (self.min - Vec2::splat(margin), self.max + Vec2::splat(margin));
        [
            lo,
            Vec2::new(hi.x, lo.y),
            hi,
            Vec2::new(lo.x, hi.y),
        ]
    }
}

/// Obstacle service made of axis-aligned walls.
#[derive(Debug, Clone, Default)]
pub struct WallObstacles {
    walls: Vec<Wall>,
}

fn planar(p: Vec3) -> Vec2 {
    Vec2::new(p.x, p.z)
}

fn lift(p: Vec2) -> Vec3 {
    Vec3::new(p.x, 0.0, p.y)
}

impl WallObstacles {
    /// Create an empty service.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder method to add a wall spanning two corners.
    #[must_use]
    pub fn with_wall(mut self, a: Vec3, b: Vec3) -> Self {
        let (a, b) = (planar(a), planar(b));
        self.walls.push(Wall {
            min: a.min(b),
            max: a.max(b),
        });
        self
    }

    /// Walls in insertion order.
    #[must_use]
    pub fn walls(&self) -> &[Wall] {
        &self.walls
    }

    fn first_blocking(&self, from: Vec2, to: Vec2, radius: f32) -> Option<&Wall> {
        let length = from.distance(to);
        let steps = (length / SAMPLE_STEP).ceil().max(1.0) as usize;
        (0..=steps)
            .map(|i| from.lerp(to, i as f32 / steps as f32))
            .find_map(|p| self.walls.iter().find(|w| w.overlaps_circle(p, radius)))
    }
}

impl ObstacleQuery for WallObstacles {
    fn is_blocked(&self, point: Vec3, radius: f32) -> bool {
        let p = planar(point);
        self.walls.iter().any(|w| w.overlaps_circle(p, radius))
    }

    fn has_clear_path(&self, from: Vec3, to: Vec3, radius: f32) -> bool {
        self.first_blocking(planar(from), planar(to), radius).is_none()
    }

    fn find_detour(&self, from: Vec3, to: Vec3, radius: f32) -> Option<Vec3> {
        let (start, goal) = (planar(from), planar(to));
        let wall = self.first_blocking(start, goal, radius)?;
        wall.corners(radius + CORNER_CLEARANCE)
            .into_iter()
            .filter(|c| self.first_blocking(start, *c, radius).is_none())
            .min_by(|a, b| {
                let cost = |c: &Vec2| start.distance(*c) + c.distance(goal);
                cost(a).total_cmp(&cost(b))
            })
            .map(lift)
    }

    fn adjust_for_collision(&self, from: Vec3, to: Vec3, radius: f32) -> Vec3 {
        if !self.is_blocked(to, radius) {
            return to;
        }
        let slide_x = Vec3::new(to.x, from.y, from.z);
        if !self.is_blocked(slide_x, radius) {
            return slide_x;
        }
        let slide_z = Vec3::new(from.x, from.y, to.z);
        if !self.is_blocked(slide_z, radius) {
            return slide_z;
        }
        from
    }
}
