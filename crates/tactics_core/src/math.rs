//! Vector helpers for the ground plane.
//!
//! Positions are full 3D [`Vec3`] values, but units move on the XZ plane
//! (Y is up). Distances used for ranges, radii and scoring are planar so
//! that terrain height never changes who can shoot whom.

use glam::Vec3;
use rand::Rng;

/// Distances below this are treated as zero when normalizing.
pub const EPSILON: f32 = 1e-4;

/// Planar (XZ) distance between two points.
#[must_use]
pub fn planar_distance(a: Vec3, b: Vec3) -> f32 {
    planar_distance_squared(a, b).sqrt()
}

/// Planar (XZ) squared distance, for comparisons that avoid `sqrt`.
#[must_use]
pub fn planar_distance_squared(a: Vec3, b: Vec3) -> f32 {
    let dx = a.x - b.x;
    let dz = a.z - b.z;
    dx * dx + dz * dz
}

/// Unit direction from `from` toward `to` on the XZ plane.
///
/// Returns [`Vec3::ZERO`] when the points coincide.
#[must_use]
pub fn planar_direction(from: Vec3, to: Vec3) -> Vec3 {
    let delta = Vec3::new(to.x - from.x, 0.0, to.z - from.z);
    let len = delta.length();
    if len < EPSILON {
        Vec3::ZERO
    } else {
        delta / len
    }
}

/// Flatten a direction onto the XZ plane and normalize it.
///
/// Degenerate input falls back to `+Z` so formations always have a facing.
#[must_use]
pub fn flatten_facing(direction: Vec3) -> Vec3 {
    let flat = Vec3::new(direction.x, 0.0, direction.z);
    let len = flat.length();
    if len < EPSILON {
        Vec3::Z
    } else {
        flat / len
    }
}

/// Right-hand perpendicular of a planar facing.
#[must_use]
pub fn planar_right(facing: Vec3) -> Vec3 {
    Vec3::new(facing.z, 0.0, -facing.x)
}

/// Point `fraction` of the way from `from` to `to`.
#[must_use]
pub fn lerp_toward(from: Vec3, to: Vec3, fraction: f32) -> Vec3 {
    from + (to - from) * fraction
}

/// Random planar offset with each axis in `[-extent, extent]`.
pub fn random_planar_offset<R: Rng + ?Sized>(rng: &mut R, extent: f32) -> Vec3 {
    if extent <= 0.0 {
        return Vec3::ZERO;
    }
    Vec3::new(
        rng.gen_range(-extent..=extent),
        0.0,
        rng.gen_range(-extent..=extent),
    )
}

/// Centroid of a set of points. Empty input yields `None`.
#[must_use]
pub fn centroid(points: &[Vec3]) -> Option<Vec3> {
    if points.is_empty() {
        return None;
    }
    let sum: Vec3 = points.iter().copied().sum();
    Some(sum / points.len() as f32)
}
