//! Formation slot generation and unit-to-slot assignment.
//!
//! Slots are generated on the ground plane around an anchor, oriented by a
//! facing direction. Assignment is a greedy nearest match: each slot, in
//! order, takes the closest unit that has not been assigned yet.

use std::f32::consts::TAU;

use glam::Vec3;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::components::UnitId;
use crate::math::{flatten_facing, planar_distance_squared, planar_right};

/// Default spacing between neighbouring slots.
pub const DEFAULT_SPACING: f32 = 4.0;

/// Formation shapes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum FormationType {
    /// Single rank perpendicular to the facing.
    #[default]
    Line,
    /// Point unit in front, widening rows behind.
    Wedge,
    /// Roughly square grid.
    Box,
    /// Random spread around the anchor.
    Scatter,
}

/// Generate `count` slot positions for a formation.
///
/// `facing` is flattened onto the ground plane; a degenerate facing falls
/// back to `+Z`. Scatter slots are drawn from `rng`; the other shapes are
/// fully determined by their inputs. Zero units yield an empty list.
pub fn compute_positions<R: Rng + ?Sized>(
    anchor: Vec3,
    count: usize,
    facing: Vec3,
    formation: FormationType,
    spacing: f32,
    rng: &mut R,
) -> Vec<Vec3> {
    if count == 0 {
        return Vec::new();
    }
    let forward = flatten_facing(facing);
    let right = planar_right(forward);
    let spacing = if spacing > 0.0 { spacing } else { DEFAULT_SPACING };

    match formation {
        FormationType::Line => line_positions(anchor, count, right, spacing),
        FormationType::Wedge => wedge_positions(anchor, count, forward, right, spacing),
        FormationType::Box => box_positions(anchor, count, forward, right, spacing),
        FormationType::Scatter => scatter_positions(anchor, count, spacing, rng),
    }
}

fn line_positions(anchor: Vec3, count: usize, right: Vec3, spacing: f32) -> Vec<Vec3> {
    let half = (count as f32 - 1.0) / 2.0;
    (0..count)
        .map(|i| anchor + right * ((i as f32 - half) * spacing))
        .collect()
}

fn wedge_positions(
    anchor: Vec3,
    count: usize,
    forward: Vec3,
    right: Vec3,
    spacing: f32,
) -> Vec<Vec3> {
    let mut positions = Vec::with_capacity(count);
    // Row r holds r + 1 slots, r ranks behind the point.
    let mut row = 0usize;
    while positions.len() < count {
        let back = forward * (-(row as f32) * spacing);
        let half = row as f32 / 2.0;
        for j in 0..=row {
            if positions.len() == count {
                break;
            }
            positions.push(anchor + back + right * ((j as f32 - half) * spacing));
        }
        row += 1;
    }
    positions
}

fn box_positions(
    anchor: Vec3,
    count: usize,
    forward: Vec3,
    right: Vec3,
    spacing: f32,
) -> Vec<Vec3> {
    let side = (count as f32).sqrt().ceil().max(1.0) as usize;
    let rows = count.div_ceil(side);
    let col_half = (side as f32 - 1.0) / 2.0;
    let row_half = (rows as f32 - 1.0) / 2.0;
    (0..count)
        .map(|i| {
            let row = (i / side) as f32;
            let col = (i % side) as f32;
            anchor + right * ((col - col_half) * spacing) - forward * ((row - row_half) * spacing)
        })
        .collect()
}

fn scatter_positions<R: Rng + ?Sized>(
    anchor: Vec3,
    count: usize,
    spacing: f32,
    rng: &mut R,
) -> Vec<Vec3> {
    let max_radius = spacing * (count as f32).sqrt();
    (0..count)
        .map(|_| {
            let angle = rng.gen_range(0.0..TAU);
            let distance = rng.gen_range(0.0..=max_radius);
            anchor + Vec3::new(angle.cos() * distance, 0.0, angle.sin() * distance)
        })
        .collect()
}

/// Assign units to slots by greedy nearest match.
///
/// Each slot, in order, takes the nearest not-yet-assigned unit. Extra
/// slots or extra units are left out of the result.
#[must_use]
pub fn assign_slots(units: &[(UnitId, Vec3)], slots: &[Vec3]) -> Vec<(UnitId, Vec3)> {
    let mut taken = vec![false; units.len()];
    let mut assignments = Vec::with_capacity(slots.len().min(units.len()));

    for &slot in slots {
        let nearest = units
            .iter()
            .enumerate()
            .filter(|(idx, _)| !taken[*idx])
            .min_by(|(_, (_, a)), (_, (_, b))| {
                planar_distance_squared(*a, slot).total_cmp(&planar_distance_squared(*b, slot))
            })
            .map(|(idx, _)| idx);

        let Some(idx) = nearest else {
            break;
        };
        taken[idx] = true;
        assignments.push((units[idx].0, slot));
    }

    assignments
}

/// Sort slots front rank first relative to `facing`.
#[must_use]
pub fn front_first(mut slots: Vec<Vec3>, anchor: Vec3, facing: Vec3) -> Vec<Vec3> {
    let forward = flatten_facing(facing);
    slots.sort_by(|a, b| {
        let da = (*a - anchor).dot(forward);
        let db = (*b - anchor).dot(forward);
        db.total_cmp(&da)
    });
    slots
}
