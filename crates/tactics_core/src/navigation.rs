//! Local navigation and movement.
//!
//! Each frame a unit works out where it wants to go ([`steering`]) and
//! then moves toward it ([`advance_unit`]) at `speed × Δt`, asking the
//! [`ObstacleQuery`] service for clear lines, detours and collision
//! adjustment. Units that make too little progress are detected as stuck:
//! first they recalculate, then they try an escape move to a random nearby
//! spot.

use glam::Vec3;
use rand::Rng;

use crate::components::{Stance, Unit};
use crate::config::NavigationTuning;
use crate::math::{planar_direction, planar_distance, random_planar_offset, EPSILON};
use crate::registry::UnitRegistry;
use crate::retreat::RETREAT_SPEED_MULTIPLIER;
use crate::targeting::effective_range;

/// How far beyond its range a Defensive unit will chase a target.
pub const DEFENSIVE_CHASE_MARGIN: f32 = 10.0;

/// Static-geometry queries used by navigation and projectiles.
pub trait ObstacleQuery {
    /// Whether a circle of `radius` at `point` overlaps static geometry.
    fn is_blocked(&self, point: Vec3, radius: f32) -> bool;

    /// Whether a circle of `radius` can travel straight from `from` to `to`.
    fn has_clear_path(&self, from: Vec3, to: Vec3, radius: f32) -> bool;

    /// Intermediate waypoint that leads around obstacles toward `to`.
    fn find_detour(&self, from: Vec3, to: Vec3, radius: f32) -> Option<Vec3>;

    /// Final position for a move from `from` toward `to`.
    fn adjust_for_collision(&self, from: Vec3, to: Vec3, radius: f32) -> Vec3;
}

/// Obstacle service for an empty map.
#[derive(Debug, Clone, Copy, Default)]
pub struct OpenField;

impl ObstacleQuery for OpenField {
    fn is_blocked(&self, _point: Vec3, _radius: f32) -> bool {
        false
    }

    fn has_clear_path(&self, _from: Vec3, _to: Vec3, _radius: f32) -> bool {
        true
    }

    fn find_detour(&self, _from: Vec3, _to: Vec3, _radius: f32) -> Option<Vec3> {
        None
    }

    fn adjust_for_collision(&self, _from: Vec3, to: Vec3, _radius: f32) -> Vec3 {
        to
    }
}

/// What a unit does with its legs this frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Steering {
    /// Stay put (target in range, or nothing to do).
    Hold,
    /// Head for an order destination.
    MoveTo(Vec3),
    /// Close the distance to an enemy.
    Chase(Vec3),
}

/// Work out the effective destination of a unit.
///
/// Priority: retreat destination, pursued enemy, current target (subject
/// to stance), order destination. A unit engaging a target that is inside
/// its range holds still.
#[must_use]
pub fn steering(
    unit: &Unit,
    units: &UnitRegistry,
    siege_multiplier: f32,
    tuning: &NavigationTuning,
) -> Steering {
    if unit.is_retreating {
        return Steering::MoveTo(unit.destination);
    }

    let range = effective_range(unit, siege_multiplier);
    let at_destination = planar_distance(unit.position, unit.destination) <= tuning.arrival_distance;

    if let Some(pursued) = unit.pursued.and_then(|id| units.get_alive(id)) {
        return if planar_distance(unit.position, pursued.position) <= range {
            Steering::Hold
        } else {
            Steering::Chase(pursued.position)
        };
    }

    let engaging = unit.attack_move || at_destination;
    if let Some(target) = unit.target.and_then(|id| units.get_alive(id)) {
        if engaging {
            let distance = planar_distance(unit.position, target.position);
            if distance <= range {
                return Steering::Hold;
            }
            let chase = match unit.stance {
                Stance::Aggressive => true,
                Stance::Defensive => distance <= range + DEFENSIVE_CHASE_MARGIN,
                Stance::HoldPosition => false,
            };
            if chase {
                return Steering::Chase(target.position);
            }
        }
    }

    if at_destination {
        Steering::Hold
    } else {
        Steering::MoveTo(unit.destination)
    }
}

/// Per-frame movement inputs.
pub struct MoveContext<'a> {
    /// Obstacle service.
    pub obstacles: &'a dyn ObstacleQuery,
    /// Tuning values.
    pub tuning: &'a NavigationTuning,
    /// Ability speed multiplier for the unit's faction.
    pub speed_multiplier: f32,
    /// Frame duration.
    pub dt: f32,
}

/// Movement speed including veterancy, abilities and retreat.
#[must_use]
pub fn movement_speed(unit: &Unit, ability_multiplier: f32) -> f32 {
    let retreat = if unit.is_retreating {
        RETREAT_SPEED_MULTIPLIER
    } else {
        1.0
    };
    unit.speed * unit.veterancy.speed_multiplier() * ability_multiplier * retreat
}

fn stand_still(unit: &mut Unit) {
    unit.is_moving = false;
    unit.nav.stuck_timer = 0.0;
    unit.nav.last_expected = 0.0;
    unit.nav.last_position = unit.position;
}

/// Move one unit according to its steering decision.
pub fn advance_unit<R: Rng + ?Sized>(
    unit: &mut Unit,
    steer: Steering,
    ctx: &MoveContext<'_>,
    rng: &mut R,
) {
    let goal = match steer {
        _ if unit.siege_locked => return stand_still(unit),
        Steering::Hold => return stand_still(unit),
        Steering::MoveTo(goal) | Steering::Chase(goal) => goal,
    };
    let position = unit.position;
    if planar_distance(position, goal) <= ctx.tuning.arrival_distance {
        unit.nav.waypoint = None;
        return stand_still(unit);
    }

    let nav = &mut unit.nav;
    let observed = planar_distance(position, nav.last_position);
    if nav.last_expected > EPSILON && observed < 0.5 * nav.last_expected {
        nav.stuck_timer += ctx.dt;
    } else {
        nav.stuck_timer = 0.0;
    }
    nav.recalc_timer += ctx.dt;

    if nav.recalc_timer >= ctx.tuning.recalc_interval
        || nav.stuck_timer >= ctx.tuning.stuck_recalc_after
    {
        nav.recalc_timer = 0.0;
        nav.waypoint = if ctx.obstacles.has_clear_path(position, goal, unit.radius) {
            None
        } else {
            ctx.obstacles.find_detour(position, goal, unit.radius)
        };
        if let Some(waypoint) = nav.waypoint {
            tracing::trace!("{} detour via {:?}", unit.id, waypoint);
        }
    }

    if nav.stuck_timer >= ctx.tuning.stuck_escape_after {
        let candidate = position + random_planar_offset(rng, ctx.tuning.escape_extent);
        if !ctx.obstacles.is_blocked(candidate, unit.radius) {
            tracing::trace!("{} escape move to {:?}", unit.id, candidate);
            nav.waypoint = Some(candidate);
        }
        nav.stuck_timer = 0.0;
    }

    if nav
        .waypoint
        .is_some_and(|w| planar_distance(position, w) <= ctx.tuning.waypoint_reached)
    {
        nav.waypoint = None;
    }
    let steer_point = nav.waypoint.unwrap_or(goal);

    let speed = movement_speed(unit, ctx.speed_multiplier);
    let step = (speed * ctx.dt).min(planar_distance(position, steer_point));
    let desired = position + planar_direction(position, steer_point) * step;
    let next = ctx
        .obstacles
        .adjust_for_collision(position, desired, unit.radius);

    unit.nav.last_position = position;
    unit.nav.last_expected = step;
    unit.position = next;
    unit.is_moving = planar_distance(next, position) > EPSILON;

    // An idle unit that chased stays where the chase left it.
    if matches!(steer, Steering::Chase(_)) && !unit.attack_move && unit.pursued.is_none() {
        unit.destination = unit.position;
    }
}
