//! Target acquisition and threat scoring.
//!
//! Every candidate enemy gets an additive score built from proximity,
//! range, wounds, class priority, threat, focus fire and base defense.
//! The highest score wins; ties go to the candidate evaluated first, which
//! is registry insertion order.
//!
//! Searches are throttled per unit. A unit keeps its current target until
//! the target dies or becomes untargetable, and only looks for a new one
//! once its search timer has run out.

use std::collections::{BTreeMap, HashMap};

use glam::Vec3;

use crate::components::{Unit, UnitClass, UnitId};
use crate::config::TargetingTuning;
use crate::factions::FactionId;
use crate::math::planar_distance;
use crate::registry::UnitRegistry;

/// Maximum proximity score, at zero distance.
pub const PROXIMITY_WEIGHT: f32 = 50.0;
/// Distance at which the proximity score reaches zero.
pub const PROXIMITY_FALLOFF: f32 = 100.0;
/// Bonus for candidates already inside attack range.
pub const IN_RANGE_BONUS: f32 = 30.0;
/// Maximum low-health score, for a candidate at zero health.
pub const LOW_HEALTH_WEIGHT: f32 = 25.0;
/// Bonus when the candidate targets the scoring unit.
pub const THREAT_SELF_BONUS: f32 = 40.0;
/// Bonus when the candidate targets an ally of the scoring unit.
pub const THREAT_ALLY_BONUS: f32 = 20.0;
/// Focus-fire score per ally already on the candidate.
pub const FOCUS_FIRE_PER_ALLY: f32 = 8.0;
/// Allies counted toward focus fire.
pub const FOCUS_FIRE_MAX_ALLIES: usize = 4;
/// Maximum base-defense score, for a candidate standing on the factory.
pub const BASE_DEFENSE_WEIGHT: f32 = 25.0;
/// Radius around the own factory in which base defense is scored.
pub const BASE_DEFENSE_RADIUS: f32 = 50.0;

/// Class priority score.
#[must_use]
pub const fn class_priority(class: UnitClass) -> f32 {
    match class {
        UnitClass::Harvester => 35.0,
        UnitClass::Light => 10.0,
        UnitClass::Medium => 15.0,
        UnitClass::Heavy => 5.0,
    }
}

/// Attack range including the siege-lock bonus.
#[must_use]
pub fn effective_range(unit: &Unit, siege_multiplier: f32) -> f32 {
    if unit.siege_locked {
        unit.stats.attack_range * siege_multiplier
    } else {
        unit.stats.attack_range
    }
}

/// Number of units of each faction targeting each unit.
pub type FocusCounts = HashMap<(FactionId, UnitId), usize>;

/// Inputs shared by every search in one tick.
#[derive(Debug, Clone, Copy)]
pub struct TargetingContext<'a> {
    /// Tuning values.
    pub tuning: &'a TargetingTuning,
    /// Siege-lock range multiplier.
    pub siege_multiplier: f32,
    /// Positions of standing factories by owner.
    pub factories: &'a BTreeMap<FactionId, Vec3>,
}

/// Count who targets whom, or `None` when focus fire is not scored.
///
/// Focus fire is only scored while the live unit count lies inside the
/// tuned range.
#[must_use]
pub fn focus_fire_counts(units: &UnitRegistry, tuning: &TargetingTuning) -> Option<FocusCounts> {
    let live = units.live_count();
    if live < tuning.focus_fire_min_units || live > tuning.focus_fire_max_units {
        return None;
    }
    let mut counts = FocusCounts::new();
    for unit in units.iter_alive() {
        if let Some(target) = unit.target {
            *counts.entry((unit.faction, target)).or_insert(0) += 1;
        }
    }
    Some(counts)
}

/// Score one candidate for `unit`.
#[must_use]
pub fn score_candidate(
    unit: &Unit,
    candidate: &Unit,
    units: &UnitRegistry,
    ctx: &TargetingContext<'_>,
    focus: Option<&FocusCounts>,
) -> f32 {
    let distance = planar_distance(unit.position, candidate.position);
    let mut score = PROXIMITY_WEIGHT * (1.0 - distance / PROXIMITY_FALLOFF).max(0.0);

    if distance <= effective_range(unit, ctx.siege_multiplier) {
        score += IN_RANGE_BONUS;
    }

    score += LOW_HEALTH_WEIGHT * (1.0 - candidate.stats.health_fraction());
    score += class_priority(candidate.class);

    if let Some(threatened) = candidate.target {
        if threatened == unit.id {
            score += THREAT_SELF_BONUS;
        } else if units
            .get_alive(threatened)
            .is_some_and(|t| t.faction == unit.faction)
        {
            score += THREAT_ALLY_BONUS;
        }
    }

    if let Some(counts) = focus {
        let mut allies = counts
            .get(&(unit.faction, candidate.id))
            .copied()
            .unwrap_or(0);
        if unit.target == Some(candidate.id) {
            allies = allies.saturating_sub(1);
        }
        score += FOCUS_FIRE_PER_ALLY * allies.min(FOCUS_FIRE_MAX_ALLIES) as f32;
    }

    if let Some(&factory) = ctx.factories.get(&unit.faction) {
        let d = planar_distance(candidate.position, factory);
        if d < BASE_DEFENSE_RADIUS {
            score += BASE_DEFENSE_WEIGHT * (1.0 - d / BASE_DEFENSE_RADIUS);
        }
    }

    score
}

fn is_valid_target(unit: &Unit, candidate: &Unit) -> bool {
    candidate.faction != unit.faction && candidate.is_targetable()
}

/// Best target for `unit`, ignoring the throttle.
///
/// An explicitly pursued enemy wins outright while it stays targetable.
#[must_use]
pub fn select_target(
    unit: &Unit,
    units: &UnitRegistry,
    ctx: &TargetingContext<'_>,
    focus: Option<&FocusCounts>,
) -> Option<UnitId> {
    if let Some(pursued) = unit.pursued {
        if units.get(pursued).is_some_and(|c| is_valid_target(unit, c)) {
            return Some(pursued);
        }
    }

    let mut best: Option<(UnitId, f32)> = None;
    for candidate in units.iter_alive() {
        if !is_valid_target(unit, candidate) {
            continue;
        }
        if planar_distance(unit.position, candidate.position) > ctx.tuning.max_search_distance {
            continue;
        }
        let score = score_candidate(unit, candidate, units, ctx, focus);
        if best.map_or(true, |(_, s)| score > s) {
            best = Some((candidate.id, score));
        }
    }
    best.map(|(id, _)| id)
}

/// Throttled target update for every unit.
pub fn update_targets(units: &mut UnitRegistry, ctx: &TargetingContext<'_>, dt: f32) {
    let mut focus = focus_fire_counts(units, ctx.tuning);

    for id in units.ids() {
        let decision = {
            let Some(unit) = units.get_alive(id) else {
                continue;
            };
            let timer = unit.target_search_timer - dt;
            if !unit.can_fight() || unit.is_retreating {
                Decision { target: None, timer }
            } else {
                let current = unit
                    .target
                    .filter(|t| units.get(*t).is_some_and(|c| is_valid_target(unit, c)));
                if timer > 0.0 {
                    Decision { target: current, timer }
                } else {
                    Decision {
                        target: select_target(unit, units, ctx, focus.as_ref()),
                        timer: ctx.tuning.throttle,
                    }
                }
            }
        };

        let Some(unit) = units.get_mut(id) else {
            continue;
        };
        unit.target_search_timer = decision.timer.max(0.0);
        if unit.target != decision.target {
            if let Some(counts) = focus.as_mut() {
                if let Some(old) = unit.target {
                    if let Some(n) = counts.get_mut(&(unit.faction, old)) {
                        *n = n.saturating_sub(1);
                    }
                }
                if let Some(new) = decision.target {
                    *counts.entry((unit.faction, new)).or_insert(0) += 1;
                }
            }
            tracing::trace!("{} target {:?} -> {:?}", unit.id, unit.target, decision.target);
            unit.target = decision.target;
        }
    }
}

struct Decision {
    target: Option<UnitId>,
    timer: f32,
}
