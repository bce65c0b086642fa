//! Retreat and stance behavior.
//!
//! A badly wounded unit, or a Defensive unit that finds itself heavily
//! outnumbered, drops its target and falls back. HoldPosition units never
//! fall back.
//!
//! A unit that reaches its fall-back point while the reason to retreat
//! persists heads straight for the next one. Within [`HOME_RADIUS`] of its
//! own factory it has nowhere further to go and stands its ground.

use std::collections::BTreeMap;

use glam::Vec3;

use crate::components::{Stance, Unit, UnitClass};
use crate::factions::FactionId;
use crate::math::{lerp_toward, planar_direction, planar_distance};
use crate::registry::{UnitQueryPort, UnitRegistry};

/// Health fraction below which units retreat.
pub const RETREAT_HEALTH_THRESHOLD: f32 = 0.25;
/// Health fraction below which heavies retreat.
pub const HEAVY_RETREAT_HEALTH_THRESHOLD: f32 = 0.15;
/// Radius used to compare enemy and allied numbers.
pub const OUTNUMBER_RADIUS: f32 = 40.0;
/// Enemy-to-ally ratio at which a Defensive unit falls back.
pub const OUTNUMBER_RATIO: usize = 2;
/// Share of the way to the factory a retreat covers.
pub const FACTORY_FRACTION: f32 = 0.7;
/// Distance to put between a retreating unit and the nearest enemy.
pub const FLEE_DISTANCE: f32 = 30.0;
/// Speed multiplier while retreating.
pub const RETREAT_SPEED_MULTIPLIER: f32 = 1.3;
/// Distance from the retreat destination at which a retreat ends.
pub const RETREAT_ARRIVAL: f32 = 3.0;
/// Distance from the own factory inside which no new retreat starts.
pub const HOME_RADIUS: f32 = 10.0;

/// Health threshold for a class.
#[must_use]
pub const fn health_threshold(class: UnitClass) -> f32 {
    match class {
        UnitClass::Heavy => HEAVY_RETREAT_HEALTH_THRESHOLD,
        _ => RETREAT_HEALTH_THRESHOLD,
    }
}

/// Whether `unit` should start retreating.
#[must_use]
pub fn should_retreat(unit: &Unit, units: &dyn UnitQueryPort) -> bool {
    if !unit.is_alive() || unit.stance == Stance::HoldPosition {
        return false;
    }
    if unit.stats.health_fraction() < health_threshold(unit.class) {
        return true;
    }
    if unit.stance == Stance::Defensive {
        let enemies = units
            .enemies_within(unit.faction, unit.position, OUTNUMBER_RADIUS)
            .len();
        // Includes the unit itself.
        let allies = units
            .allies_within(unit.faction, unit.position, OUTNUMBER_RADIUS)
            .len()
            .max(1);
        return enemies >= allies * OUTNUMBER_RATIO;
    }
    false
}

/// Where a retreating unit heads.
///
/// Toward the own factory if it stands, else directly away from the
/// nearest enemy, else the map center.
#[must_use]
pub fn retreat_destination(
    unit: &Unit,
    units: &UnitRegistry,
    own_factory: Option<Vec3>,
    map_center: Vec3,
) -> Vec3 {
    if let Some(factory) = own_factory {
        return lerp_toward(unit.position, factory, FACTORY_FRACTION);
    }
    if let Some(enemy) = units.nearest_enemy(unit.faction, unit.position) {
        let away = planar_direction(enemy.position, unit.position);
        if away != Vec3::ZERO {
            return unit.position + away * FLEE_DISTANCE;
        }
    }
    map_center
}

/// Fall-back point for a unit that should retreat, or `None` when it is
/// already there.
#[must_use]
pub fn fall_back_point(
    unit: &Unit,
    units: &UnitRegistry,
    own_factory: Option<Vec3>,
    map_center: Vec3,
) -> Option<Vec3> {
    if own_factory.is_some_and(|f| planar_distance(unit.position, f) <= HOME_RADIUS) {
        return None;
    }
    let destination = retreat_destination(unit, units, own_factory, map_center);
    (planar_distance(unit.position, destination) > RETREAT_ARRIVAL).then_some(destination)
}

enum RetreatStep {
    Keep,
    Start(Vec3),
    End,
}

/// Start, chain and finish retreats for every unit.
pub fn update_retreats(
    units: &mut UnitRegistry,
    factories: &BTreeMap<FactionId, Vec3>,
    map_center: Vec3,
) {
    for id in units.ids() {
        let step = {
            let view: &UnitRegistry = units;
            let Some(unit) = view.get_alive(id) else {
                continue;
            };
            let arrived = unit.is_retreating
                && planar_distance(unit.position, unit.destination) <= RETREAT_ARRIVAL;
            if unit.is_retreating && !arrived {
                RetreatStep::Keep
            } else {
                let next = if should_retreat(unit, view) {
                    fall_back_point(
                        unit,
                        view,
                        factories.get(&unit.faction).copied(),
                        map_center,
                    )
                } else {
                    None
                };
                match next {
                    Some(destination) => RetreatStep::Start(destination),
                    None if arrived => RetreatStep::End,
                    None => RetreatStep::Keep,
                }
            }
        };

        let Some(unit) = units.get_mut(id) else {
            continue;
        };
        match step {
            RetreatStep::Keep => {}
            RetreatStep::Start(destination) => {
                tracing::trace!("{} retreating to {:?}", unit.id, destination);
                unit.is_retreating = true;
                unit.destination = destination;
                unit.target = None;
                unit.pursued = None;
                unit.attack_move = false;
                unit.nav.waypoint = None;
            }
            RetreatStep::End => {
                unit.is_retreating = false;
                unit.destination = unit.position;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::{CombatStats, UnitId};

    fn unit(faction: u8, class: UnitClass, x: f32) -> Unit {
        Unit::new(
            FactionId(faction),
            class,
            CombatStats::new(100.0, 10.0, 20.0, 1.0),
            5.0,
            Vec3::new(x, 0.0, 0.0),
        )
    }

    fn wounded(class: UnitClass, fraction: f32) -> Unit {
        let mut u = unit(0, class, 0.0);
        u.stats.health = u.stats.max_health * fraction;
        u
    }

    #[test]
    fn test_heavy_at_twenty_percent_holds() {
        let reg = UnitRegistry::new();
        assert!(!should_retreat(&wounded(UnitClass::Heavy, 0.2), &reg));
        assert!(should_retreat(&wounded(UnitClass::Heavy, 0.1), &reg));
    }

    #[test]
    fn test_medium_at_twenty_percent_retreats() {
        let reg = UnitRegistry::new();
        assert!(should_retreat(&wounded(UnitClass::Medium, 0.2), &reg));
        assert!(!should_retreat(&wounded(UnitClass::Medium, 0.3), &reg));
    }

    #[test]
    fn test_hold_position_never_retreats() {
        let reg = UnitRegistry::new();
        let u = wounded(UnitClass::Light, 0.01).with_stance(Stance::HoldPosition);
        assert!(!should_retreat(&u, &reg));
    }

    #[test]
    fn test_defensive_outnumbered() {
        let mut reg = UnitRegistry::new();
        let me = reg.insert(unit(0, UnitClass::Medium, 0.0).with_stance(Stance::Defensive));
        reg.insert(unit(1, UnitClass::Light, 10.0));
        assert!(!should_retreat(reg.get(me).unwrap(), &reg));
        reg.insert(unit(1, UnitClass::Light, 12.0));
        assert!(should_retreat(reg.get(me).unwrap(), &reg));

        // An ally nearby evens the odds again.
        reg.insert(unit(0, UnitClass::Medium, -5.0));
        assert!(!should_retreat(reg.get(me).unwrap(), &reg));
    }

    #[test]
    fn test_aggressive_ignores_numbers() {
        let mut reg = UnitRegistry::new();
        let me = reg.insert(unit(0, UnitClass::Medium, 0.0));
        for i in 0..5 {
            reg.insert(unit(1, UnitClass::Light, 5.0 + i as f32));
        }
        assert!(!should_retreat(reg.get(me).unwrap(), &reg));
    }

    #[test]
    fn test_destination_priority() {
        let mut reg = UnitRegistry::new();
        let me = reg.insert(unit(0, UnitClass::Medium, 10.0));
        let center = Vec3::new(500.0, 0.0, 500.0);
        let factory = Vec3::new(110.0, 0.0, 0.0);

        let me_ref = reg.get(me).unwrap().clone();
        let dest = retreat_destination(&me_ref, &reg, Some(factory), center);
        assert!((dest - Vec3::new(80.0, 0.0, 0.0)).length() < 1e-4);
        assert_eq!(retreat_destination(&me_ref, &reg, None, center), center);

        reg.insert(unit(1, UnitClass::Light, 0.0));
        let dest = retreat_destination(&me_ref, &reg, None, center);
        assert!((dest - Vec3::new(40.0, 0.0, 0.0)).length() < 1e-4);
    }

    #[test]
    fn test_wounded_unit_holds_near_home() {
        let mut reg = UnitRegistry::new();
        let mut wounded_unit = wounded(UnitClass::Light, 0.1);
        wounded_unit.position = Vec3::new(-92.0, 0.0, 0.0);
        let me = reg.insert(wounded_unit);
        let mut factories = BTreeMap::new();
        factories.insert(FactionId(0), Vec3::new(-100.0, 0.0, 0.0));

        let home = factories.get(&FactionId(0)).copied();
        assert!(fall_back_point(reg.get(me).unwrap(), &reg, home, Vec3::ZERO).is_none());
        for _ in 0..5 {
            update_retreats(&mut reg, &factories, Vec3::ZERO);
            assert!(!reg.get(me).unwrap().is_retreating);
        }
    }

    #[test]
    fn test_arrival_chains_into_next_retreat() {
        let mut reg = UnitRegistry::new();
        let me = reg.insert(wounded(UnitClass::Light, 0.1));
        let mut factories = BTreeMap::new();
        factories.insert(FactionId(0), Vec3::new(-100.0, 0.0, 0.0));

        update_retreats(&mut reg, &factories, Vec3::ZERO);
        reg.get_mut(me).unwrap().position = Vec3::new(-69.0, 0.0, 0.0);
        update_retreats(&mut reg, &factories, Vec3::ZERO);
        let u = reg.get(me).unwrap();
        assert!(u.is_retreating);
        // 70% of the remaining 31 units.
        assert!((u.destination - Vec3::new(-90.7, 0.0, 0.0)).length() < 1e-3);

        // Inside the home radius the next arrival ends the retreat for good.
        reg.get_mut(me).unwrap().position = Vec3::new(-91.0, 0.0, 0.0);
        update_retreats(&mut reg, &factories, Vec3::ZERO);
        assert!(!reg.get(me).unwrap().is_retreating);
        update_retreats(&mut reg, &factories, Vec3::ZERO);
        assert!(!reg.get(me).unwrap().is_retreating);
    }

    #[test]
    fn test_update_starts_and_ends_retreat() {
        let mut reg = UnitRegistry::new();
        let me = reg.insert(wounded(UnitClass::Light, 0.1));
        let enemy = reg.insert(unit(1, UnitClass::Light, 5.0));
        reg.get_mut(me).unwrap().target = Some(enemy);
        reg.get_mut(me).unwrap().pursued = Some(UnitId(99));
        let mut factories = BTreeMap::new();
        factories.insert(FactionId(0), Vec3::new(-100.0, 0.0, 0.0));

        update_retreats(&mut reg, &factories, Vec3::ZERO);
        let u = reg.get(me).unwrap();
        assert!(u.is_retreating);
        assert!(u.target.is_none() && u.pursued.is_none());
        assert!((u.destination - Vec3::new(-70.0, 0.0, 0.0)).length() < 1e-4);

        // Healed on the way, so arriving ends the retreat.
        let u = reg.get_mut(me).unwrap();
        u.position = Vec3::new(-69.0, 0.0, 0.0);
        u.stats.health = u.stats.max_health;
        update_retreats(&mut reg, &factories, Vec3::ZERO);
        let u = reg.get(me).unwrap();
        assert!(!u.is_retreating);
        assert_eq!(u.destination, u.position);
    }
}
