//! Unit registry: sole owner of unit records.
//!
//! Units are stored contiguously in insertion order with an id → index map.
//! Ids come from a monotonic counter and are never reused. Storage is only
//! compacted by [`UnitRegistry::reap_dead`], so indices stay valid for the
//! rest of a tick and no component ever holds a dangling reference.

use std::collections::HashMap;

use glam::Vec3;

use crate::components::{Unit, UnitClass, UnitId};
use crate::factions::FactionId;
use crate::math::planar_distance_squared;

/// Read-only queries over live units.
///
/// Implemented once by the registry and handed to abilities and faction
/// mechanics, so none of them needs its own lookup wiring.
pub trait UnitQueryPort {
    /// Position of a live unit.
    fn position(&self, id: UnitId) -> Option<Vec3>;

    /// Faction of a live unit.
    fn faction(&self, id: UnitId) -> Option<FactionId>;

    /// Health fraction of a live unit.
    fn health_fraction(&self, id: UnitId) -> Option<f32>;

    /// Whether the unit exists and is not flagged dead.
    fn is_alive(&self, id: UnitId) -> bool;

    /// Live units of `faction` within `radius` of `center` (planar).
    fn allies_within(&self, faction: FactionId, center: Vec3, radius: f32) -> Vec<UnitId>;

    /// Live units not of `faction` within `radius` of `center` (planar).
    fn enemies_within(&self, faction: FactionId, center: Vec3, radius: f32) -> Vec<UnitId>;
}

/// Storage for all units in the simulation.
#[derive(Debug, Clone, Default)]
pub struct UnitRegistry {
    /// Units in insertion order.
    units: Vec<Unit>,
    /// Map of unit id to index in `units`.
    index: HashMap<UnitId, usize>,
    /// Next unit id to assign.
    next_id: u32,
}

impl UnitRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            units: Vec::new(),
            index: HashMap::new(),
            next_id: 1,
        }
    }

    /// Insert a new unit, assigning and returning its id.
    pub fn insert(&mut self, mut unit: Unit) -> UnitId {
        let id = UnitId(self.next_id.max(1));
        self.next_id = id.0 + 1;
        unit.id = id;
        self.index.insert(id, self.units.len());
        self.units.push(unit);
        id
    }

    /// Get a unit by id (dead units included until reaped).
    #[must_use]
    pub fn get(&self, id: UnitId) -> Option<&Unit> {
        self.index.get(&id).map(|&i| &self.units[i])
    }

    /// Get a mutable unit by id.
    pub fn get_mut(&mut self, id: UnitId) -> Option<&mut Unit> {
        self.index.get(&id).map(|&i| &mut self.units[i])
    }

    /// Get a live unit by id.
    #[must_use]
    pub fn get_alive(&self, id: UnitId) -> Option<&Unit> {
        self.get(id).filter(|u| u.is_alive())
    }

    /// Check if a unit record exists.
    #[must_use]
    pub fn contains(&self, id: UnitId) -> bool {
        self.index.contains_key(&id)
    }

    /// Number of records, dead ones included.
    #[must_use]
    pub fn len(&self) -> usize {
        self.units.len()
    }

    /// Check if the registry is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }

    /// Number of live units.
    #[must_use]
    pub fn live_count(&self) -> usize {
        self.units.iter().filter(|u| u.is_alive()).count()
    }

    /// Ids in insertion order.
    #[must_use]
    pub fn ids(&self) -> Vec<UnitId> {
        self.units.iter().map(|u| u.id).collect()
    }

    /// Iterate over all records in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &Unit> {
        self.units.iter()
    }

    /// Iterate over live units in insertion order.
    pub fn iter_alive(&self) -> impl Iterator<Item = &Unit> {
        self.units.iter().filter(|u| u.is_alive())
    }

    /// Iterate mutably over all records in insertion order.
    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Unit> {
        self.units.iter_mut()
    }

    /// Live units belonging to `faction`.
    pub fn faction_units(&self, faction: FactionId) -> impl Iterator<Item = &Unit> {
        self.iter_alive().filter(move |u| u.faction == faction)
    }

    /// Count live units of a faction and class.
    #[must_use]
    pub fn count_class(&self, faction: FactionId, class: UnitClass) -> usize {
        self.faction_units(faction).filter(|u| u.class == class).count()
    }

    /// Nearest live enemy of `faction` to `point`.
    #[must_use]
    pub fn nearest_enemy(&self, faction: FactionId, point: Vec3) -> Option<&Unit> {
        self.iter_alive()
            .filter(|u| u.faction != faction)
            .min_by(|a, b| {
                planar_distance_squared(a.position, point)
                    .total_cmp(&planar_distance_squared(b.position, point))
            })
    }

    /// Drop every reference to units that are dead or missing.
    ///
    /// Run after combat so no live unit targets a dead one on the next tick.
    pub fn clear_stale_references(&mut self) {
        let alive: HashMap<UnitId, bool> =
            self.units.iter().map(|u| (u.id, u.is_alive())).collect();
        let is_valid = |id: &UnitId| alive.get(id).copied().unwrap_or(false);

        for unit in &mut self.units {
            if unit.target.is_some_and(|t| !is_valid(&t)) {
                unit.target = None;
            }
            if unit.pursued.is_some_and(|t| !is_valid(&t)) {
                unit.pursued = None;
            }
        }
    }

    /// Remove units flagged dead, compacting storage. Returns the reaped units.
    pub fn reap_dead(&mut self) -> Vec<Unit> {
        if !self.units.iter().any(|u| u.is_dead) {
            return Vec::new();
        }
        let (dead, live): (Vec<Unit>, Vec<Unit>) =
            std::mem::take(&mut self.units).into_iter().partition(|u| u.is_dead);
        self.units = live;
        self.index = self
            .units
            .iter()
            .enumerate()
            .map(|(i, u)| (u.id, i))
            .collect();
        dead
    }
}

impl UnitQueryPort for UnitRegistry {
    fn position(&self, id: UnitId) -> Option<Vec3> {
        self.get_alive(id).map(|u| u.position)
    }

    fn faction(&self, id: UnitId) -> Option<FactionId> {
        self.get_alive(id).map(|u| u.faction)
    }

    fn health_fraction(&self, id: UnitId) -> Option<f32> {
        self.get_alive(id).map(|u| u.stats.health_fraction())
    }

    fn is_alive(&self, id: UnitId) -> bool {
        self.get_alive(id).is_some()
    }

    fn allies_within(&self, faction: FactionId, center: Vec3, radius: f32) -> Vec<UnitId> {
        let r2 = radius * radius;
        self.iter_alive()
            .filter(|u| u.faction == faction && planar_distance_squared(u.position, center) <= r2)
            .map(|u| u.id)
            .collect()
    }

    fn enemies_within(&self, faction: FactionId, center: Vec3, radius: f32) -> Vec<UnitId> {
        let r2 = radius * radius;
        self.iter_alive()
            .filter(|u| u.faction != faction && planar_distance_squared(u.position, center) <= r2)
            .map(|u| u.id)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::CombatStats;

    fn unit(faction: u8, x: f32) -> Unit {
        Unit::new(
            FactionId(faction),
            UnitClass::Medium,
            CombatStats::new(100.0, 10.0, 20.0, 1.0),
            5.0,
            Vec3::new(x, 0.0, 0.0),
        )
    }

    #[test]
    fn test_ids_are_monotonic_and_never_reused() {
        let mut reg = UnitRegistry::new();
        let a = reg.insert(unit(0, 0.0));
        let b = reg.insert(unit(0, 1.0));
        assert_eq!((a, b), (UnitId(1), UnitId(2)));

        reg.get_mut(a).unwrap().is_dead = true;
        reg.reap_dead();
        let c = reg.insert(unit(0, 2.0));
        assert_eq!(c, UnitId(3));
        assert!(reg.get(a).is_none());
        assert_eq!(reg.get(c).unwrap().position.x, 2.0);
    }

    #[test]
    fn test_reap_preserves_insertion_order() {
        let mut reg = UnitRegistry::new();
        let ids: Vec<UnitId> = (0..5).map(|i| reg.insert(unit(0, i as f32))).collect();
        reg.get_mut(ids[1]).unwrap().is_dead = true;
        reg.get_mut(ids[3]).unwrap().is_dead = true;
        let reaped = reg.reap_dead();
        assert_eq!(reaped.len(), 2);
        assert_eq!(reg.ids(), vec![ids[0], ids[2], ids[4]]);
        assert_eq!(reg.get(ids[4]).unwrap().id, ids[4]);
    }

    #[test]
    fn test_clear_stale_references() {
        let mut reg = UnitRegistry::new();
        let a = reg.insert(unit(0, 0.0));
        let b = reg.insert(unit(1, 5.0));
        reg.get_mut(a).unwrap().target = Some(b);
        reg.get_mut(a).unwrap().pursued = Some(UnitId(99));
        reg.get_mut(b).unwrap().is_dead = true;

        reg.clear_stale_references();
        let a_unit = reg.get(a).unwrap();
        assert!(a_unit.target.is_none());
        assert!(a_unit.pursued.is_none());
    }

    #[test]
    fn test_query_port_neighbourhoods() {
        let mut reg = UnitRegistry::new();
        let a = reg.insert(unit(0, 0.0));
        let b = reg.insert(unit(0, 3.0));
        let c = reg.insert(unit(1, 4.0));
        reg.insert(unit(1, 50.0));

        assert_eq!(reg.allies_within(FactionId(0), Vec3::ZERO, 5.0), vec![a, b]);
        assert_eq!(reg.enemies_within(FactionId(0), Vec3::ZERO, 5.0), vec![c]);
        assert_eq!(reg.nearest_enemy(FactionId(0), Vec3::ZERO).unwrap().id, c);
        reg.get_mut(c).unwrap().is_dead = true;
        assert!(!reg.is_alive(c));
        assert!(reg.position(c).is_none());
    }
}
