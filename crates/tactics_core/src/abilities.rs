//! Faction abilities.
//!
//! Abilities are per-faction modifier state plus pure query functions. The
//! combat and navigation code never branches on a specific ability; it asks
//! [`AbilitySystem`] for multipliers, evasion chances and visibility flags.
//! Activation receives a [`UnitQueryPort`] to resolve the units it touches.

use std::collections::BTreeMap;

use glam::Vec3;
use serde::{Deserialize, Serialize};

use crate::components::UnitId;
use crate::error::{Result, TacticsError};
use crate::factions::{FactionId, FactionProfile};
use crate::math::planar_distance_squared;
use crate::registry::{UnitQueryPort, UnitRegistry};

/// Speed multiplier granted by Overclock alongside its damage bonus.
pub const OVERCLOCK_SPEED_MULTIPLIER: f32 = 1.15;

/// Ability kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum AbilityKind {
    /// Faction-wide damage and speed boost.
    Overclock,
    /// Marked enemy takes extra damage from the marking faction.
    MarkTarget,
    /// Own units inside an area get a chance to evade hits.
    EvasionField,
    /// Own units inside an area become untargetable.
    Cloak,
    /// Own units inside an area become untargetable and immune, but cannot fire.
    PhaseShift,
}

/// Static definition of an ability.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AbilitySpec {
    /// Which ability this defines.
    pub kind: AbilityKind,
    /// Seconds before the ability can be used again.
    pub cooldown: f32,
    /// Seconds the effect lasts.
    pub duration: f32,
    /// Area radius (0 for faction-wide or single-target effects).
    pub radius: f32,
    /// Kind-specific strength: damage multiplier, evasion chance, ...
    pub magnitude: f32,
}

impl AbilitySpec {
    /// Default definitions for every ability kind.
    #[must_use]
    pub fn standard_set() -> Vec<Self> {
        vec![
            Self {
                kind: AbilityKind::Overclock,
                cooldown: 30.0,
                duration: 8.0,
                radius: 0.0,
                magnitude: 1.5,
            },
            Self {
                kind: AbilityKind::MarkTarget,
                cooldown: 20.0,
                duration: 10.0,
                radius: 0.0,
                magnitude: 1.75,
            },
            Self {
                kind: AbilityKind::EvasionField,
                cooldown: 25.0,
                duration: 8.0,
                radius: 15.0,
                magnitude: 0.3,
            },
            Self {
                kind: AbilityKind::Cloak,
                cooldown: 40.0,
                duration: 10.0,
                radius: 12.0,
                magnitude: 0.0,
            },
            Self {
                kind: AbilityKind::PhaseShift,
                cooldown: 45.0,
                duration: 4.0,
                radius: 10.0,
                magnitude: 0.0,
            },
        ]
    }
}

/// Where an ability is aimed.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum AbilityTarget {
    /// No explicit target (faction-wide effects).
    None,
    /// A specific unit.
    Unit(UnitId),
    /// A ground position.
    Point(Vec3),
}

/// A running ability effect.
#[derive(Debug, Clone, PartialEq)]
pub struct ActiveEffect {
    /// Ability that produced the effect.
    pub kind: AbilityKind,
    /// Seconds left.
    pub remaining: f32,
    /// Copied from the spec at activation.
    pub magnitude: f32,
    /// Copied from the spec at activation.
    pub radius: f32,
    /// Area center, for area effects.
    pub center: Vec3,
    /// Marked enemy, for MarkTarget.
    pub marked: Option<UnitId>,
    /// Units put under the effect at activation (Cloak, PhaseShift).
    pub affected: Vec<UnitId>,
}

/// Ability state of one faction.
#[derive(Debug, Clone, Default)]
pub struct FactionAbilities {
    available: Vec<AbilityKind>,
    cooldowns: BTreeMap<AbilityKind, f32>,
    active: Vec<ActiveEffect>,
}

impl FactionAbilities {
    /// Create state for a faction owning `available` abilities.
    #[must_use]
    pub fn new(available: Vec<AbilityKind>) -> Self {
        Self {
            available,
            cooldowns: BTreeMap::new(),
            active: Vec::new(),
        }
    }

    /// Currently running effects.
    #[must_use]
    pub fn active(&self) -> &[ActiveEffect] {
        &self.active
    }

    fn product(&self, kind: AbilityKind) -> f32 {
        self.active
            .iter()
            .filter(|e| e.kind == kind)
            .map(|e| e.magnitude)
            .product()
    }

    /// Outgoing damage multiplier from offensive effects.
    #[must_use]
    pub fn damage_multiplier(&self) -> f32 {
        self.product(AbilityKind::Overclock)
    }

    /// Movement speed multiplier.
    #[must_use]
    pub fn speed_multiplier(&self) -> f32 {
        if self.active.iter().any(|e| e.kind == AbilityKind::Overclock) {
            OVERCLOCK_SPEED_MULTIPLIER
        } else {
            1.0
        }
    }

    /// Multiplier this faction applies against `target`.
    #[must_use]
    pub fn mark_multiplier(&self, target: UnitId) -> f32 {
        self.active
            .iter()
            .filter(|e| e.kind == AbilityKind::MarkTarget && e.marked == Some(target))
            .map(|e| e.magnitude)
            .fold(1.0, f32::max)
    }

    /// Evasion chance for an own unit standing at `position`.
    #[must_use]
    pub fn evasion_chance(&self, position: Vec3) -> f32 {
        self.active
            .iter()
            .filter(|e| {
                e.kind == AbilityKind::EvasionField
                    && planar_distance_squared(e.center, position) <= e.radius * e.radius
            })
            .map(|e| e.magnitude)
            .fold(0.0, f32::max)
            .clamp(0.0, 1.0)
    }

    fn covers(&self, kind: AbilityKind, unit: UnitId) -> bool {
        self.active
            .iter()
            .any(|e| e.kind == kind && e.affected.contains(&unit))
    }
}

/// Outcome of a successful activation.
#[derive(Debug, Clone, PartialEq)]
pub struct AbilityActivation {
    /// Activated ability.
    pub kind: AbilityKind,
    /// Units directly affected (marked enemy or covered allies).
    pub affected: Vec<UnitId>,
}

/// Ability state for every faction.
#[derive(Debug, Clone, Default)]
pub struct AbilitySystem {
    specs: Vec<AbilitySpec>,
    factions: BTreeMap<FactionId, FactionAbilities>,
}

impl AbilitySystem {
    /// Create the system from ability definitions and faction profiles.
    #[must_use]
    pub fn new(specs: Vec<AbilitySpec>, profiles: &[FactionProfile]) -> Self {
        let factions = profiles
            .iter()
            .map(|p| (p.id, FactionAbilities::new(p.abilities.clone())))
            .collect();
        Self { specs, factions }
    }

    /// Definition of an ability kind.
    #[must_use]
    pub fn spec(&self, kind: AbilityKind) -> Option<&AbilitySpec> {
        self.specs.iter().find(|s| s.kind == kind)
    }

    /// Ability state of a faction.
    #[must_use]
    pub fn faction(&self, faction: FactionId) -> Option<&FactionAbilities> {
        self.factions.get(&faction)
    }

    /// Seconds until `kind` can be activated again by `faction`.
    #[must_use]
    pub fn cooldown_remaining(&self, faction: FactionId, kind: AbilityKind) -> f32 {
        self.factions
            .get(&faction)
            .and_then(|f| f.cooldowns.get(&kind).copied())
            .unwrap_or(0.0)
    }

    /// Activate an ability.
    ///
    /// # Errors
    ///
    /// Fails if the faction is unknown, does not own the ability, the
    /// ability is recharging, or the target does not suit the ability.
    pub fn activate(
        &mut self,
        faction: FactionId,
        kind: AbilityKind,
        target: AbilityTarget,
        units: &dyn UnitQueryPort,
    ) -> Result<AbilityActivation> {
        let spec = *self
            .spec(kind)
            .ok_or(TacticsError::AbilityUnavailable { faction, kind })?;
        let state = self
            .factions
            .get_mut(&faction)
            .ok_or(TacticsError::FactionNotFound(faction))?;
        if !state.available.contains(&kind) {
            return Err(TacticsError::AbilityUnavailable { faction, kind });
        }
        let remaining = state.cooldowns.get(&kind).copied().unwrap_or(0.0);
        if remaining > 0.0 {
            return Err(TacticsError::AbilityOnCooldown { kind, remaining });
        }

        let mut effect = ActiveEffect {
            kind,
            remaining: spec.duration,
            magnitude: spec.magnitude,
            radius: spec.radius,
            center: Vec3::ZERO,
            marked: None,
            affected: Vec::new(),
        };

        match kind {
            AbilityKind::Overclock => {}
            AbilityKind::MarkTarget => {
                let AbilityTarget::Unit(id) = target else {
                    return Err(TacticsError::InvalidState(
                        "MarkTarget requires a unit target".into(),
                    ));
                };
                match units.faction(id) {
                    None => return Err(TacticsError::UnitNotFound(id)),
                    Some(owner) if owner == faction => {
                        return Err(TacticsError::InvalidState(format!(
                            "{id} belongs to the marking faction"
                        )));
                    }
                    Some(_) => {}
                }
                effect.marked = Some(id);
                effect.affected.push(id);
            }
            AbilityKind::EvasionField | AbilityKind::Cloak | AbilityKind::PhaseShift => {
                let center = match target {
                    AbilityTarget::Point(point) => point,
                    AbilityTarget::Unit(id) => {
                        units.position(id).ok_or(TacticsError::UnitNotFound(id))?
                    }
                    AbilityTarget::None => {
                        return Err(TacticsError::InvalidState(format!(
                            "{kind:?} requires a target point"
                        )));
                    }
                };
                effect.center = center;
                effect.affected = units.allies_within(faction, center, spec.radius);
            }
        }

        tracing::debug!(
            "{} activated {:?} affecting {} units",
            faction,
            kind,
            effect.affected.len()
        );

        let affected = effect.affected.clone();
        state.cooldowns.insert(kind, spec.cooldown.max(0.0));
        state.active.push(effect);
        Ok(AbilityActivation { kind, affected })
    }

    /// Advance cooldowns and effect timers. Returns effects that ended.
    pub fn advance(&mut self, dt: f32) -> Vec<(FactionId, AbilityKind)> {
        let mut expired = Vec::new();
        for (&faction, state) in &mut self.factions {
            for remaining in state.cooldowns.values_mut() {
                *remaining = (*remaining - dt).max(0.0);
            }
            state.active.retain_mut(|effect| {
                effect.remaining -= dt;
                if effect.remaining <= 0.0 {
                    expired.push((faction, effect.kind));
                    false
                } else {
                    true
                }
            });
        }
        expired
    }

    /// Damage multiplier for units of `faction`.
    #[must_use]
    pub fn damage_multiplier(&self, faction: FactionId) -> f32 {
        self.factions
            .get(&faction)
            .map_or(1.0, FactionAbilities::damage_multiplier)
    }

    /// Speed multiplier for units of `faction`.
    #[must_use]
    pub fn speed_multiplier(&self, faction: FactionId) -> f32 {
        self.factions
            .get(&faction)
            .map_or(1.0, FactionAbilities::speed_multiplier)
    }

    /// Multiplier applied when `attacker` hits `target`.
    #[must_use]
    pub fn mark_multiplier(&self, attacker: FactionId, target: UnitId) -> f32 {
        self.factions
            .get(&attacker)
            .map_or(1.0, |f| f.mark_multiplier(target))
    }

    /// Evasion chance of a unit of `faction` at `position`.
    #[must_use]
    pub fn evasion_chance(&self, faction: FactionId, position: Vec3) -> f32 {
        self.factions
            .get(&faction)
            .map_or(0.0, |f| f.evasion_chance(position))
    }

    /// Whether an own effect currently cloaks `unit`.
    #[must_use]
    pub fn is_cloaked(&self, faction: FactionId, unit: UnitId) -> bool {
        self.factions
            .get(&faction)
            .is_some_and(|f| f.covers(AbilityKind::Cloak, unit))
    }

    /// Whether an own effect currently phases `unit`.
    #[must_use]
    pub fn is_phased(&self, faction: FactionId, unit: UnitId) -> bool {
        self.factions
            .get(&faction)
            .is_some_and(|f| f.covers(AbilityKind::PhaseShift, unit))
    }

    /// Write cloak and phase flags onto unit records.
    pub fn refresh_flags(&self, units: &mut UnitRegistry) {
        for unit in units.iter_mut() {
            unit.is_cloaked = self.is_cloaked(unit.faction, unit.id);
            unit.is_phased = self.is_phased(unit.faction, unit.id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::{CombatStats, Unit, UnitClass};

    fn setup() -> (AbilitySystem, UnitRegistry, UnitId, UnitId) {
        let profiles = vec![
            FactionProfile::new(FactionId(0), "Blue").with_abilities(vec![
                AbilityKind::Overclock,
                AbilityKind::MarkTarget,
                AbilityKind::EvasionField,
                AbilityKind::Cloak,
                AbilityKind::PhaseShift,
            ]),
            FactionProfile::new(FactionId(1), "Red"),
        ];
        let system = AbilitySystem::new(AbilitySpec::standard_set(), &profiles);
        let mut units = UnitRegistry::new();
        let stats = CombatStats::new(100.0, 10.0, 20.0, 1.0);
        let own = units.insert(Unit::new(FactionId(0), UnitClass::Light, stats, 5.0, Vec3::ZERO));
        let enemy = units.insert(Unit::new(
            FactionId(1),
            UnitClass::Light,
            stats,
            5.0,
            Vec3::new(30.0, 0.0, 0.0),
        ));
        (system, units, own, enemy)
    }

    #[test]
    fn test_overclock_multipliers_and_expiry() {
        let (mut system, units, _, _) = setup();
        system
            .activate(FactionId(0), AbilityKind::Overclock, AbilityTarget::None, &units)
            .unwrap();
        assert_eq!(system.damage_multiplier(FactionId(0)), 1.5);
        assert_eq!(system.speed_multiplier(FactionId(0)), OVERCLOCK_SPEED_MULTIPLIER);
        assert_eq!(system.damage_multiplier(FactionId(1)), 1.0);

        let expired = system.advance(8.5);
        assert_eq!(expired, vec![(FactionId(0), AbilityKind::Overclock)]);
        assert_eq!(system.damage_multiplier(FactionId(0)), 1.0);
    }

    #[test]
    fn test_cooldown_blocks_reactivation() {
        let (mut system, units, _, _) = setup();
        system
            .activate(FactionId(0), AbilityKind::Overclock, AbilityTarget::None, &units)
            .unwrap();
        let err = system
            .activate(FactionId(0), AbilityKind::Overclock, AbilityTarget::None, &units)
            .unwrap_err();
        assert!(matches!(err, TacticsError::AbilityOnCooldown { .. }));

        system.advance(30.0);
        assert_eq!(system.cooldown_remaining(FactionId(0), AbilityKind::Overclock), 0.0);
        assert!(system
            .activate(FactionId(0), AbilityKind::Overclock, AbilityTarget::None, &units)
            .is_ok());
    }

    #[test]
    fn test_unavailable_ability() {
        let (mut system, units, _, _) = setup();
        let err = system
            .activate(FactionId(1), AbilityKind::Cloak, AbilityTarget::Point(Vec3::ZERO), &units)
            .unwrap_err();
        assert!(matches!(err, TacticsError::AbilityUnavailable { .. }));
    }

    #[test]
    fn test_mark_target_only_for_marking_faction() {
        let (mut system, units, own, enemy) = setup();
        assert!(system
            .activate(FactionId(0), AbilityKind::MarkTarget, AbilityTarget::Unit(own), &units)
            .is_err());
        system
            .activate(FactionId(0), AbilityKind::MarkTarget, AbilityTarget::Unit(enemy), &units)
            .unwrap();
        assert_eq!(system.mark_multiplier(FactionId(0), enemy), 1.75);
        assert_eq!(system.mark_multiplier(FactionId(1), enemy), 1.0);
    }

    #[test]
    fn test_cloak_and_phase_flags() {
        let (mut system, mut units, own, enemy) = setup();
        system
            .activate(FactionId(0), AbilityKind::Cloak, AbilityTarget::Point(Vec3::ZERO), &units)
            .unwrap();
        system.refresh_flags(&mut units);
        assert!(units.get(own).unwrap().is_cloaked);
        assert!(!units.get(enemy).unwrap().is_cloaked);

        system.advance(11.0);
        system.refresh_flags(&mut units);
        assert!(!units.get(own).unwrap().is_cloaked);
    }

    #[test]
    fn test_evasion_field_is_positional() {
        let (mut system, units, _, _) = setup();
        system
            .activate(
                FactionId(0),
                AbilityKind::EvasionField,
                AbilityTarget::Point(Vec3::ZERO),
                &units,
            )
            .unwrap();
        assert_eq!(system.evasion_chance(FactionId(0), Vec3::new(5.0, 0.0, 0.0)), 0.3);
        assert_eq!(system.evasion_chance(FactionId(0), Vec3::new(50.0, 0.0, 0.0)), 0.0);
        assert_eq!(system.evasion_chance(FactionId(1), Vec3::ZERO), 0.0);
    }
}
