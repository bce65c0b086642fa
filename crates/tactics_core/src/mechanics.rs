//! Faction damage mechanics.
//!
//! The combat pipeline calls [`FactionMechanics`] twice per shot: once on
//! the way out (attacker side) and once on the way in (defender side).

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::components::{Unit, UnitId};
use crate::factions::{FactionId, FactionProfile, MechanicsKind};
use crate::registry::UnitQueryPort;

/// Radius in which allies count toward Synergy.
pub const SYNERGY_RADIUS: f32 = 8.0;
/// Outgoing bonus per nearby ally.
pub const SYNERGY_PER_ALLY: f32 = 0.05;
/// Cap on the Synergy bonus.
pub const SYNERGY_MAX_BONUS: f32 = 0.2;
/// Share of incoming damage spread by ArmorShare.
pub const ARMOR_SHARE_FRACTION: f32 = 0.25;
/// Radius in which allies absorb shared damage.
pub const ARMOR_SHARE_RADIUS: f32 = 10.0;
/// Maximum number of allies absorbing shared damage.
pub const ARMOR_SHARE_MAX_ALLIES: usize = 3;

/// Result of the incoming-damage hook.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct IncomingDamage {
    /// Damage still applied to the defender (before armor).
    pub damage: f32,
    /// The hit was fully negated.
    pub dodged: bool,
    /// Raw damage moved onto allies, applied directly to them.
    pub redistributed: Vec<(UnitId, f32)>,
}

impl IncomingDamage {
    /// Pass damage through unchanged.
    #[must_use]
    pub fn unchanged(damage: f32) -> Self {
        Self {
            damage,
            dodged: false,
            redistributed: Vec::new(),
        }
    }
}

/// Per-faction damage hooks.
pub trait FactionMechanics {
    /// Adjust damage leaving `unit`.
    fn apply_outgoing_damage(&self, unit: &Unit, damage: f32, units: &dyn UnitQueryPort) -> f32;

    /// Adjust damage arriving at `unit` from `attacker`.
    fn apply_incoming_damage(
        &self,
        unit: &Unit,
        damage: f32,
        attacker: FactionId,
        units: &dyn UnitQueryPort,
    ) -> IncomingDamage;
}

/// Mechanics driven by each faction's [`MechanicsKind`].
#[derive(Debug, Clone, Default)]
pub struct StandardMechanics {
    kinds: HashMap<FactionId, MechanicsKind>,
}

impl StandardMechanics {
    /// Build from faction profiles.
    #[must_use]
    pub fn from_profiles(profiles: &[FactionProfile]) -> Self {
        Self {
            kinds: profiles.iter().map(|p| (p.id, p.mechanics)).collect(),
        }
    }

    /// Mechanics kind for a faction.
    #[must_use]
    pub fn kind(&self, faction: FactionId) -> MechanicsKind {
        self.kinds.get(&faction).copied().unwrap_or_default()
    }
}

fn nearby_allies(unit: &Unit, radius: f32, units: &dyn UnitQueryPort) -> Vec<UnitId> {
    units
        .allies_within(unit.faction, unit.position, radius)
        .into_iter()
        .filter(|&id| id != unit.id)
        .collect()
}

/// Synergy multiplier for `allies` nearby allies.
#[must_use]
pub fn synergy_multiplier(allies: usize) -> f32 {
    1.0 + (allies as f32 * SYNERGY_PER_ALLY).min(SYNERGY_MAX_BONUS)
}

impl FactionMechanics for StandardMechanics {
    fn apply_outgoing_damage(&self, unit: &Unit, damage: f32, units: &dyn UnitQueryPort) -> f32 {
        match self.kind(unit.faction) {
            MechanicsKind::Synergy => {
                damage * synergy_multiplier(nearby_allies(unit, SYNERGY_RADIUS, units).len())
            }
            MechanicsKind::None | MechanicsKind::ArmorShare => damage,
        }
    }

    fn apply_incoming_damage(
        &self,
        unit: &Unit,
        damage: f32,
        _attacker: FactionId,
        units: &dyn UnitQueryPort,
    ) -> IncomingDamage {
        if self.kind(unit.faction) != MechanicsKind::ArmorShare {
            return IncomingDamage::unchanged(damage);
        }
        let mut allies = nearby_allies(unit, ARMOR_SHARE_RADIUS, units);
        allies.truncate(ARMOR_SHARE_MAX_ALLIES);
        if allies.is_empty() {
            return IncomingDamage::unchanged(damage);
        }
        let shared = damage * ARMOR_SHARE_FRACTION;
        let each = shared / allies.len() as f32;
        IncomingDamage {
            damage: damage - shared,
            dodged: false,
            redistributed: allies.into_iter().map(|id| (id, each)).collect(),
        }
    }
}
