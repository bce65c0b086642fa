//! Faction identifiers and per-faction profiles.
//!
//! Factions are data-driven: a [`FactionProfile`] fixes a faction's AI
//! personality, formation preferences, damage mechanics and economy at
//! initialization. Nothing in a profile adapts at runtime.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::abilities::AbilityKind;
use crate::formation::FormationType;

/// Unique identifier for factions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct FactionId(pub u8);

impl fmt::Display for FactionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "faction#{}", self.0)
    }
}

/// Faction-specific damage mechanic applied through the mechanics hook.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum MechanicsKind {
    /// No special damage handling.
    #[default]
    None,
    /// Outgoing damage grows with the number of allies standing nearby.
    Synergy,
    /// Part of incoming damage is spread across nearby allies.
    ArmorShare,
}

/// Static description of one faction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FactionProfile {
    /// Faction identifier.
    pub id: FactionId,
    /// Display name (used in logs and reports only).
    pub name: String,
    /// Whether the AI Faction Controller drives this faction.
    pub ai_controlled: bool,
    /// Aggression scalar in `[0, 1]`; scales attack-wave probability.
    pub aggression: f32,
    /// Formation used for attack waves.
    pub attack_formation: FormationType,
    /// Formation used when recalling units to defend the factory.
    pub defense_formation: FormationType,
    /// Damage mechanic applied through the mechanics hook.
    pub mechanics: MechanicsKind,
    /// Currency available at the start of the match.
    pub starting_resources: u32,
    /// Passive income per simulated second (district / power grid stand-in).
    pub passive_income: f32,
    /// Abilities this faction may activate.
    pub abilities: Vec<AbilityKind>,
}

impl FactionProfile {
    /// Create a profile with default settings for the given id.
    #[must_use]
    pub fn new(id: FactionId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            ..Self::default()
        }
    }

    /// Builder method to mark the faction as computer controlled.
    #[must_use]
    pub fn with_ai(mut self, aggression: f32) -> Self {
        self.ai_controlled = true;
        self.aggression = aggression.clamp(0.0, 1.0);
        self
    }

    /// Builder method to set formation preferences.
    #[must_use]
    pub fn with_formations(mut self, attack: FormationType, defense: FormationType) -> Self {
        self.attack_formation = attack;
        self.defense_formation = defense;
        self
    }

    /// Builder method to set the damage mechanic.
    #[must_use]
    pub fn with_mechanics(mut self, mechanics: MechanicsKind) -> Self {
        self.mechanics = mechanics;
        self
    }

    /// Builder method to set starting resources.
    #[must_use]
    pub fn with_resources(mut self, amount: u32) -> Self {
        self.starting_resources = amount;
        self
    }

    /// Builder method to grant abilities.
    #[must_use]
    pub fn with_abilities(mut self, abilities: Vec<AbilityKind>) -> Self {
        self.abilities = abilities;
        self
    }
}

impl Default for FactionProfile {
    fn default() -> Self {
        Self {
            id: FactionId(0),
            name: String::from("Unnamed"),
            ai_controlled: false,
            aggression: 0.5,
            attack_formation: FormationType::Wedge,
            defense_formation: FormationType::Line,
            mechanics: MechanicsKind::None,
            starting_resources: 300,
            passive_income: 2.0,
            abilities: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_aggression_is_clamped() {
        let profile = FactionProfile::new(FactionId(1), "Raiders").with_ai(3.0);
        assert!(profile.ai_controlled);
        assert_eq!(profile.aggression, 1.0);
    }

    #[test]
    fn test_display() {
        assert_eq!(FactionId(3).to_string(), "faction#3");
    }
}
