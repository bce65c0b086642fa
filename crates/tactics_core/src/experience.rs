//! Faction-wide experience pools.
//!
//! Separate from unit veterancy: each faction accumulates Combat, Survival
//! and Economy experience, and every full tier of a pool grants a small
//! faction-wide bonus.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::factions::FactionId;

/// Experience needed per tier in any pool.
pub const TIER_SIZE: f32 = 500.0;
/// Highest tier a pool can reach.
pub const MAX_TIER: u32 = 5;
/// Crit chance every faction starts with.
pub const BASE_CRIT_CHANCE: f32 = 0.05;

/// Experience categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum XpCategory {
    /// Earned by dealing damage and scoring kills.
    Combat,
    /// Earned by losing units (lessons learned).
    Survival,
    /// Earned by harvesters delivering cargo.
    Economy,
}

/// Consumed interface for faction experience.
pub trait ExperiencePool {
    /// Add experience to a faction pool.
    fn add_experience(&mut self, faction: FactionId, category: XpCategory, amount: f32);

    /// Outgoing damage multiplier.
    fn damage_multiplier(&self, faction: FactionId) -> f32;

    /// Chance for a unit of this faction to dodge a hit.
    fn dodge_chance(&self, faction: FactionId) -> f32;

    /// Chance for a shot from this faction to crit.
    fn crit_chance(&self, faction: FactionId) -> f32;

    /// Attack speed multiplier.
    fn attack_speed_multiplier(&self, faction: FactionId) -> f32;
}

/// Totals of one faction.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ExperienceTotals {
    /// Combat pool.
    pub combat: f32,
    /// Survival pool.
    pub survival: f32,
    /// Economy pool.
    pub economy: f32,
}

impl ExperienceTotals {
    fn tier(xp: f32) -> u32 {
        ((xp / TIER_SIZE).floor().max(0.0) as u32).min(MAX_TIER)
    }

    /// Combat tier.
    #[must_use]
    pub fn combat_tier(&self) -> u32 {
        Self::tier(self.combat)
    }

    /// Survival tier.
    #[must_use]
    pub fn survival_tier(&self) -> u32 {
        Self::tier(self.survival)
    }

    /// Economy tier.
    #[must_use]
    pub fn economy_tier(&self) -> u32 {
        Self::tier(self.economy)
    }
}

/// Default in-memory experience pool.
#[derive(Debug, Clone, Default)]
pub struct FactionExperience {
    pools: HashMap<FactionId, ExperienceTotals>,
}

impl FactionExperience {
    /// Create an empty pool set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Totals for a faction (zero if it never earned anything).
    #[must_use]
    pub fn totals(&self, faction: FactionId) -> ExperienceTotals {
        self.pools.get(&faction).copied().unwrap_or_default()
    }
}

impl ExperiencePool for FactionExperience {
    fn add_experience(&mut self, faction: FactionId, category: XpCategory, amount: f32) {
        if amount <= 0.0 || !amount.is_finite() {
            return;
        }
        let totals = self.pools.entry(faction).or_default();
        match category {
            XpCategory::Combat => totals.combat += amount,
            XpCategory::Survival => totals.survival += amount,
            XpCategory::Economy => totals.economy += amount,
        }
    }

    fn damage_multiplier(&self, faction: FactionId) -> f32 {
        1.0 + 0.03 * self.totals(faction).combat_tier() as f32
    }

    fn dodge_chance(&self, faction: FactionId) -> f32 {
        0.02 * self.totals(faction).survival_tier() as f32
    }

    fn crit_chance(&self, faction: FactionId) -> f32 {
        BASE_CRIT_CHANCE + 0.01 * self.totals(faction).combat_tier() as f32
    }

    fn attack_speed_multiplier(&self, faction: FactionId) -> f32 {
        1.0 + 0.02 * self.totals(faction).economy_tier() as f32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fresh_faction_has_neutral_multipliers() {
        let pool = FactionExperience::new();
        let f = FactionId(0);
        assert_eq!(pool.damage_multiplier(f), 1.0);
        assert_eq!(pool.attack_speed_multiplier(f), 1.0);
        assert_eq!(pool.dodge_chance(f), 0.0);
        assert_eq!(pool.crit_chance(f), BASE_CRIT_CHANCE);
    }

    #[test]
    fn test_tiers_raise_bonuses() {
        let mut pool = FactionExperience::new();
        let f = FactionId(2);
        pool.add_experience(f, XpCategory::Combat, 1200.0);
        pool.add_experience(f, XpCategory::Survival, 499.0);
        assert_eq!(pool.totals(f).combat_tier(), 2);
        assert!((pool.damage_multiplier(f) - 1.06).abs() < 1e-6);
        assert_eq!(pool.dodge_chance(f), 0.0);

        pool.add_experience(f, XpCategory::Survival, 1.0);
        assert!((pool.dodge_chance(f) - 0.02).abs() < 1e-6);
    }

    #[test]
    fn test_tiers_are_capped() {
        let mut pool = FactionExperience::new();
        pool.add_experience(FactionId(0), XpCategory::Economy, 1.0e9);
        assert_eq!(pool.totals(FactionId(0)).economy_tier(), MAX_TIER);
        pool.add_experience(FactionId(0), XpCategory::Economy, -5.0);
        assert_eq!(pool.totals(FactionId(0)).economy, 1.0e9);
    }
}
