//! Unit experience and veterancy levels.
//!
//! Units earn XP from damage dealt and kills. Five levels (0-4) are gated
//! by cumulative thresholds; each level scales damage, max health and
//! speed. Levels never regress.

use serde::{Deserialize, Serialize};

use crate::components::UnitClass;

/// Highest veterancy level.
pub const MAX_LEVEL: u8 = 4;

/// Cumulative XP required for each level.
pub const LEVEL_THRESHOLDS: [f32; 5] = [0.0, 100.0, 300.0, 600.0, 1000.0];

/// Damage multiplier per level.
pub const DAMAGE_MULTIPLIERS: [f32; 5] = [1.0, 1.1, 1.2, 1.35, 1.5];

/// Max-health multiplier per level.
pub const HEALTH_MULTIPLIERS: [f32; 5] = [1.0, 1.15, 1.27, 1.36, 1.42];

/// Movement speed multiplier per level.
pub const SPEED_MULTIPLIERS: [f32; 5] = [1.0, 1.05, 1.09, 1.12, 1.14];

/// XP per point of damage dealt.
pub const XP_PER_DAMAGE: f32 = 0.5;

/// XP for any kill.
pub const XP_PER_KILL: f32 = 50.0;

/// Extra XP for killing a harvester.
pub const XP_HARVESTER_BONUS: f32 = 25.0;

/// Experience track of a single unit.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Veterancy {
    /// Accumulated experience.
    pub xp: f32,
    /// Current level, `0..=MAX_LEVEL`.
    pub level: u8,
    /// Confirmed kills.
    pub kills: u32,
}

impl Veterancy {
    /// Add experience. Returns the new level if this crossed a threshold.
    pub fn add_xp(&mut self, amount: f32) -> Option<u8> {
        if amount <= 0.0 || !amount.is_finite() {
            return None;
        }
        self.xp += amount;
        let level = level_for_xp(self.xp).max(self.level);
        if level > self.level {
            self.level = level;
            Some(level)
        } else {
            None
        }
    }

    /// XP for damage dealt. Returns the new level on level-up.
    pub fn record_damage(&mut self, damage: f32) -> Option<u8> {
        self.add_xp(damage * XP_PER_DAMAGE)
    }

    /// XP and kill count for a kill. Returns the new level on level-up.
    pub fn record_kill(&mut self, victim: UnitClass) -> Option<u8> {
        self.kills += 1;
        self.add_xp(kill_xp(victim))
    }

    /// Damage multiplier for the current level.
    #[must_use]
    pub fn damage_multiplier(&self) -> f32 {
        DAMAGE_MULTIPLIERS[self.index()]
    }

    /// Max-health multiplier for the current level.
    #[must_use]
    pub fn health_multiplier(&self) -> f32 {
        HEALTH_MULTIPLIERS[self.index()]
    }

    /// Speed multiplier for the current level.
    #[must_use]
    pub fn speed_multiplier(&self) -> f32 {
        SPEED_MULTIPLIERS[self.index()]
    }

    fn index(&self) -> usize {
        usize::from(self.level.min(MAX_LEVEL))
    }
}

/// Level reached with `xp` cumulative experience.
#[must_use]
pub fn level_for_xp(xp: f32) -> u8 {
    LEVEL_THRESHOLDS
        .iter()
        .rposition(|&threshold| xp >= threshold)
        .map_or(0, |idx| idx as u8)
        .min(MAX_LEVEL)
}

/// XP awarded for killing a unit of `victim` class.
#[must_use]
pub fn kill_xp(victim: UnitClass) -> f32 {
    match victim {
        UnitClass::Harvester => XP_PER_KILL + XP_HARVESTER_BONUS,
        _ => XP_PER_KILL,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_thresholds() {
        assert_eq!(level_for_xp(0.0), 0);
        assert_eq!(level_for_xp(99.9), 0);
        assert_eq!(level_for_xp(100.0), 1);
        assert_eq!(level_for_xp(300.0), 2);
        assert_eq!(level_for_xp(599.0), 2);
        assert_eq!(level_for_xp(600.0), 3);
        assert_eq!(level_for_xp(1000.0), 4);
        assert_eq!(level_for_xp(1_000_000.0), 4);
    }

    #[test]
    fn test_damage_xp_levels_up() {
        let mut vet = Veterancy::default();
        // 200 damage * 0.5 = 100 XP
        assert_eq!(vet.record_damage(200.0), Some(1));
        assert_eq!(vet.record_damage(2.0), None);
        assert_eq!(vet.damage_multiplier(), 1.1);
    }

    #[test]
    fn test_kill_xp() {
        let mut vet = Veterancy::default();
        vet.record_kill(UnitClass::Light);
        assert_eq!(vet.xp, 50.0);
        vet.record_kill(UnitClass::Harvester);
        assert_eq!(vet.xp, 125.0);
        assert_eq!(vet.kills, 2);
        assert_eq!(vet.level, 1);
    }

    #[test]
    fn test_multipliers_increase_with_diminishing_steps() {
        for tables in [HEALTH_MULTIPLIERS, SPEED_MULTIPLIERS] {
            let steps: Vec<f32> = tables.windows(2).map(|w| w[1] - w[0]).collect();
            assert!(steps.iter().all(|s| *s > 0.0));
            assert!(steps.windows(2).all(|w| w[1] <= w[0] + 1e-6));
        }
    }

    #[test]
    fn test_negative_xp_ignored() {
        let mut vet = Veterancy { xp: 350.0, level: 2, kills: 0 };
        assert_eq!(vet.add_xp(-500.0), None);
        assert_eq!(vet.level, 2);
        assert_eq!(vet.xp, 350.0);
    }
}
