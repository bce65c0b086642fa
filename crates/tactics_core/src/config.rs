//! Simulation configuration.
//!
//! Everything tunable lives in [`SimConfig`], which deserializes from RON
//! with every field defaulted. The defaults reproduce the standard
//! behavior: 0.3s target throttle, 200-unit search cap, 1.0s path
//! recalculation, a spawn decision every 5 seconds, and so on.
//!
//! # Example RON
//!
//! ```ron
//! SimConfig(
//!     seed: 7,
//!     factions: [
//!         FactionProfile(id: FactionId(0), name: "Player"),
//!         FactionProfile(id: FactionId(1), name: "Raiders", ai_controlled: true, aggression: 0.8),
//!     ],
//! )
//! ```

use std::path::Path;

use glam::Vec3;
use serde::{Deserialize, Serialize};

use crate::abilities::AbilitySpec;
use crate::components::{CombatStats, UnitClass};
use crate::error::{Result, TacticsError};
use crate::factions::{FactionId, FactionProfile};
use crate::formation::DEFAULT_SPACING;

/// Data-driven unit definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnitTemplate {
    /// Unique template id.
    pub id: String,
    /// Unit class.
    pub class: UnitClass,
    /// Production cost.
    pub cost: u32,
    /// Maximum health.
    pub health: f32,
    /// Damage per shot.
    #[serde(default)]
    pub damage: f32,
    /// Attack range.
    #[serde(default)]
    pub range: f32,
    /// Attacks per second.
    #[serde(default = "default_attack_speed")]
    pub attack_speed: f32,
    /// Fractional armor.
    #[serde(default)]
    pub armor: f32,
    /// Movement speed per second.
    pub speed: f32,
    /// Splash radius (0 = none).
    #[serde(default)]
    pub splash_radius: f32,
    /// Damage factor at the splash boundary.
    #[serde(default = "default_falloff")]
    pub splash_falloff: f32,
    /// Harvester cargo capacity.
    #[serde(default)]
    pub capacity: f32,
    /// Harvester salvage rate per second.
    #[serde(default)]
    pub harvest_rate: f32,
}

const fn default_attack_speed() -> f32 {
    1.0
}

const fn default_falloff() -> f32 {
    0.5
}

impl UnitTemplate {
    /// Build combat stats for a fresh unit.
    #[must_use]
    pub fn combat_stats(&self) -> CombatStats {
        CombatStats::new(self.health, self.damage, self.range, self.attack_speed)
            .with_armor(self.armor)
            .with_splash(self.splash_radius, self.splash_falloff)
    }

    /// Default template for a class.
    #[must_use]
    pub fn standard(class: UnitClass) -> Self {
        let (cost, health, damage, range, attack_speed, armor, speed, splash) = match class {
            UnitClass::Light => (60, 80.0, 8.0, 18.0, 1.5, 0.05, 9.0, 0.0),
            UnitClass::Medium => (100, 140.0, 14.0, 22.0, 1.0, 0.15, 7.0, 0.0),
            UnitClass::Heavy => (150, 260.0, 30.0, 26.0, 0.5, 0.3, 4.5, 4.0),
            UnitClass::Harvester => (50, 120.0, 0.0, 0.0, 0.0, 0.1, 6.0, 0.0),
        };
        let (capacity, harvest_rate) = if class == UnitClass::Harvester {
            (50.0, 10.0)
        } else {
            (0.0, 0.0)
        };
        Self {
            id: class.name().to_string(),
            class,
            cost,
            health,
            damage,
            range,
            attack_speed,
            armor,
            speed,
            splash_radius: splash,
            splash_falloff: default_falloff(),
            capacity,
            harvest_rate,
        }
    }
}

/// Target-search tuning.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TargetingTuning {
    /// Minimum seconds between target searches for one unit.
    pub throttle: f32,
    /// Enemies beyond this distance are never considered.
    pub max_search_distance: f32,
    /// Live unit count range in which focus fire is scored.
    pub focus_fire_min_units: usize,
    /// Upper bound of the focus-fire range.
    pub focus_fire_max_units: usize,
}

impl Default for TargetingTuning {
    fn default() -> Self {
        Self {
            throttle: 0.3,
            max_search_distance: 200.0,
            focus_fire_min_units: 30,
            focus_fire_max_units: 500,
        }
    }
}

/// Local navigation tuning.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NavigationTuning {
    /// Periodic path recalculation interval.
    pub recalc_interval: f32,
    /// Stuck time that forces an immediate recalculation.
    pub stuck_recalc_after: f32,
    /// Stuck time that triggers an escape move.
    pub stuck_escape_after: f32,
    /// Maximum offset of an escape move on each axis.
    pub escape_extent: f32,
    /// Distance at which a detour waypoint counts as reached.
    pub waypoint_reached: f32,
    /// Distance at which the destination counts as reached.
    pub arrival_distance: f32,
}

impl Default for NavigationTuning {
    fn default() -> Self {
        Self {
            recalc_interval: 1.0,
            stuck_recalc_after: 0.3,
            stuck_escape_after: 1.0,
            escape_extent: 8.0,
            waypoint_reached: 2.0,
            arrival_distance: 0.5,
        }
    }
}

/// Combat pipeline tuning.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CombatTuning {
    /// Miss chance for a stationary shooter.
    pub base_miss_chance: f32,
    /// Extra miss chance when the shooter moved this frame.
    pub moving_miss_penalty: f32,
    /// Maximum aim offset on a miss, per axis.
    pub miss_scatter: f32,
    /// Projectile travel speed.
    pub projectile_speed: f32,
    /// Distance at which a projectile counts as hitting its target.
    pub hit_radius: f32,
    /// Fraction of base damage dealt as splash.
    pub splash_factor: f32,
    /// Attack-range multiplier while siege-locked.
    pub siege_range_multiplier: f32,
    /// Critical hit multiplier.
    pub crit_multiplier: f32,
    /// Seconds between consecutive kills that still extend a streak.
    pub kill_streak_window: f32,
}

impl Default for CombatTuning {
    fn default() -> Self {
        Self {
            base_miss_chance: 0.25,
            moving_miss_penalty: 0.25,
            miss_scatter: 3.0,
            projectile_speed: 60.0,
            hit_radius: 1.0,
            splash_factor: 0.6,
            siege_range_multiplier: 1.5,
            crit_multiplier: 2.0,
            kill_streak_window: 3.0,
        }
    }
}

/// Faction AI tuning.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AiTuning {
    /// Seconds between spawn decisions.
    pub spawn_interval: f32,
    /// Radius around the factory watched for threats.
    pub defense_radius: f32,
    /// Enemy count inside the radius that triggers defense mode.
    pub defense_trigger: usize,
    /// Upper bound on recalled defenders.
    pub max_defenders: usize,
    /// Units further than this from the factory count as "far" for recalls.
    pub far_distance: f32,
    /// Minimum harvesters a faction keeps.
    pub min_harvesters: usize,
    /// Target harvester share of the faction's army.
    pub harvester_ratio: f32,
    /// Attack-wave probability scale (`aggression × Δt × scale`).
    pub attack_rate: f32,
    /// Maximum units in one attack wave.
    pub wave_size: usize,
    /// Unit cap per faction.
    pub max_units: usize,
}

impl Default for AiTuning {
    fn default() -> Self {
        Self {
            spawn_interval: 5.0,
            defense_radius: 50.0,
            defense_trigger: 2,
            max_defenders: 8,
            far_distance: 50.0,
            min_harvesters: 2,
            harvester_ratio: 0.15,
            attack_rate: 0.5,
            wave_size: 5,
            max_units: 60,
        }
    }
}

/// Top-level simulation configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    /// Seed for the simulation RNG.
    pub seed: u64,
    /// Ticks per simulated second.
    pub tick_rate: u32,
    /// Retreat destination of last resort.
    pub map_center: Vec3,
    /// Spacing between formation slots.
    pub formation_spacing: f32,
    /// Participating factions.
    pub factions: Vec<FactionProfile>,
    /// Unit templates available for spawning.
    pub templates: Vec<UnitTemplate>,
    /// Ability definitions.
    pub abilities: Vec<AbilitySpec>,
    /// Targeting tuning.
    pub targeting: TargetingTuning,
    /// Navigation tuning.
    pub navigation: NavigationTuning,
    /// Combat tuning.
    pub combat: CombatTuning,
    /// AI tuning.
    pub ai: AiTuning,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            seed: 0,
            tick_rate: 20,
            map_center: Vec3::ZERO,
            formation_spacing: DEFAULT_SPACING,
            factions: Vec::new(),
            templates: UnitClass::ALL.iter().map(|c| UnitTemplate::standard(*c)).collect(),
            abilities: AbilitySpec::standard_set(),
            targeting: TargetingTuning::default(),
            navigation: NavigationTuning::default(),
            combat: CombatTuning::default(),
            ai: AiTuning::default(),
        }
    }
}

impl SimConfig {
    /// Parse a configuration from RON text.
    pub fn from_ron_str(text: &str) -> Result<Self> {
        ron::from_str(text).map_err(|e| TacticsError::ConfigParse {
            path: String::from("<inline>"),
            message: e.to_string(),
        })
    }

    /// Load a configuration from a RON file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| TacticsError::ConfigParse {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        ron::from_str(&text).map_err(|e| TacticsError::ConfigParse {
            path: path.display().to_string(),
            message: e.to_string(),
        })
    }

    /// Builder method to add a faction.
    #[must_use]
    pub fn with_faction(mut self, profile: FactionProfile) -> Self {
        self.factions.push(profile);
        self
    }

    /// Builder method to set the RNG seed.
    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Seconds per tick.
    #[must_use]
    pub fn tick_seconds(&self) -> f32 {
        1.0 / self.tick_rate.max(1) as f32
    }

    /// Look up a template by id.
    #[must_use]
    pub fn template(&self, id: &str) -> Option<&UnitTemplate> {
        self.templates.iter().find(|t| t.id == id)
    }

    /// First template of a class, used by AI production.
    #[must_use]
    pub fn template_for_class(&self, class: UnitClass) -> Option<&UnitTemplate> {
        self.templates.iter().find(|t| t.class == class)
    }

    /// Look up a faction profile.
    #[must_use]
    pub fn faction(&self, id: FactionId) -> Option<&FactionProfile> {
        self.factions.iter().find(|f| f.id == id)
    }
}
