//! Scenario loading and setup.
//!
//! A scenario is a [`SimConfig`] plus the factories and units placed on the
//! map before the first tick. Scenarios are written in RON:
//!
//! ```ron
//! Scenario(
//!     name: "Duel",
//!     config: (
//!         seed: 7,
//!         factions: [
//!             (id: FactionId(0), name: "Blue"),
//!             (id: FactionId(1), name: "Red"),
//!         ],
//!     ),
//!     factories: [
//!         (faction: FactionId(0), position: (-80.0, 0.0)),
//!         (faction: FactionId(1), position: (80.0, 0.0)),
//!     ],
//!     units: [
//!         (template: "heavy", faction: FactionId(0), position: (-20.0, 0.0), count: 3),
//!     ],
//!     terrain: Some((
//!         origin: (-100.0, -100.0),
//!         width: 100,
//!         height: 100,
//!         blocked: [(min: (-2.0, -30.0), max: (2.0, 30.0))],
//!     )),
//! )
//! ```
//!
//! Without `terrain` the map is an open field. With it, units navigate a
//! grid in which everything outside the grid counts as blocked, so the grid
//! should cover every factory and unit.

use std::path::Path;

use glam::Vec3;
use serde::{Deserialize, Serialize};

use tactics_core::abilities::AbilityKind;
use tactics_core::components::Stance;
use tactics_core::config::SimConfig;
use tactics_core::factions::{FactionId, FactionProfile, MechanicsKind};
use tactics_core::formation::FormationType;
use tactics_core::pathfinding::NavGrid;
use tactics_core::simulation::Simulation;

use crate::error::{HeadlessError, Result};

/// Name of the built-in scenario.
pub const SKIRMISH: &str = "skirmish";

/// Gap between units of one placement group.
const PLACEMENT_SPACING: f32 = 3.0;

/// Ticks a scenario runs when neither the file nor the caller says otherwise.
pub const DEFAULT_TICKS: u64 = 2400;

/// Terrain cell size when the file leaves it out.
pub const DEFAULT_CELL_SIZE: f32 = 2.0;

/// A complete scenario.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Scenario {
    /// Scenario name.
    pub name: String,
    /// Human-readable description.
    pub description: String,
    /// Simulation configuration.
    pub config: SimConfig,
    /// Factory positions, at most one per faction.
    pub factories: Vec<FactoryPlacement>,
    /// Units present at the start.
    pub units: Vec<UnitPlacement>,
    /// Suggested run length in ticks.
    pub ticks: u64,
    /// Impassable terrain; an open field when absent.
    pub terrain: Option<Terrain>,
}

impl Default for Scenario {
    fn default() -> Self {
        Self {
            name: String::from("Empty"),
            description: String::new(),
            config: SimConfig::default(),
            factories: Vec::new(),
            units: Vec::new(),
            ticks: DEFAULT_TICKS,
            terrain: None,
        }
    }
}

/// Navigation grid laid over the map.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Terrain {
    /// Low corner of the grid as `(x, z)`.
    pub origin: (f32, f32),
    /// Cells along x.
    pub width: u32,
    /// Cells along z.
    pub height: u32,
    /// Cell edge length.
    #[serde(default = "default_cell_size")]
    pub cell_size: f32,
    /// Impassable rectangles.
    #[serde(default)]
    pub blocked: Vec<BlockedArea>,
}

/// An impassable axis-aligned rectangle, corners as `(x, z)`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BlockedArea {
    /// Low corner.
    pub min: (f32, f32),
    /// High corner.
    pub max: (f32, f32),
}

const fn default_cell_size() -> f32 {
    DEFAULT_CELL_SIZE
}

impl Terrain {
    /// Build the navigation grid, rejecting empty or degenerate sizes.
    pub fn to_grid(&self) -> Result<NavGrid> {
        if self.width == 0 || self.height == 0 || !self.cell_size.is_finite() || self.cell_size <= 0.0 {
            return Err(HeadlessError::InvalidRequest(format!(
                "terrain needs a positive size, got {}x{} cells of {}",
                self.width, self.height, self.cell_size
            )));
        }
        let (ox, oz) = self.origin;
        let mut grid = NavGrid::new(self.width, self.height, self.cell_size)
            .with_origin(Vec3::new(ox, 0.0, oz));
        for area in &self.blocked {
            grid.block_rect(
                Vec3::new(area.min.0, 0.0, area.min.1),
                Vec3::new(area.max.0, 0.0, area.max.1),
            );
        }
        Ok(grid)
    }
}

/// A factory placed on the ground plane.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FactoryPlacement {
    /// Owning faction.
    pub faction: FactionId,
    /// Ground position as `(x, z)`.
    pub position: (f32, f32),
}

/// A group of identical units placed in a column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnitPlacement {
    /// Template id.
    pub template: String,
    /// Owning faction.
    pub faction: FactionId,
    /// Center of the group as `(x, z)`.
    pub position: (f32, f32),
    /// Number of units.
    #[serde(default = "one")]
    pub count: u32,
    /// Starting stance; the unit default when absent.
    #[serde(default)]
    pub stance: Option<Stance>,
}

const fn one() -> u32 {
    1
}

impl UnitPlacement {
    /// Create a placement of `count` units.
    #[must_use]
    pub fn new(template: &str, faction: FactionId, x: f32, z: f32, count: u32) -> Self {
        Self {
            template: template.to_string(),
            faction,
            position: (x, z),
            count,
            stance: None,
        }
    }

    /// Builder method to set the starting stance.
    #[must_use]
    pub fn with_stance(mut self, stance: Stance) -> Self {
        self.stance = Some(stance);
        self
    }

    /// Positions of every unit in the group, spread along z.
    #[must_use]
    pub fn positions(&self) -> Vec<Vec3> {
        let (x, z) = self.position;
        let half = (self.count.saturating_sub(1)) as f32 * PLACEMENT_SPACING / 2.0;
        (0..self.count)
            .map(|i| Vec3::new(x, 0.0, z - half + i as f32 * PLACEMENT_SPACING))
            .collect()
    }
}

impl Scenario {
    /// Load a scenario from a RON file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(HeadlessError::ScenarioNotFound(path.display().to_string()));
        }
        let contents = std::fs::read_to_string(path)?;
        Self::from_ron_str(&contents)
    }

    /// Parse a scenario from RON text.
    pub fn from_ron_str(ron: &str) -> Result<Self> {
        Ok(ron::from_str(ron)?)
    }

    /// Resolve a built-in scenario name or a path to a RON file.
    pub fn resolve(name_or_path: &str) -> Result<Self> {
        match name_or_path {
            SKIRMISH => Ok(Self::skirmish()),
            path => Self::load(path),
        }
    }

    /// Serialize to pretty RON.
    pub fn to_ron_string(&self) -> Result<String> {
        Ok(ron::ser::to_string_pretty(
            self,
            ron::ser::PrettyConfig::default(),
        )?)
    }

    /// Two computer-controlled factions with a small mixed army each.
    ///
    /// Blue fights as a synergy faction with Overclock, Red spreads damage
    /// with armor sharing and can phase out.
    #[must_use]
    pub fn skirmish() -> Self {
        let blue = FactionId(0);
        let red = FactionId(1);
        let config = SimConfig::default()
            .with_seed(1)
            .with_faction(
                FactionProfile::new(blue, "Blue")
                    .with_ai(0.6)
                    .with_mechanics(MechanicsKind::Synergy)
                    .with_formations(FormationType::Wedge, FormationType::Line)
                    .with_resources(400)
                    .with_abilities(vec![AbilityKind::Overclock, AbilityKind::MarkTarget]),
            )
            .with_faction(
                FactionProfile::new(red, "Red")
                    .with_ai(0.4)
                    .with_mechanics(MechanicsKind::ArmorShare)
                    .with_formations(FormationType::Box, FormationType::Line)
                    .with_resources(400)
                    .with_abilities(vec![AbilityKind::EvasionField, AbilityKind::PhaseShift]),
            );

        Self {
            name: String::from("Skirmish"),
            description: String::from("Two AI factions trade attack waves across an open field"),
            config,
            factories: vec![
                FactoryPlacement {
                    faction: blue,
                    position: (-80.0, 0.0),
                },
                FactoryPlacement {
                    faction: red,
                    position: (80.0, 0.0),
                },
            ],
            units: vec![
                UnitPlacement::new("harvester", blue, -70.0, 10.0, 1),
                UnitPlacement::new("light", blue, -55.0, 0.0, 4),
                UnitPlacement::new("medium", blue, -60.0, 0.0, 3),
                UnitPlacement::new("heavy", blue, -65.0, 0.0, 1).with_stance(Stance::Defensive),
                UnitPlacement::new("harvester", red, 70.0, -10.0, 1),
                UnitPlacement::new("light", red, 55.0, 0.0, 3),
                UnitPlacement::new("medium", red, 60.0, 0.0, 3),
                UnitPlacement::new("heavy", red, 65.0, 0.0, 2).with_stance(Stance::Defensive),
            ],
            ticks: DEFAULT_TICKS,
            terrain: None,
        }
    }

    /// Build the simulation described by this scenario.
    ///
    /// `seed` overrides the configured seed.
    pub fn build(&self, seed: Option<u64>) -> Result<Simulation> {
        let mut config = self.config.clone();
        if let Some(seed) = seed {
            config.seed = seed;
        }
        let mut sim = Simulation::new(config);
        if let Some(terrain) = &self.terrain {
            sim = sim.with_obstacles(terrain.to_grid()?);
        }

        for factory in &self.factories {
            let (x, z) = factory.position;
            sim.add_factory(factory.faction, Vec3::new(x, 0.0, z))?;
        }
        for placement in &self.units {
            for position in placement.positions() {
                let id = sim.spawn_unit(&placement.template, placement.faction, position)?;
                if let Some(stance) = placement.stance {
                    sim.set_stance(&[id], stance)?;
                }
            }
        }

        tracing::debug!(
            "Scenario '{}' built: {} factories, {} units, {}",
            self.name,
            sim.factories().len(),
            sim.units().live_count(),
            if self.terrain.is_some() { "grid terrain" } else { "open field" }
        );
        Ok(sim)
    }
}
