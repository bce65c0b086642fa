//! Test fixtures and helpers.
//!
//! Pre-built configurations, units and simulations for consistent testing.

use glam::Vec3;
use tactics_core::components::{Unit, UnitClass};
use tactics_core::config::{SimConfig, UnitTemplate};
use tactics_core::factions::{FactionId, FactionProfile};
use tactics_core::simulation::Simulation;

/// First test faction.
pub const BLUE: FactionId = FactionId(0);

/// Second test faction.
pub const RED: FactionId = FactionId(1);

/// Distance of each factory from the map center in [`skirmish`].
pub const FACTORY_OFFSET: f32 = 80.0;

/// Shorthand for a point on the ground plane.
#[must_use]
pub fn ground(x: f32, z: f32) -> Vec3 {
    Vec3::new(x, 0.0, z)
}

/// Two player-controlled factions with 500 starting resources.
#[must_use]
pub fn two_faction_config(seed: u64) -> SimConfig {
    SimConfig::default()
        .with_seed(seed)
        .with_faction(FactionProfile::new(BLUE, "Blue").with_resources(500))
        .with_faction(FactionProfile::new(RED, "Red").with_resources(500))
}

/// Two AI-controlled factions.
#[must_use]
pub fn ai_config(seed: u64, aggression: f32) -> SimConfig {
    let mut config = two_faction_config(seed);
    for profile in &mut config.factions {
        profile.ai_controlled = true;
        profile.aggression = aggression;
    }
    config
}

/// A unit with the standard stats of its class, not yet registered.
#[must_use]
pub fn unit(faction: FactionId, class: UnitClass, position: Vec3) -> Unit {
    let template = UnitTemplate::standard(class);
    Unit::new(
        faction,
        class,
        template.combat_stats(),
        template.speed,
        position,
    )
    .with_template(template.id)
}

/// Simulation with both factories placed on the X axis.
#[must_use]
pub fn arena(config: SimConfig) -> Simulation {
    let mut sim = Simulation::new(config);
    for (faction, x) in [(BLUE, -FACTORY_OFFSET), (RED, FACTORY_OFFSET)] {
        if let Err(e) = sim.add_factory(faction, ground(x, 0.0)) {
            tracing::warn!("fixture factory not placed: {e}");
        }
    }
    sim
}

/// Factories plus `per_side` mixed units for each faction, facing each other.
///
/// # Panics
///
/// Panics if the default templates are missing from `config`.
#[must_use]
pub fn skirmish(config: SimConfig, per_side: usize) -> Simulation {
    let mut sim = arena(config);
    let classes = [UnitClass::Light, UnitClass::Medium, UnitClass::Heavy];
    for i in 0..per_side {
        let class = classes[i % classes.len()];
        let row = (i / 10) as f32 * 4.0;
        let col = (i % 10) as f32 * 4.0 - 18.0;
        sim.spawn_unit(class.name(), BLUE, ground(-40.0 - row, col))
            .expect("default template");
        sim.spawn_unit(class.name(), RED, ground(40.0 + row, col))
            .expect("default template");
    }
    sim
}
