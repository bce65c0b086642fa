//! Faction factories.
//!
//! One factory per faction. It anchors base defense, retreat destinations,
//! harvester deposits and AI production, and can be shot down. A destroyed
//! factory stays in the list as a ruin with `alive == false`.

use glam::Vec3;
use serde::{Deserialize, Serialize};

use crate::factions::FactionId;

/// Default factory health.
pub const FACTORY_HEALTH: f32 = 1500.0;

/// Radius within which a projectile counts as hitting a factory.
pub const FACTORY_RADIUS: f32 = 4.0;

/// A faction's production building.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Factory {
    /// Owner.
    pub faction: FactionId,
    /// Position.
    pub position: Vec3,
    /// Remaining health.
    pub health: f32,
    /// Maximum health.
    pub max_health: f32,
    /// Still standing.
    pub alive: bool,
}

impl Factory {
    /// Create a factory at full health.
    #[must_use]
    pub fn new(faction: FactionId, position: Vec3) -> Self {
        Self {
            faction,
            position,
            health: FACTORY_HEALTH,
            max_health: FACTORY_HEALTH,
            alive: true,
        }
    }

    /// Builder method to set health.
    #[must_use]
    pub fn with_health(mut self, health: f32) -> Self {
        self.max_health = health.max(1.0);
        self.health = self.max_health;
        self
    }

    /// Apply damage. Returns `true` if this destroyed the factory.
    pub fn apply_damage(&mut self, amount: f32) -> bool {
        if !self.alive {
            return false;
        }
        self.health = (self.health - amount.max(0.0)).clamp(0.0, self.max_health);
        if self.health <= 0.0 {
            self.alive = false;
            return true;
        }
        false
    }
}
