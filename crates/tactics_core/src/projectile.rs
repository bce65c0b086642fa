//! In-flight projectiles.

use glam::Vec3;
use serde::{Deserialize, Serialize};

use crate::components::{Splash, UnitId};
use crate::events::ProjectileSnapshot;
use crate::factions::FactionId;

/// What a projectile was fired at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProjectileTarget {
    /// Nothing: the shot was rolled as a miss and deals only splash.
    None,
    /// An enemy unit.
    Unit(UnitId),
    /// An enemy factory, by owner.
    Factory(FactionId),
}

/// A shot travelling in a straight line.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Projectile {
    /// Faction that fired.
    pub origin_faction: FactionId,
    /// Unit that fired.
    pub origin_unit: UnitId,
    /// Current position.
    pub position: Vec3,
    /// Unit travel direction.
    pub direction: Vec3,
    /// Travel speed.
    pub speed: f32,
    /// Outgoing damage, before crits and the defender's modifiers.
    pub damage: f32,
    /// Splash parameters.
    pub splash: Option<Splash>,
    /// Intended target.
    pub target: ProjectileTarget,
    /// Seconds until the projectile resolves at its position.
    pub lifetime: f32,
}

impl Projectile {
    /// Read-only view.
    #[must_use]
    pub fn snapshot(&self) -> ProjectileSnapshot {
        ProjectileSnapshot {
            position: self.position,
            direction: self.direction,
        }
    }
}

/// Owner of all projectiles in flight.
#[derive(Debug, Clone, Default)]
pub struct ProjectileList {
    items: Vec<Projectile>,
}

impl ProjectileList {
    /// Create an empty list.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a projectile.
    pub fn push(&mut self, projectile: Projectile) {
        self.items.push(projectile);
    }

    /// Number of projectiles in flight.
    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Check if nothing is in flight.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Iterate over projectiles.
    pub fn iter(&self) -> impl Iterator<Item = &Projectile> {
        self.items.iter()
    }

    /// Take every projectile out for processing.
    pub fn drain(&mut self) -> Vec<Projectile> {
        std::mem::take(&mut self.items)
    }

    /// Put surviving projectiles back, ahead of any fired meanwhile.
    pub fn restore(&mut self, mut survivors: Vec<Projectile>) {
        survivors.append(&mut self.items);
        self.items = survivors;
    }
}
