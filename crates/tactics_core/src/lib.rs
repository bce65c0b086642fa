//! # Tactics Core
//!
//! Tactical simulation core for a real-time strategy battle.
//!
//! This crate contains the unit-level behavior of a battle:
//! - Target selection with threat scoring and focus fire
//! - Navigation with stuck detection and obstacle detours
//! - Retreat and stance behavior
//! - Projectile combat with misses, crits, dodges and splash
//! - Formations, veterancy, abilities and faction mechanics
//! - A computer-controlled faction loop (defense, production, attack waves)
//!
//! It has no rendering, no IO beyond loading configuration, and no system
//! randomness: every roll comes from a seeded generator, so a run can be
//! reproduced from its config and orders.
//!
//! ## Crate Structure
//!
//! - [`simulation`] - Tick loop and the orders API
//! - [`components`] - Unit records and combat stats
//! - [`registry`] - Unit storage and the [`registry::UnitQueryPort`] trait
//! - [`targeting`], [`navigation`], [`retreat`], [`combat`] - Per-tick systems
//! - [`formation`], [`ai`] - Group movement and faction AI
//! - [`abilities`], [`mechanics`], [`experience`], [`economy`] - Faction services
//! - [`config`] - Data-driven templates and tuning

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic)]

pub mod abilities;
pub mod ai;
pub mod combat;
pub mod components;
pub mod config;
pub mod economy;
pub mod error;
pub mod events;
pub mod experience;
pub mod factions;
pub mod factory;
pub mod formation;
pub mod math;
pub mod mechanics;
pub mod navigation;
pub mod pathfinding;
pub mod projectile;
pub mod registry;
pub mod retreat;
pub mod simulation;
pub mod targeting;
pub mod veterancy;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::abilities::{AbilityKind, AbilitySpec, AbilityTarget};
    pub use crate::components::*;
    pub use crate::config::{SimConfig, UnitTemplate};
    pub use crate::economy::{ResourceLedger, WreckageId};
    pub use crate::error::{Result, TacticsError};
    pub use crate::events::{SimEvent, SimSnapshot, StreakLabel};
    pub use crate::factions::{FactionId, FactionProfile, MechanicsKind};
    pub use crate::formation::FormationType;
    pub use crate::navigation::{ObstacleQuery, OpenField};
    pub use crate::pathfinding::NavGrid;
    pub use crate::registry::{UnitQueryPort, UnitRegistry};
    pub use crate::simulation::{FactionStats, Simulation, TickEvents};
}
