//! Error types for the tactical simulation.
//!
//! Only the outer API can fail (orders, spawning, abilities, config loading).
//! The per-tick pipeline degrades silently instead of returning errors.

use thiserror::Error;

use crate::abilities::AbilityKind;
use crate::components::UnitId;
use crate::factions::FactionId;

/// Result type alias using [`TacticsError`].
pub type Result<T> = std::result::Result<T, TacticsError>;

/// Top-level error type for the simulation API.
#[derive(Debug, Error)]
pub enum TacticsError {
    /// No live unit with this id exists in the registry.
    #[error("Unit not found: {0}")]
    UnitNotFound(UnitId),

    /// The faction is not configured in this simulation.
    #[error("Faction not found: {0}")]
    FactionNotFound(FactionId),

    /// A spawn referenced a template id that is not configured.
    #[error("Unknown unit template: {0}")]
    UnknownTemplate(String),

    /// Ability activation attempted while the ability is recharging.
    #[error("Ability {kind:?} is on cooldown for another {remaining:.1}s")]
    AbilityOnCooldown {
        /// Ability that was requested.
        kind: AbilityKind,
        /// Seconds until it can be activated again.
        remaining: f32,
    },

    /// The faction does not own the requested ability.
    #[error("Faction {faction} has no ability {kind:?}")]
    AbilityUnavailable {
        /// Requesting faction.
        faction: FactionId,
        /// Ability that was requested.
        kind: AbilityKind,
    },

    /// Not enough currency in the faction's ledger.
    #[error("Insufficient resources for {faction}: need {required}, have {available}")]
    InsufficientResources {
        /// Faction whose ledger was charged.
        faction: FactionId,
        /// Amount required.
        required: u32,
        /// Amount available.
        available: u32,
    },

    /// Configuration text or file failed to parse.
    #[error("Failed to parse config '{path}': {message}")]
    ConfigParse {
        /// Source of the configuration (file path or `<inline>`).
        path: String,
        /// Parser message.
        message: String,
    },

    /// Invalid simulation state for the requested operation.
    #[error("Invalid simulation state: {0}")]
    InvalidState(String),
}
