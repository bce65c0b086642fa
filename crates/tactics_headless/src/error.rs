//! Error type for the headless runner.

use thiserror::Error;

use tactics_core::error::TacticsError;

/// Errors raised while loading, running or reporting a scenario.
#[derive(Error, Debug)]
pub enum HeadlessError {
    /// Scenario file does not exist.
    #[error("Scenario file not found: {0}")]
    ScenarioNotFound(String),
    /// Failed to read or write a file.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    /// Failed to parse scenario RON.
    #[error("Failed to parse scenario: {0}")]
    Parse(#[from] ron::error::SpannedError),
    /// Failed to write scenario RON.
    #[error("Failed to encode scenario: {0}")]
    Encode(#[from] ron::Error),
    /// Failed to encode or decode a JSON report.
    #[error("Report serialization failed: {0}")]
    Json(#[from] serde_json::Error),
    /// The simulation rejected part of the scenario.
    #[error(transparent)]
    Simulation(#[from] TacticsError),
    /// A batch or verify request that cannot run.
    #[error("Invalid run request: {0}")]
    InvalidRequest(String),
}

/// Result alias for headless operations.
pub type Result<T> = std::result::Result<T, HeadlessError>;
