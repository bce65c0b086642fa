//! Headless scenario runner for the tactical simulation.
//!
//! Loads a scenario (RON), builds a [`tactics_core::simulation::Simulation`]
//! from it, runs a number of ticks and produces a JSON [`MatchReport`].
//! Batches of seeds run in parallel for balance and determinism checks.
//!
//! - **stdout**: reports (JSON)
//! - **stderr**: logs (human-readable)
//!
//! # Example
//!
//! ```bash
//! # Run the built-in skirmish for 2 minutes of game time
//! cargo run -p tactics_headless -- run --scenario skirmish --ticks 2400
//!
//! # Run a scenario file with a different seed
//! cargo run -p tactics_headless -- run --scenario scenarios/skirmish.ron --seed 7
//!
//! # Verify determinism
//! cargo run -p tactics_headless -- verify --scenario skirmish --seed 12345
//! ```

pub mod batch;
pub mod error;
pub mod report;
pub mod runner;
pub mod scenario;

pub use batch::{run_batch, verify_determinism, BatchConfig, BatchResults, BatchSummary};
pub use error::{HeadlessError, Result};
pub use report::{FactionReport, MatchReport, MatchTotals};
pub use runner::{run_scenario, HeadlessRunner, RunOptions};
pub use scenario::{BlockedArea, Scenario, Terrain, UnitPlacement};
