//! Batch runs and determinism checks.
//!
//! Runs one scenario across many seeds in parallel using rayon. Each game
//! builds its own [`Simulation`](tactics_core::simulation::Simulation) on
//! the worker thread, so nothing is shared between games except the
//! read-only scenario.

use std::collections::BTreeMap;
use std::path::Path;
use std::time::Instant;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{HeadlessError, Result};
use crate::report::MatchReport;
use crate::runner::{run_scenario, RunOptions};
use crate::scenario::Scenario;

/// Configuration for a batch run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchConfig {
    /// Number of games to run.
    pub game_count: u32,
    /// Seed of the first game; game `i` uses `seed_start + i`.
    pub seed_start: u64,
    /// Maximum ticks per game; the scenario's length when `None`.
    pub max_ticks: Option<u64>,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            game_count: 16,
            seed_start: 0,
            max_ticks: None,
        }
    }
}

impl BatchConfig {
    /// Create a config for `game_count` games.
    #[must_use]
    pub fn new(game_count: u32) -> Self {
        Self {
            game_count,
            ..Default::default()
        }
    }

    /// Set the first seed.
    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed_start = seed;
        self
    }

    /// Cap the length of each game.
    #[must_use]
    pub fn with_max_ticks(mut self, ticks: u64) -> Self {
        self.max_ticks = Some(ticks);
        self
    }
}

/// Aggregate outcome of a batch.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BatchSummary {
    /// Games that finished.
    pub games: u32,
    /// Wins keyed by faction name.
    pub wins: BTreeMap<String, u32>,
    /// Games with no single faction left standing.
    pub undecided: u32,
    /// Mean ticks per game.
    pub average_ticks: f64,
    /// Mean deaths per game.
    pub average_deaths: f64,
}

/// Results from a batch run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchResults {
    /// Scenario name.
    pub scenario: String,
    /// Configuration used.
    pub config: BatchConfig,
    /// Individual game reports, in seed order.
    pub reports: Vec<MatchReport>,
    /// Aggregate summary.
    pub summary: BatchSummary,
    /// Wall-clock runtime.
    pub duration_seconds: f64,
}

impl BatchResults {
    /// Save results as pretty JSON.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }
}

fn summarize(reports: &[MatchReport]) -> BatchSummary {
    let mut summary = BatchSummary {
        games: reports.len() as u32,
        ..BatchSummary::default()
    };
    if reports.is_empty() {
        return summary;
    }
    for report in reports {
        let winner = report
            .winner
            .and_then(|id| report.faction(id))
            .map(|f| f.name.clone());
        match winner {
            Some(name) => *summary.wins.entry(name).or_insert(0) += 1,
            None => summary.undecided += 1,
        }
    }
    let n = reports.len() as f64;
    summary.average_ticks = reports.iter().map(|r| r.ticks as f64).sum::<f64>() / n;
    summary.average_deaths = reports.iter().map(|r| r.totals.deaths as f64).sum::<f64>() / n;
    summary
}

/// Run a batch of games, one per seed, in parallel.
///
/// Games stop early once a faction is the last one standing.
pub fn run_batch(scenario: &Scenario, config: &BatchConfig) -> Result<BatchResults> {
    if config.game_count == 0 {
        return Err(HeadlessError::InvalidRequest(String::from(
            "batch needs at least one game",
        )));
    }
    let start = Instant::now();
    info!(
        "Starting batch: {} games of '{}' from seed {}",
        config.game_count, scenario.name, config.seed_start
    );

    let reports = (0..u64::from(config.game_count))
        .into_par_iter()
        .map(|i| {
            let options = RunOptions {
                ticks: config.max_ticks,
                seed: Some(config.seed_start + i),
                stop_on_victory: true,
                progress_every: 0,
            };
            run_scenario(scenario, &options)
        })
        .collect::<Result<Vec<_>>>()?;

    let summary = summarize(&reports);
    let duration_seconds = start.elapsed().as_secs_f64();
    info!(
        "Batch finished in {:.2}s: {} undecided, wins {:?}",
        duration_seconds, summary.undecided, summary.wins
    );

    Ok(BatchResults {
        scenario: scenario.name.clone(),
        config: *config,
        reports,
        summary,
        duration_seconds,
    })
}

/// Run one seed `runs` times in parallel and return each final state hash.
///
/// A deterministic simulation returns `runs` identical hashes.
pub fn verify_determinism(scenario: &Scenario, seed: u64, runs: u32, ticks: u64) -> Result<Vec<u64>> {
    if runs < 2 {
        return Err(HeadlessError::InvalidRequest(String::from(
            "determinism check needs at least two runs",
        )));
    }
    let options = RunOptions::default().with_ticks(ticks).with_seed(seed);
    let hashes = (0..runs)
        .into_par_iter()
        .map(|_| run_scenario(scenario, &options).map(|r| r.state_hash))
        .collect::<Result<Vec<_>>>()?;

    if hashes.windows(2).any(|w| w[0] != w[1]) {
        warn!("Seed {} diverged across runs: {:?}", seed, hashes);
    }
    Ok(hashes)
}
