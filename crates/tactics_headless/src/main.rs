//! Headless tactical simulation runner.
//!
//! # Usage
//!
//! ```bash
//! # Run the built-in skirmish and print a JSON report
//! cargo run -p tactics_headless -- run --scenario skirmish --ticks 2400
//!
//! # Same armies with a ridge to path around
//! cargo run -p tactics_headless -- run --scenario scenarios/ridge.ron --until-victory
//!
//! # Run a batch of seeds in parallel
//! cargo run -p tactics_headless -- batch --scenario scenarios/skirmish.ron --count 64 --output results/batch.json
//!
//! # Check that a seed replays identically
//! cargo run -p tactics_headless -- verify --scenario skirmish --seed 12345 --runs 5
//!
//! # Write the built-in scenario out as a starting point for new ones
//! cargo run -p tactics_headless -- dump --output my_scenario.ron
//! ```
//!
//! Reports go to stdout (or `--output`); logs go to stderr. `RUST_LOG`
//! controls log filtering, `--verbose` forces debug output.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use tactics_headless::{
    batch::{run_batch, verify_determinism, BatchConfig},
    runner::{run_scenario, RunOptions},
    scenario::{Scenario, SKIRMISH},
    HeadlessError,
};

#[derive(Parser)]
#[command(name = "tactics_headless")]
#[command(about = "Headless tactical simulation runner")]
#[command(version)]
struct Cli {
    /// Enable debug logging to stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one scenario and print its report
    Run {
        /// Scenario file, or `skirmish` for the built-in one
        #[arg(short, long, default_value = SKIRMISH)]
        scenario: String,

        /// Ticks to simulate (defaults to the scenario's length)
        #[arg(short, long)]
        ticks: Option<u64>,

        /// Override the scenario seed
        #[arg(long)]
        seed: Option<u64>,

        /// Stop once one faction is left standing
        #[arg(long)]
        until_victory: bool,

        /// Log progress every N ticks
        #[arg(long, default_value = "0")]
        progress: u64,

        /// Write the report here instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Run a batch of seeds in parallel
    Batch {
        /// Scenario file, or `skirmish` for the built-in one
        #[arg(short, long, default_value = SKIRMISH)]
        scenario: String,

        /// Number of games to run
        #[arg(short, long, default_value = "16")]
        count: u32,

        /// Starting random seed
        #[arg(long, default_value = "0")]
        seed: u64,

        /// Maximum ticks per game
        #[arg(short, long)]
        ticks: Option<u64>,

        /// Maximum parallel games (0 = one per CPU)
        #[arg(short, long, default_value = "0")]
        parallel: usize,

        /// Write the results here instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Verify determinism by running the same seed several times
    Verify {
        /// Scenario file, or `skirmish` for the built-in one
        #[arg(short, long, default_value = SKIRMISH)]
        scenario: String,

        /// Seed to verify
        #[arg(long, default_value = "12345")]
        seed: u64,

        /// Number of runs
        #[arg(short, long, default_value = "5")]
        runs: u32,

        /// Ticks per run
        #[arg(short, long, default_value = "1200")]
        ticks: u64,
    },

    /// Write a scenario out as RON
    Dump {
        /// Scenario file, or `skirmish` for the built-in one
        #[arg(short, long, default_value = SKIRMISH)]
        scenario: String,

        /// Destination file (stdout when absent)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

fn init_logging(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_ansi(true),
        )
        .with(filter)
        .init();
}

fn emit(text: &str, output: Option<&PathBuf>) -> Result<(), HeadlessError> {
    match output {
        Some(path) => {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::write(path, text)?;
            tracing::info!("Wrote {}", path.display());
        }
        None => println!("{text}"),
    }
    Ok(())
}

fn cmd_run(
    scenario: &str,
    ticks: Option<u64>,
    seed: Option<u64>,
    until_victory: bool,
    progress: u64,
    output: Option<&PathBuf>,
) -> Result<(), HeadlessError> {
    let scenario = Scenario::resolve(scenario)?;
    let options = RunOptions {
        ticks,
        seed,
        stop_on_victory: until_victory,
        progress_every: progress,
    };
    tracing::info!("Running '{}'", scenario.name);
    let report = run_scenario(&scenario, &options)?;
    tracing::info!(
        ticks = report.ticks,
        deaths = report.totals.deaths,
        winner = ?report.winner,
        "Run finished"
    );
    emit(&report.to_json()?, output)
}

fn cmd_batch(
    scenario: &str,
    count: u32,
    seed: u64,
    ticks: Option<u64>,
    parallel: usize,
    output: Option<&PathBuf>,
) -> Result<(), HeadlessError> {
    if parallel > 0 {
        rayon::ThreadPoolBuilder::new()
            .num_threads(parallel)
            .build_global()
            .map_err(|e| HeadlessError::InvalidRequest(e.to_string()))?;
    }
    let scenario = Scenario::resolve(scenario)?;
    let mut config = BatchConfig::new(count).with_seed(seed);
    config.max_ticks = ticks;

    let results = run_batch(&scenario, &config)?;
    match output {
        Some(path) => {
            results.save(path)?;
            tracing::info!("Wrote {}", path.display());
            Ok(())
        }
        None => emit(&serde_json::to_string_pretty(&results)?, None),
    }
}

fn cmd_verify(scenario: &str, seed: u64, runs: u32, ticks: u64) -> Result<bool, HeadlessError> {
    let scenario = Scenario::resolve(scenario)?;
    let hashes = verify_determinism(&scenario, seed, runs, ticks)?;
    let deterministic = hashes.windows(2).all(|w| w[0] == w[1]);
    if deterministic {
        tracing::info!("Seed {} is deterministic over {} runs ({:#018x})", seed, runs, hashes[0]);
    } else {
        tracing::error!("Seed {} diverged: {:?}", seed, hashes);
    }
    Ok(deterministic)
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let outcome = match cli.command {
        Commands::Run {
            scenario,
            ticks,
            seed,
            until_victory,
            progress,
            output,
        } => cmd_run(&scenario, ticks, seed, until_victory, progress, output.as_ref()).map(|()| true),
        Commands::Batch {
            scenario,
            count,
            seed,
            ticks,
            parallel,
            output,
        } => cmd_batch(&scenario, count, seed, ticks, parallel, output.as_ref()).map(|()| true),
        Commands::Verify {
            scenario,
            seed,
            runs,
            ticks,
        } => cmd_verify(&scenario, seed, runs, ticks),
        Commands::Dump { scenario, output } => Scenario::resolve(&scenario)
            .and_then(|s| s.to_ron_string())
            .and_then(|text| emit(&text, output.as_ref()))
            .map(|()| true),
    };

    match outcome {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            tracing::error!("{e}");
            ExitCode::FAILURE
        }
    }
}
