//! Headless scenario runner.

use std::collections::BTreeMap;

use tactics_core::events::SimEvent;
use tactics_core::factions::FactionId;
use tactics_core::simulation::{Simulation, TickEvents};

use crate::error::Result;
use crate::report::{last_standing, MatchReport, MatchTotals};
use crate::scenario::Scenario;

/// Options for a single run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RunOptions {
    /// Ticks to simulate; the scenario's own length when `None`.
    pub ticks: Option<u64>,
    /// Seed override.
    pub seed: Option<u64>,
    /// Stop as soon as one faction is left standing.
    pub stop_on_victory: bool,
    /// Log a progress line every this many ticks (0 = never).
    pub progress_every: u64,
}

impl RunOptions {
    /// Builder method to set the run length.
    #[must_use]
    pub fn with_ticks(mut self, ticks: u64) -> Self {
        self.ticks = Some(ticks);
        self
    }

    /// Builder method to override the seed.
    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Builder method to end the run when a faction wins.
    #[must_use]
    pub fn stopping_on_victory(mut self) -> Self {
        self.stop_on_victory = true;
        self
    }
}

/// Drives one scenario to completion.
#[derive(Debug)]
pub struct HeadlessRunner {
    name: String,
    sim: Simulation,
    totals: MatchTotals,
    best_streaks: BTreeMap<FactionId, u32>,
}

impl HeadlessRunner {
    /// Build the scenario's simulation.
    pub fn new(scenario: &Scenario, seed: Option<u64>) -> Result<Self> {
        Ok(Self {
            name: scenario.name.clone(),
            sim: scenario.build(seed)?,
            totals: MatchTotals::default(),
            best_streaks: BTreeMap::new(),
        })
    }

    /// The simulation being driven.
    #[must_use]
    pub fn simulation(&self) -> &Simulation {
        &self.sim
    }

    /// Mutable access for hosts that issue orders between ticks.
    pub fn simulation_mut(&mut self) -> &mut Simulation {
        &mut self.sim
    }

    /// Counters gathered so far.
    #[must_use]
    pub fn totals(&self) -> MatchTotals {
        self.totals
    }

    /// Advance one tick and fold its events into the totals.
    pub fn tick(&mut self) -> TickEvents {
        let events = self.sim.tick();
        self.record(&events);
        events
    }

    fn record(&mut self, events: &TickEvents) {
        self.totals.shots_fired += events.shots_fired as u64;
        self.totals.hits += events.hits as u64;
        for event in &events.events {
            match event {
                SimEvent::UnitDied { .. } => self.totals.deaths += 1,
                SimEvent::LevelUp { .. } => self.totals.level_ups += 1,
                SimEvent::FactoryDestroyed {
                    faction,
                    destroyed_by,
                    ..
                } => {
                    self.totals.factories_destroyed += 1;
                    tracing::info!("{} factory destroyed by {}", faction, destroyed_by);
                }
                SimEvent::KillStreak { faction, count, .. } => {
                    let best = self.best_streaks.entry(*faction).or_insert(0);
                    *best = (*best).max(*count);
                }
                _ => {}
            }
        }
    }

    /// Run up to `ticks` ticks.
    ///
    /// Returns the number of ticks actually simulated.
    pub fn run(&mut self, ticks: u64, options: &RunOptions) -> u64 {
        for done in 0..ticks {
            self.tick();
            let tick = self.sim.get_tick();
            if options.progress_every > 0 && tick % options.progress_every == 0 {
                tracing::info!(
                    "tick {} ({:.1}s): {} units alive, {} shots so far",
                    tick,
                    self.sim.time(),
                    self.sim.units().live_count(),
                    self.totals.shots_fired
                );
            }
            if options.stop_on_victory {
                if let Some(winner) = last_standing(&self.sim) {
                    tracing::info!("{} is the last faction standing at tick {}", winner, tick);
                    return done + 1;
                }
            }
        }
        ticks
    }

    /// Build the report for the current state.
    #[must_use]
    pub fn report(&self) -> MatchReport {
        MatchReport::collect(&self.name, &self.sim, self.totals, &self.best_streaks)
    }
}

/// Run a scenario from a fresh simulation and return its report.
pub fn run_scenario(scenario: &Scenario, options: &RunOptions) -> Result<MatchReport> {
    let mut runner = HeadlessRunner::new(scenario, options.seed)?;
    let ticks = options.ticks.unwrap_or(scenario.ticks);
    tracing::debug!("Running '{}' for up to {} ticks", scenario.name, ticks);
    runner.run(ticks, options);
    Ok(runner.report())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scenario::UnitPlacement;
    use tactics_core::components::Stance;

    fn duel() -> Scenario {
        let mut scenario = Scenario::skirmish();
        scenario.config.factions.iter_mut().for_each(|f| f.ai_controlled = false);
        scenario.units = vec![
            UnitPlacement::new("heavy", FactionId(0), -10.0, 0.0, 3),
            UnitPlacement::new("light", FactionId(1), 10.0, 0.0, 1)
                .with_stance(Stance::HoldPosition),
        ];
        scenario
    }

    #[test]
    fn test_run_counts_ticks() {
        let report = run_scenario(&duel(), &RunOptions::default().with_ticks(40)).unwrap();
        assert_eq!(report.ticks, 40);
        assert!((report.time_seconds - 2.0).abs() < 1e-3);
        assert!(report.totals.shots_fired > 0);
    }

    #[test]
    fn test_duel_records_kill() {
        let report = run_scenario(&duel(), &RunOptions::default().with_ticks(400)).unwrap();
        assert_eq!(report.totals.deaths, 1);
        assert_eq!(report.faction(FactionId(0)).unwrap().kills, 1);
        assert_eq!(report.faction(FactionId(1)).unwrap().losses, 1);
        assert_eq!(report.faction(FactionId(1)).unwrap().surviving_units, 0);
    }

    #[test]
    fn test_stop_on_victory() {
        let mut scenario = duel();
        scenario.factories.retain(|f| f.faction == FactionId(0));
        let options = RunOptions::default().with_ticks(2000).stopping_on_victory();
        let report = run_scenario(&scenario, &options).unwrap();
        assert!(report.ticks < 2000);
        assert_eq!(report.winner, Some(FactionId(0)));
    }

    #[test]
    fn test_same_seed_same_report() {
        let options = RunOptions::default().with_ticks(300).with_seed(5);
        let a = run_scenario(&Scenario::skirmish(), &options).unwrap();
        let b = run_scenario(&Scenario::skirmish(), &options).unwrap();
        assert_eq!(a, b);
    }
}
