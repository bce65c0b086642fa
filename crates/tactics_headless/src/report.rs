//! Match reports.
//!
//! A [`MatchReport`] is the JSON document printed at the end of a run: the
//! final state of every faction plus a few whole-match counters.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use tactics_core::factions::FactionId;
use tactics_core::simulation::Simulation;

use crate::error::Result;

/// Final state of one faction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FactionReport {
    /// Faction identifier.
    pub id: FactionId,
    /// Display name.
    pub name: String,
    /// Enemy units killed.
    pub kills: u32,
    /// Own units lost.
    pub losses: u32,
    /// Units bought through the factory.
    pub produced: u32,
    /// Salvage delivered by harvesters.
    pub harvested: f32,
    /// Ledger balance at the end of the run.
    pub resources: u32,
    /// Living units.
    pub surviving_units: usize,
    /// Living units per class name.
    pub units_by_class: BTreeMap<String, usize>,
    /// Highest veterancy level among living units.
    pub top_veterancy: u8,
    /// Whether the faction still has a standing factory.
    pub factory_alive: bool,
    /// Factory health, zero without a factory.
    pub factory_health: f32,
    /// Longest kill streak seen during the run.
    pub best_streak: u32,
}

/// Counters gathered while ticking.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct MatchTotals {
    /// Shots fired by every faction.
    pub shots_fired: u64,
    /// Direct hits.
    pub hits: u64,
    /// Units killed.
    pub deaths: u64,
    /// Veterancy promotions.
    pub level_ups: u64,
    /// Factories destroyed.
    pub factories_destroyed: u64,
}

/// Outcome of one scenario run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchReport {
    /// Scenario name.
    pub scenario: String,
    /// Seed the simulation ran with.
    pub seed: u64,
    /// Ticks simulated.
    pub ticks: u64,
    /// Simulated seconds.
    pub time_seconds: f32,
    /// Last faction standing, if the match was decided.
    pub winner: Option<FactionId>,
    /// Whole-match counters.
    pub totals: MatchTotals,
    /// Per-faction results in configuration order.
    pub factions: Vec<FactionReport>,
    /// Final state hash, for comparing runs.
    pub state_hash: u64,
}

impl MatchReport {
    /// Collect a report from a finished simulation.
    #[must_use]
    pub fn collect(
        scenario: &str,
        sim: &Simulation,
        totals: MatchTotals,
        best_streaks: &BTreeMap<FactionId, u32>,
    ) -> Self {
        let factions = sim
            .config()
            .factions
            .iter()
            .map(|profile| {
                let stats = sim.stats(profile.id);
                let mut units_by_class = BTreeMap::new();
                let mut surviving_units = 0;
                let mut top_veterancy = 0;
                for unit in sim.units().faction_units(profile.id) {
                    surviving_units += 1;
                    *units_by_class
                        .entry(unit.class.name().to_string())
                        .or_insert(0) += 1;
                    top_veterancy = top_veterancy.max(unit.veterancy.level);
                }
                let factory = sim.factory(profile.id);
                FactionReport {
                    id: profile.id,
                    name: profile.name.clone(),
                    kills: stats.kills,
                    losses: stats.losses,
                    produced: stats.produced,
                    harvested: stats.harvested,
                    resources: sim.balance(profile.id),
                    surviving_units,
                    units_by_class,
                    top_veterancy,
                    factory_alive: factory.is_some_and(|f| f.alive),
                    factory_health: factory.map_or(0.0, |f| f.health),
                    best_streak: best_streaks.get(&profile.id).copied().unwrap_or(0),
                }
            })
            .collect();

        Self {
            scenario: scenario.to_string(),
            seed: sim.config().seed,
            ticks: sim.get_tick(),
            time_seconds: sim.time(),
            winner: last_standing(sim),
            totals,
            factions,
            state_hash: sim.state_hash(),
        }
    }

    /// Report for one faction.
    #[must_use]
    pub fn faction(&self, id: FactionId) -> Option<&FactionReport> {
        self.factions.iter().find(|f| f.id == id)
    }

    /// Encode as pretty JSON.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Save as pretty JSON, creating parent directories.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, self.to_json()?)?;
        Ok(())
    }

    /// Load a report written by [`MatchReport::save`].
    pub fn load(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&json)?)
    }
}

/// The one faction still holding a factory or units, if exactly one is.
#[must_use]
pub fn last_standing(sim: &Simulation) -> Option<FactionId> {
    let mut standing = sim.config().factions.iter().map(|p| p.id).filter(|&id| {
        sim.factory(id).is_some_and(|f| f.alive) || sim.units().faction_units(id).next().is_some()
    });
    let first = standing.next()?;
    standing.next().is_none().then_some(first)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scenario::Scenario;
    use glam::Vec3;

    #[test]
    fn test_collects_every_faction() {
        let sim = Scenario::skirmish().build(None).unwrap();
        let report = MatchReport::collect("skirmish", &sim, MatchTotals::default(), &BTreeMap::new());
        assert_eq!(report.factions.len(), 2);
        let blue = report.faction(FactionId(0)).unwrap();
        assert_eq!(blue.surviving_units, 9);
        assert_eq!(blue.units_by_class["light"], 4);
        assert!(blue.factory_alive);
        assert_eq!(blue.resources, 400);
        assert_eq!(report.winner, None);
    }

    #[test]
    fn test_last_standing() {
        let mut scenario = Scenario::skirmish();
        scenario.factories.retain(|f| f.faction == FactionId(0));
        scenario.units.retain(|u| u.faction == FactionId(0));
        let sim = scenario.build(None).unwrap();
        assert_eq!(last_standing(&sim), Some(FactionId(0)));
    }

    #[test]
    fn test_json_shape() {
        let mut scenario = Scenario::skirmish();
        scenario.units.clear();
        let mut sim = scenario.build(None).unwrap();
        sim.spawn_unit("heavy", FactionId(1), Vec3::new(10.0, 0.0, 0.0))
            .unwrap();
        let report = MatchReport::collect("t", &sim, MatchTotals::default(), &BTreeMap::new());
        let json: serde_json::Value = serde_json::from_str(&report.to_json().unwrap()).unwrap();
        assert_eq!(json["factions"][1]["units_by_class"]["heavy"], 1);
        assert_eq!(json["factions"][0]["surviving_units"], 0);
        assert!(json["state_hash"].is_u64());
    }
}
