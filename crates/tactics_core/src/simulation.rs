//! Core simulation loop.
//!
//! The simulation advances in frame steps of `dt` simulated seconds and
//! owns every registry: units, projectiles, factories, wrecks and ruins.
//! External concerns (obstacles, faction mechanics, experience, the
//! resource ledger and passive income) are reached through traits with
//! in-crate defaults, so a host can swap any of them.
//!
//! # Determinism
//!
//! All randomness comes from one `ChaCha8Rng` seeded from
//! [`SimConfig::seed`], and units are always processed in registry order.
//! Two simulations built from the same config and fed the same orders
//! produce the same [`Simulation::state_hash`].
//!
//! # Example
//!
//! ```
//! use glam::Vec3;
//! use tactics_core::config::SimConfig;
//! use tactics_core::factions::{FactionId, FactionProfile};
//! use tactics_core::simulation::Simulation;
//!
//! let config = SimConfig::default()
//!     .with_faction(FactionProfile::new(FactionId(0), "Blue"))
//!     .with_faction(FactionProfile::new(FactionId(1), "Red"));
//! let mut sim = Simulation::new(config);
//!
//! let unit = sim.spawn_unit("medium", FactionId(0), Vec3::ZERO).unwrap();
//! sim.order_move(&[unit], Vec3::new(10.0, 0.0, 0.0), None).unwrap();
//! sim.tick();
//! assert_eq!(sim.get_tick(), 1);
//! ```

use std::collections::hash_map::DefaultHasher;
use std::collections::BTreeMap;
use std::fmt;
use std::hash::{Hash, Hasher};

use glam::Vec3;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

use crate::abilities::{AbilityActivation, AbilityKind, AbilitySystem, AbilityTarget};
use crate::ai::{self, AiOrder, AiView, FactionAiState};
use crate::combat::{run_combat, CombatReport, CombatWorld};
use crate::components::{HarvesterData, Stance, Unit, UnitId};
use crate::config::SimConfig;
use crate::economy::{
    step_harvester, FactionLedger, FlatIncome, HarvestContext, IncomeSource, ResourceLedger,
    SalvageSite, WreckageField, BUILDING_SALVAGE,
};
use crate::error::{Result, TacticsError};
use crate::events::{
    FactorySnapshot, KillStreakTracker, SimEvent, SimSnapshot, UnitSnapshot,
};
use crate::experience::{ExperiencePool, FactionExperience, XpCategory};
use crate::factions::FactionId;
use crate::factory::{Factory, FACTORY_RADIUS};
use crate::formation::{assign_slots, compute_positions, FormationType};
use crate::math::{centroid, planar_direction, random_planar_offset};
use crate::mechanics::{FactionMechanics, StandardMechanics};
use crate::navigation::{advance_unit, steering, MoveContext, ObstacleQuery, OpenField};
use crate::projectile::{Projectile, ProjectileList};
use crate::registry::UnitRegistry;
use crate::retreat::update_retreats;
use crate::targeting::{update_targets, TargetingContext};

/// Distance in front of a factory where produced units appear.
pub const SPAWN_OFFSET: f32 = FACTORY_RADIUS + 2.0;

/// Random jitter applied to spawn points.
pub const SPAWN_JITTER: f32 = 2.0;

/// Running totals for one faction.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct FactionStats {
    /// Enemy units killed.
    pub kills: u32,
    /// Own units lost.
    pub losses: u32,
    /// Units produced through the factory.
    pub produced: u32,
    /// Salvage delivered by harvesters.
    pub harvested: f32,
}

/// Events and counters generated during one tick.
///
/// These can be used by the host to drive effects, sounds, kill feeds and
/// reports.
#[derive(Debug, Clone, Default)]
pub struct TickEvents {
    /// Discrete events in the order they happened.
    pub events: Vec<SimEvent>,
    /// Shots fired this tick.
    pub shots_fired: usize,
    /// Direct hits that dealt damage this tick.
    pub hits: usize,
}

/// The tactical simulation.
///
/// # System Execution Order
///
/// Each step runs, in order:
/// 1. **Reap** units flagged dead on the previous step
/// 2. **Abilities** tick down and refresh cloak/phase flags; passive income
/// 3. **AI** decides spawns, attack waves and defense recalls
/// 4. **Retreat** checks
/// 5. **Harvesters** advance their work cycle
/// 6. **Navigation** moves every unit
/// 7. **Targeting** (throttled per unit)
/// 8. **Combat** fires weapons and resolves projectiles
/// 9. **Death reactions**: wrecks, kill feed, streaks, factory ruins
pub struct Simulation {
    config: SimConfig,
    tick: u64,
    time: f32,
    units: UnitRegistry,
    projectiles: ProjectileList,
    factories: Vec<Factory>,
    ruins: Vec<SalvageSite>,
    wreckage: WreckageField,
    ai: Vec<FactionAiState>,
    abilities: AbilitySystem,
    streaks: KillStreakTracker,
    stats: BTreeMap<FactionId, FactionStats>,
    obstacles: Box<dyn ObstacleQuery>,
    mechanics: Box<dyn FactionMechanics>,
    experience: Box<dyn ExperiencePool>,
    ledger: Box<dyn ResourceLedger>,
    income: Box<dyn IncomeSource>,
    rng: ChaCha8Rng,
}

impl fmt::Debug for Simulation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Simulation")
            .field("tick", &self.tick)
            .field("time", &self.time)
            .field("units", &self.units.len())
            .field("projectiles", &self.projectiles.len())
            .field("factories", &self.factories)
            .finish_non_exhaustive()
    }
}

impl Simulation {
    /// Create a simulation from a configuration, with the default services.
    #[must_use]
    pub fn new(config: SimConfig) -> Self {
        for template in &config.templates {
            if template.health <= 0.0 || template.speed < 0.0 {
                tracing::warn!("Template '{}' has invalid health or speed", template.id);
            }
        }
        for profile in &config.factions {
            for kind in &profile.abilities {
                if !config.abilities.iter().any(|s| s.kind == *kind) {
                    tracing::warn!("{} lists {:?} but no spec defines it", profile.name, kind);
                }
            }
        }

        let ai = config
            .factions
            .iter()
            .filter(|p| p.ai_controlled)
            .map(|p| FactionAiState::new(p, &config.ai))
            .collect();
        let stats = config
            .factions
            .iter()
            .map(|p| (p.id, FactionStats::default()))
            .collect();

        tracing::info!(
            seed = config.seed,
            factions = config.factions.len(),
            "Simulation created"
        );

        Self {
            tick: 0,
            time: 0.0,
            units: UnitRegistry::new(),
            projectiles: ProjectileList::new(),
            factories: Vec::new(),
            ruins: Vec::new(),
            wreckage: WreckageField::new(),
            ai,
            abilities: AbilitySystem::new(config.abilities.clone(), &config.factions),
            streaks: KillStreakTracker::new(config.combat.kill_streak_window),
            stats,
            obstacles: Box::new(OpenField),
            mechanics: Box::new(StandardMechanics::from_profiles(&config.factions)),
            experience: Box::new(FactionExperience::new()),
            ledger: Box::new(FactionLedger::from_profiles(&config.factions)),
            income: Box::new(FlatIncome::from_profiles(&config.factions)),
            rng: ChaCha8Rng::seed_from_u64(config.seed),
            config,
        }
    }

    /// Builder method to replace the obstacle service.
    #[must_use]
    pub fn with_obstacles(mut self, obstacles: impl ObstacleQuery + 'static) -> Self {
        self.obstacles = Box::new(obstacles);
        self
    }

    /// Builder method to replace the faction mechanics.
    #[must_use]
    pub fn with_mechanics(mut self, mechanics: impl FactionMechanics + 'static) -> Self {
        self.mechanics = Box::new(mechanics);
        self
    }

    /// Builder method to replace the experience pools.
    #[must_use]
    pub fn with_experience(mut self, experience: impl ExperiencePool + 'static) -> Self {
        self.experience = Box::new(experience);
        self
    }

    /// Builder method to replace the resource ledger.
    #[must_use]
    pub fn with_ledger(mut self, ledger: impl ResourceLedger + 'static) -> Self {
        self.ledger = Box::new(ledger);
        self
    }

    /// Builder method to replace the passive income source.
    #[must_use]
    pub fn with_income(mut self, income: impl IncomeSource + 'static) -> Self {
        self.income = Box::new(income);
        self
    }

    /// Get the current tick number.
    #[must_use]
    pub const fn get_tick(&self) -> u64 {
        self.tick
    }

    /// Simulated seconds elapsed.
    #[must_use]
    pub const fn time(&self) -> f32 {
        self.time
    }

    /// Configuration in use.
    #[must_use]
    pub fn config(&self) -> &SimConfig {
        &self.config
    }

    /// Unit registry.
    #[must_use]
    pub fn units(&self) -> &UnitRegistry {
        &self.units
    }

    /// Look up a unit, dead or alive.
    #[must_use]
    pub fn unit(&self, id: UnitId) -> Option<&Unit> {
        self.units.get(id)
    }

    /// Projectiles in flight.
    pub fn projectiles(&self) -> impl Iterator<Item = &Projectile> {
        self.projectiles.iter()
    }

    /// All factories, standing or destroyed.
    #[must_use]
    pub fn factories(&self) -> &[Factory] {
        &self.factories
    }

    /// A faction's factory.
    #[must_use]
    pub fn factory(&self, faction: FactionId) -> Option<&Factory> {
        self.factories.iter().find(|f| f.faction == faction)
    }

    /// Wrecks on the map.
    #[must_use]
    pub fn wreckage(&self) -> &WreckageField {
        &self.wreckage
    }

    /// Ruins of destroyed factories.
    #[must_use]
    pub fn ruins(&self) -> &[SalvageSite] {
        &self.ruins
    }

    /// Ability state.
    #[must_use]
    pub fn abilities(&self) -> &AbilitySystem {
        &self.abilities
    }

    /// Ledger balance of a faction.
    #[must_use]
    pub fn balance(&self, faction: FactionId) -> u32 {
        self.ledger.balance(faction)
    }

    /// Running totals of a faction.
    #[must_use]
    pub fn stats(&self, faction: FactionId) -> FactionStats {
        self.stats.get(&faction).copied().unwrap_or_default()
    }

    /// Current kill streak of a faction.
    #[must_use]
    pub fn kill_streak(&self, faction: FactionId) -> u32 {
        self.streaks.current(faction)
    }

    /// Place a faction's factory.
    ///
    /// # Errors
    ///
    /// Fails if the faction is not configured or already has a factory.
    pub fn add_factory(&mut self, faction: FactionId, position: Vec3) -> Result<()> {
        self.require_faction(faction)?;
        if self.factory(faction).is_some() {
            return Err(TacticsError::InvalidState(format!(
                "{faction} already has a factory"
            )));
        }
        self.factories.push(Factory::new(faction, position));
        Ok(())
    }

    /// Spawn a unit from a template, free of charge.
    ///
    /// # Errors
    ///
    /// Fails on an unknown faction or template.
    pub fn spawn_unit(
        &mut self,
        template: &str,
        faction: FactionId,
        position: Vec3,
    ) -> Result<UnitId> {
        self.require_faction(faction)?;
        let template = self
            .config
            .template(template)
            .ok_or_else(|| TacticsError::UnknownTemplate(template.to_string()))?;

        let mut unit = Unit::new(
            faction,
            template.class,
            template.combat_stats(),
            template.speed,
            position,
        )
        .with_template(&template.id);
        if let Some(harvester) = unit.harvester.as_mut() {
            if template.capacity > 0.0 {
                *harvester = HarvesterData::new(template.capacity, template.harvest_rate);
            }
        }
        let id = self.units.insert(unit);
        tracing::trace!("Spawned {} ({}) for {}", id, template.id, faction);
        Ok(id)
    }

    /// Buy a unit from the faction's ledger and spawn it at its factory.
    ///
    /// # Errors
    ///
    /// Fails on an unknown faction or template, a missing factory, or
    /// insufficient resources.
    pub fn produce_unit(&mut self, faction: FactionId, template: &str) -> Result<UnitId> {
        self.require_faction(faction)?;
        let cost = self
            .config
            .template(template)
            .ok_or_else(|| TacticsError::UnknownTemplate(template.to_string()))?
            .cost;
        let factory = self
            .factory(faction)
            .filter(|f| f.alive)
            .map(|f| f.position)
            .ok_or_else(|| TacticsError::InvalidState(format!("{faction} has no factory")))?;

        self.ledger.consume(faction, cost)?;
        let toward = planar_direction(factory, self.config.map_center);
        let position =
            factory + toward * SPAWN_OFFSET + random_planar_offset(&mut self.rng, SPAWN_JITTER);
        let id = self.spawn_unit(template, faction, position)?;
        self.stats.entry(faction).or_default().produced += 1;
        Ok(id)
    }

    /// Move units, optionally arranged in a formation around `destination`.
    ///
    /// # Errors
    ///
    /// Fails if any unit is unknown or dead; no unit is moved in that case.
    pub fn order_move(
        &mut self,
        units: &[UnitId],
        destination: Vec3,
        formation: Option<FormationType>,
    ) -> Result<()> {
        self.issue_move(units, destination, formation, false)
    }

    /// Move units with attack-move: they engage anything met on the way.
    ///
    /// # Errors
    ///
    /// Fails if any unit is unknown or dead.
    pub fn order_attack_move(
        &mut self,
        units: &[UnitId],
        destination: Vec3,
        formation: Option<FormationType>,
    ) -> Result<()> {
        self.issue_move(units, destination, formation, true)
    }

    /// Order units to pursue one enemy.
    ///
    /// # Errors
    ///
    /// Fails if a unit or the target is unknown or dead, or if the target
    /// belongs to an ordered unit's own faction.
    pub fn order_attack(&mut self, units: &[UnitId], target: UnitId) -> Result<()> {
        self.require_units(units)?;
        let (target_faction, target_pos) = self
            .units
            .get_alive(target)
            .map(|t| (t.faction, t.position))
            .ok_or(TacticsError::UnitNotFound(target))?;
        if units
            .iter()
            .filter_map(|id| self.units.get(*id))
            .any(|u| u.faction == target_faction)
        {
            return Err(TacticsError::InvalidState(format!(
                "{target} is friendly to the ordered units"
            )));
        }
        for id in units {
            if let Some(unit) = self.units.get_mut(*id) {
                unit.order_move(target_pos, false);
                unit.pursued = Some(target);
                unit.target = Some(target);
            }
        }
        Ok(())
    }

    /// Change the stance of units.
    ///
    /// # Errors
    ///
    /// Fails if any unit is unknown or dead.
    pub fn set_stance(&mut self, units: &[UnitId], stance: Stance) -> Result<()> {
        self.require_units(units)?;
        for id in units {
            if let Some(unit) = self.units.get_mut(*id) {
                unit.stance = stance;
            }
        }
        Ok(())
    }

    /// Lock or unlock units in siege mode. Locked units stop and gain range.
    ///
    /// # Errors
    ///
    /// Fails if any unit is unknown or dead.
    pub fn set_siege_lock(&mut self, units: &[UnitId], locked: bool) -> Result<()> {
        self.require_units(units)?;
        for id in units {
            if let Some(unit) = self.units.get_mut(*id) {
                unit.siege_locked = locked;
                if locked {
                    unit.destination = unit.position;
                    unit.nav.waypoint = None;
                    unit.is_moving = false;
                }
            }
        }
        Ok(())
    }

    /// Activate a faction ability.
    ///
    /// # Errors
    ///
    /// See [`AbilitySystem::activate`].
    pub fn activate_ability(
        &mut self,
        faction: FactionId,
        kind: AbilityKind,
        target: AbilityTarget,
    ) -> Result<AbilityActivation> {
        let activation = self
            .abilities
            .activate(faction, kind, target, &self.units)?;
        self.abilities.refresh_flags(&mut self.units);
        Ok(activation)
    }

    /// Advance by one tick of `1 / tick_rate` seconds.
    pub fn tick(&mut self) -> TickEvents {
        let dt = self.config.tick_seconds();
        self.step(dt)
    }

    /// Advance the simulation by `dt` seconds.
    ///
    /// Never fails: stale references, unaffordable spawns and missing
    /// services degrade to doing nothing.
    pub fn step(&mut self, dt: f32) -> TickEvents {
        let dt = if dt.is_finite() { dt.max(0.0) } else { 0.0 };
        let mut events = TickEvents::default();

        // 1. Reap
        self.units.reap_dead();

        // 2. Abilities and income
        for (faction, kind) in self.abilities.advance(dt) {
            tracing::debug!("{} {:?} expired", faction, kind);
        }
        self.abilities.refresh_flags(&mut self.units);
        for profile in &self.config.factions {
            let amount = self.income.income(profile.id, dt);
            self.ledger.add(profile.id, amount);
        }

        let standing = self.standing_factories();

        // 3. AI
        self.run_ai(dt, &standing, &mut events);

        // 4. Retreat
        update_retreats(&mut self.units, &standing, self.config.map_center);

        // 5. Harvesters
        self.run_harvesters(dt, &standing, &mut events);

        // 6. Navigation
        self.run_navigation(dt);

        // 7. Targeting
        let targeting = TargetingContext {
            tuning: &self.config.targeting,
            siege_multiplier: self.config.combat.siege_range_multiplier,
            factories: &standing,
        };
        update_targets(&mut self.units, &targeting, dt);

        // 8. Combat
        let report = {
            let mut world = CombatWorld {
                units: &mut self.units,
                projectiles: &mut self.projectiles,
                factories: &mut self.factories,
                abilities: &self.abilities,
                mechanics: self.mechanics.as_ref(),
                experience: self.experience.as_mut(),
                obstacles: self.obstacles.as_ref(),
                tuning: &self.config.combat,
                rng: &mut self.rng,
            };
            run_combat(&mut world, dt)
        };

        self.tick += 1;
        self.time += dt;

        // 9. Death reactions
        self.react_to_combat(report, &mut events);
        self.units.clear_stale_references();
        self.wreckage.remove_depleted();

        #[cfg(feature = "debug-validation")]
        self.validate();

        tracing::debug!(
            tick = self.tick,
            live = self.units.live_count(),
            projectiles = self.projectiles.len(),
            events = events.events.len(),
            "Tick complete"
        );
        events
    }

    /// Read-only view for renderers and reports.
    #[must_use]
    pub fn snapshot(&self) -> SimSnapshot {
        SimSnapshot {
            tick: self.tick,
            time: self.time,
            units: self
                .units
                .iter_alive()
                .map(|u| UnitSnapshot {
                    id: u.id,
                    faction: u.faction,
                    class: u.class,
                    position: u.position,
                    health_fraction: u.stats.health_fraction(),
                    stance: u.stance,
                    veterancy: u.veterancy.level,
                    target: u.target,
                    is_retreating: u.is_retreating,
                })
                .collect(),
            projectiles: self.projectiles.iter().map(Projectile::snapshot).collect(),
            factories: self
                .factories
                .iter()
                .map(|f| FactorySnapshot {
                    faction: f.faction,
                    position: f.position,
                    health: f.health,
                    alive: f.alive,
                })
                .collect(),
        }
    }

    /// Calculate a hash of the current simulation state.
    ///
    /// Used for determinism checks: two simulations with identical state
    /// produce identical hashes.
    #[must_use]
    pub fn state_hash(&self) -> u64 {
        let mut hasher = DefaultHasher::new();
        self.tick.hash(&mut hasher);
        self.time.to_bits().hash(&mut hasher);

        self.units.len().hash(&mut hasher);
        for unit in self.units.iter() {
            unit.id.hash(&mut hasher);
            unit.faction.hash(&mut hasher);
            unit.is_dead.hash(&mut hasher);
            unit.position.x.to_bits().hash(&mut hasher);
            unit.position.z.to_bits().hash(&mut hasher);
            unit.stats.health.to_bits().hash(&mut hasher);
            unit.target.hash(&mut hasher);
            unit.veterancy.xp.to_bits().hash(&mut hasher);
        }

        self.projectiles.len().hash(&mut hasher);
        for projectile in self.projectiles.iter() {
            projectile.position.x.to_bits().hash(&mut hasher);
            projectile.position.z.to_bits().hash(&mut hasher);
            projectile.damage.to_bits().hash(&mut hasher);
        }

        for factory in &self.factories {
            factory.faction.hash(&mut hasher);
            factory.health.to_bits().hash(&mut hasher);
        }
        for profile in &self.config.factions {
            self.ledger.balance(profile.id).hash(&mut hasher);
        }
        hasher.finish()
    }

    fn require_faction(&self, faction: FactionId) -> Result<()> {
        if self.config.faction(faction).is_none() {
            return Err(TacticsError::FactionNotFound(faction));
        }
        Ok(())
    }

    fn require_units(&self, units: &[UnitId]) -> Result<()> {
        if let Some(missing) = units.iter().find(|id| self.units.get_alive(**id).is_none()) {
            tracing::warn!("Order references unknown unit {}", missing);
            return Err(TacticsError::UnitNotFound(*missing));
        }
        Ok(())
    }

    fn issue_move(
        &mut self,
        units: &[UnitId],
        destination: Vec3,
        formation: Option<FormationType>,
        attack_move: bool,
    ) -> Result<()> {
        self.require_units(units)?;
        let current: Vec<(UnitId, Vec3)> = units
            .iter()
            .filter_map(|id| self.units.get(*id).map(|u| (u.id, u.position)))
            .collect();

        let assignments = match formation {
            Some(formation) if current.len() > 1 => {
                let positions: Vec<Vec3> = current.iter().map(|c| c.1).collect();
                let facing = centroid(&positions)
                    .map_or(Vec3::Z, |center| planar_direction(center, destination));
                let slots = compute_positions(
                    destination,
                    current.len(),
                    facing,
                    formation,
                    self.config.formation_spacing,
                    &mut self.rng,
                );
                assign_slots(&current, &slots)
            }
            _ => current.iter().map(|c| (c.0, destination)).collect(),
        };

        for (id, slot) in assignments {
            if let Some(unit) = self.units.get_mut(id) {
                unit.order_move(slot, attack_move);
            }
        }
        Ok(())
    }

    fn standing_factories(&self) -> BTreeMap<FactionId, Vec3> {
        self.factories
            .iter()
            .filter(|f| f.alive)
            .map(|f| (f.faction, f.position))
            .collect()
    }

    fn run_ai(&mut self, dt: f32, standing: &BTreeMap<FactionId, Vec3>, events: &mut TickEvents) {
        for idx in 0..self.ai.len() {
            let faction = self.ai[idx].faction;
            let orders = {
                let Some(profile) = self.config.faction(faction) else {
                    continue;
                };
                let view = AiView {
                    profile,
                    units: &self.units,
                    factories: standing,
                    balance: self.ledger.balance(faction),
                    templates: &self.config.templates,
                    tuning: &self.config.ai,
                    spacing: self.config.formation_spacing,
                };
                ai::think(&mut self.ai[idx], &view, dt, &mut self.rng)
            };

            for order in orders {
                match order {
                    AiOrder::Spawn { template } => match self.produce_unit(faction, &template) {
                        Ok(unit) => events.events.push(SimEvent::ProductionComplete {
                            unit,
                            faction,
                            template,
                        }),
                        Err(e) => tracing::debug!("{} AI spawn skipped: {}", faction, e),
                    },
                    AiOrder::Move {
                        orders,
                        attack_move,
                    } => {
                        for (id, slot) in orders {
                            if let Some(unit) = self.units.get_mut(id) {
                                unit.order_move(slot, attack_move);
                            }
                        }
                    }
                }
            }
        }
    }

    fn run_harvesters(
        &mut self,
        dt: f32,
        standing: &BTreeMap<FactionId, Vec3>,
        events: &mut TickEvents,
    ) {
        for id in self.units.ids() {
            let Some(unit) = self.units.get_mut(id) else {
                continue;
            };
            if !unit.is_alive() || unit.harvester.is_none() {
                continue;
            }
            let faction = unit.faction;
            let mut ctx = HarvestContext {
                home: standing.get(&faction).copied(),
                wreckage: &mut self.wreckage,
                ruins: &mut self.ruins,
                dt,
            };
            if let Some(amount) = step_harvester(unit, &mut ctx) {
                self.ledger.add(faction, amount);
                self.experience
                    .add_experience(faction, XpCategory::Economy, amount);
                self.stats.entry(faction).or_default().harvested += amount;
                tracing::trace!("{} deposited {:.1}", id, amount);
                events.events.push(SimEvent::Deposit {
                    unit: id,
                    faction,
                    amount,
                });
            }
        }
    }

    fn run_navigation(&mut self, dt: f32) {
        let siege = self.config.combat.siege_range_multiplier;
        for id in self.units.ids() {
            let Some(unit) = self.units.get_alive(id) else {
                continue;
            };
            let steer = steering(unit, &self.units, siege, &self.config.navigation);
            let ctx = MoveContext {
                obstacles: self.obstacles.as_ref(),
                tuning: &self.config.navigation,
                speed_multiplier: self.abilities.speed_multiplier(unit.faction),
                dt,
            };
            if let Some(unit) = self.units.get_mut(id) {
                advance_unit(unit, steer, &ctx, &mut self.rng);
            }
        }
    }

    fn react_to_combat(&mut self, report: CombatReport, events: &mut TickEvents) {
        events.shots_fired = report.shots_fired;
        events.hits = report.hits;

        for death in report.deaths {
            let wreck = self.wreckage.spawn(death.position, death.class);
            self.stats.entry(death.faction).or_default().losses += 1;
            self.stats.entry(death.killer_faction).or_default().kills += 1;
            tracing::debug!(
                "{} ({}) of {} killed by {}",
                death.unit,
                death.class.name(),
                death.faction,
                death.killer_faction
            );

            events.events.push(SimEvent::UnitDied {
                unit: death.unit,
                faction: death.faction,
                class: death.class,
                position: death.position,
                killer: death.killer,
                killer_faction: death.killer_faction,
            });
            events.events.push(SimEvent::WreckageSpawned {
                wreckage: wreck,
                position: death.position,
            });
            if let Some(streak) = self.streaks.record_kill(death.killer_faction, self.time) {
                events.events.push(streak);
            }
        }

        for event in report.events {
            if let SimEvent::FactoryDestroyed {
                faction, position, ..
            } = event
            {
                self.ruins.push(SalvageSite {
                    owner: faction,
                    position,
                    remaining: BUILDING_SALVAGE,
                });
            }
            events.events.push(event);
        }
    }

    #[cfg(feature = "debug-validation")]
    fn validate(&self) {
        for unit in self.units.iter() {
            assert!(
                unit.stats.health >= 0.0 && unit.stats.health <= unit.stats.max_health,
                "{} health {} outside [0, {}]",
                unit.id,
                unit.stats.health,
                unit.stats.max_health
            );
        }
        for unit in self.units.iter_alive() {
            if let Some(target) = unit.target {
                assert!(
                    self.units.get_alive(target).is_some(),
                    "{} targets dead {}",
                    unit.id,
                    target
                );
            }
        }
    }
}

impl Default for Simulation {
    fn default() -> Self {
        Self::new(SimConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::UnitClass;
    use crate::factions::FactionProfile;

    fn config() -> SimConfig {
        SimConfig::default()
            .with_seed(42)
            .with_faction(FactionProfile::new(FactionId(0), "Blue").with_resources(500))
            .with_faction(FactionProfile::new(FactionId(1), "Red").with_resources(500))
    }

    fn arena() -> Simulation {
        let mut sim = Simulation::new(config());
        sim.add_factory(FactionId(0), Vec3::new(-100.0, 0.0, 0.0))
            .unwrap();
        sim.add_factory(FactionId(1), Vec3::new(100.0, 0.0, 0.0))
            .unwrap();
        sim
    }

    #[test]
    fn test_simulation_new() {
        let sim = Simulation::new(config());
        assert_eq!(sim.get_tick(), 0);
        assert!(sim.units().is_empty());
        assert_eq!(sim.balance(FactionId(0)), 500);
    }

    #[test]
    fn test_tick_increments() {
        let mut sim = arena();
        sim.tick();
        sim.tick();
        assert_eq!(sim.get_tick(), 2);
        assert!((sim.time() - 0.1).abs() < 1e-5);
    }

    #[test]
    fn test_spawn_errors() {
        let mut sim = arena();
        assert!(matches!(
            sim.spawn_unit("dreadnought", FactionId(0), Vec3::ZERO),
            Err(TacticsError::UnknownTemplate(_))
        ));
        assert!(matches!(
            sim.spawn_unit("light", FactionId(9), Vec3::ZERO),
            Err(TacticsError::FactionNotFound(FactionId(9)))
        ));
        assert!(sim.add_factory(FactionId(0), Vec3::ZERO).is_err());
    }

    #[test]
    fn test_spawned_harvester_uses_template_cargo() {
        let mut sim = arena();
        let id = sim.spawn_unit("harvester", FactionId(0), Vec3::ZERO).unwrap();
        let unit = sim.unit(id).unwrap();
        assert_eq!(unit.template.as_deref(), Some("harvester"));
        assert_eq!(unit.harvester.unwrap().capacity, 50.0);
    }

    #[test]
    fn test_produce_unit_charges_ledger() {
        let mut sim = arena();
        let id = sim.produce_unit(FactionId(0), "heavy").unwrap();
        assert_eq!(sim.balance(FactionId(0)), 350);
        assert_eq!(sim.stats(FactionId(0)).produced, 1);
        let pos = sim.unit(id).unwrap().position;
        assert!(pos.x > -100.0);

        for _ in 0..2 {
            sim.produce_unit(FactionId(0), "heavy").unwrap();
        }
        assert!(matches!(
            sim.produce_unit(FactionId(0), "heavy"),
            Err(TacticsError::InsufficientResources { required: 150, available: 50, .. })
        ));
    }

    #[test]
    fn test_order_unknown_unit() {
        let mut sim = arena();
        let a = sim.spawn_unit("light", FactionId(0), Vec3::ZERO).unwrap();
        let err = sim
            .order_move(&[a, UnitId(999)], Vec3::ONE, None)
            .unwrap_err();
        assert!(matches!(err, TacticsError::UnitNotFound(UnitId(999))));
        assert_eq!(sim.unit(a).unwrap().destination, Vec3::ZERO);
    }

    #[test]
    fn test_formation_move_spreads_destinations() {
        let mut sim = arena();
        let ids: Vec<UnitId> = (0..4)
            .map(|i| {
                sim.spawn_unit("light", FactionId(0), Vec3::new(i as f32, 0.0, -20.0))
                    .unwrap()
            })
            .collect();
        sim.order_move(&ids, Vec3::new(0.0, 0.0, 20.0), Some(FormationType::Line))
            .unwrap();
        let mut xs: Vec<f32> = ids
            .iter()
            .map(|id| sim.unit(*id).unwrap().destination.x)
            .collect();
        xs.sort_by(f32::total_cmp);
        xs.dedup();
        assert_eq!(xs.len(), 4);
    }

    #[test]
    fn test_attack_order_rejects_friendly_target() {
        let mut sim = arena();
        let a = sim.spawn_unit("light", FactionId(0), Vec3::ZERO).unwrap();
        let b = sim.spawn_unit("light", FactionId(0), Vec3::X).unwrap();
        assert!(matches!(
            sim.order_attack(&[a], b),
            Err(TacticsError::InvalidState(_))
        ));
    }

    #[test]
    fn test_duel_ends_in_death_and_wreck() {
        let mut sim = arena();
        let heavy = sim.spawn_unit("heavy", FactionId(0), Vec3::ZERO).unwrap();
        let light = sim
            .spawn_unit("light", FactionId(1), Vec3::new(15.0, 0.0, 0.0))
            .unwrap();
        sim.set_stance(&[light], Stance::HoldPosition).unwrap();
        sim.order_attack(&[heavy], light).unwrap();

        let mut died = None;
        for _ in 0..2000 {
            let events = sim.tick();
            died = events.events.iter().find_map(|e| match e {
                SimEvent::UnitDied { unit, .. } => Some(*unit),
                _ => None,
            });
            if died.is_some() {
                break;
            }
        }
        assert_eq!(died, Some(light));
        assert_eq!(sim.wreckage().len(), 1);
        assert_eq!(sim.stats(FactionId(0)).kills, 1);
        assert_eq!(sim.stats(FactionId(1)).losses, 1);

        // Reaped on the following tick; no one targets it.
        sim.tick();
        assert!(sim.unit(light).is_none());
        assert!(sim.unit(heavy).unwrap().target.is_none());
    }

    #[test]
    fn test_siege_lock_stops_movement() {
        let mut sim = arena();
        let a = sim.spawn_unit("heavy", FactionId(0), Vec3::ZERO).unwrap();
        sim.order_move(&[a], Vec3::new(50.0, 0.0, 0.0), None).unwrap();
        sim.set_siege_lock(&[a], true).unwrap();
        for _ in 0..20 {
            sim.tick();
        }
        assert_eq!(sim.unit(a).unwrap().position, Vec3::ZERO);
    }

    #[test]
    fn test_same_seed_same_hash() {
        let run = || {
            let mut config = config();
            for profile in &mut config.factions {
                profile.ai_controlled = true;
                profile.aggression = 0.8;
            }
            let mut sim = Simulation::new(config);
            sim.add_factory(FactionId(0), Vec3::new(-60.0, 0.0, 0.0)).unwrap();
            sim.add_factory(FactionId(1), Vec3::new(60.0, 0.0, 0.0)).unwrap();
            for i in 0..4 {
                sim.spawn_unit("medium", FactionId(0), Vec3::new(-40.0, 0.0, i as f32 * 3.0))
                    .unwrap();
                sim.spawn_unit("light", FactionId(1), Vec3::new(40.0, 0.0, i as f32 * 3.0))
                    .unwrap();
            }
            for _ in 0..400 {
                sim.tick();
            }
            sim.state_hash()
        };
        assert_eq!(run(), run());
    }

    #[test]
    fn test_snapshot_lists_live_units() {
        let mut sim = arena();
        sim.spawn_unit("light", FactionId(0), Vec3::ZERO).unwrap();
        sim.spawn_unit("harvester", FactionId(1), Vec3::ONE).unwrap();
        let snap = sim.snapshot();
        assert_eq!(snap.units.len(), 2);
        assert_eq!(snap.factories.len(), 2);
        assert!(snap.units.iter().any(|u| u.class == UnitClass::Harvester));
        assert!(snap.units.iter().all(|u| u.health_fraction == 1.0));
    }

    #[test]
    fn test_ability_activation_goes_on_cooldown() {
        let config = SimConfig::default()
            .with_faction(
                FactionProfile::new(FactionId(0), "Blue")
                    .with_abilities(vec![AbilityKind::Overclock]),
            )
            .with_faction(FactionProfile::new(FactionId(1), "Red"));
        let mut sim = Simulation::new(config);
        sim.activate_ability(FactionId(0), AbilityKind::Overclock, AbilityTarget::None)
            .unwrap();
        assert!(matches!(
            sim.activate_ability(FactionId(0), AbilityKind::Overclock, AbilityTarget::None),
            Err(TacticsError::AbilityOnCooldown { .. })
        ));
        assert!(matches!(
            sim.activate_ability(FactionId(1), AbilityKind::Overclock, AbilityTarget::None),
            Err(TacticsError::AbilityUnavailable { .. })
        ));
    }
}
