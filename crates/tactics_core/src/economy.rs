//! Resource ledger, income and the harvester salvage economy.
//!
//! Currency comes from two places: passive income (an [`IncomeSource`]
//! standing in for districts and power grids) and harvesters stripping
//! wreckage or the ruins of destroyed factories and hauling the cargo home.

use std::collections::BTreeMap;
use std::fmt;

use glam::Vec3;
use serde::{Deserialize, Serialize};

use crate::components::{HarvesterState, SalvageRef, Unit, UnitClass};
use crate::error::{Result, TacticsError};
use crate::factions::{FactionId, FactionProfile};
use crate::math::{planar_distance, planar_distance_squared};

/// Salvage left by a destroyed factory.
pub const BUILDING_SALVAGE: f32 = 200.0;

/// Distance at which a harvester can work a wreck or ruin.
pub const HARVEST_RANGE: f32 = 3.0;

/// Distance from the factory at which cargo is deposited.
pub const DEPOSIT_RANGE: f32 = 5.0;

/// Salvage value of a wreck by the class of the unit that died.
#[must_use]
pub const fn salvage_value(class: UnitClass) -> f32 {
    match class {
        UnitClass::Light => 20.0,
        UnitClass::Medium => 35.0,
        UnitClass::Heavy => 50.0,
        UnitClass::Harvester => 15.0,
    }
}

/// Per-faction currency store.
pub trait ResourceLedger {
    /// Whole units of currency available.
    fn balance(&self, faction: FactionId) -> u32;

    /// Credit currency. Fractional amounts accumulate.
    fn add(&mut self, faction: FactionId, amount: f32);

    /// Debit currency.
    ///
    /// # Errors
    ///
    /// Returns [`TacticsError::InsufficientResources`] if the balance is too low.
    fn consume(&mut self, faction: FactionId, amount: u32) -> Result<()>;

    /// Check if `amount` can be paid.
    fn can_afford(&self, faction: FactionId, amount: u32) -> bool {
        self.balance(faction) >= amount
    }
}

/// Default in-memory ledger.
#[derive(Debug, Clone, Default)]
pub struct FactionLedger {
    balances: BTreeMap<FactionId, f32>,
}

impl FactionLedger {
    /// Create a ledger seeded with each profile's starting resources.
    #[must_use]
    pub fn from_profiles(profiles: &[FactionProfile]) -> Self {
        Self {
            balances: profiles
                .iter()
                .map(|p| (p.id, p.starting_resources as f32))
                .collect(),
        }
    }
}

impl ResourceLedger for FactionLedger {
    fn balance(&self, faction: FactionId) -> u32 {
        self.balances
            .get(&faction)
            .map_or(0, |b| b.max(0.0).floor() as u32)
    }

    fn add(&mut self, faction: FactionId, amount: f32) {
        if amount > 0.0 && amount.is_finite() {
            *self.balances.entry(faction).or_insert(0.0) += amount;
        }
    }

    fn consume(&mut self, faction: FactionId, amount: u32) -> Result<()> {
        let available = self.balance(faction);
        if available < amount {
            return Err(TacticsError::InsufficientResources {
                faction,
                required: amount,
                available,
            });
        }
        *self.balances.entry(faction).or_insert(0.0) -= amount as f32;
        Ok(())
    }
}

/// Passive income provider queried once per tick.
pub trait IncomeSource {
    /// Income earned by `faction` over `dt` seconds.
    fn income(&self, faction: FactionId, dt: f32) -> f32;
}

/// Flat per-second income taken from faction profiles.
#[derive(Debug, Clone, Default)]
pub struct FlatIncome {
    rates: BTreeMap<FactionId, f32>,
}

impl FlatIncome {
    /// Build from faction profiles.
    #[must_use]
    pub fn from_profiles(profiles: &[FactionProfile]) -> Self {
        Self {
            rates: profiles.iter().map(|p| (p.id, p.passive_income)).collect(),
        }
    }
}

impl IncomeSource for FlatIncome {
    fn income(&self, faction: FactionId, dt: f32) -> f32 {
        self.rates.get(&faction).map_or(0.0, |r| r.max(0.0) * dt)
    }
}

/// Unique identifier for wrecks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct WreckageId(pub u32);

impl fmt::Display for WreckageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "wreck#{}", self.0)
    }
}

/// Wreck left where a unit died.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Wreckage {
    /// Identifier.
    pub id: WreckageId,
    /// Position of the wreck.
    pub position: Vec3,
    /// Salvage left to strip.
    pub remaining: f32,
}

/// Ruin of a destroyed factory.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SalvageSite {
    /// Faction that owned the factory.
    pub owner: FactionId,
    /// Position of the ruin.
    pub position: Vec3,
    /// Salvage left to strip.
    pub remaining: f32,
}

/// All wrecks on the map.
#[derive(Debug, Clone, Default)]
pub struct WreckageField {
    wrecks: Vec<Wreckage>,
    next_id: u32,
}

impl WreckageField {
    /// Create an empty field.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Leave a wreck for a dead unit of `class`.
    pub fn spawn(&mut self, position: Vec3, class: UnitClass) -> WreckageId {
        self.next_id += 1;
        let id = WreckageId(self.next_id);
        self.wrecks.push(Wreckage {
            id,
            position,
            remaining: salvage_value(class),
        });
        id
    }

    /// Get a wreck by id.
    #[must_use]
    pub fn get(&self, id: WreckageId) -> Option<&Wreckage> {
        self.wrecks.iter().find(|w| w.id == id)
    }

    /// Number of wrecks.
    #[must_use]
    pub fn len(&self) -> usize {
        self.wrecks.len()
    }

    /// Check if there are no wrecks.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.wrecks.is_empty()
    }

    /// Iterate over wrecks.
    pub fn iter(&self) -> impl Iterator<Item = &Wreckage> {
        self.wrecks.iter()
    }

    /// Nearest wreck with salvage left.
    #[must_use]
    pub fn nearest(&self, point: Vec3) -> Option<&Wreckage> {
        self.wrecks
            .iter()
            .filter(|w| w.remaining > 0.0)
            .min_by(|a, b| {
                planar_distance_squared(a.position, point)
                    .total_cmp(&planar_distance_squared(b.position, point))
            })
    }

    /// Strip up to `amount` from a wreck. Returns what was taken.
    pub fn take(&mut self, id: WreckageId, amount: f32) -> f32 {
        let Some(wreck) = self.wrecks.iter_mut().find(|w| w.id == id) else {
            return 0.0;
        };
        let taken = amount.clamp(0.0, wreck.remaining);
        wreck.remaining -= taken;
        taken
    }

    /// Remove stripped wrecks.
    pub fn remove_depleted(&mut self) {
        self.wrecks.retain(|w| w.remaining > 0.0);
    }
}

/// What a harvester sees of the world when it picks its next step.
pub struct HarvestContext<'a> {
    /// Own factory position, if it stands.
    pub home: Option<Vec3>,
    /// Wrecks on the map.
    pub wreckage: &'a mut WreckageField,
    /// Ruins of destroyed factories.
    pub ruins: &'a mut [SalvageSite],
    /// Frame duration.
    pub dt: f32,
}

fn ruin_index(ruins: &[SalvageSite], owner: FactionId) -> Option<usize> {
    ruins
        .iter()
        .position(|r| r.owner == owner && r.remaining > 0.0)
}

/// Advance a harvester's work cycle. Returns cargo deposited this frame.
///
/// Sets the unit's destination; movement itself is left to navigation.
/// Non-harvesters and retreating harvesters are untouched.
pub fn step_harvester(unit: &mut Unit, ctx: &mut HarvestContext<'_>) -> Option<f32> {
    if unit.is_retreating || unit.is_dead {
        return None;
    }
    let position = unit.position;
    let harvester = unit.harvester.as_mut()?;
    let mut destination = None;
    let mut deposited = None;

    match harvester.state {
        HarvesterState::Idle => {
            if harvester.carried > 0.0 && ctx.home.is_some() {
                harvester.state = HarvesterState::Returning;
            } else if let Some(wreck) = ctx.wreckage.nearest(position) {
                harvester.state = HarvesterState::SeekingWreckage;
                harvester.salvage = Some(SalvageRef::Wreckage(wreck.id));
                destination = Some(wreck.position);
            } else if let Some(ruin) = ctx
                .ruins
                .iter()
                .filter(|r| r.remaining > 0.0)
                .min_by(|a, b| {
                    planar_distance_squared(a.position, position)
                        .total_cmp(&planar_distance_squared(b.position, position))
                })
            {
                harvester.state = HarvesterState::SeekingBuilding;
                harvester.salvage = Some(SalvageRef::Building(ruin.owner));
                destination = Some(ruin.position);
            }
        }
        HarvesterState::SeekingWreckage | HarvesterState::Harvesting => {
            let wreck = match harvester.salvage {
                Some(SalvageRef::Wreckage(id)) => {
                    ctx.wreckage.get(id).filter(|w| w.remaining > 0.0).copied()
                }
                _ => None,
            };
            match wreck {
                None => {
                    harvester.salvage = None;
                    harvester.state = next_after_work(harvester.carried, ctx.home);
                }
                Some(wreck) if harvester.state == HarvesterState::SeekingWreckage => {
                    destination = Some(wreck.position);
                    if planar_distance(position, wreck.position) <= HARVEST_RANGE {
                        harvester.state = HarvesterState::Harvesting;
                    }
                }
                Some(wreck) => {
                    destination = Some(position);
                    let room = harvester.capacity - harvester.carried;
                    harvester.carried += ctx
                        .wreckage
                        .take(wreck.id, (harvester.harvest_rate * ctx.dt).min(room));
                    let exhausted = ctx.wreckage.get(wreck.id).map_or(true, |w| w.remaining <= 0.0);
                    if harvester.is_full() || exhausted {
                        harvester.salvage = None;
                        harvester.state = next_after_work(harvester.carried, ctx.home);
                    }
                }
            }
        }
        HarvesterState::SeekingBuilding | HarvesterState::Salvaging => {
            let ruin = match harvester.salvage {
                Some(SalvageRef::Building(owner)) => ruin_index(ctx.ruins, owner),
                _ => None,
            };
            match ruin {
                None => {
                    harvester.salvage = None;
                    harvester.state = next_after_work(harvester.carried, ctx.home);
                }
                Some(idx) if harvester.state == HarvesterState::SeekingBuilding => {
                    let site = ctx.ruins[idx].position;
                    destination = Some(site);
                    if planar_distance(position, site) <= HARVEST_RANGE {
                        harvester.state = HarvesterState::Salvaging;
                    }
                }
                Some(idx) => {
                    destination = Some(position);
                    let site = &mut ctx.ruins[idx];
                    let room = harvester.capacity - harvester.carried;
                    let taken = (harvester.harvest_rate * ctx.dt).min(room).clamp(0.0, site.remaining);
                    site.remaining -= taken;
                    harvester.carried += taken;
                    if harvester.is_full() || site.remaining <= 0.0 {
                        harvester.salvage = None;
                        harvester.state = next_after_work(harvester.carried, ctx.home);
                    }
                }
            }
        }
        HarvesterState::Returning => match ctx.home {
            None => harvester.state = HarvesterState::Idle,
            Some(home) => {
                destination = Some(home);
                if planar_distance(position, home) <= DEPOSIT_RANGE {
                    deposited = Some(harvester.carried);
                    harvester.carried = 0.0;
                    harvester.state = HarvesterState::Idle;
                    destination = Some(position);
                }
            }
        },
    }

    if let Some(destination) = destination {
        unit.destination = destination;
    }
    deposited.filter(|amount| *amount > 0.0)
}

fn next_after_work(carried: f32, home: Option<Vec3>) -> HarvesterState {
    if carried > 0.0 && home.is_some() {
        HarvesterState::Returning
    } else {
        HarvesterState::Idle
    }
}
