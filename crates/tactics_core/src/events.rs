//! Discrete simulation events and read-only snapshots.
//!
//! Events carry ids and positions only; consumers look up anything else
//! from a snapshot taken between ticks.

use std::collections::BTreeMap;

use glam::Vec3;
use serde::{Deserialize, Serialize};

use crate::components::{Stance, UnitClass, UnitId};
use crate::economy::WreckageId;
use crate::factions::FactionId;

/// Kill streak tiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StreakLabel {
    /// Two kills.
    Double,
    /// Three kills.
    Triple,
    /// Four kills.
    Multi,
    /// Five or more kills.
    Rampage,
}

impl StreakLabel {
    /// Label for a streak length, `None` below two.
    #[must_use]
    pub const fn for_count(count: u32) -> Option<Self> {
        match count {
            0 | 1 => None,
            2 => Some(Self::Double),
            3 => Some(Self::Triple),
            4 => Some(Self::Multi),
            _ => Some(Self::Rampage),
        }
    }
}

/// Something that happened during a tick.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SimEvent {
    /// A unit was killed.
    UnitDied {
        /// The dead unit.
        unit: UnitId,
        /// Its faction.
        faction: FactionId,
        /// Its class.
        class: UnitClass,
        /// Where it died.
        position: Vec3,
        /// Unit credited with the kill, if still alive.
        killer: Option<UnitId>,
        /// Faction credited with the kill.
        killer_faction: FactionId,
    },
    /// A faction scored consecutive kills inside the streak window.
    KillStreak {
        /// Faction on the streak.
        faction: FactionId,
        /// Kills in the streak.
        count: u32,
        /// Streak tier.
        label: StreakLabel,
    },
    /// A unit reached a new veterancy level.
    LevelUp {
        /// Promoted unit.
        unit: UnitId,
        /// New level.
        level: u8,
    },
    /// A unit was produced.
    ProductionComplete {
        /// New unit.
        unit: UnitId,
        /// Producing faction.
        faction: FactionId,
        /// Template used.
        template: String,
    },
    /// A factory was destroyed.
    FactoryDestroyed {
        /// Owner of the factory.
        faction: FactionId,
        /// Faction that fired the last shot.
        destroyed_by: FactionId,
        /// Factory position.
        position: Vec3,
    },
    /// A wreck appeared.
    WreckageSpawned {
        /// New wreck.
        wreckage: WreckageId,
        /// Where it lies.
        position: Vec3,
    },
    /// A harvester delivered cargo.
    Deposit {
        /// Delivering harvester.
        unit: UnitId,
        /// Receiving faction.
        faction: FactionId,
        /// Amount credited.
        amount: f32,
    },
}

#[derive(Debug, Clone, Copy, Default)]
struct Streak {
    count: u32,
    last_kill: f32,
}

/// Tracks kill streaks per faction.
///
/// A kill within the window of the previous kill extends the streak; any
/// later kill starts a new streak at one.
#[derive(Debug, Clone)]
pub struct KillStreakTracker {
    window: f32,
    streaks: BTreeMap<FactionId, Streak>,
}

impl KillStreakTracker {
    /// Create a tracker with a streak window in seconds.
    #[must_use]
    pub fn new(window: f32) -> Self {
        Self {
            window,
            streaks: BTreeMap::new(),
        }
    }

    /// Record a kill at simulated time `now`. Returns the streak event, if any.
    pub fn record_kill(&mut self, faction: FactionId, now: f32) -> Option<SimEvent> {
        let streak = self.streaks.entry(faction).or_default();
        if streak.count > 0 && now - streak.last_kill <= self.window {
            streak.count += 1;
        } else {
            streak.count = 1;
        }
        streak.last_kill = now;
        StreakLabel::for_count(streak.count).map(|label| SimEvent::KillStreak {
            faction,
            count: streak.count,
            label,
        })
    }

    /// Current streak length of a faction.
    #[must_use]
    pub fn current(&self, faction: FactionId) -> u32 {
        self.streaks.get(&faction).map_or(0, |s| s.count)
    }
}

/// Read-only view of a unit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnitSnapshot {
    /// Unit id.
    pub id: UnitId,
    /// Owning faction.
    pub faction: FactionId,
    /// Unit class.
    pub class: UnitClass,
    /// Position.
    pub position: Vec3,
    /// Health as a fraction of max health.
    pub health_fraction: f32,
    /// Stance.
    pub stance: Stance,
    /// Veterancy level.
    pub veterancy: u8,
    /// Current target.
    pub target: Option<UnitId>,
    /// Retreating.
    pub is_retreating: bool,
}

/// Read-only view of a projectile.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ProjectileSnapshot {
    /// Position.
    pub position: Vec3,
    /// Unit travel direction.
    pub direction: Vec3,
}

/// Read-only view of a factory.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FactorySnapshot {
    /// Owner.
    pub faction: FactionId,
    /// Position.
    pub position: Vec3,
    /// Remaining health.
    pub health: f32,
    /// Still standing.
    pub alive: bool,
}

/// Everything a reader may observe between ticks.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SimSnapshot {
    /// Tick the snapshot was taken after.
    pub tick: u64,
    /// Simulated seconds elapsed.
    pub time: f32,
    /// Live units in registry order.
    pub units: Vec<UnitSnapshot>,
    /// Projectiles in flight.
    pub projectiles: Vec<ProjectileSnapshot>,
    /// Factories.
    pub factories: Vec<FactorySnapshot>,
}
