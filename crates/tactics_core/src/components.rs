//! Unit record definitions.
//!
//! A [`Unit`] is a flat, fixed-schema record owned by the
//! [`UnitRegistry`](crate::registry::UnitRegistry). Other components refer to
//! units only by [`UnitId`] and revalidate the id before every use.

use std::fmt;

use glam::Vec3;
use serde::{Deserialize, Serialize};

use crate::economy::WreckageId;
use crate::factions::FactionId;
use crate::veterancy::Veterancy;

/// Unique identifier for units. Allocated from a monotonic counter and never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct UnitId(pub u32);

impl fmt::Display for UnitId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unit#{}", self.0)
    }
}

/// Unit class. Drives targeting priority, retreat thresholds and AI production.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum UnitClass {
    /// Fast, fragile skirmishers.
    Light,
    /// Line infantry and light vehicles.
    Medium,
    /// Slow, durable anchors of the battle line.
    Heavy,
    /// Unarmed economic unit that salvages wreckage.
    Harvester,
}

impl UnitClass {
    /// All classes, in production-menu order.
    pub const ALL: [UnitClass; 4] = [
        UnitClass::Light,
        UnitClass::Medium,
        UnitClass::Heavy,
        UnitClass::Harvester,
    ];

    /// Whether units of this class fight.
    #[must_use]
    pub const fn is_combat(self) -> bool {
        !matches!(self, Self::Harvester)
    }

    /// Short lowercase name used for template ids and logs.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Light => "light",
            Self::Medium => "medium",
            Self::Heavy => "heavy",
            Self::Harvester => "harvester",
        }
    }
}

/// Engagement stance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Stance {
    /// Chase and engage anything that gets selected as a target.
    #[default]
    Aggressive,
    /// Engage nearby threats, but fall back when outnumbered.
    Defensive,
    /// Never move to engage and never retreat.
    HoldPosition,
}

/// Splash parameters of a weapon.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Splash {
    /// Radius around the impact point.
    pub radius: f32,
    /// Damage factor at the radius boundary, in `[0, 1]`.
    pub edge_falloff: f32,
}

impl Splash {
    /// Create splash parameters, clamping the falloff into `[0, 1]`.
    #[must_use]
    pub fn new(radius: f32, edge_falloff: f32) -> Self {
        Self {
            radius: radius.max(0.0),
            edge_falloff: edge_falloff.clamp(0.0, 1.0),
        }
    }
}

/// Combat statistics for a unit.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CombatStats {
    /// Current health, always within `[0, max_health]`.
    pub health: f32,
    /// Current maximum health (base scaled by veterancy).
    pub max_health: f32,
    /// Maximum health before veterancy scaling.
    pub base_max_health: f32,
    /// Damage per shot.
    pub damage: f32,
    /// Attack range in world units.
    pub attack_range: f32,
    /// Attacks per second.
    pub attack_speed: f32,
    /// Fractional damage reduction in `[0, 1]`.
    pub armor: f32,
    /// Optional splash; `None` means single-target.
    pub splash: Option<Splash>,
}

impl CombatStats {
    /// Create new combat stats at full health.
    #[must_use]
    pub fn new(max_health: f32, damage: f32, attack_range: f32, attack_speed: f32) -> Self {
        let max_health = max_health.max(1.0);
        Self {
            health: max_health,
            max_health,
            base_max_health: max_health,
            damage: damage.max(0.0),
            attack_range: attack_range.max(0.0),
            attack_speed,
            armor: 0.0,
            splash: None,
        }
    }

    /// Builder method to set armor.
    #[must_use]
    pub fn with_armor(mut self, armor: f32) -> Self {
        self.armor = armor.clamp(0.0, 1.0);
        self
    }

    /// Builder method to set splash damage.
    #[must_use]
    pub fn with_splash(mut self, radius: f32, edge_falloff: f32) -> Self {
        self.splash = (radius > 0.0).then(|| Splash::new(radius, edge_falloff));
        self
    }

    /// Health as a fraction of max health.
    #[must_use]
    pub fn health_fraction(&self) -> f32 {
        if self.max_health <= 0.0 {
            0.0
        } else {
            (self.health / self.max_health).clamp(0.0, 1.0)
        }
    }

    /// Subtract health, clamped at zero. Returns the health actually removed.
    pub fn apply_damage(&mut self, amount: f32) -> f32 {
        let amount = amount.max(0.0);
        let actual = amount.min(self.health);
        self.health = (self.health - actual).clamp(0.0, self.max_health);
        actual
    }

    /// Check if health has reached zero.
    #[must_use]
    pub fn is_depleted(&self) -> bool {
        self.health <= 0.0
    }
}

/// Navigation scratch state for local obstacle avoidance.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct NavState {
    /// Pending detour waypoint, steered toward instead of the destination.
    pub waypoint: Option<Vec3>,
    /// Seconds of continuous insufficient progress.
    pub stuck_timer: f32,
    /// Seconds since the last path recalculation.
    pub recalc_timer: f32,
    /// Position observed at the end of the previous frame.
    pub last_position: Vec3,
    /// Unobstructed displacement expected during the previous frame.
    pub last_expected: f32,
}

impl NavState {
    /// Reset timers and drop any detour, anchoring at `position`.
    pub fn reset(&mut self, position: Vec3) {
        self.waypoint = None;
        self.stuck_timer = 0.0;
        self.recalc_timer = 0.0;
        self.last_position = position;
        self.last_expected = 0.0;
    }
}

/// Harvester work cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum HarvesterState {
    /// Waiting for salvage to appear.
    #[default]
    Idle,
    /// Driving toward a wreck.
    SeekingWreckage,
    /// Stripping a wreck.
    Harvesting,
    /// Carrying cargo back to the factory.
    Returning,
    /// Driving toward a destroyed factory.
    SeekingBuilding,
    /// Stripping a destroyed factory.
    Salvaging,
}

/// What a harvester is currently working on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SalvageRef {
    /// A wreck left by a dead unit.
    Wreckage(WreckageId),
    /// The ruin of a destroyed factory, identified by its owner.
    Building(FactionId),
}

/// Harvester-only state.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HarvesterData {
    /// Current work-cycle state.
    pub state: HarvesterState,
    /// Resources currently carried.
    pub carried: f32,
    /// Maximum cargo.
    pub capacity: f32,
    /// Resources stripped per second.
    pub harvest_rate: f32,
    /// Salvage being worked, if any.
    pub salvage: Option<SalvageRef>,
}

impl HarvesterData {
    /// Create an idle, empty harvester.
    #[must_use]
    pub fn new(capacity: f32, harvest_rate: f32) -> Self {
        Self {
            state: HarvesterState::Idle,
            carried: 0.0,
            capacity: capacity.max(1.0),
            harvest_rate: harvest_rate.max(0.0),
            salvage: None,
        }
    }

    /// Check if the cargo hold is full.
    #[must_use]
    pub fn is_full(&self) -> bool {
        self.carried >= self.capacity
    }
}

/// A live combatant or economic actor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Unit {
    /// Stable identifier.
    pub id: UnitId,
    /// Owning faction.
    pub faction: FactionId,
    /// Unit class.
    pub class: UnitClass,
    /// Template this unit was spawned from, if any.
    pub template: Option<String>,
    /// Combat statistics.
    pub stats: CombatStats,
    /// Base movement speed in world units per second.
    pub speed: f32,
    /// Collision radius used for obstacle queries.
    pub radius: f32,
    /// Current world position.
    pub position: Vec3,
    /// Order destination.
    pub destination: Vec3,
    /// Currently selected attack target.
    pub target: Option<UnitId>,
    /// Enemy explicitly ordered to attack.
    pub pursued: Option<UnitId>,
    /// Seconds until the next shot; never negative.
    pub cooldown: f32,
    /// Seconds until the target search may run again.
    pub target_search_timer: f32,
    /// Flagged on death, reaped on the following tick.
    pub is_dead: bool,
    /// Whether the unit moved during the last frame.
    pub is_moving: bool,
    /// Engage anything encountered while moving.
    pub attack_move: bool,
    /// Engagement stance.
    pub stance: Stance,
    /// Currently retreating toward `destination`.
    pub is_retreating: bool,
    /// Immobile, with extended range.
    pub siege_locked: bool,
    /// Untargetable by enemies.
    pub is_cloaked: bool,
    /// Untargetable, immune to damage, and unable to fire.
    pub is_phased: bool,
    /// Local navigation scratch state.
    pub nav: NavState,
    /// Experience and kills.
    pub veterancy: Veterancy,
    /// Present only for harvesters.
    pub harvester: Option<HarvesterData>,
}

impl Unit {
    /// Create a new unit at `position`. The id is assigned by the registry.
    #[must_use]
    pub fn new(faction: FactionId, class: UnitClass, stats: CombatStats, speed: f32, position: Vec3) -> Self {
        let mut nav = NavState::default();
        nav.reset(position);
        Self {
            id: UnitId(0),
            faction,
            class,
            template: None,
            stats,
            speed: speed.max(0.0),
            radius: 1.0,
            position,
            destination: position,
            target: None,
            pursued: None,
            cooldown: 0.0,
            target_search_timer: 0.0,
            is_dead: false,
            is_moving: false,
            attack_move: false,
            stance: Stance::default(),
            is_retreating: false,
            siege_locked: false,
            is_cloaked: false,
            is_phased: false,
            nav,
            veterancy: Veterancy::default(),
            harvester: (class == UnitClass::Harvester).then(|| HarvesterData::new(50.0, 10.0)),
        }
    }

    /// Builder method to set the template id.
    #[must_use]
    pub fn with_template(mut self, template: impl Into<String>) -> Self {
        self.template = Some(template.into());
        self
    }

    /// Builder method to set the stance.
    #[must_use]
    pub fn with_stance(mut self, stance: Stance) -> Self {
        self.stance = stance;
        self
    }

    /// Check if the unit is alive (not flagged dead).
    #[must_use]
    pub const fn is_alive(&self) -> bool {
        !self.is_dead
    }

    /// Check if enemies may select this unit as a target.
    #[must_use]
    pub const fn is_targetable(&self) -> bool {
        !self.is_dead && !self.is_cloaked && !self.is_phased
    }

    /// Check if the unit can shoot at all.
    #[must_use]
    pub fn can_fight(&self) -> bool {
        self.is_alive() && self.class.is_combat() && self.stats.damage > 0.0 && !self.is_phased
    }

    /// Idle: not moving, no target, not retreating.
    #[must_use]
    pub fn is_idle(&self) -> bool {
        self.is_alive() && !self.is_moving && self.target.is_none() && !self.is_retreating
    }

    /// Give the unit a plain move order, dropping any attack intent.
    pub fn order_move(&mut self, destination: Vec3, attack_move: bool) {
        self.destination = destination;
        self.attack_move = attack_move;
        self.pursued = None;
        self.is_retreating = false;
        self.nav.waypoint = None;
        self.nav.recalc_timer = 0.0;
    }
}
