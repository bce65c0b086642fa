//! AI faction controller.
//!
//! Each computer-controlled faction runs three loops:
//!
//! - **Defense**: enemies massing near the factory switch the faction into
//!   defense mode and recall nearby or idle units into the defensive
//!   formation, heavies in front.
//! - **Production**: every spawn interval, pick a template the faction can
//!   afford (harvesters first when the economy is thin).
//! - **Attack waves**: a per-tick roll scaled by aggression sends idle
//!   combat units at the nearest standing enemy factory.
//!
//! The controller only decides. It returns [`AiOrder`]s that the
//! simulation applies, so it never touches the ledger or the registry.

use std::collections::BTreeMap;

use glam::Vec3;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::components::{UnitClass, UnitId};
use crate::config::{AiTuning, UnitTemplate};
use crate::factions::{FactionId, FactionProfile};
use crate::formation::{assign_slots, compute_positions, front_first};
use crate::math::{centroid, planar_direction, planar_distance, planar_distance_squared};
use crate::registry::UnitRegistry;

/// Spawn weights outside defense mode (heavy, medium, light).
pub const NORMAL_WEIGHTS: [(UnitClass, f32); 3] = [
    (UnitClass::Heavy, 0.2),
    (UnitClass::Medium, 0.35),
    (UnitClass::Light, 0.45),
];

/// Spawn weights in defense mode.
pub const DEFENSE_WEIGHTS: [(UnitClass, f32); 3] = [
    (UnitClass::Heavy, 0.45),
    (UnitClass::Medium, 0.4),
    (UnitClass::Light, 0.15),
];

/// Extra defenders recalled beyond the threat count.
pub const DEFENDER_MARGIN: usize = 2;

/// Per-faction controller state.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FactionAiState {
    /// Faction driven by this state.
    pub faction: FactionId,
    /// Seconds until the next spawn decision.
    pub spawn_timer: f32,
    /// Aggression in `[0, 1]`, fixed at creation.
    pub aggression: f32,
    /// Currently defending the factory.
    pub defending: bool,
    /// Threat count behind the last recall.
    pub last_threat_count: usize,
}

impl FactionAiState {
    /// Create controller state from a faction profile.
    #[must_use]
    pub fn new(profile: &FactionProfile, tuning: &AiTuning) -> Self {
        Self {
            faction: profile.id,
            spawn_timer: tuning.spawn_interval,
            aggression: profile.aggression.clamp(0.0, 1.0),
            defending: false,
            last_threat_count: 0,
        }
    }
}

/// Read-only inputs for one faction's decisions.
#[derive(Clone, Copy)]
pub struct AiView<'a> {
    /// The faction's profile.
    pub profile: &'a FactionProfile,
    /// All units.
    pub units: &'a UnitRegistry,
    /// Standing factories by owner.
    pub factories: &'a BTreeMap<FactionId, Vec3>,
    /// Current ledger balance.
    pub balance: u32,
    /// Available templates.
    pub templates: &'a [UnitTemplate],
    /// Tuning values.
    pub tuning: &'a AiTuning,
    /// Formation slot spacing.
    pub spacing: f32,
}

/// A decision for the simulation to carry out.
#[derive(Debug, Clone, PartialEq)]
pub enum AiOrder {
    /// Produce a unit from a template at the factory.
    Spawn {
        /// Template id.
        template: String,
    },
    /// Send units to positions.
    Move {
        /// Unit and slot pairs.
        orders: Vec<(UnitId, Vec3)>,
        /// Engage anything met on the way.
        attack_move: bool,
    },
}

/// Run one tick of decisions for a faction.
pub fn think<R: Rng + ?Sized>(
    state: &mut FactionAiState,
    view: &AiView<'_>,
    dt: f32,
    rng: &mut R,
) -> Vec<AiOrder> {
    let mut orders = Vec::new();
    let own_factory = view.factories.get(&state.faction).copied();

    if let Some(factory) = own_factory {
        if let Some(recall) = defend(state, view, factory, rng) {
            orders.push(recall);
        }

        state.spawn_timer -= dt;
        if state.spawn_timer <= 0.0 {
            state.spawn_timer += view.tuning.spawn_interval.max(dt);
            if let Some(template) = spawn_decision(state, view, rng) {
                tracing::debug!("{} AI spawning {}", state.faction, template.id);
                orders.push(AiOrder::Spawn {
                    template: template.id.clone(),
                });
            }
        }
    } else {
        state.defending = false;
    }

    if !state.defending && rng.gen::<f32>() < state.aggression * dt * view.tuning.attack_rate {
        if let Some(wave) = attack_wave(state.faction, view, own_factory, rng) {
            orders.push(wave);
        }
    }

    orders
}

fn defend<R: Rng + ?Sized>(
    state: &mut FactionAiState,
    view: &AiView<'_>,
    factory: Vec3,
    rng: &mut R,
) -> Option<AiOrder> {
    let threats: Vec<Vec3> = view
        .units
        .iter_alive()
        .filter(|u| {
            u.faction != state.faction
                && u.class != UnitClass::Harvester
                && planar_distance(u.position, factory) <= view.tuning.defense_radius
        })
        .map(|u| u.position)
        .collect();

    if threats.len() < view.tuning.defense_trigger {
        if state.defending {
            tracing::debug!("{} AI leaves defense mode", state.faction);
        }
        state.defending = false;
        state.last_threat_count = 0;
        return None;
    }

    let changed = !state.defending || threats.len() != state.last_threat_count;
    state.defending = true;
    state.last_threat_count = threats.len();
    if !changed {
        return None;
    }

    let threat_center = centroid(&threats)?;
    let wanted = (threats.len() + DEFENDER_MARGIN).min(view.tuning.max_defenders);
    let mut defenders: Vec<(UnitClass, f32, UnitId, Vec3)> = view
        .units
        .faction_units(state.faction)
        .filter(|u| u.can_fight() && !u.is_retreating)
        .filter(|u| u.is_idle() || planar_distance(u.position, factory) > view.tuning.far_distance)
        .map(|u| (u.class, planar_distance_squared(u.position, factory), u.id, u.position))
        .collect();
    defenders.sort_by(|a, b| {
        class_rank(a.0)
            .cmp(&class_rank(b.0))
            .then(a.1.total_cmp(&b.1))
            .then(a.2.cmp(&b.2))
    });
    defenders.truncate(wanted);
    if defenders.is_empty() {
        return None;
    }

    let anchor = (factory + threat_center) * 0.5;
    let facing = planar_direction(factory, threat_center);
    let slots = front_first(
        compute_positions(
            anchor,
            defenders.len(),
            facing,
            view.profile.defense_formation,
            view.spacing,
            rng,
        ),
        anchor,
        facing,
    );
    tracing::debug!(
        "{} AI recalls {} defenders against {} threats",
        state.faction,
        defenders.len(),
        threats.len()
    );

    // Heavies come first in `defenders`, front slots first in `slots`.
    Some(AiOrder::Move {
        orders: defenders
            .iter()
            .zip(slots)
            .map(|(d, slot)| (d.2, slot))
            .collect(),
        attack_move: true,
    })
}

const fn class_rank(class: UnitClass) -> u8 {
    match class {
        UnitClass::Heavy => 0,
        UnitClass::Medium => 1,
        UnitClass::Light => 2,
        UnitClass::Harvester => 3,
    }
}

fn spawn_decision<'t, R: Rng + ?Sized>(
    state: &FactionAiState,
    view: &AiView<'t>,
    rng: &mut R,
) -> Option<&'t UnitTemplate> {
    let own = view.units.faction_units(state.faction).count();
    if own >= view.tuning.max_units {
        return None;
    }
    let harvesters = view.units.count_class(state.faction, UnitClass::Harvester);
    choose_spawn(
        view.balance,
        harvesters,
        own,
        state.defending,
        view.templates,
        view.tuning,
        rng,
    )
}

/// Pick the next template to produce, or `None` if nothing is affordable.
///
/// Outside defense mode a harvester comes first while the faction has fewer
/// than the minimum or their share of the army is under the target ratio.
/// Otherwise a weighted roll over combat classes, restricted to affordable
/// templates.
pub fn choose_spawn<'t, R: Rng + ?Sized>(
    balance: u32,
    harvesters: usize,
    total_units: usize,
    defending: bool,
    templates: &'t [UnitTemplate],
    tuning: &AiTuning,
    rng: &mut R,
) -> Option<&'t UnitTemplate> {
    let for_class = move |class: UnitClass| {
        templates
            .iter()
            .find(|t| t.class == class)
            .filter(|t| t.cost <= balance)
    };

    if !templates.iter().any(|t| t.cost <= balance) {
        return None;
    }

    if !defending {
        let ratio = if total_units == 0 {
            0.0
        } else {
            harvesters as f32 / total_units as f32
        };
        if harvesters < tuning.min_harvesters || ratio < tuning.harvester_ratio {
            if let Some(harvester) = for_class(UnitClass::Harvester) {
                return Some(harvester);
            }
        }
    }

    let weights = if defending {
        DEFENSE_WEIGHTS
    } else {
        NORMAL_WEIGHTS
    };
    let affordable: Vec<(&UnitTemplate, f32)> = weights
        .iter()
        .filter_map(|&(class, weight)| for_class(class).map(|t| (t, weight)))
        .collect();
    let total: f32 = affordable.iter().map(|(_, w)| w).sum();
    if affordable.is_empty() || total <= 0.0 {
        return None;
    }

    let mut roll = rng.gen::<f32>() * total;
    for (template, weight) in &affordable {
        if roll < *weight {
            return Some(*template);
        }
        roll -= weight;
    }
    affordable.last().map(|(t, _)| *t)
}

fn attack_wave<R: Rng + ?Sized>(
    faction: FactionId,
    view: &AiView<'_>,
    own_factory: Option<Vec3>,
    rng: &mut R,
) -> Option<AiOrder> {
    let wave: Vec<(UnitId, Vec3)> = view
        .units
        .faction_units(faction)
        .filter(|u| u.can_fight() && u.is_idle() && !u.siege_locked)
        .take(view.tuning.wave_size)
        .map(|u| (u.id, u.position))
        .collect();
    if wave.is_empty() {
        return None;
    }
    let positions: Vec<Vec3> = wave.iter().map(|w| w.1).collect();
    let origin = own_factory.or_else(|| centroid(&positions))?;

    let (target_faction, target) = view
        .factories
        .iter()
        .filter(|(owner, _)| **owner != faction)
        .min_by(|a, b| {
            planar_distance_squared(*a.1, origin).total_cmp(&planar_distance_squared(*b.1, origin))
        })
        .map(|(owner, pos)| (*owner, *pos))?;

    let center = centroid(&positions)?;
    let facing = planar_direction(center, target);
    let slots = compute_positions(
        target,
        wave.len(),
        facing,
        view.profile.attack_formation,
        view.spacing,
        rng,
    );
    tracing::debug!(
        "{} AI attack wave of {} toward {} factory",
        faction,
        wave.len(),
        target_faction
    );
    Some(AiOrder::Move {
        orders: assign_slots(&wave, &slots),
        attack_move: true,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::{CombatStats, Unit};
    use rand::rngs::mock::StepRng;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn templates() -> Vec<UnitTemplate> {
        UnitClass::ALL.iter().map(|c| UnitTemplate::standard(*c)).collect()
    }

    fn combat(faction: u8, class: UnitClass, x: f32) -> Unit {
        Unit::new(
            FactionId(faction),
            class,
            CombatStats::new(100.0, 10.0, 20.0, 1.0),
            5.0,
            Vec3::new(x, 0.0, 0.0),
        )
    }

    #[test]
    fn test_thin_economy_spawns_harvester() {
        let templates = templates();
        let tuning = AiTuning::default();
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let pick = choose_spawn(150, 0, 0, false, &templates, &tuning, &mut rng).unwrap();
        assert_eq!(pick.class, UnitClass::Harvester);
        assert_eq!(pick.cost, 50);
    }

    #[test]
    fn test_nothing_affordable_skips() {
        let templates = templates();
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        assert!(choose_spawn(10, 0, 0, false, &templates, &AiTuning::default(), &mut rng).is_none());
    }

    #[test]
    fn test_defense_mode_never_builds_harvesters() {
        let templates = templates();
        let tuning = AiTuning::default();
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        for _ in 0..50 {
            let pick = choose_spawn(1000, 0, 10, true, &templates, &tuning, &mut rng).unwrap();
            assert!(pick.class.is_combat());
        }
    }

    #[test]
    fn test_roll_respects_affordability() {
        let templates = templates();
        let tuning = AiTuning::default();
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        // Enough harvesters; 70 only buys a light.
        for _ in 0..20 {
            let pick = choose_spawn(70, 4, 10, false, &templates, &tuning, &mut rng).unwrap();
            assert_eq!(pick.class, UnitClass::Light);
        }
    }

    #[test]
    fn test_defense_recall_puts_heavy_in_front() {
        let profile = FactionProfile::new(FactionId(0), "Blue").with_ai(0.0);
        let tuning = AiTuning::default();
        let templates = templates();
        let mut units = UnitRegistry::new();
        let light = units.insert(combat(0, UnitClass::Light, 5.0));
        let heavy = units.insert(combat(0, UnitClass::Heavy, -5.0));
        units.insert(combat(1, UnitClass::Light, 30.0));
        units.insert(combat(1, UnitClass::Light, 32.0));
        let mut factories = BTreeMap::new();
        factories.insert(FactionId(0), Vec3::ZERO);

        let view = AiView {
            profile: &profile,
            units: &units,
            factories: &factories,
            balance: 0,
            templates: &templates,
            tuning: &tuning,
            spacing: 4.0,
        };
        let mut state = FactionAiState::new(&profile, &tuning);
        let mut rng = StepRng::new(u64::MAX, 0);
        let orders = think(&mut state, &view, 0.05, &mut rng);
        assert!(state.defending);

        let AiOrder::Move { orders: moves, attack_move } = &orders[0] else {
            panic!("expected a recall");
        };
        assert!(*attack_move);
        let slot = |id| moves.iter().find(|(u, _)| *u == id).unwrap().1;
        assert!(slot(heavy).x >= slot(light).x);

        // Same threat count: no new recall.
        let again = think(&mut state, &view, 0.05, &mut rng);
        assert!(again.iter().all(|o| !matches!(o, AiOrder::Move { .. })));
    }

    #[test]
    fn test_attack_wave_targets_enemy_factory() {
        let profile = FactionProfile::new(FactionId(0), "Blue").with_ai(1.0);
        let tuning = AiTuning {
            attack_rate: 1000.0,
            ..AiTuning::default()
        };
        let templates = templates();
        let mut units = UnitRegistry::new();
        for i in 0..7 {
            units.insert(combat(0, UnitClass::Medium, i as f32));
        }
        let mut factories = BTreeMap::new();
        factories.insert(FactionId(0), Vec3::ZERO);
        factories.insert(FactionId(1), Vec3::new(200.0, 0.0, 0.0));

        let view = AiView {
            profile: &profile,
            units: &units,
            factories: &factories,
            balance: 0,
            templates: &templates,
            tuning: &tuning,
            spacing: 4.0,
        };
        let mut state = FactionAiState::new(&profile, &tuning);
        let mut rng = ChaCha8Rng::seed_from_u64(5);
        let orders = think(&mut state, &view, 0.05, &mut rng);
        let wave = orders
            .iter()
            .find_map(|o| match o {
                AiOrder::Move { orders, attack_move: true } => Some(orders),
                _ => None,
            })
            .unwrap();
        assert_eq!(wave.len(), 5);
        assert!(wave.iter().all(|(_, p)| planar_distance(*p, Vec3::new(200.0, 0.0, 0.0)) < 30.0));
    }

    #[test]
    fn test_spawn_timer_gates_production() {
        let profile = FactionProfile::new(FactionId(0), "Blue").with_ai(0.0);
        let tuning = AiTuning::default();
        let templates = templates();
        let units = UnitRegistry::new();
        let mut factories = BTreeMap::new();
        factories.insert(FactionId(0), Vec3::ZERO);
        let view = AiView {
            profile: &profile,
            units: &units,
            factories: &factories,
            balance: 500,
            templates: &templates,
            tuning: &tuning,
            spacing: 4.0,
        };
        let mut state = FactionAiState::new(&profile, &tuning);
        let mut rng = ChaCha8Rng::seed_from_u64(2);
        let mut spawns = 0;
        for _ in 0..210 {
            spawns += think(&mut state, &view, 0.05, &mut rng)
                .iter()
                .filter(|o| matches!(o, AiOrder::Spawn { .. }))
                .count();
        }
        // 10 simulated seconds.
        assert_eq!(spawns, 2);
    }
}
