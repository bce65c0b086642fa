//! Combat resolution pipeline.
//!
//! Firing and hit resolution are split across two passes per tick:
//!
//! 1. [`fire_weapons`]: every armed unit whose cooldown has run out shoots
//!    at its target (or at an enemy factory when it has no unit target).
//!    Misses are rolled here and fly toward a scattered aim point with no
//!    target.
//! 2. [`advance_projectiles`]: projectiles move, collide with static
//!    geometry, and resolve on direct impact or on expiry.
//!
//! Hit resolution order: faction dodge, crit, mark, evasion field, faction
//! mechanics, armor, health. Splash follows a direct hit and is the only
//! damage a miss deals.

use glam::Vec3;
use rand::{Rng, RngCore};

use crate::abilities::AbilitySystem;
use crate::components::{Splash, Unit, UnitClass, UnitId};
use crate::config::CombatTuning;
use crate::events::SimEvent;
use crate::experience::{ExperiencePool, XpCategory};
use crate::factions::FactionId;
use crate::factory::{Factory, FACTORY_RADIUS};
use crate::math::{planar_distance, random_planar_offset};
use crate::mechanics::FactionMechanics;
use crate::navigation::ObstacleQuery;
use crate::projectile::{Projectile, ProjectileList, ProjectileTarget};
use crate::registry::UnitRegistry;
use crate::targeting::effective_range;
use crate::veterancy::{kill_xp, XP_PER_DAMAGE};

/// Floor on attacks per second when computing cooldowns.
pub const MIN_ATTACK_RATE: f32 = 0.1;

/// Share of kill experience the losing faction earns as Survival.
pub const SURVIVAL_XP_SHARE: f32 = 0.5;

/// Seconds between shots.
///
/// `1 / max(attack_speed × xp_multiplier, 0.1)`.
#[must_use]
pub fn attack_cooldown(attack_speed: f32, xp_multiplier: f32) -> f32 {
    1.0 / (attack_speed * xp_multiplier).max(MIN_ATTACK_RATE)
}

/// Miss chance for a shooter.
#[must_use]
pub fn miss_chance(tuning: &CombatTuning, moving: bool) -> f32 {
    let penalty = if moving { tuning.moving_miss_penalty } else { 0.0 };
    (tuning.base_miss_chance + penalty).clamp(0.0, 1.0)
}

/// Splash damage at `distance` from the impact, before armor.
///
/// Scales linearly from `base × factor` at the center to
/// `base × edge_falloff × factor` at the radius; zero beyond it.
#[must_use]
pub fn splash_damage(base: f32, distance: f32, splash: Splash, factor: f32) -> f32 {
    if splash.radius <= 0.0 || distance > splash.radius {
        return 0.0;
    }
    let t = distance / splash.radius;
    base * (1.0 - t * (1.0 - splash.edge_falloff)) * factor
}

/// Damage left after fractional armor.
#[must_use]
pub fn armor_reduce(damage: f32, armor: f32) -> f32 {
    damage * (1.0 - armor.clamp(0.0, 1.0))
}

/// Damage a unit's shot carries before the faction-mechanics hook.
#[must_use]
pub fn outgoing_damage(unit: &Unit, xp_multiplier: f32, ability_multiplier: f32) -> f32 {
    unit.stats.damage * unit.veterancy.damage_multiplier() * xp_multiplier * ability_multiplier
}

/// Apply a veterancy promotion: max health grows, current health stays.
pub fn promote(unit: &mut Unit) {
    unit.stats.max_health = unit.stats.base_max_health * unit.veterancy.health_multiplier();
    unit.stats.health = unit.stats.health.clamp(0.0, unit.stats.max_health);
}

/// Collaborators the combat passes read and write.
pub struct CombatWorld<'a> {
    /// Unit registry.
    pub units: &'a mut UnitRegistry,
    /// Projectiles in flight.
    pub projectiles: &'a mut ProjectileList,
    /// Factories.
    pub factories: &'a mut [Factory],
    /// Ability modifiers.
    pub abilities: &'a AbilitySystem,
    /// Faction damage hooks.
    pub mechanics: &'a dyn FactionMechanics,
    /// Faction experience pools.
    pub experience: &'a mut dyn ExperiencePool,
    /// Static geometry.
    pub obstacles: &'a dyn ObstacleQuery,
    /// Tuning values.
    pub tuning: &'a CombatTuning,
    /// Random source for miss, crit, dodge and evasion rolls.
    pub rng: &'a mut dyn RngCore,
}

/// A unit killed during combat, handed to the death-reaction hook.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DeathRecord {
    /// Dead unit.
    pub unit: UnitId,
    /// Its faction.
    pub faction: FactionId,
    /// Its class.
    pub class: UnitClass,
    /// Where it died.
    pub position: Vec3,
    /// Killer, if still alive.
    pub killer: Option<UnitId>,
    /// Killer's faction.
    pub killer_faction: FactionId,
}

/// What happened during one combat step.
#[derive(Debug, Clone, Default)]
pub struct CombatReport {
    /// Shots fired.
    pub shots_fired: usize,
    /// Direct hits that dealt damage.
    pub hits: usize,
    /// Units killed.
    pub deaths: Vec<DeathRecord>,
    /// Level-ups and destroyed factories.
    pub events: Vec<SimEvent>,
}

/// Run both combat passes.
pub fn run_combat(world: &mut CombatWorld<'_>, dt: f32) -> CombatReport {
    let mut report = CombatReport::default();
    fire_weapons(world, dt, &mut report);
    advance_projectiles(world, dt, &mut report);
    report
}

/// Tick cooldowns and fire every ready weapon.
pub fn fire_weapons(world: &mut CombatWorld<'_>, dt: f32, report: &mut CombatReport) {
    for id in world.units.ids() {
        let Some(unit) = world.units.get_mut(id) else {
            continue;
        };
        if !unit.is_alive() {
            continue;
        }
        unit.cooldown = (unit.cooldown - dt).max(0.0);
        if unit.cooldown > 0.0 || !unit.can_fight() || unit.is_retreating {
            continue;
        }

        let units: &UnitRegistry = world.units;
        let Some(unit) = units.get(id) else {
            continue;
        };
        let range = effective_range(unit, world.tuning.siege_range_multiplier);

        let aim = match unit.target {
            Some(target_id) => units
                .get_alive(target_id)
                .filter(|t| {
                    t.faction != unit.faction
                        && t.is_targetable()
                        && planar_distance(unit.position, t.position) <= range
                })
                .map(|t| (ProjectileTarget::Unit(t.id), t.position)),
            None => world
                .factories
                .iter()
                .filter(|f| {
                    f.alive
                        && f.faction != unit.faction
                        && planar_distance(unit.position, f.position) <= range + FACTORY_RADIUS
                })
                .min_by(|a, b| {
                    planar_distance(unit.position, a.position)
                        .total_cmp(&planar_distance(unit.position, b.position))
                })
                .map(|f| (ProjectileTarget::Factory(f.faction), f.position)),
        };
        let Some((mut target, mut aim_point)) = aim else {
            continue;
        };

        let damage = world.mechanics.apply_outgoing_damage(
            unit,
            outgoing_damage(
                unit,
                world.experience.damage_multiplier(unit.faction),
                world.abilities.damage_multiplier(unit.faction),
            ),
            units,
        );

        if world.rng.gen::<f32>() < miss_chance(world.tuning, unit.is_moving) {
            aim_point += random_planar_offset(&mut *world.rng, world.tuning.miss_scatter);
            target = ProjectileTarget::None;
        }

        let offset = aim_point - unit.position;
        let distance = offset.length();
        let speed = world.tuning.projectile_speed.max(1.0);
        let projectile = Projectile {
            origin_faction: unit.faction,
            origin_unit: unit.id,
            position: unit.position,
            direction: offset.normalize_or_zero(),
            speed,
            damage,
            splash: unit.stats.splash,
            target,
            lifetime: distance / speed,
        };
        let cooldown = attack_cooldown(
            unit.stats.attack_speed,
            world.experience.attack_speed_multiplier(unit.faction),
        );

        world.projectiles.push(projectile);
        report.shots_fired += 1;
        if let Some(unit) = world.units.get_mut(id) {
            unit.cooldown = cooldown;
        }
    }
}

/// Move projectiles and resolve the ones that hit or expire.
pub fn advance_projectiles(world: &mut CombatWorld<'_>, dt: f32, report: &mut CombatReport) {
    let mut survivors = Vec::with_capacity(world.projectiles.len());

    for mut projectile in world.projectiles.drain() {
        let from = projectile.position;
        // Never travel past the aim point.
        let travel = dt.min(projectile.lifetime.max(0.0));
        let to = from + projectile.direction * projectile.speed * travel;
        projectile.lifetime -= dt;
        if !world.obstacles.has_clear_path(from, to, 0.0) {
            continue;
        }
        projectile.position = to;
        let expired = projectile.lifetime <= 0.0;

        match projectile.target {
            ProjectileTarget::Unit(target_id) => {
                match world.units.get_alive(target_id).map(|u| u.position) {
                    Some(target_pos) => {
                        if expired
                            || planar_distance(to, target_pos) <= world.tuning.hit_radius
                        {
                            resolve_unit_hit(world, &projectile, target_id, report);
                            continue;
                        }
                    }
                    None => projectile.target = ProjectileTarget::None,
                }
            }
            ProjectileTarget::Factory(owner) => {
                match world.factories.iter().position(|f| f.faction == owner && f.alive) {
                    Some(idx) => {
                        let factory_pos = world.factories[idx].position;
                        if expired || planar_distance(to, factory_pos) <= FACTORY_RADIUS {
                            resolve_factory_hit(world, &projectile, idx, report);
                            apply_splash(world, &projectile, to, None, report);
                            continue;
                        }
                    }
                    None => projectile.target = ProjectileTarget::None,
                }
            }
            ProjectileTarget::None => {}
        }

        if expired {
            apply_splash(world, &projectile, projectile.position, None, report);
            continue;
        }
        survivors.push(projectile);
    }

    world.projectiles.restore(survivors);
}

fn resolve_unit_hit(
    world: &mut CombatWorld<'_>,
    projectile: &Projectile,
    target_id: UnitId,
    report: &mut CombatReport,
) {
    let Some(target) = world.units.get_alive(target_id) else {
        return;
    };
    let impact = target.position;
    let defender = target.faction;

    if world.rng.gen::<f32>() < world.experience.dodge_chance(defender) {
        tracing::trace!("{} dodged", target_id);
        return;
    }

    let mut damage = projectile.damage;
    if world.rng.gen::<f32>() < world.experience.crit_chance(projectile.origin_faction) {
        damage *= world.tuning.crit_multiplier;
    }
    damage *= world
        .abilities
        .mark_multiplier(projectile.origin_faction, target_id);

    if world.rng.gen::<f32>() < world.abilities.evasion_chance(defender, impact) {
        tracing::trace!("{} evaded", target_id);
        return;
    }

    if !target.is_phased {
        let units: &UnitRegistry = world.units;
        let incoming = world.mechanics.apply_incoming_damage(
            target,
            damage,
            projectile.origin_faction,
            units,
        );
        if incoming.dodged {
            return;
        }
        let armor = target.stats.armor;

        for (ally, raw) in incoming.redistributed {
            damage_unit(world, ally, raw, projectile.origin_unit, projectile.origin_faction, report);
        }
        let dealt = damage_unit(
            world,
            target_id,
            armor_reduce(incoming.damage, armor),
            projectile.origin_unit,
            projectile.origin_faction,
            report,
        );
        if dealt > 0.0 {
            report.hits += 1;
        }
    }

    apply_splash(world, projectile, impact, Some(target_id), report);
}

fn resolve_factory_hit(
    world: &mut CombatWorld<'_>,
    projectile: &Projectile,
    idx: usize,
    report: &mut CombatReport,
) {
    let factory = &mut world.factories[idx];
    if factory.apply_damage(projectile.damage) {
        tracing::info!(
            "{} factory destroyed by {}",
            factory.faction,
            projectile.origin_faction
        );
        report.events.push(SimEvent::FactoryDestroyed {
            faction: factory.faction,
            destroyed_by: projectile.origin_faction,
            position: factory.position,
        });
    }
}

/// Area damage around `center`, scaled from the shot's damage.
///
/// That is the damage after veterancy, ability and outgoing mechanics
/// multipliers, so a buffed shot splashes harder too.
fn apply_splash(
    world: &mut CombatWorld<'_>,
    projectile: &Projectile,
    center: Vec3,
    exclude: Option<UnitId>,
    report: &mut CombatReport,
) {
    let Some(splash) = projectile.splash else {
        return;
    };
    let victims: Vec<(UnitId, f32, f32)> = world
        .units
        .iter_alive()
        .filter(|u| {
            u.faction != projectile.origin_faction && Some(u.id) != exclude && !u.is_phased
        })
        .filter_map(|u| {
            let d = planar_distance(u.position, center);
            (d <= splash.radius).then_some((u.id, d, u.stats.armor))
        })
        .collect();

    for (id, distance, armor) in victims {
        let raw = splash_damage(projectile.damage, distance, splash, world.tuning.splash_factor);
        damage_unit(
            world,
            id,
            armor_reduce(raw, armor),
            projectile.origin_unit,
            projectile.origin_faction,
            report,
        );
    }
}

/// Subtract health, award experience and handle death. Returns damage dealt.
fn damage_unit(
    world: &mut CombatWorld<'_>,
    victim: UnitId,
    amount: f32,
    attacker: UnitId,
    attacker_faction: FactionId,
    report: &mut CombatReport,
) -> f32 {
    let Some(unit) = world.units.get_mut(victim).filter(|u| u.is_alive()) else {
        return 0.0;
    };
    if unit.is_phased {
        return 0.0;
    }
    let dealt = unit.stats.apply_damage(amount);
    let died = unit.stats.is_depleted();
    let (class, faction, position) = (unit.class, unit.faction, unit.position);
    if died {
        unit.is_dead = true;
        unit.target = None;
        unit.pursued = None;
        unit.is_moving = false;
    }

    if dealt > 0.0 {
        world
            .experience
            .add_experience(attacker_faction, XpCategory::Combat, dealt * XP_PER_DAMAGE);
    }

    let mut killer = None;
    if let Some(shooter) = world.units.get_mut(attacker).filter(|u| u.is_alive()) {
        let mut level = shooter.veterancy.record_damage(dealt);
        if died {
            level = shooter.veterancy.record_kill(class).or(level);
            killer = Some(shooter.id);
        }
        if let Some(level) = level {
            promote(shooter);
            tracing::debug!("{} reached veterancy level {}", shooter.id, level);
            report.events.push(SimEvent::LevelUp {
                unit: shooter.id,
                level,
            });
        }
    }

    if died {
        let xp = kill_xp(class);
        world
            .experience
            .add_experience(attacker_faction, XpCategory::Combat, xp);
        world
            .experience
            .add_experience(faction, XpCategory::Survival, xp * SURVIVAL_XP_SHARE);
        report.deaths.push(DeathRecord {
            unit: victim,
            faction,
            class,
            position,
            killer,
            killer_faction: attacker_faction,
        });
    }

    dealt
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::abilities::{AbilityKind, AbilitySpec, AbilityTarget};
    use crate::components::CombatStats;
    use crate::experience::FactionExperience;
    use crate::factions::{FactionProfile, MechanicsKind};
    use crate::mechanics::StandardMechanics;
    use crate::navigation::OpenField;
    use rand::rngs::mock::StepRng;

    /// Rolls that never succeed: no misses, crits, dodges or evasions.
    fn never() -> StepRng {
        StepRng::new(u64::MAX, 0)
    }

    /// Rolls that always succeed.
    fn always() -> StepRng {
        StepRng::new(0, 0)
    }

    struct Arena {
        units: UnitRegistry,
        projectiles: ProjectileList,
        factories: Vec<Factory>,
        abilities: AbilitySystem,
        mechanics: StandardMechanics,
        experience: FactionExperience,
        tuning: CombatTuning,
        rng: StepRng,
    }

    impl Arena {
        fn new(profiles: &[FactionProfile]) -> Self {
            Self {
                units: UnitRegistry::new(),
                projectiles: ProjectileList::new(),
                factories: Vec::new(),
                abilities: AbilitySystem::new(AbilitySpec::standard_set(), profiles),
                mechanics: StandardMechanics::from_profiles(profiles),
                experience: FactionExperience::new(),
                tuning: CombatTuning::default(),
                rng: never(),
            }
        }

        fn two_factions() -> Self {
            Self::new(&[
                FactionProfile::new(FactionId(0), "Blue"),
                FactionProfile::new(FactionId(1), "Red"),
            ])
        }

        fn spawn(&mut self, faction: u8, x: f32, stats: CombatStats) -> UnitId {
            self.units.insert(Unit::new(
                FactionId(faction),
                UnitClass::Medium,
                stats,
                5.0,
                Vec3::new(x, 0.0, 0.0),
            ))
        }

        fn step(&mut self, dt: f32) -> CombatReport {
            let mut world = CombatWorld {
                units: &mut self.units,
                projectiles: &mut self.projectiles,
                factories: &mut self.factories,
                abilities: &self.abilities,
                mechanics: &self.mechanics,
                experience: &mut self.experience,
                obstacles: &OpenField,
                tuning: &self.tuning,
                rng: &mut self.rng,
            };
            run_combat(&mut world, dt)
        }

        fn run(&mut self, ticks: usize) -> CombatReport {
            let mut total = CombatReport::default();
            for _ in 0..ticks {
                let report = self.step(0.05);
                total.shots_fired += report.shots_fired;
                total.hits += report.hits;
                total.deaths.extend(report.deaths);
                total.events.extend(report.events);
            }
            total
        }
    }

    fn gun(damage: f32) -> CombatStats {
        CombatStats::new(100.0, damage, 20.0, 1.0)
    }

    #[test]
    fn test_cooldown_formula() {
        assert_eq!(attack_cooldown(1.0, 1.0), 1.0);
        assert_eq!(attack_cooldown(2.0, 1.0), 0.5);
        assert!((attack_cooldown(0.01, 1.0) - 10.0).abs() < 1e-4);
        assert!((attack_cooldown(0.0, 1.0) - 10.0).abs() < 1e-4);
    }

    #[test]
    fn test_splash_falloff() {
        let splash = Splash::new(5.0, 0.5);
        assert!((splash_damage(100.0, 2.5, splash, 0.6) - 45.0).abs() < 1e-4);
        assert!((splash_damage(100.0, 0.0, splash, 0.6) - 60.0).abs() < 1e-4);
        assert!((splash_damage(100.0, 5.0, splash, 0.6) - 30.0).abs() < 1e-4);
        assert_eq!(splash_damage(100.0, 5.1, splash, 0.6), 0.0);
    }

    #[test]
    fn test_miss_chance_stacks_when_moving() {
        let tuning = CombatTuning::default();
        assert_eq!(miss_chance(&tuning, false), 0.25);
        assert_eq!(miss_chance(&tuning, true), 0.5);
    }

    #[test]
    fn test_direct_hit_applies_armor_and_xp() {
        let mut arena = Arena::two_factions();
        let shooter = arena.spawn(0, 0.0, gun(40.0));
        let target = arena.spawn(1, 12.0, gun(0.0).with_armor(0.25));
        arena.units.get_mut(shooter).unwrap().target = Some(target);

        let report = arena.run(10);
        assert_eq!(report.shots_fired, 1);
        assert_eq!(report.hits, 1);
        assert!((arena.units.get(target).unwrap().stats.health - 70.0).abs() < 1e-4);
        assert!((arena.units.get(shooter).unwrap().veterancy.xp - 15.0).abs() < 1e-4);
        assert!((arena.units.get(shooter).unwrap().cooldown - 0.55).abs() < 1e-3);
        assert!(arena.projectiles.is_empty());
    }

    #[test]
    fn test_out_of_range_holds_fire() {
        let mut arena = Arena::two_factions();
        let shooter = arena.spawn(0, 0.0, gun(40.0));
        let target = arena.spawn(1, 25.0, gun(0.0));
        arena.units.get_mut(shooter).unwrap().target = Some(target);
        assert_eq!(arena.run(5).shots_fired, 0);

        arena.units.get_mut(shooter).unwrap().siege_locked = true;
        assert_eq!(arena.run(1).shots_fired, 1);
    }

    #[test]
    fn test_kill_awards_xp_and_reports_death() {
        let mut arena = Arena::two_factions();
        let shooter = arena.spawn(0, 0.0, gun(500.0));
        let target = arena.spawn(1, 10.0, gun(0.0));
        arena.units.get_mut(shooter).unwrap().target = Some(target);

        let report = arena.run(10);
        assert_eq!(report.deaths.len(), 1);
        let death = report.deaths[0];
        assert_eq!((death.unit, death.killer), (target, Some(shooter)));
        let dead = arena.units.get(target).unwrap();
        assert!(dead.is_dead);
        assert_eq!(dead.stats.health, 0.0);

        let vet = arena.units.get(shooter).unwrap().veterancy;
        assert_eq!(vet.kills, 1);
        // 100 damage * 0.5 + 50 kill
        assert!((vet.xp - 100.0).abs() < 1e-4);
        assert_eq!(vet.level, 1);
        assert!(report.events.iter().any(|e| matches!(e, SimEvent::LevelUp { level: 1, .. })));
        assert_eq!(arena.experience.totals(FactionId(1)).survival, 25.0);
    }

    #[test]
    fn test_level_up_keeps_current_health() {
        let mut unit = Unit::new(FactionId(0), UnitClass::Medium, gun(10.0), 5.0, Vec3::ZERO);
        unit.stats.health = 60.0;
        unit.veterancy.add_xp(100.0);
        promote(&mut unit);
        assert_eq!(unit.stats.health, 60.0);
        assert!((unit.stats.max_health - 115.0).abs() < 1e-4);
    }

    #[test]
    fn test_dodge_aborts_everything() {
        struct Slippery;
        impl ExperiencePool for Slippery {
            fn add_experience(&mut self, _: FactionId, _: XpCategory, _: f32) {}
            fn damage_multiplier(&self, _: FactionId) -> f32 {
                1.0
            }
            fn dodge_chance(&self, _: FactionId) -> f32 {
                1.0
            }
            fn crit_chance(&self, _: FactionId) -> f32 {
                0.0
            }
            fn attack_speed_multiplier(&self, _: FactionId) -> f32 {
                1.0
            }
        }

        let mut arena = Arena::two_factions();
        let shooter = arena.spawn(0, 0.0, gun(40.0).with_splash(5.0, 0.5));
        let target = arena.spawn(1, 10.0, gun(0.0));
        let bystander = arena.spawn(1, 11.0, gun(0.0));
        arena.units.get_mut(shooter).unwrap().target = Some(target);

        let mut slippery = Slippery;
        for _ in 0..10 {
            let mut world = CombatWorld {
                units: &mut arena.units,
                projectiles: &mut arena.projectiles,
                factories: &mut arena.factories,
                abilities: &arena.abilities,
                mechanics: &arena.mechanics,
                experience: &mut slippery,
                obstacles: &OpenField,
                tuning: &arena.tuning,
                rng: &mut arena.rng,
            };
            run_combat(&mut world, 0.05);
        }
        assert_eq!(arena.units.get(target).unwrap().stats.health, 100.0);
        assert_eq!(arena.units.get(bystander).unwrap().stats.health, 100.0);
    }

    #[test]
    fn test_miss_deals_only_splash() {
        let mut arena = Arena::two_factions();
        arena.rng = always();
        arena.tuning.miss_scatter = 0.0;
        let shooter = arena.spawn(0, 0.0, gun(100.0).with_splash(5.0, 0.5));
        let target = arena.spawn(1, 10.0, gun(0.0));
        arena.units.get_mut(shooter).unwrap().target = Some(target);

        arena.run(10);
        // Scatter of zero lands the miss on the target: splash only, 100 * 0.6.
        let health = arena.units.get(target).unwrap().stats.health;
        assert!((health - 40.0).abs() < 1e-3, "health {health}");
    }

    #[test]
    fn test_splash_hits_enemies_not_allies() {
        let mut arena = Arena::two_factions();
        let shooter = arena.spawn(0, 0.0, gun(100.0).with_splash(5.0, 0.5));
        let target = arena.spawn(1, 10.0, gun(0.0));
        let secondary = arena.spawn(1, 12.5, gun(0.0));
        let ally = arena.spawn(0, 11.0, gun(0.0));
        arena.units.get_mut(shooter).unwrap().target = Some(target);

        arena.run(10);
        assert!(arena.units.get(target).unwrap().is_dead);
        let secondary_health = arena.units.get(secondary).unwrap().stats.health;
        assert!((secondary_health - 55.0).abs() < 1e-3);
        assert_eq!(arena.units.get(ally).unwrap().stats.health, 100.0);
    }

    #[test]
    fn test_veteran_splash_scales_with_shot() {
        let mut arena = Arena::two_factions();
        let shooter = arena.spawn(0, 0.0, gun(100.0).with_splash(5.0, 0.5));
        let target = arena.spawn(1, 10.0, gun(0.0));
        let secondary = arena.spawn(1, 12.5, gun(0.0));
        let multiplier = {
            let unit = arena.units.get_mut(shooter).unwrap();
            unit.target = Some(target);
            unit.veterancy.add_xp(100.0);
            unit.veterancy.damage_multiplier()
        };
        assert!(multiplier > 1.0);

        arena.run(10);
        // Same falloff as an unbuffed shot, times the veteran bonus.
        let expected = 100.0 - 45.0 * multiplier;
        let health = arena.units.get(secondary).unwrap().stats.health;
        assert!((health - expected).abs() < 1e-3, "health {health}");
    }

    #[test]
    fn test_phased_target_is_immune() {
        let mut arena = Arena::two_factions();
        let shooter = arena.spawn(0, 0.0, gun(40.0));
        let target = arena.spawn(1, 10.0, gun(0.0));
        arena.units.get_mut(shooter).unwrap().target = Some(target);
        arena.step(0.0);
        arena.units.get_mut(target).unwrap().is_phased = true;
        arena.run(10);
        assert_eq!(arena.units.get(target).unwrap().stats.health, 100.0);
    }

    #[test]
    fn test_marked_target_takes_extra_damage() {
        let profiles = [
            FactionProfile::new(FactionId(0), "Blue").with_abilities(vec![AbilityKind::MarkTarget]),
            FactionProfile::new(FactionId(1), "Red"),
        ];
        let mut arena = Arena::new(&profiles);
        let shooter = arena.spawn(0, 0.0, gun(40.0));
        let target = arena.spawn(1, 10.0, gun(0.0));
        arena.units.get_mut(shooter).unwrap().target = Some(target);
        arena
            .abilities
            .activate(FactionId(0), AbilityKind::MarkTarget, AbilityTarget::Unit(target), &arena.units)
            .unwrap();

        arena.run(10);
        assert!((arena.units.get(target).unwrap().stats.health - 30.0).abs() < 1e-3);
    }

    #[test]
    fn test_armor_share_redistributes_raw_damage() {
        let profiles = [
            FactionProfile::new(FactionId(0), "Blue"),
            FactionProfile::new(FactionId(1), "Red").with_mechanics(MechanicsKind::ArmorShare),
        ];
        let mut arena = Arena::new(&profiles);
        let shooter = arena.spawn(0, 0.0, gun(40.0));
        let target = arena.spawn(1, 10.0, gun(0.0).with_armor(0.5));
        let buddy = arena.spawn(1, 14.0, gun(0.0).with_armor(0.5));
        arena.units.get_mut(shooter).unwrap().target = Some(target);

        arena.run(10);
        // 40 -> 10 shared raw to the buddy, 30 * 0.5 armor to the target.
        assert!((arena.units.get(target).unwrap().stats.health - 85.0).abs() < 1e-3);
        assert!((arena.units.get(buddy).unwrap().stats.health - 90.0).abs() < 1e-3);
    }

    #[test]
    fn test_factory_targeted_without_unit_target() {
        let mut arena = Arena::two_factions();
        arena.spawn(0, 0.0, gun(50.0));
        arena
            .factories
            .push(Factory::new(FactionId(1), Vec3::new(20.0, 0.0, 0.0)).with_health(50.0));

        let report = arena.run(10);
        assert!(!arena.factories[0].alive);
        assert!(report.events.iter().any(|e| matches!(
            e,
            SimEvent::FactoryDestroyed { faction: FactionId(1), destroyed_by: FactionId(0), .. }
        )));
    }

    #[test]
    fn test_static_geometry_swallows_projectiles() {
        struct Wall;
        impl ObstacleQuery for Wall {
            fn is_blocked(&self, point: Vec3, _radius: f32) -> bool {
                (point.x - 5.0).abs() < 0.5
            }
            fn has_clear_path(&self, from: Vec3, to: Vec3, _radius: f32) -> bool {
                (from.x < 5.0) == (to.x < 5.0)
            }
            fn find_detour(&self, _: Vec3, _: Vec3, _: f32) -> Option<Vec3> {
                None
            }
            fn adjust_for_collision(&self, from: Vec3, _to: Vec3, _radius: f32) -> Vec3 {
                from
            }
        }

        let mut arena = Arena::two_factions();
        let shooter = arena.spawn(0, 0.0, gun(40.0));
        let target = arena.spawn(1, 10.0, gun(0.0));
        arena.units.get_mut(shooter).unwrap().target = Some(target);
        for _ in 0..10 {
            let mut world = CombatWorld {
                units: &mut arena.units,
                projectiles: &mut arena.projectiles,
                factories: &mut arena.factories,
                abilities: &arena.abilities,
                mechanics: &arena.mechanics,
                experience: &mut arena.experience,
                obstacles: &Wall,
                tuning: &arena.tuning,
                rng: &mut arena.rng,
            };
            run_combat(&mut world, 0.05);
        }
        assert_eq!(arena.units.get(target).unwrap().stats.health, 100.0);
        assert!(arena.projectiles.is_empty());
    }
}
