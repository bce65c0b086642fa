//! Whole-tick scenarios: production, economy, sieges and navigation.

use tactics_core::events::SimEvent;
use tactics_core::math::planar_distance;
use tactics_core::navigation::ObstacleQuery;
use tactics_core::prelude::*;
use tactics_core::retreat::{OUTNUMBER_RADIUS, RETREAT_SPEED_MULTIPLIER};
use tactics_core::simulation::Simulation;
use tactics_test_utils::fixtures::{arena, ground, two_faction_config, BLUE, RED};
use tactics_test_utils::obstacles::WallObstacles;

fn run_until<F>(sim: &mut Simulation, max_ticks: usize, mut found: F) -> Option<SimEvent>
where
    F: FnMut(&SimEvent) -> bool,
{
    for _ in 0..max_ticks {
        let events = sim.tick();
        if let Some(event) = events.events.into_iter().find(|e| found(e)) {
            return Some(event);
        }
    }
    None
}

#[test]
fn test_thin_economy_builds_harvester_first() {
    let mut config = two_faction_config(9);
    config.factions[0] = FactionProfile::new(BLUE, "Blue")
        .with_ai(0.0)
        .with_resources(150);
    let mut sim = arena(config);

    let produced = run_until(&mut sim, 400, |e| {
        matches!(e, SimEvent::ProductionComplete { .. })
    });
    let Some(SimEvent::ProductionComplete {
        template, faction, ..
    }) = produced
    else {
        panic!("no production within 20 seconds");
    };
    assert_eq!(faction, BLUE);
    assert_eq!(template, "harvester");
    // 150 start plus passive income, minus the 50 the harvester cost.
    let expected = 100.0 + 2.0 * sim.time();
    assert!((sim.balance(BLUE) as f32 - expected).abs() <= 1.0);
}

#[test]
fn test_wreck_is_salvaged_and_deposited() {
    let mut sim = arena(two_faction_config(4));
    let harvester = sim
        .spawn_unit("harvester", BLUE, ground(-74.0, 0.0))
        .unwrap();
    let heavy = sim.spawn_unit("heavy", BLUE, ground(-60.0, 0.0)).unwrap();
    let light = sim.spawn_unit("light", RED, ground(-40.0, 0.0)).unwrap();
    sim.set_stance(&[light], Stance::HoldPosition).unwrap();
    sim.order_attack(&[heavy], light).unwrap();

    let deposit = run_until(&mut sim, 4000, |e| matches!(e, SimEvent::Deposit { .. }));
    let Some(SimEvent::Deposit { unit, amount, .. }) = deposit else {
        panic!("harvester never deposited");
    };
    assert_eq!(unit, harvester);
    assert!((amount - 20.0).abs() < 1e-2, "deposited {amount}");
    assert!(sim.balance(BLUE) >= 519);
    assert!(sim.wreckage().is_empty());
}

#[test]
fn test_unopposed_heavies_raze_factory() {
    let mut sim = arena(two_faction_config(5));
    for z in [-8.0, -4.0, 0.0, 4.0, 8.0] {
        sim.spawn_unit("heavy", BLUE, ground(60.0, z)).unwrap();
    }

    let destroyed = run_until(&mut sim, 6000, |e| {
        matches!(e, SimEvent::FactoryDestroyed { .. })
    });
    assert!(matches!(
        destroyed,
        Some(SimEvent::FactoryDestroyed {
            faction: RED,
            destroyed_by: BLUE,
            ..
        })
    ));
    assert!(!sim.factory(RED).unwrap().alive);
    assert_eq!(sim.ruins().len(), 1);

    // Nothing left to shoot at.
    let quiet = sim.tick();
    assert_eq!(quiet.shots_fired, 0);
}

#[test]
fn test_unit_walks_around_wall() {
    let walls = WallObstacles::new().with_wall(ground(9.0, -10.0), ground(11.0, 10.0));
    let mut sim = Simulation::new(two_faction_config(2)).with_obstacles(walls.clone());
    let id = sim.spawn_unit("light", BLUE, ground(0.0, 0.0)).unwrap();
    let goal = ground(20.0, -14.0);
    sim.order_move(&[id], goal, None).unwrap();

    for _ in 0..1200 {
        sim.tick();
        let unit = sim.unit(id).unwrap();
        assert!(!walls.is_blocked(unit.position, unit.radius), "inside wall at {:?}", unit.position);
    }
    let unit = sim.unit(id).unwrap();
    assert!(unit.position.distance(goal) <= 1.0, "stopped at {:?}", unit.position);
}

#[test]
fn test_no_target_points_at_dead_unit() {
    let mut sim = tactics_test_utils::fixtures::skirmish(two_faction_config(8), 12);
    for id in sim.units().ids().into_iter().step_by(2) {
        let _ = sim.order_attack_move(&[id], ground(0.0, 0.0), Some(FormationType::Wedge));
    }
    for _ in 0..1500 {
        sim.tick();
        for unit in sim.units().iter_alive() {
            if let Some(target) = unit.target {
                assert!(sim.units().get_alive(target).is_some());
            }
            assert!(unit.stats.health >= 0.0 && unit.stats.health <= unit.stats.max_health);
        }
    }
}

#[test]
fn test_cloaked_units_are_left_alone() {
    let mut config = two_faction_config(6);
    config.factions[1] = FactionProfile::new(RED, "Red").with_abilities(vec![AbilityKind::Cloak]);
    let mut sim = Simulation::new(config);
    sim.spawn_unit("medium", BLUE, ground(0.0, 0.0)).unwrap();
    let hidden = sim.spawn_unit("light", RED, ground(12.0, 0.0)).unwrap();
    sim.set_stance(&[hidden], Stance::HoldPosition).unwrap();
    sim.activate_ability(RED, AbilityKind::Cloak, AbilityTarget::Unit(hidden))
        .unwrap();

    for _ in 0..100 {
        sim.tick();
    }
    let hidden = sim.unit(hidden).unwrap();
    assert!(hidden.is_cloaked);
    assert_eq!(hidden.stats.health, hidden.stats.max_health);
}

#[test]
fn test_outnumbered_defender_falls_back() {
    let mut sim = Simulation::new(two_faction_config(12));
    let defender = sim.spawn_unit("medium", BLUE, ground(0.0, 0.0)).unwrap();
    sim.set_stance(&[defender], Stance::Defensive).unwrap();
    let attackers = [
        sim.spawn_unit("light", RED, ground(15.0, -2.0)).unwrap(),
        sim.spawn_unit("light", RED, ground(15.0, 2.0)).unwrap(),
    ];
    sim.set_stance(&attackers, Stance::HoldPosition).unwrap();

    let speed = UnitTemplate::standard(UnitClass::Medium).speed;
    let per_tick = speed * RETREAT_SPEED_MULTIPLIER * sim.config().tick_seconds();
    let mut retreat_ticks = 0;
    for _ in 0..400 {
        let before = sim.unit(defender).unwrap().position;
        sim.tick();
        let unit = sim.unit(defender).unwrap();
        if !unit.is_retreating {
            break;
        }
        retreat_ticks += 1;
        assert!(unit.target.is_none());
        assert!(sim.projectiles().all(|p| p.origin_unit != defender));
        let moved = planar_distance(before, unit.position);
        assert!((moved - per_tick).abs() < 1e-3, "moved {moved} in one tick");
    }
    // 30 units of flight, minus the arrival margin, at 1.3x speed.
    assert!(retreat_ticks > 50, "retreated for {retreat_ticks} ticks");

    let unit = sim.unit(defender).unwrap();
    assert!(!unit.is_retreating);
    for &attacker in &attackers {
        let enemy = sim.unit(attacker).unwrap().position;
        assert!(planar_distance(unit.position, enemy) > OUTNUMBER_RADIUS);
    }

    // Out of reach of both attackers it stays where the retreat ended.
    let resting = unit.position;
    for _ in 0..40 {
        sim.tick();
    }
    let unit = sim.unit(defender).unwrap();
    assert!(!unit.is_retreating);
    assert!(planar_distance(unit.position, resting) < 1e-3);
}
