//! Property tests for the combat math, formations and veterancy.

use proptest::prelude::*;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use tactics_core::combat::{armor_reduce, attack_cooldown, splash_damage};
use tactics_core::formation::compute_positions;
use tactics_core::veterancy::{Veterancy, MAX_LEVEL};
use tactics_test_utils::strategies::{
    arb_damage, arb_facing, arb_formation, arb_position, arb_splash, arb_stats, arb_xp_gains,
};

proptest! {
    #[test]
    fn health_stays_within_bounds(
        stats in arb_stats(),
        hits in proptest::collection::vec(arb_damage(), 0..20),
    ) {
        let mut stats = stats;
        for hit in hits {
            stats.apply_damage(armor_reduce(hit, stats.armor));
            prop_assert!(stats.health >= 0.0);
            prop_assert!(stats.health <= stats.max_health);
        }
    }

    #[test]
    fn formation_yields_requested_count(
        anchor in arb_position(),
        facing in arb_facing(),
        formation in arb_formation(),
        count in 0usize..80,
        seed in any::<u64>(),
    ) {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let slots = compute_positions(anchor, count, facing, formation, 4.0, &mut rng);
        prop_assert_eq!(slots.len(), count);
    }

    #[test]
    fn veterancy_is_monotonic(gains in arb_xp_gains(30)) {
        let mut vet = Veterancy::default();
        let mut last = 0;
        for gain in gains {
            vet.add_xp(gain);
            prop_assert!(vet.level >= last);
            prop_assert!(vet.level <= MAX_LEVEL);
            last = vet.level;
        }
    }

    #[test]
    fn splash_falls_off_between_bounds(
        splash in arb_splash(),
        base in 0.0f32..500.0,
        t in 0.0f32..=1.0,
    ) {
        let distance = splash.radius * t;
        let dealt = splash_damage(base, distance, splash, 0.6);
        let high = base * 0.6;
        let low = base * splash.edge_falloff * 0.6;
        prop_assert!(dealt <= high + 1e-3);
        prop_assert!(dealt >= low - 1e-3);
        prop_assert_eq!(splash_damage(base, splash.radius + 0.01, splash, 0.6), 0.0);
    }

    #[test]
    fn cooldown_never_exceeds_floor(speed in 0.0f32..10.0, mult in 0.0f32..3.0) {
        let cooldown = attack_cooldown(speed, mult);
        prop_assert!(cooldown > 0.0);
        prop_assert!(cooldown <= 10.0 + 1e-3);
    }
}
