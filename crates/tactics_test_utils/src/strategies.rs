//! Proptest strategies.
//!
//! These strategies generate random but reproducible inputs for
//! property-based tests of the combat math, formations and veterancy.

use glam::Vec3;
use proptest::prelude::*;
use tactics_core::components::{CombatStats, Splash, UnitClass};
use tactics_core::formation::FormationType;

/// Ground-plane position in a typical map range.
pub fn arb_position() -> impl Strategy<Value = Vec3> {
    (-500.0f32..500.0, -500.0f32..500.0).prop_map(|(x, z)| Vec3::new(x, 0.0, z))
}

/// Non-degenerate facing on the ground plane.
pub fn arb_facing() -> impl Strategy<Value = Vec3> {
    (0.0f32..std::f32::consts::TAU).prop_map(|a| Vec3::new(a.cos(), 0.0, a.sin()))
}

/// Any formation type.
pub fn arb_formation() -> impl Strategy<Value = FormationType> {
    prop_oneof![
        Just(FormationType::Line),
        Just(FormationType::Wedge),
        Just(FormationType::Box),
        Just(FormationType::Scatter),
    ]
}

/// Any unit class.
pub fn arb_class() -> impl Strategy<Value = UnitClass> {
    prop::sample::select(UnitClass::ALL.to_vec())
}

/// Damage amounts, including zero and overkill.
pub fn arb_damage() -> impl Strategy<Value = f32> {
    prop_oneof![Just(0.0f32), 0.0f32..50.0, 50.0f32..5000.0]
}

/// Splash with a positive radius and falloff in `[0, 1]`.
pub fn arb_splash() -> impl Strategy<Value = Splash> {
    (0.5f32..20.0, 0.0f32..=1.0).prop_map(|(radius, falloff)| Splash::new(radius, falloff))
}

/// Combat stats with armor in `[0, 0.9]`.
pub fn arb_stats() -> impl Strategy<Value = CombatStats> {
    (1.0f32..1000.0, 0.0f32..100.0, 1.0f32..40.0, 0.0f32..4.0, 0.0f32..0.9).prop_map(
        |(health, damage, range, speed, armor)| {
            CombatStats::new(health, damage, range, speed).with_armor(armor)
        },
    )
}

/// A sequence of experience gains.
pub fn arb_xp_gains(max_len: usize) -> impl Strategy<Value = Vec<f32>> {
    proptest::collection::vec(0.0f32..400.0, 0..max_len)
}
