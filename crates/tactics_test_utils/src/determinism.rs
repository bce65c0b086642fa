//! Replay checks for the simulation.
//!
//! A match is deterministic when two simulations built by the same setup
//! closure and ticked the same number of times report the same
//! [`Simulation::state_hash`]. The usual ways to break that:
//!
//! - rolling dice outside the simulation's seeded `ChaCha8Rng`
//! - iterating a `HashMap` in a per-tick loop (the registry keeps
//!   insertion order and per-faction state lives in `BTreeMap`s)
//! - state leaking between simulation instances through statics
//!
//! Float results are only compared within one binary on one machine.

use std::collections::BTreeSet;
use std::thread;

use tactics_core::simulation::Simulation;

/// Build a simulation, tick it and return its hash after every tick.
///
/// Index 0 is the hash before the first tick.
pub fn hash_trace<F>(setup: F, ticks: u64) -> Vec<u64>
where
    F: FnOnce() -> Simulation,
{
    let mut sim = setup();
    let mut trace = Vec::with_capacity(ticks as usize + 1);
    trace.push(sim.state_hash());
    for _ in 0..ticks {
        sim.tick();
        trace.push(sim.state_hash());
    }
    trace
}

/// Hash after `ticks` ticks of a freshly built simulation.
pub fn final_hash<F>(setup: F, ticks: u64) -> u64
where
    F: FnOnce() -> Simulation,
{
    let mut sim = setup();
    for _ in 0..ticks {
        sim.tick();
    }
    sim.state_hash()
}

/// Whether two runs of the same setup end in the same state.
pub fn replays_identically<F>(setup: F, ticks: u64) -> bool
where
    F: Fn() -> Simulation,
{
    final_hash(&setup, ticks) == final_hash(&setup, ticks)
}

/// First tick after which two runs of the same setup disagree.
///
/// `Some(0)` means the setups themselves differ.
pub fn find_first_divergence<F>(setup: F, ticks: u64) -> Option<u64>
where
    F: Fn() -> Simulation,
{
    let first = hash_trace(&setup, ticks);
    let second = hash_trace(&setup, ticks);
    let tick = first
        .iter()
        .zip(&second)
        .position(|(a, b)| a != b)? as u64;
    tracing::debug!(tick, "simulations diverged");
    Some(tick)
}

/// Final hashes of `runs` simulations, each built and ticked on its own
/// scoped thread.
pub fn parallel_final_hashes<F>(setup: F, runs: usize, ticks: u64) -> Vec<u64>
where
    F: Fn() -> Simulation + Sync,
{
    thread::scope(|scope| {
        let handles: Vec<_> = (0..runs)
            .map(|_| scope.spawn(|| final_hash(&setup, ticks)))
            .collect();
        handles
            .into_iter()
            .map(|handle| handle.join().expect("simulation thread panicked"))
            .collect()
    })
}

/// Assert that every run ended with the same hash.
///
/// # Panics
///
/// Lists the distinct hashes when the runs disagree.
pub fn assert_runs_agree(hashes: &[u64], ticks: u64) {
    let distinct: BTreeSet<u64> = hashes.iter().copied().collect();
    assert!(
        distinct.len() <= 1,
        "{} runs of {ticks} ticks ended in {} different states: {distinct:?}",
        hashes.len(),
        distinct.len(),
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{ai_config, skirmish, two_faction_config};

    #[test]
    fn test_trace_starts_before_the_first_tick() {
        let trace = hash_trace(|| skirmish(two_faction_config(5), 4), 10);
        assert_eq!(trace.len(), 11);
        assert_eq!(trace[0], skirmish(two_faction_config(5), 4).state_hash());
        assert_eq!(trace[10], final_hash(|| skirmish(two_faction_config(5), 4), 10));
    }

    #[test]
    fn test_empty_simulation_replays() {
        assert!(replays_identically(Simulation::default, 100));
    }

    #[test]
    fn test_skirmish_replays() {
        assert!(replays_identically(|| skirmish(two_faction_config(7), 12), 300));
    }

    #[test]
    fn test_ai_battle_never_diverges() {
        assert_eq!(
            find_first_divergence(|| skirmish(ai_config(11, 0.9), 6), 600),
            None
        );
    }

    #[test]
    fn test_parallel_runs_match() {
        let hashes = parallel_final_hashes(|| skirmish(ai_config(3, 0.5), 8), 4, 200);
        assert_eq!(hashes.len(), 4);
        assert_runs_agree(&hashes, 200);
    }

    #[test]
    #[should_panic(expected = "different states")]
    fn test_disagreeing_runs_are_reported() {
        assert_runs_agree(&[1, 1, 2], 50);
    }

    #[test]
    fn test_different_seeds_differ() {
        let a = final_hash(|| skirmish(ai_config(1, 1.0), 10), 400);
        let b = final_hash(|| skirmish(ai_config(2, 1.0), 10), 400);
        assert_ne!(a, b);
    }
}
