//! Same seed, same match.

use tactics_test_utils::determinism::{
    assert_runs_agree, find_first_divergence, parallel_final_hashes, replays_identically,
};
use tactics_test_utils::fixtures::{ai_config, skirmish, two_faction_config};

#[test]
fn test_ai_skirmish_replays_identically() {
    let setup = || skirmish(ai_config(21, 0.8), 10);
    assert!(replays_identically(setup, 600));
    assert_eq!(find_first_divergence(setup, 300), None);
}

#[test]
fn test_parallel_runs_agree() {
    let hashes = parallel_final_hashes(|| skirmish(two_faction_config(4), 16), 4, 400);
    assert_runs_agree(&hashes, 400);
    assert!(hashes.windows(2).all(|pair| pair[0] == pair[1]));
}
