//! The six concrete end-to-end scenarios from spec.md §8, run with DP
//! disabled for determinism. Each scenario pins its own seed and parameters
//! rather than sharing state across tests, so they can run in any order.

use std::cell::RefCell;
use std::collections::HashSet;
use std::rc::Rc;

use castle_core::{Castle, GeneralizedRecord, Parameters, RawRecord};
use rand_chacha::rand_core::SeedableRng;
use rand_chacha::ChaCha8Rng;

fn record(pid: u32, age: f64, sensitive: &'static str) -> RawRecord<u32, &'static str> {
    let mut quasi = std::collections::HashMap::new();
    quasi.insert("age".to_string(), age);
    RawRecord::new(pid, sensitive, quasi, ())
}

type Sink = Rc<RefCell<Vec<GeneralizedRecord<u32, &'static str, ()>>>>;

fn collecting_castle(params: Parameters, seed: u64) -> (Castle<u32, &'static str, (), ChaCha8Rng>, Sink) {
    let releases: Sink = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&releases);
    let castle = Castle::new(
        vec!["age".to_string()],
        "disease",
        params,
        ChaCha8Rng::seed_from_u64(seed),
        move |g| sink.borrow_mut().push(g),
    )
    .unwrap();
    (castle, releases)
}

/// Scenario 1: trivial below threshold. Two tuples with identical
/// quasi-identifiers never come close to k, so nothing is released and
/// both stay in a single active cluster.
#[test]
fn trivial_below_threshold_releases_nothing() {
    let params = Parameters {
        k: 3,
        delta: 5,
        beta: 5,
        l: 1,
        dp: false,
        ..Parameters::default()
    };
    let (mut castle, releases) = collecting_castle(params, 1);

    castle.insert(record(1, 30.0, "flu")).unwrap();
    castle.insert(record(2, 30.0, "cold")).unwrap();

    assert_eq!(releases.borrow().len(), 0);
    assert_eq!(castle.active_cluster_count(), 1);
    assert_eq!(castle.pending_count(), 2);
}

/// Scenario 2: first release. Four tuples with identical quasi-identifiers
/// and a single sensitive value pack into one cluster; once the queue
/// outgrows δ, the engine has nowhere else to go but release the whole
/// cluster (diversity never exceeds l, so the direct k/l check never
/// fires, but merge's fallthrough releases it regardless).
#[test]
fn first_release_happens_once_the_queue_outgrows_delta() {
    let params = Parameters {
        k: 3,
        delta: 3,
        beta: 5,
        l: 1,
        dp: false,
        ..Parameters::default()
    };
    let (mut castle, releases) = collecting_castle(params, 2);

    for pid in 1..=4u32 {
        castle.insert(record(pid, 50.0, "flu")).unwrap();
    }

    assert!(releases.borrow().len() >= 3);
    assert_eq!(castle.retired_cluster_count(), 1);
}

/// Scenario 3: forced new-cluster fallback. With β=1, every tuple after
/// the first is forced to reuse the sole active cluster regardless of τ
/// (there is nowhere else for it to go); the cluster still eventually
/// reaches k and is released.
#[test]
fn beta_ceiling_forces_reuse_until_release() {
    let params = Parameters {
        k: 3,
        delta: 3,
        beta: 1,
        l: 1,
        dp: false,
        ..Parameters::default()
    };
    let (mut castle, releases) = collecting_castle(params, 3);

    let ages = [10.0, 90.0, 50.0, 20.0];
    for (pid, age) in ages.into_iter().enumerate() {
        castle.insert(record(pid as u32 + 1, age, "flu")).unwrap();
        assert!(castle.active_cluster_count() <= 1);
    }

    assert!(releases.borrow().len() >= 3);
    assert_eq!(castle.retired_cluster_count(), 1);
}

/// Scenario 4: suppression path. Four tuples with wildly different
/// quasi-identifiers and distinct pids each open their own cluster (τ
/// never allows reuse); once the queue outgrows δ, the oldest tuple's
/// cluster is far too small and there isn't enough material in flight
/// (distinct pids < k) to ever satisfy the release, so it is suppressed
/// with no release.
#[test]
fn suppression_fires_when_not_enough_material_is_in_flight() {
    let params = Parameters {
        k: 5,
        delta: 3,
        beta: 5,
        l: 1,
        dp: false,
        ..Parameters::default()
    };
    let (mut castle, releases) = collecting_castle(params, 4);

    let ages = [10.0, 200.0, -50.0, 500.0];
    for (pid, age) in ages.into_iter().enumerate() {
        castle.insert(record(pid as u32 + 1, age, "flu")).unwrap();
    }

    assert_eq!(releases.borrow().len(), 0);
    assert_eq!(castle.pending_count(), 3);
    assert_eq!(castle.active_cluster_count(), 3);
}

/// Scenario 5: Ω shelter. After a cluster has been released, a later
/// tuple whose quasi-identifiers fall inside that retired cluster's
/// envelope is generalized against it directly instead of waiting to
/// grow its own cluster to k, the moment the delay constraint next fires
/// on it.
#[test]
fn retired_cluster_shelters_a_matching_late_tuple() {
    let params = Parameters {
        k: 3,
        delta: 3,
        beta: 5,
        l: 1,
        dp: false,
        ..Parameters::default()
    };
    let (mut castle, releases) = collecting_castle(params, 5);

    for pid in 1..=4u32 {
        castle.insert(record(pid, 50.0, "flu")).unwrap();
    }
    assert_eq!(castle.retired_cluster_count(), 1);
    let released_before_shelter = releases.borrow().len();

    // A tuple whose age falls exactly inside the retired cluster's
    // envelope ({50, 50}); three unrelated, mutually distant tuples are
    // fed afterward purely to push the queue past δ again so the delay
    // constraint fires on this one.
    castle.insert(record(100, 50.0, "flu")).unwrap();
    castle.insert(record(101, 5_000.0, "flu")).unwrap();
    castle.insert(record(102, -5_000.0, "flu")).unwrap();
    castle.insert(record(103, 10_000.0, "flu")).unwrap();

    let released_after = releases.borrow().len();
    assert_eq!(released_after, released_before_shelter + 1);

    let sheltered = releases.borrow()[released_before_shelter].clone();
    assert_eq!(sheltered.pid, 100);
    let age = &sheltered.quasi["age"];
    assert_eq!(age.lower, 50.0);
    assert_eq!(age.upper, 50.0);
}

/// Scenario 6: split-l branch. Six tuples, evenly split across two
/// sensitive values, all fit in one cluster (identical quasi-identifiers,
/// so τ never blocks reuse). Once that cluster is large enough to need
/// splitting (≥ 2k tuples, ≥ l sensitive values), `output_cluster` runs
/// `split_l` first. `split_l`'s per-bucket share is recomputed against the
/// *current* remaining total on every bucket it visits (spec.md §4.6,
/// castle.py's `total_tuples`), so exactly how many subclusters come out
/// depends on the (hashmap-ordered, not PRNG-seeded) order buckets are
/// visited in — this test only pins the invariants that hold regardless:
/// every tuple is released exactly once and whatever subclusters resulted
/// all satisfied k/l on the way (release_and_retire would have panicked
/// otherwise).
#[test]
fn split_l_divides_an_oversized_cluster_without_losing_tuples() {
    let params = Parameters {
        k: 3,
        delta: 5,
        beta: 5,
        l: 2,
        dp: false,
        ..Parameters::default()
    };
    let (mut castle, releases) = collecting_castle(params, 6);

    let sensitives = ["flu", "flu", "flu", "cold", "cold", "cold"];
    for (i, sensitive) in sensitives.into_iter().enumerate() {
        castle
            .insert(record(i as u32 + 1, 50.0, sensitive))
            .unwrap();
    }

    let released = releases.borrow();
    assert_eq!(released.len(), 6);

    let released_pids: HashSet<u32> = released.iter().map(|r| r.pid).collect();
    let expected_pids: HashSet<u32> = (1..=6u32).collect();
    assert_eq!(released_pids, expected_pids);

    assert!((1..=2).contains(&castle.retired_cluster_count()));
    assert_eq!(castle.active_cluster_count(), 0);
}
