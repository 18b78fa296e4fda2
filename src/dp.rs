//! Differential-privacy perturbation (spec §4.3): a Bernoulli gate that
//! may drop a tuple outright, and per-header Laplace noise applied to the
//! tuples that survive.

use std::collections::HashMap;

use rand::Rng;
use rand_distr::{Distribution, Laplace};

use crate::range::Range;

/// With probability `1 - beta_big`, the tuple should be dropped before any
/// state update and produce no output.
pub fn should_retain<R: Rng>(rng: &mut R, beta_big: f64) -> bool {
    rng.gen::<f64>() <= beta_big
}

/// For each header with a defined global range, draws Laplace noise scaled
/// by `max(global_range.width(), 1) / phi`, rounds it to the nearest
/// integer, and adds it to the tuple's value for that header. Headers with
/// no defined global range yet (nothing observed before this tuple) are
/// left untouched.
pub fn perturb<R: Rng>(
    rng: &mut R,
    quasi: &mut HashMap<String, f64>,
    global_ranges: &HashMap<String, Range>,
    phi: f64,
) {
    for (header, value) in quasi.iter_mut() {
        let Some(global) = global_ranges.get(header) else {
            continue;
        };
        if global.lower.is_none() || global.upper.is_none() {
            continue;
        }
        let scale = global.width().max(1.0) / phi;
        let laplace = Laplace::new(0.0, scale).expect("scale is always positive");
        let noise = laplace.sample(rng).round();
        *value += noise;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::mock::StepRng;
    use rand_chacha::rand_core::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    #[test]
    fn retains_everything_when_beta_big_is_one() {
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        for _ in 0..100 {
            assert!(should_retain(&mut rng, 1.0));
        }
    }

    #[test]
    fn drops_everything_when_beta_big_is_zero() {
        let mut rng = StepRng::new(1, 1);
        assert!(!should_retain(&mut rng, 0.0));
    }

    #[test]
    fn perturb_leaves_unobserved_headers_alone() {
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        let mut quasi = HashMap::new();
        quasi.insert("age".to_string(), 30.0);
        let global_ranges = HashMap::new();
        perturb(&mut rng, &mut quasi, &global_ranges, 10.0);
        assert_eq!(quasi["age"], 30.0);
    }

    #[test]
    fn perturb_moves_the_value_by_an_integer_amount() {
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        let mut quasi = HashMap::new();
        quasi.insert("age".to_string(), 30.0);
        let mut global_ranges = HashMap::new();
        let mut range = Range::new();
        range.update(0.0);
        range.update(100.0);
        global_ranges.insert("age".to_string(), range);
        perturb(&mut rng, &mut quasi, &global_ranges, 10.0);
        let delta = quasi["age"] - 30.0;
        assert_eq!(delta, delta.round());
    }
}
