//! Synthetic learners
//!
//! Draws observation sequences from the BKT generative model. Used for
//! parameter-recovery checks and benchmarks.

use rand::prelude::*;
use rand_chacha::ChaCha8Rng;

use crate::types::{ObservationSequence, ParameterSet};

/// Sample one learner's sequence of `length` answers
pub fn simulate_sequence<R: Rng>(
    params: &ParameterSet,
    length: usize,
    rng: &mut R,
) -> ObservationSequence {
    let mut known = rng.gen::<f64>() < params.prior();
    let mut sequence = Vec::with_capacity(length);

    for _ in 0..length {
        let correct = if known {
            rng.gen::<f64>() >= params.slip()
        } else {
            rng.gen::<f64>() < params.guess()
        };
        sequence.push(correct);

        if !known && rng.gen::<f64>() < params.transit() {
            known = true;
        }
    }

    sequence
}

/// Sample `learners` sequences with a seeded ChaCha8 generator
pub fn simulate_population(
    params: &ParameterSet,
    learners: usize,
    length: usize,
    seed: u64,
) -> Vec<ObservationSequence> {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    (0..learners)
        .map(|_| simulate_sequence(params, length, &mut rng))
        .collect()
}
