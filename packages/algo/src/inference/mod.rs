//! Forward-Backward Inference for BKT
//!
//! Two hidden states: unknown (0) and known (1).
//!
//! Transition matrix (rows = from, cols = to):
//! - unknown: [1 - T, T]
//! - known:   [0,     1]   (absorbing, known -> unknown never happens)
//!
//! Emissions:
//! - P(correct | known)   = 1 - S
//! - P(correct | unknown) = G
//!
//! Both passes renormalize every step (scaled forward-backward), so long
//! sequences never underflow. An observation that is impossible under the
//! current parameters (e.g. a wrong answer with prior = 1 and slip = 0) zeroes
//! both states; that step keeps the fallback distribution instead, and only
//! the log-likelihood records it, through a small epsilon.

use serde::{Deserialize, Serialize};

use crate::types::{ParameterSet, EPSILON};

/// Per-timestep state probabilities
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct StatePosterior {
    pub unknown: f64,
    pub known: f64,
}

impl StatePosterior {
    const UNIFORM: Self = Self {
        unknown: 0.5,
        known: 0.5,
    };

    /// Rescale to sum to 1; an all-zero pair yields `fallback`
    #[inline]
    fn normalized_or(unknown: f64, known: f64, fallback: Self) -> Self {
        let sum = unknown + known;
        if sum > 0.0 && sum.is_finite() {
            Self {
                unknown: unknown / sum,
                known: known / sum,
            }
        } else {
            fallback
        }
    }

    pub fn total(&self) -> f64 {
        self.unknown + self.known
    }
}

/// Smoothed posterior for one observation sequence
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct SequencePosterior {
    /// P(state_t | whole sequence), one entry per observation
    pub gamma: Vec<StatePosterior>,
    /// Expected unknown -> known transition between t and t + 1
    pub xi: Vec<f64>,
    /// ln P(sequence | params), from the forward normalizers
    pub log_likelihood: f64,
}

impl SequencePosterior {
    pub fn len(&self) -> usize {
        self.gamma.len()
    }

    pub fn is_empty(&self) -> bool {
        self.gamma.is_empty()
    }

}

/// Run forward-backward over one sequence.
///
/// An empty sequence yields an empty posterior.
pub fn infer(sequence: &[bool], params: &ParameterSet) -> SequencePosterior {
    let n = sequence.len();
    if n == 0 {
        return SequencePosterior::default();
    }

    let t = params.transit();
    let (alpha, log_likelihood) = forward(sequence, params);
    let beta = backward(sequence, params);

    let gamma: Vec<StatePosterior> = alpha
        .iter()
        .zip(beta.iter())
        .map(|(a, b)| StatePosterior::normalized_or(a.unknown * b.unknown, a.known * b.known, *a))
        .collect();

    let xi: Vec<f64> = (0..n - 1)
        .map(|i| {
            let a = alpha[i];
            let b_next = beta[i + 1];
            let o_next = sequence[i + 1];
            let e_k = params.emit_known(o_next);
            let e_u = params.emit_unknown(o_next);

            let path_00 = a.unknown * (1.0 - t) * e_u * b_next.unknown;
            let path_01 = a.unknown * t * e_k * b_next.known;
            let path_11 = a.known * e_k * b_next.known;

            path_01 / (path_00 + path_01 + path_11 + EPSILON)
        })
        .collect();

    SequencePosterior {
        gamma,
        xi,
        log_likelihood,
    }
}

/// Scaled forward pass; returns filtered state probabilities and ln-likelihood
fn forward(sequence: &[bool], params: &ParameterSet) -> (Vec<StatePosterior>, f64) {
    let t = params.transit();
    let mut alpha = Vec::with_capacity(sequence.len());
    let mut log_likelihood = 0.0;

    let mut predicted = StatePosterior {
        unknown: 1.0 - params.prior(),
        known: params.prior(),
    };

    for &obs in sequence {
        let a_u = predicted.unknown * params.emit_unknown(obs);
        let a_k = predicted.known * params.emit_known(obs);
        log_likelihood += (a_u + a_k + EPSILON).ln();

        let step = StatePosterior::normalized_or(a_u, a_k, predicted);
        alpha.push(step);

        predicted = StatePosterior {
            unknown: step.unknown * (1.0 - t),
            known: step.unknown * t + step.known,
        };
    }

    (alpha, log_likelihood)
}

/// Scaled backward pass
fn backward(sequence: &[bool], params: &ParameterSet) -> Vec<StatePosterior> {
    let n = sequence.len();
    let t = params.transit();
    let mut beta = vec![
        StatePosterior {
            unknown: 1.0,
            known: 1.0,
        };
        n
    ];

    for i in (0..n.saturating_sub(1)).rev() {
        let o_next = sequence[i + 1];
        let b_next = beta[i + 1];
        let e_k = params.emit_known(o_next);
        let e_u = params.emit_unknown(o_next);

        let val_u = (1.0 - t) * e_u * b_next.unknown + t * e_k * b_next.known;
        let val_k = e_k * b_next.known;
        beta[i] = StatePosterior::normalized_or(val_u, val_k, StatePosterior::UNIFORM);
    }

    beta
}
