//! Online BKT Update
//!
//! Applies a single observation to a learner's mastery estimate.
//!
//! Standard rule (canonical):
//! - Likelihood: P(L|correct) = L(1-S) / (L(1-S) + (1-L)G)
//!               P(L|wrong)   = LS / (LS + (1-L)(1-G))
//! - Transition: L' = P(L|obs) + (1 - P(L|obs)) * T
//!
//! The known state is absorbing, so mastery can only be lost through the
//! likelihood step, never through the transition step.
//!
//! Smoothed rule (historical variant, opt-in):
//! - Transit is scaled by (1 - L) on correct answers
//! - Wrong answers apply a forgetting factor 0.05 + 0.15 * L instead of a transition

use serde::{Deserialize, Serialize};

use crate::sanitize::{clamp_probability, stabilized_ratio};
use crate::types::{ParameterSet, EPSILON, MIN_LIKELIHOOD};

/// Base forgetting rate applied by the smoothed rule on wrong answers
const SMOOTHED_BASE_UNLEARN: f64 = 0.05;

/// Additional forgetting per unit of prior mastery (smoothed rule)
const SMOOTHED_UNLEARN_SLOPE: f64 = 0.15;

/// Named online update strategy
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UpdateRule {
    #[default]
    Standard,
    Smoothed,
}

impl UpdateRule {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "standard" => Some(UpdateRule::Standard),
            "smoothed" => Some(UpdateRule::Smoothed),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            UpdateRule::Standard => "standard",
            UpdateRule::Smoothed => "smoothed",
        }
    }

    /// Apply this rule to one observation
    pub fn apply(&self, prior: f64, was_correct: bool, params: &ParameterSet) -> f64 {
        match self {
            UpdateRule::Standard => update(prior, was_correct, params),
            UpdateRule::Smoothed => update_smoothed(prior, was_correct, params),
        }
    }
}

/// Posterior P(known | observation) before the transition step.
///
/// Falls back to `prior` when the observation has zero likelihood.
pub fn posterior(prior: f64, was_correct: bool, params: &ParameterSet) -> f64 {
    let prior = clamp_probability(prior);
    let (num, den) = likelihood_terms(prior, was_correct, params);

    if den <= MIN_LIKELIHOOD {
        return prior;
    }
    clamp_probability(num / den)
}

/// Standard BKT update: likelihood step followed by the learning transition
pub fn update(prior: f64, was_correct: bool, params: &ParameterSet) -> f64 {
    let post = posterior(prior, was_correct, params);
    let next = post + (1.0 - post) * params.transit();
    clamp_probability(next)
}

/// Smoothed update with adaptive transit and a forgetting term on wrong answers
pub fn update_smoothed(prior: f64, was_correct: bool, params: &ParameterSet) -> f64 {
    let prior = clamp_probability(prior);
    let (num, den) = likelihood_terms(prior, was_correct, params);
    let post = stabilized_ratio(num, den, EPSILON);

    let next = if was_correct {
        let scaled_transit = params.transit() * (1.0 - prior);
        post + (1.0 - post) * scaled_transit
    } else {
        let unlearn_rate = SMOOTHED_BASE_UNLEARN + SMOOTHED_UNLEARN_SLOPE * prior;
        post * (1.0 - unlearn_rate)
    };

    clamp_probability(next)
}

#[inline]
fn likelihood_terms(prior: f64, was_correct: bool, params: &ParameterSet) -> (f64, f64) {
    let num = prior * params.emit_known(was_correct);
    let den = num + (1.0 - prior) * params.emit_unknown(was_correct);
    (num, den)
}
