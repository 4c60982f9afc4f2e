//! Common Types and Constants
//!
//! Shared data structures used across all algorithm modules.

use serde::{Deserialize, Serialize};

use crate::sanitize::{clamp_probability, sanitize_probability};

// ==================== Constants ====================

/// Denominator stabilizer used by the forward-backward recursions and the M-step
pub const EPSILON: f64 = 1e-9;

/// Below this the online likelihood denominator is treated as zero
pub const MIN_LIKELIHOOD: f64 = 1e-12;

/// Lower clamp bound for EM-produced parameters
pub const MIN_FITTED_PROBABILITY: f64 = 1e-6;

/// Upper clamp bound for EM-produced parameters
pub const MAX_FITTED_PROBABILITY: f64 = 1.0 - 1e-6;

/// Population default: initial mastery (L0)
pub const DEFAULT_PRIOR: f64 = 0.2;

/// Population default: unknown -> known transition probability
pub const DEFAULT_TRANSIT: f64 = 0.15;

/// Population default: slip probability
pub const DEFAULT_SLIP: f64 = 0.1;

/// Population default: guess probability
pub const DEFAULT_GUESS: f64 = 0.2;

/// Knowledge component identifier
pub type KcId = i64;

/// Learner identifier
pub type LearnerId = i64;

// ==================== BKT Types ====================

/// The four BKT parameters
///
/// Values are always inside `[0, 1]`: every constructor, deserialization
/// included, goes through [`ParameterSet::new`]. A `ParameterSet` is never
/// mutated once built; a refit produces a new value.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(from = "RawParameterSet")]
pub struct ParameterSet {
    prior: f64,
    transit: f64,
    slip: f64,
    guess: f64,
}

/// Unchecked wire shape of [`ParameterSet`]
#[derive(Deserialize)]
struct RawParameterSet {
    prior: f64,
    transit: f64,
    slip: f64,
    guess: f64,
}

impl From<RawParameterSet> for ParameterSet {
    fn from(raw: RawParameterSet) -> Self {
        Self::new(raw.prior, raw.transit, raw.slip, raw.guess)
    }
}

impl ParameterSet {
    /// Build a parameter set, clamping every component into `[0, 1]`.
    ///
    /// Non-finite components fall back to the population default.
    pub fn new(prior: f64, transit: f64, slip: f64, guess: f64) -> Self {
        Self {
            prior: sanitize_probability(prior, DEFAULT_PRIOR),
            transit: sanitize_probability(transit, DEFAULT_TRANSIT),
            slip: sanitize_probability(slip, DEFAULT_SLIP),
            guess: sanitize_probability(guess, DEFAULT_GUESS),
        }
    }

    /// P(L0): probability the learner already knows the KC
    #[inline]
    pub fn prior(&self) -> f64 {
        self.prior
    }

    /// P(T): probability of moving unknown -> known after an opportunity
    #[inline]
    pub fn transit(&self) -> f64 {
        self.transit
    }

    /// P(S): probability of answering wrong while in the known state
    #[inline]
    pub fn slip(&self) -> f64 {
        self.slip
    }

    /// P(G): probability of answering right while in the unknown state
    #[inline]
    pub fn guess(&self) -> f64 {
        self.guess
    }

    /// Starting point used by the EM fitter when the caller has none
    pub fn em_seed() -> Self {
        Self::new(0.2, 0.1, 0.15, 0.25)
    }

    /// Largest absolute component-wise difference
    pub fn max_abs_diff(&self, other: &ParameterSet) -> f64 {
        (self.prior - other.prior)
            .abs()
            .max((self.transit - other.transit).abs())
            .max((self.slip - other.slip).abs())
            .max((self.guess - other.guess).abs())
    }

    /// True when every component lies strictly inside `(0, 1)`
    pub fn is_interior(&self) -> bool {
        [self.prior, self.transit, self.slip, self.guess]
            .iter()
            .all(|&p| p > 0.0 && p < 1.0)
    }

    /// Emission likelihood P(obs | known)
    #[inline]
    pub(crate) fn emit_known(&self, correct: bool) -> f64 {
        if correct {
            1.0 - self.slip
        } else {
            self.slip
        }
    }

    /// Emission likelihood P(obs | unknown)
    #[inline]
    pub(crate) fn emit_unknown(&self, correct: bool) -> f64 {
        if correct {
            self.guess
        } else {
            1.0 - self.guess
        }
    }
}

impl Default for ParameterSet {
    fn default() -> Self {
        Self {
            prior: DEFAULT_PRIOR,
            transit: DEFAULT_TRANSIT,
            slip: DEFAULT_SLIP,
            guess: DEFAULT_GUESS,
        }
    }
}

/// Ordered correctness observations for one (learner, KC) pair
pub type ObservationSequence = Vec<bool>;

/// Per-(learner, KC) mastery record
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MasteryEstimate {
    pub learner_id: LearnerId,
    pub kc_id: KcId,
    /// Current probability of mastery
    pub p_know: f64,
    /// Parameters in effect for this pair
    pub params: ParameterSet,
    pub attempts: u32,
    pub correct: u32,
}

impl MasteryEstimate {
    /// Fresh record before any observation; mastery starts at the prior
    pub fn new(learner_id: LearnerId, kc_id: KcId, params: ParameterSet) -> Self {
        Self {
            learner_id,
            kc_id,
            p_know: params.prior,
            params,
            attempts: 0,
            correct: 0,
        }
    }

    /// Empirical accuracy; zero attempts count as accuracy 0
    pub fn accuracy(&self) -> f64 {
        if self.attempts == 0 {
            0.0
        } else {
            self.correct as f64 / self.attempts as f64
        }
    }

    /// Record one observation: bump the counters and move `p_know`
    pub fn observe(&mut self, was_correct: bool, rule: crate::bkt::UpdateRule) -> f64 {
        self.attempts = self.attempts.saturating_add(1);
        if was_correct {
            self.correct = self.correct.saturating_add(1);
        }
        self.p_know = clamp_probability(rule.apply(self.p_know, was_correct, &self.params));
        self.p_know
    }
}
