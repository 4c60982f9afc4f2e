//! Expectation-Maximization fitting of BKT parameters
//!
//! E-step: run forward-backward on every non-empty sequence and collect
//! expected sufficient statistics. M-step: closed-form re-estimates
//!
//! - L0 = Σ γ₀(known) / #sequences
//! - T  = Σ ξ(unknown→known) / Σ_{t<last} γ_t(unknown)
//! - S  = Σ γ(known) · [wrong] / Σ γ(known)
//! - G  = Σ γ(unknown) · [correct] / Σ γ(unknown)
//!
//! The per-sequence statistics form a commutative monoid, so the E-step is
//! computed in parallel (Rayon) and reduced in any order.

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::inference::infer;
use crate::sanitize::{clamp_fitted, stabilized_ratio};
use crate::types::{ParameterSet, EPSILON};

// ==================== Constants ====================

/// Default iteration cap
pub const DEFAULT_MAX_ITERATIONS: u32 = 100;

/// Default convergence threshold on the largest parameter change
pub const DEFAULT_TOLERANCE: f64 = 1e-5;

// ==================== Data Structures ====================

/// EM driver configuration
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EmConfig {
    /// Maximum number of EM iterations
    pub max_iterations: u32,
    /// Stop once every parameter moves less than this
    pub tolerance: f64,
    /// Run the E-step across sequences in parallel
    pub parallel: bool,
}

impl Default for EmConfig {
    fn default() -> Self {
        Self {
            max_iterations: DEFAULT_MAX_ITERATIONS,
            tolerance: DEFAULT_TOLERANCE,
            parallel: true,
        }
    }
}

/// Expected sufficient statistics accumulated over sequences
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct SufficientStats {
    pub sequences: usize,
    pub observations: usize,
    pub initial_known: f64,
    pub known: f64,
    pub known_incorrect: f64,
    pub unknown: f64,
    pub unknown_correct: f64,
    pub transitions: f64,
    pub unknown_before_last: f64,
    pub log_likelihood: f64,
}

impl SufficientStats {
    /// Statistics for a single sequence; empty sequences contribute nothing
    pub fn from_sequence(sequence: &[bool], params: &ParameterSet) -> Self {
        if sequence.is_empty() {
            return Self::default();
        }

        let posterior = infer(sequence, params);
        let mut stats = Self {
            sequences: 1,
            observations: sequence.len(),
            initial_known: posterior.gamma[0].known,
            transitions: posterior.xi.iter().sum(),
            log_likelihood: posterior.log_likelihood,
            ..Self::default()
        };

        for (g, &correct) in posterior.gamma.iter().zip(sequence) {
            stats.known += g.known;
            stats.unknown += g.unknown;
            if correct {
                stats.unknown_correct += g.unknown;
            } else {
                stats.known_incorrect += g.known;
            }
        }

        let last = posterior.gamma.len() - 1;
        stats.unknown_before_last = posterior.gamma[..last]
            .iter()
            .map(|g| 1.0 - g.known)
            .sum();

        stats
    }

    /// Combine two partial sums
    pub fn merge(self, other: Self) -> Self {
        Self {
            sequences: self.sequences + other.sequences,
            observations: self.observations + other.observations,
            initial_known: self.initial_known + other.initial_known,
            known: self.known + other.known,
            known_incorrect: self.known_incorrect + other.known_incorrect,
            unknown: self.unknown + other.unknown,
            unknown_correct: self.unknown_correct + other.unknown_correct,
            transitions: self.transitions + other.transitions,
            unknown_before_last: self.unknown_before_last + other.unknown_before_last,
            log_likelihood: self.log_likelihood + other.log_likelihood,
        }
    }

    /// M-step: re-estimate and clamp into (0, 1)
    pub fn maximize(&self) -> Option<ParameterSet> {
        if self.sequences == 0 {
            return None;
        }

        let prior = self.initial_known / self.sequences as f64;
        let transit = stabilized_ratio(self.transitions, self.unknown_before_last, EPSILON);
        let slip = stabilized_ratio(self.known_incorrect, self.known, EPSILON);
        let guess = stabilized_ratio(self.unknown_correct, self.unknown, EPSILON);

        Some(ParameterSet::new(
            clamp_fitted(prior),
            clamp_fitted(transit),
            clamp_fitted(slip),
            clamp_fitted(guess),
        ))
    }
}

/// Outcome of an EM run
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FitResult {
    pub params: ParameterSet,
    /// Iterations actually run
    pub iterations: u32,
    /// True if the loop stopped on the tolerance rather than the cap
    pub converged: bool,
    /// Largest parameter change in the final iteration
    pub max_delta: f64,
    /// Data log-likelihood under the parameters of the final E-step
    pub log_likelihood: f64,
    pub sequence_count: usize,
    pub observation_count: usize,
}

/// Error returned by the EM fitter
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum FitError {
    #[error("no non-empty observation sequences to fit")]
    InsufficientData,
}

// ==================== Fitter ====================

/// BKT parameter estimator
#[derive(Clone, Debug, Default)]
pub struct EmFitter {
    config: EmConfig,
}

impl EmFitter {
    pub fn new(config: EmConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &EmConfig {
        &self.config
    }

    /// One E-step over all sequences under `params`
    pub fn expectation<S: AsRef<[bool]> + Sync>(
        &self,
        sequences: &[S],
        params: &ParameterSet,
    ) -> SufficientStats {
        if self.config.parallel {
            sequences
                .par_iter()
                .map(|seq| SufficientStats::from_sequence(seq.as_ref(), params))
                .reduce(SufficientStats::default, SufficientStats::merge)
        } else {
            sequences
                .iter()
                .map(|seq| SufficientStats::from_sequence(seq.as_ref(), params))
                .fold(SufficientStats::default(), SufficientStats::merge)
        }
    }

    /// Fit parameters and report convergence details
    pub fn fit_report<S: AsRef<[bool]> + Sync>(
        &self,
        sequences: &[S],
        initial: ParameterSet,
    ) -> Result<FitResult, FitError> {
        let usable: Vec<&[bool]> = sequences
            .iter()
            .map(|s| s.as_ref())
            .filter(|s| !s.is_empty())
            .collect();

        if usable.is_empty() {
            return Err(FitError::InsufficientData);
        }

        let sequence_count = usable.len();
        let observation_count = usable.iter().map(|s| s.len()).sum();

        let mut params = initial;
        let mut iterations = 0;
        let mut converged = false;
        let mut max_delta = 0.0;
        let mut log_likelihood = 0.0;

        while iterations < self.config.max_iterations {
            let stats = self.expectation(&usable, &params);
            log_likelihood = stats.log_likelihood;

            let next = stats.maximize().ok_or(FitError::InsufficientData)?;
            max_delta = next.max_abs_diff(&params);
            params = next;
            iterations += 1;

            if max_delta < self.config.tolerance {
                converged = true;
                break;
            }
        }

        Ok(FitResult {
            params,
            iterations,
            converged,
            max_delta,
            log_likelihood,
            sequence_count,
            observation_count,
        })
    }

    /// Fit parameters, returning only the final iterate
    pub fn fit<S: AsRef<[bool]> + Sync>(
        &self,
        sequences: &[S],
        initial: ParameterSet,
    ) -> Result<ParameterSet, FitError> {
        self.fit_report(sequences, initial).map(|r| r.params)
    }
}

/// Fit BKT parameters with an explicit iteration cap and tolerance
pub fn fit<S: AsRef<[bool]> + Sync>(
    sequences: &[S],
    initial: ParameterSet,
    max_iterations: u32,
    tolerance: f64,
) -> Result<ParameterSet, FitError> {
    EmFitter::new(EmConfig {
        max_iterations,
        tolerance,
        parallel: true,
    })
    .fit(sequences, initial)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn population() -> Vec<Vec<bool>> {
        let raw: Vec<Vec<u8>> = vec![
            vec![0, 0, 1, 1, 1],
            vec![1, 1, 1, 1],
            vec![0, 1, 0, 1, 1, 1],
            vec![0, 0, 0, 1],
            vec![1, 0, 1, 1],
            vec![],
            vec![0, 0, 0, 0, 1, 1],
            vec![1],
            vec![0, 1, 1],
        ];
        raw.into_iter()
            .map(|s| s.into_iter().map(|o| o == 1).collect())
            .collect()
    }

    fn strict(max_iterations: u32, tolerance: f64) -> EmFitter {
        EmFitter::new(EmConfig {
            max_iterations,
            tolerance,
            parallel: false,
        })
    }

    // ==================== Sufficient statistics ====================

    #[test]
    fn test_empty_sequence_contributes_nothing() {
        let stats = SufficientStats::from_sequence(&[], &ParameterSet::default());
        assert_eq!(stats, SufficientStats::default());
        assert!(stats.maximize().is_none());
    }

    #[test]
    fn test_single_step_sequence_has_no_transition_mass() {
        let stats = SufficientStats::from_sequence(&[true], &ParameterSet::default());

        assert_eq!(stats.sequences, 1);
        assert_eq!(stats.transitions, 0.0);
        assert_eq!(stats.unknown_before_last, 0.0);
        assert!((stats.known + stats.unknown - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_merge_is_commutative() {
        let p = ParameterSet::default();
        let a = SufficientStats::from_sequence(&[false, true, true], &p);
        let b = SufficientStats::from_sequence(&[true, false], &p);

        assert_eq!(a.merge(b), b.merge(a));
    }

    // ==================== Fitting ====================

    #[test]
    fn test_all_empty_is_insufficient_data() {
        let seqs: Vec<Vec<bool>> = vec![vec![], vec![]];
        let result = strict(10, 1e-5).fit(&seqs, ParameterSet::em_seed());
        assert_eq!(result, Err(FitError::InsufficientData));

        let none: Vec<Vec<bool>> = Vec::new();
        assert!(fit(&none, ParameterSet::em_seed(), 10, 1e-5).is_err());
    }

    #[test]
    fn test_single_sequence_converges() {
        let seqs = vec![vec![false, false, true, true, true]];
        let initial = ParameterSet::new(0.2, 0.2, 0.1, 0.2);

        let report = strict(50, 1e-5).fit_report(&seqs, initial).unwrap();

        assert!(report.converged);
        assert!(report.iterations < 50);
        assert!(report.params.is_interior());
        assert!(report.max_delta < 1e-5);
        assert_eq!(report.sequence_count, 1);
        assert_eq!(report.observation_count, 5);
    }

    #[test]
    fn test_zero_iterations_returns_initial() {
        let seqs = population();
        let initial = ParameterSet::em_seed();

        let report = strict(0, 1e-5).fit_report(&seqs, initial).unwrap();
        assert_eq!(report.params, initial);
        assert_eq!(report.iterations, 0);
        assert!(!report.converged);
    }

    #[test]
    fn test_empty_sequences_are_skipped() {
        let seqs = population();
        let report = strict(5, 1e-5)
            .fit_report(&seqs, ParameterSet::em_seed())
            .unwrap();

        assert_eq!(report.sequence_count, 8);
        assert_eq!(report.observation_count, 33);
    }

    #[test]
    fn test_fixed_point_is_stable() {
        let seqs = population();
        let fitter = strict(500, 1e-6);

        let first = fitter.fit_report(&seqs, ParameterSet::em_seed()).unwrap();
        assert!(first.converged);

        let second = fitter.fit(&seqs, first.params).unwrap();
        assert!(second.max_abs_diff(&first.params) < 1e-6);
    }

    #[test]
    fn test_parallel_matches_sequential() {
        let seqs = population();
        let sequential = strict(40, 1e-8).fit(&seqs, ParameterSet::em_seed()).unwrap();
        let parallel = EmFitter::new(EmConfig {
            max_iterations: 40,
            tolerance: 1e-8,
            parallel: true,
        })
        .fit(&seqs, ParameterSet::em_seed())
        .unwrap();

        assert!(sequential.max_abs_diff(&parallel) < 1e-9);
    }

    #[test]
    fn test_fitted_params_are_clamped() {
        // Perfect learners drive slip and guess towards the bounds
        let seqs = vec![vec![true; 6]; 4];
        let params = strict(200, 1e-7).fit(&seqs, ParameterSet::em_seed()).unwrap();

        assert!(params.is_interior());
        assert!(params.slip() >= 1e-6);
    }

    #[test]
    fn test_log_likelihood_improves() {
        let seqs = population();
        let one = strict(1, 0.0).fit_report(&seqs, ParameterSet::em_seed()).unwrap();
        let many = strict(30, 0.0).fit_report(&seqs, ParameterSet::em_seed()).unwrap();

        assert!(many.log_likelihood >= one.log_likelihood - 1e-9);
    }
}
