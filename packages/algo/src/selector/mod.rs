//! Adaptive KC selection
//!
//! Picks the weakest knowledge component among the eligible ones so the next
//! piece of content targets it. Two orderings exist and they can disagree
//! (a KC with few lucky answers has high accuracy but low mastery), so each
//! is a named strategy and the caller chooses one.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::types::{KcId, MasteryEstimate};

/// Ordering used to rank KCs
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SelectionStrategy {
    /// Minimum `p_know`
    #[default]
    LowestMastery,
    /// Minimum `correct / attempts`, zero attempts counting as 0
    LowestAccuracy,
}

impl SelectionStrategy {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "mastery" | "lowest_mastery" | "p_know" => Some(Self::LowestMastery),
            "accuracy" | "lowest_accuracy" => Some(Self::LowestAccuracy),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::LowestMastery => "lowest_mastery",
            Self::LowestAccuracy => "lowest_accuracy",
        }
    }

    /// Score used for ranking; lower is weaker
    pub fn score(&self, estimate: &MasteryEstimate) -> f64 {
        match self {
            Self::LowestMastery => estimate.p_know,
            Self::LowestAccuracy => estimate.accuracy(),
        }
    }
}

/// Result of a selection
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SelectionResult {
    /// `None` when no eligible estimate exists
    pub kc_id: Option<KcId>,
    /// Ranking score of the chosen KC
    pub score: Option<f64>,
    pub strategy: SelectionStrategy,
}

impl SelectionResult {
    pub fn none(strategy: SelectionStrategy) -> Self {
        Self {
            kc_id: None,
            score: None,
            strategy,
        }
    }

    pub fn is_none(&self) -> bool {
        self.kc_id.is_none()
    }
}

/// Capability: choose the weakest eligible KC
pub trait Selector {
    fn select_worst(
        &self,
        estimates: &[MasteryEstimate],
        eligible_kc_ids: &HashSet<KcId>,
    ) -> SelectionResult;
}

impl Selector for SelectionStrategy {
    fn select_worst(
        &self,
        estimates: &[MasteryEstimate],
        eligible_kc_ids: &HashSet<KcId>,
    ) -> SelectionResult {
        let mut worst: Option<(KcId, f64)> = None;

        for estimate in estimates
            .iter()
            .filter(|e| eligible_kc_ids.contains(&e.kc_id))
        {
            let score = self.score(estimate);
            // NaN never wins; ties keep the earlier estimate
            let weaker = match worst {
                None => !score.is_nan(),
                Some((_, best)) => score < best,
            };
            if weaker {
                worst = Some((estimate.kc_id, score));
            }
        }

        match worst {
            Some((kc_id, score)) => SelectionResult {
                kc_id: Some(kc_id),
                score: Some(score),
                strategy: *self,
            },
            None => SelectionResult::none(*self),
        }
    }
}

/// Select with the given strategy
pub fn select_worst(
    estimates: &[MasteryEstimate],
    eligible_kc_ids: &HashSet<KcId>,
    strategy: SelectionStrategy,
) -> Option<KcId> {
    strategy.select_worst(estimates, eligible_kc_ids).kc_id
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ParameterSet;

    fn estimate(kc_id: KcId, p_know: f64, attempts: u32, correct: u32) -> MasteryEstimate {
        MasteryEstimate {
            learner_id: 1,
            kc_id,
            p_know,
            params: ParameterSet::default(),
            attempts,
            correct,
        }
    }

    fn eligible(ids: &[KcId]) -> HashSet<KcId> {
        ids.iter().copied().collect()
    }

    #[test]
    fn test_picks_lowest_mastery() {
        let estimates = vec![estimate(1, 0.9, 0, 0), estimate(2, 0.3, 0, 0)];

        let result = SelectionStrategy::LowestMastery.select_worst(&estimates, &eligible(&[1, 2]));
        assert_eq!(result.kc_id, Some(2));
        assert_eq!(result.score, Some(0.3));
    }

    #[test]
    fn test_empty_estimates_select_nothing() {
        let result = SelectionStrategy::LowestMastery.select_worst(&[], &eligible(&[1, 2]));

        assert!(result.is_none());
        assert_eq!(result.score, None);
        assert_eq!(select_worst(&[], &eligible(&[1]), SelectionStrategy::LowestAccuracy), None);
    }

    #[test]
    fn test_ineligible_kcs_are_ignored() {
        let estimates = vec![estimate(1, 0.1, 0, 0), estimate(2, 0.6, 0, 0)];

        assert_eq!(
            select_worst(&estimates, &eligible(&[2, 3]), SelectionStrategy::LowestMastery),
            Some(2)
        );
        assert_eq!(
            select_worst(&estimates, &eligible(&[3]), SelectionStrategy::LowestMastery),
            None
        );
    }

    #[test]
    fn test_accuracy_ordering_treats_unattempted_as_zero() {
        let estimates = vec![
            estimate(1, 0.2, 4, 3), // 0.75
            estimate(2, 0.1, 2, 1), // 0.5
            estimate(3, 0.9, 0, 0), // 0.0
        ];

        assert_eq!(
            select_worst(&estimates, &eligible(&[1, 2, 3]), SelectionStrategy::LowestAccuracy),
            Some(3)
        );
    }

    #[test]
    fn test_strategies_can_disagree() {
        let estimates = vec![estimate(1, 0.2, 2, 2), estimate(2, 0.5, 4, 1)];
        let all = eligible(&[1, 2]);

        assert_eq!(select_worst(&estimates, &all, SelectionStrategy::LowestMastery), Some(1));
        assert_eq!(select_worst(&estimates, &all, SelectionStrategy::LowestAccuracy), Some(2));
    }

    #[test]
    fn test_ties_keep_first_estimate() {
        let estimates = vec![estimate(5, 0.4, 0, 0), estimate(2, 0.4, 0, 0)];

        assert_eq!(
            select_worst(&estimates, &eligible(&[2, 5]), SelectionStrategy::LowestMastery),
            Some(5)
        );
    }

    #[test]
    fn test_strategy_from_str() {
        assert_eq!(SelectionStrategy::from_str("mastery"), Some(SelectionStrategy::LowestMastery));
        assert_eq!(SelectionStrategy::from_str("ACCURACY"), Some(SelectionStrategy::LowestAccuracy));
        assert_eq!(SelectionStrategy::from_str("random"), None);
    }
}
