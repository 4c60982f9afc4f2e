use std::collections::HashSet;

use bkt_algo::{KcId, LearnerId, MasteryEstimate, SelectionResult, SelectionStrategy, Selector};
use tracing::debug;

use crate::db::StoreError;
use crate::state::AppContext;

#[derive(Debug, thiserror::Error)]
pub enum AdaptiveError {
    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

/// Pick the learner's weakest eligible KC with the configured strategy.
pub fn next_kc(
    ctx: &AppContext,
    learner_id: LearnerId,
    eligible_kc_ids: &HashSet<KcId>,
) -> Result<SelectionResult, AdaptiveError> {
    next_kc_with(ctx, learner_id, eligible_kc_ids, ctx.config().selection)
}

pub fn next_kc_with(
    ctx: &AppContext,
    learner_id: LearnerId,
    eligible_kc_ids: &HashSet<KcId>,
    strategy: SelectionStrategy,
) -> Result<SelectionResult, AdaptiveError> {
    if eligible_kc_ids.is_empty() {
        return Ok(SelectionResult::none(strategy));
    }

    let estimates: Vec<MasteryEstimate> = ctx
        .mastery()
        .list_for_learner(learner_id)?
        .into_iter()
        .map(|r| r.estimate)
        .collect();

    let result = strategy.select_worst(&estimates, eligible_kc_ids);
    debug!(
        learner_id,
        strategy = strategy.as_str(),
        candidates = estimates.len(),
        kc_id = ?result.kc_id,
        "adaptive selection"
    );
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::services::mastery::record_observation;

    fn eligible(ids: &[KcId]) -> HashSet<KcId> {
        ids.iter().copied().collect()
    }

    #[test]
    fn test_picks_lowest_mastery() {
        let ctx = AppContext::in_memory(Config::default());
        record_observation(&ctx, 1, 1, true).unwrap();
        record_observation(&ctx, 1, 2, false).unwrap();
        record_observation(&ctx, 1, 3, true).unwrap();

        let result = next_kc(&ctx, 1, &eligible(&[1, 2, 3])).unwrap();

        assert_eq!(result.kc_id, Some(2));
        assert_eq!(result.strategy, SelectionStrategy::LowestMastery);
    }

    #[test]
    fn test_ignores_ineligible_and_unseen_kcs() {
        let ctx = AppContext::in_memory(Config::default());
        record_observation(&ctx, 1, 1, true).unwrap();
        record_observation(&ctx, 1, 2, false).unwrap();

        assert_eq!(next_kc(&ctx, 1, &eligible(&[1, 7])).unwrap().kc_id, Some(1));
        assert!(next_kc(&ctx, 1, &eligible(&[7, 8])).unwrap().is_none());
        assert!(next_kc(&ctx, 1, &HashSet::new()).unwrap().is_none());
        assert!(next_kc(&ctx, 2, &eligible(&[1, 2])).unwrap().is_none());
    }

    #[test]
    fn test_accuracy_strategy() {
        let ctx = AppContext::in_memory(Config::default());
        // kc 1: 1/2 correct, kc 2: 2/3 correct
        record_observation(&ctx, 1, 1, true).unwrap();
        record_observation(&ctx, 1, 1, false).unwrap();
        record_observation(&ctx, 1, 2, false).unwrap();
        record_observation(&ctx, 1, 2, true).unwrap();
        record_observation(&ctx, 1, 2, true).unwrap();

        let result =
            next_kc_with(&ctx, 1, &eligible(&[1, 2]), SelectionStrategy::LowestAccuracy).unwrap();

        assert_eq!(result.kc_id, Some(1));
        assert_eq!(result.score, Some(0.5));
    }
}
