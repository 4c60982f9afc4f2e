use bkt_algo::{KcId, LearnerId, MasteryEstimate};
use chrono::{DateTime, Utc};
use tracing::{debug, error, info};

use crate::db::{MasteryRecord, StoreError, Submission};
use crate::state::AppContext;

#[derive(Debug, thiserror::Error)]
pub enum MasteryError {
    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

/// Record a graded answer and update the pair's mastery.
pub fn record_observation(
    ctx: &AppContext,
    learner_id: LearnerId,
    kc_id: KcId,
    is_correct: bool,
) -> Result<MasteryRecord, MasteryError> {
    record_observation_at(ctx, learner_id, kc_id, is_correct, Utc::now())
}

/// Same as [`record_observation`] with an explicit submission time (used when replaying history).
///
/// The mastery row is written first and the submission appended second; if the
/// append fails the row is restored, so history and mastery never disagree.
pub fn record_observation_at(
    ctx: &AppContext,
    learner_id: LearnerId,
    kc_id: KcId,
    is_correct: bool,
    at: DateTime<Utc>,
) -> Result<MasteryRecord, MasteryError> {
    let locks = ctx.pair_locks();
    let pair_lock = locks.lock_for(learner_id, kc_id);
    let result = {
        let _guard = pair_lock.lock();
        apply_observation(ctx, learner_id, kc_id, is_correct, at)
    };
    locks.release(learner_id, kc_id, pair_lock);
    result
}

fn apply_observation(
    ctx: &AppContext,
    learner_id: LearnerId,
    kc_id: KcId,
    is_correct: bool,
    at: DateTime<Utc>,
) -> Result<MasteryRecord, MasteryError> {
    let repo = ctx.mastery();
    let previous = repo.load(learner_id, kc_id)?;
    let mut record = match &previous {
        Some(existing) => existing.clone(),
        None => {
            // new pairs pick up the current generation; existing pairs keep theirs
            let model = ctx.models().current();
            info!(
                learner_id,
                kc_id,
                generation = model.generation,
                prior = model.params.prior(),
                "mastery pair created"
            );
            MasteryRecord {
                estimate: MasteryEstimate::new(learner_id, kc_id, model.params),
                generation: model.generation,
                created_at: at,
                updated_at: at,
            }
        }
    };

    let before = record.estimate.p_know;
    let after = record.estimate.observe(is_correct, ctx.config().update_rule);
    record.updated_at = at;

    repo.save(&record)?;

    let appended = ctx.history().append(Submission {
        learner_id,
        kc_id,
        is_correct,
        created_at: at,
    });
    if let Err(err) = appended {
        let restored = match &previous {
            Some(existing) => repo.save(existing),
            None => repo.delete(learner_id, kc_id),
        };
        if let Err(rollback_err) = restored {
            error!(
                learner_id,
                kc_id,
                error = %rollback_err,
                "failed to restore mastery row after history append error"
            );
        }
        return Err(err.into());
    }

    debug!(
        learner_id,
        kc_id,
        is_correct,
        p_know_before = before,
        p_know = after,
        attempts = record.estimate.attempts,
        "mastery updated"
    );

    Ok(record)
}

/// All mastery rows of a learner, ordered by KC id.
pub fn learner_mastery(
    ctx: &AppContext,
    learner_id: LearnerId,
) -> Result<Vec<MasteryRecord>, MasteryError> {
    Ok(ctx.mastery().list_for_learner(learner_id)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use bkt_algo::UpdateRule;

    #[test]
    fn test_first_observation_creates_pair_from_current_generation() {
        let ctx = AppContext::in_memory(Config::default());

        let record = record_observation(&ctx, 1, 42, true).unwrap();

        assert_eq!(record.estimate.attempts, 1);
        assert_eq!(record.estimate.correct, 1);
        assert_eq!(record.generation, 0);
        assert!((record.estimate.p_know - 0.6).abs() < 1e-9);
        assert_eq!(ctx.history().count().unwrap(), 1);
    }

    #[test]
    fn test_wrong_answer_lowers_mastery() {
        let ctx = AppContext::in_memory(Config::default());

        let record = record_observation(&ctx, 1, 42, false).unwrap();

        assert_eq!(record.estimate.correct, 0);
        assert!((record.estimate.p_know - 0.175_757_575).abs() < 1e-6);
    }

    #[test]
    fn test_configured_update_rule_is_applied() {
        let config = Config {
            update_rule: UpdateRule::Smoothed,
            ..Config::default()
        };
        let ctx = AppContext::in_memory(config);

        let record = record_observation(&ctx, 1, 1, true).unwrap();
        let expected = bkt_algo::update_smoothed(0.2, true, &ctx.models().params());

        assert!((record.estimate.p_know - expected).abs() < 1e-12);
    }

    #[test]
    fn test_learner_mastery_lists_only_that_learner() {
        let ctx = AppContext::in_memory(Config::default());
        record_observation(&ctx, 1, 3, true).unwrap();
        record_observation(&ctx, 1, 1, false).unwrap();
        record_observation(&ctx, 2, 1, true).unwrap();

        let rows = learner_mastery(&ctx, 1).unwrap();

        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].kc_id(), 1);
        assert_eq!(rows[1].kc_id(), 3);
        assert!(learner_mastery(&ctx, 99).unwrap().is_empty());
    }

    #[test]
    fn test_pair_lock_released_after_observation() {
        let ctx = AppContext::in_memory(Config::default());

        record_observation(&ctx, 1, 3, true).unwrap();
        record_observation(&ctx, 2, 3, false).unwrap();

        assert_eq!(ctx.pair_locks().len(), 0);
    }
}
