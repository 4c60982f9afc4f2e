use std::path::Path;

use tracing::{debug, info};

use crate::db::{StoreError, Submission};
use crate::services::mastery::{record_observation_at, MasteryError};
use crate::state::AppContext;

/// Read a JSON array of submissions.
pub fn load_submissions(path: &Path) -> Result<Vec<Submission>, StoreError> {
    let raw = std::fs::read_to_string(path)?;
    let submissions: Vec<Submission> = serde_json::from_str(&raw)?;
    debug!(path = %path.display(), count = submissions.len(), "seed file parsed");
    Ok(submissions)
}

/// Replay a seed file through the online update, oldest submission first.
///
/// Rebuilds both the submission history and the mastery rows. Returns the number of
/// submissions replayed.
pub fn seed_from_file(ctx: &AppContext, path: &Path) -> Result<usize, MasteryError> {
    let mut submissions = load_submissions(path)?;
    submissions.sort_by_key(|s| s.created_at);

    for s in &submissions {
        record_observation_at(ctx, s.learner_id, s.kc_id, s.is_correct, s.created_at)?;
    }

    info!(path = %path.display(), submissions = submissions.len(), "seed history loaded");
    Ok(submissions.len())
}
