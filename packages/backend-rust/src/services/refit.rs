use std::sync::Arc;

use bkt_algo::{EmFitter, FitError};
use tracing::{debug, info};

use crate::db::StoreError;
use crate::state::{AppContext, ModelGeneration};

#[derive(Debug, thiserror::Error)]
pub enum RefitError {
    #[error("store error: {0}")]
    Store(#[from] StoreError),
    #[error("fit error: {0}")]
    Fit(#[from] FitError),
    #[error("fit task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

#[derive(Debug, Clone)]
pub enum RefitOutcome {
    Published(Arc<ModelGeneration>),
    Skipped {
        usable_sequences: usize,
        required: usize,
    },
}

impl RefitOutcome {
    pub fn generation(&self) -> Option<u64> {
        match self {
            Self::Published(model) => Some(model.generation),
            Self::Skipped { .. } => None,
        }
    }
}

/// Fit population parameters on all recorded history and publish a new generation.
///
/// Starts EM from the current generation's parameters. Existing mastery rows are
/// never touched; only pairs created afterwards use the new parameters.
pub async fn refit_population(ctx: &AppContext) -> Result<RefitOutcome, RefitError> {
    let sequences = ctx.history().sequences(None)?;
    let usable_sequences = sequences.iter().filter(|s| !s.is_empty()).count();
    let required = ctx.config().refit.min_sequences.max(1);

    if usable_sequences < required {
        info!(usable_sequences, required, "refit skipped: not enough history");
        return Ok(RefitOutcome::Skipped {
            usable_sequences,
            required,
        });
    }

    let models = ctx.models();
    let initial = models.params();
    let fitter = EmFitter::new(ctx.config().em.clone());

    // EM is CPU-bound
    let fit = tokio::task::spawn_blocking(move || fitter.fit_report(&sequences, initial)).await??;

    debug!(fit = ?fit, "EM finished");
    let model = models.publish(fit);

    if let Some(fit) = &model.fit {
        info!(
            generation = model.generation,
            iterations = fit.iterations,
            converged = fit.converged,
            log_likelihood = fit.log_likelihood,
            sequences = fit.sequence_count,
            observations = fit.observation_count,
            prior = model.params.prior(),
            transit = model.params.transit(),
            slip = model.params.slip(),
            guess = model.params.guess(),
            "population parameters published"
        );
    }

    Ok(RefitOutcome::Published(model))
}
