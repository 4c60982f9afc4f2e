use std::time::Instant;

use tracing::info;

use crate::services::refit::{refit_population, RefitOutcome};
use crate::state::AppContext;

pub async fn run_refit_cycle(ctx: AppContext) -> Result<(), super::WorkerError> {
    let start = Instant::now();
    info!("Starting population refit cycle");

    let outcome = refit_population(&ctx).await?;
    let duration_ms = start.elapsed().as_millis() as u64;

    match outcome {
        RefitOutcome::Published(model) => info!(
            generation = model.generation,
            duration_ms,
            "Refit cycle completed"
        ),
        RefitOutcome::Skipped {
            usable_sequences,
            required,
        } => info!(
            usable_sequences,
            required,
            duration_ms,
            "Refit cycle skipped"
        ),
    }

    Ok(())
}
