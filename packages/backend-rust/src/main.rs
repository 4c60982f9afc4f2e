use bkt_backend::config::Config;
use bkt_backend::logging;
use bkt_backend::seed;
use bkt_backend::services::refit::{refit_population, RefitOutcome};
use bkt_backend::state::AppContext;
use bkt_backend::workers::WorkerManager;

#[tokio::main]
async fn main() {
    let _ = dotenvy::dotenv();
    let config = Config::from_env();
    let _log_guard = logging::init_tracing(&config.log);

    let ctx = AppContext::in_memory(config);
    tracing::info!(
        update_rule = ctx.config().update_rule.as_str(),
        selection = ctx.config().selection.as_str(),
        "bkt-backend starting"
    );

    if let Some(path) = ctx.config().seed_submissions_path.clone() {
        if let Err(e) = seed::seed_from_file(&ctx, &path) {
            tracing::warn!(error = %e, path = %path.display(), "seed history not loaded");
        }
    }

    if ctx.config().refit.fit_on_startup {
        match refit_population(&ctx).await {
            Ok(RefitOutcome::Published(model)) => {
                tracing::info!(generation = model.generation, "startup refit published")
            }
            Ok(RefitOutcome::Skipped { .. }) => {}
            Err(e) => tracing::error!(error = %e, "startup refit failed"),
        }
    }

    let worker_manager = match WorkerManager::new(ctx.clone()).await {
        Ok(manager) => {
            if let Err(e) = manager.start().await {
                tracing::error!(error = %e, "failed to start workers");
            }
            Some(manager)
        }
        Err(e) => {
            tracing::warn!(error = %e, "worker manager not initialized");
            None
        }
    };

    shutdown_signal().await;
    tracing::info!("shutdown signal received");

    if let Some(ref manager) = worker_manager {
        manager.stop().await;
    }

    tracing::info!(uptime_seconds = ctx.uptime_seconds(), "Graceful shutdown complete");
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        let mut sigterm = signal(SignalKind::terminate()).expect("failed to install SIGTERM handler");
        sigterm.recv().await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
