//! Training job entry points.
//!
//! The manager has no notion of wall-clock schedules; an external trigger
//! (cron job, operator command) invokes one of these functions. Each logs
//! the run outcome and reports evaluation rejection as a warning rather
//! than an error, matching the deployment-gate semantics.

use crate::error::Result;
use crate::models::TrainingMode;
use crate::services::lifecycle::{ModelLifecycleManager, TrainingReport};
use tracing::{info, warn};

/// Daily job: short lookback, new similarity blended into the prior model.
pub async fn run_incremental(manager: &ModelLifecycleManager) -> Result<TrainingReport> {
    run_job(manager, TrainingMode::Incremental).await
}

/// Weekly job: full lookback with holdout evaluation.
pub async fn run_full(manager: &ModelLifecycleManager) -> Result<TrainingReport> {
    run_job(manager, TrainingMode::Full).await
}

/// Monthly job: full lookback plus hyperparameter search.
pub async fn run_deep(manager: &ModelLifecycleManager) -> Result<TrainingReport> {
    run_job(manager, TrainingMode::Deep).await
}

async fn run_job(manager: &ModelLifecycleManager, mode: TrainingMode) -> Result<TrainingReport> {
    info!(mode = mode.as_str(), "Training job started");

    let report = manager.run(mode).await.map_err(|err| {
        warn!(mode = mode.as_str(), error = %err, "Training job failed");
        err
    })?;

    if report.deployed {
        info!(
            mode = mode.as_str(),
            version = %report.version,
            duration_ms = report.duration_ms,
            "Training job completed, model deployed"
        );
    } else {
        warn!(
            mode = mode.as_str(),
            version = %report.version,
            reason = report.rejection.as_deref().unwrap_or("unknown"),
            "Training job completed, model did not meet deployment criteria"
        );
    }

    Ok(report)
}
