use recommendation_engine::jobs;
use recommendation_engine::services::source::{default_events_path, JsonFileSource};
use recommendation_engine::services::{
    ContentHandle, CurrentModel, ModelLifecycleManager, RecommendationScorer,
};
use recommendation_engine::Config;
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env())
        .init();

    // Load config
    let config = Config::from_env();
    info!(
        "Starting {} v{}",
        config.service.service_name,
        env!("CARGO_PKG_VERSION")
    );

    // Wire the engine: event source, serving handles, scorer, lifecycle
    let events_path = default_events_path();
    info!(events_file = %events_path.display(), "Using file-backed event source");
    let source = Arc::new(JsonFileSource::new(events_path));

    let current = Arc::new(CurrentModel::empty());
    let content_handle = Arc::new(ContentHandle::empty());
    let scorer = Arc::new(RecommendationScorer::new(
        current.clone(),
        content_handle.clone(),
        config.hybrid.clone(),
    ));
    let manager = ModelLifecycleManager::new(
        &config,
        source.clone(),
        source,
        current,
        content_handle,
        scorer.clone(),
    );

    // Serve from the last persisted artifact when one exists
    match manager.load_current().await {
        Ok(()) => info!("Published persisted model for serving"),
        Err(err) => warn!(error = %err, "No persisted model available yet"),
    }

    let mode = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "health".to_string());

    match mode.as_str() {
        "incremental" => {
            jobs::run_incremental(&manager).await?;
        }
        "full" => {
            jobs::run_full(&manager).await?;
        }
        "deep" => {
            jobs::run_deep(&manager).await?;
        }
        "backups" => {
            let backups = manager.list_backups()?;
            info!(count = backups.len(), "Available backups");
            for (rank, backup) in backups.iter().enumerate() {
                info!(
                    rank,
                    path = %backup.path.display(),
                    modified = %backup.modified,
                    size_bytes = backup.size_bytes,
                    "Backup"
                );
            }
        }
        "health" => {
            let health = manager.check_health();
            info!(status = %health.status, "Model health report");
            if let Some(age_days) = health.age_days {
                info!(age_days, "Model age");
            }
            for issue in &health.issues {
                error!(issue = %issue, "Health issue");
            }
            for warning in &health.warnings {
                warn!(warning = %warning, "Health warning");
            }
        }
        other => {
            error!(
                mode = %other,
                "Unknown mode, expected one of incremental|full|deep|health|backups"
            );
            std::process::exit(2);
        }
    }

    Ok(())
}
