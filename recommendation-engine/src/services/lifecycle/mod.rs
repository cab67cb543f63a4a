//! Model lifecycle orchestration: backup, train, validate, evaluate,
//! deploy, rollback.
//!
//! Serving reads an immutable artifact through [`CurrentModel`]; this
//! module owns the only code path that replaces that reference, and it does
//! so atomically after a candidate has been fully built, validated and
//! evaluated. At most one training run is active at a time; an overlapping
//! trigger returns [`EngineError::TrainingInProgress`] instead of queueing.

pub mod backup;
pub mod evaluator;
pub mod store;
pub mod tracker;

pub use backup::{BackupEntry, BackupStore};
pub use evaluator::{EvaluationMetrics, Evaluator};
pub use store::ModelStore;
pub use tracker::{MetricsEntry, PerformanceTracker};

use crate::config::{Config, EvaluationConfig, TrainingConfig};
use crate::error::{EngineError, Result};
use crate::models::{
    InteractionMatrix, ModelArtifact, ModelMetadata, SimilarityMatrix, TrainingMode,
};
use crate::services::interaction::InteractionMatrixBuilder;
use crate::services::scoring::{ContentHandle, CurrentModel, RecommendationScorer};
use crate::services::similarity::{CoOccurrenceFilter, SimilarityEngine};
use crate::services::source::{ContentModelProvider, InteractionSource};
use chrono::Utc;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};
use tracing::{error, info, warn};
use uuid::Uuid;

/// Validation floors for a freshly trained candidate.
const MIN_PRODUCTS: usize = 10;
const MIN_USERS: usize = 50;
const HIGH_SPARSITY: f64 = 0.99;

/// Model age (days) after which the health report suggests retraining.
const STALE_MODEL_DAYS: f64 = 7.0;

/// Deep-mode hyperparameter grid.
const DEEP_CO_OCCURRENCE_GRID: &[u32] = &[3, 5, 7];
const DEEP_VIEW_WEIGHT_GRID: &[f64] = &[0.2, 0.3, 0.5];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PipelineState {
    Idle,
    Training,
    Validating,
    Evaluating,
    Deploying,
    Failed,
}

impl PipelineState {
    pub fn as_str(&self) -> &'static str {
        match self {
            PipelineState::Idle => "idle",
            PipelineState::Training => "training",
            PipelineState::Validating => "validating",
            PipelineState::Evaluating => "evaluating",
            PipelineState::Deploying => "deploying",
            PipelineState::Failed => "failed",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct TrainingReport {
    pub mode: TrainingMode,
    pub version: String,
    pub deployed: bool,
    pub rejection: Option<String>,
    pub metrics: EvaluationMetrics,
    pub duration_ms: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct HealthStatus {
    pub status: String,
    pub issues: Vec<String>,
    pub warnings: Vec<String>,
    pub age_days: Option<f64>,
    pub metadata: Option<ModelMetadata>,
}

struct CandidateModel {
    artifact: ModelArtifact,
    metrics: EvaluationMetrics,
    gate: std::result::Result<(), String>,
}

pub struct ModelLifecycleManager {
    training: TrainingConfig,
    evaluation: EvaluationConfig,
    source: Arc<dyn InteractionSource>,
    content_provider: Arc<dyn ContentModelProvider>,
    store: ModelStore,
    backups: BackupStore,
    tracker: PerformanceTracker,
    current: Arc<CurrentModel>,
    content_handle: Arc<ContentHandle>,
    scorer: Arc<RecommendationScorer>,
    run_lock: tokio::sync::Mutex<()>,
    state: RwLock<PipelineState>,
}

impl ModelLifecycleManager {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        config: &Config,
        source: Arc<dyn InteractionSource>,
        content_provider: Arc<dyn ContentModelProvider>,
        current: Arc<CurrentModel>,
        content_handle: Arc<ContentHandle>,
        scorer: Arc<RecommendationScorer>,
    ) -> Self {
        Self {
            training: config.training.clone(),
            evaluation: config.evaluation.clone(),
            source,
            content_provider,
            store: ModelStore::new(config.storage.model_path()),
            backups: BackupStore::new(config.storage.backup_dir(), config.storage.max_backups),
            tracker: PerformanceTracker::new(
                config.storage.metrics_path(),
                config.storage.metrics_history,
            ),
            current,
            content_handle,
            scorer,
            run_lock: tokio::sync::Mutex::new(()),
            state: RwLock::new(PipelineState::Idle),
        }
    }

    pub fn state(&self) -> PipelineState {
        *self.state.read().expect("state lock poisoned")
    }

    fn set_state(&self, state: PipelineState) {
        *self.state.write().expect("state lock poisoned") = state;
    }

    /// Load the persisted artifact and publish it for serving. Fatal to
    /// readiness when no artifact exists.
    pub async fn load_current(&self) -> Result<()> {
        let artifact = self.store.load()?;
        self.refresh_content().await;
        self.current.publish(Arc::new(artifact));
        self.scorer.clear_hybrid_cache();
        Ok(())
    }

    /// Execute one training run. Exactly one run may be active; the
    /// pipeline up to and including evaluation is bounded by the configured
    /// wall-clock budget, and the previous model stays current unless every
    /// gate passes and deployment succeeds.
    pub async fn run(&self, mode: TrainingMode) -> Result<TrainingReport> {
        let _guard = self
            .run_lock
            .try_lock()
            .map_err(|_| EngineError::TrainingInProgress)?;

        let started = Instant::now();
        info!(mode = mode.as_str(), "Training pipeline started");

        let budget_secs = self.training.max_training_secs;
        let candidate = match tokio::time::timeout(
            Duration::from_secs(budget_secs),
            self.build_candidate(mode),
        )
        .await
        {
            Err(_) => {
                self.set_state(PipelineState::Failed);
                error!(
                    mode = mode.as_str(),
                    budget_secs, "Training run timed out, previous model stays current"
                );
                self.set_state(PipelineState::Idle);
                return Err(EngineError::Timeout(budget_secs));
            }
            Ok(Err(err)) => {
                self.set_state(PipelineState::Failed);
                error!(mode = mode.as_str(), error = %err, "Training run failed");
                self.set_state(PipelineState::Idle);
                return Err(err);
            }
            Ok(Ok(candidate)) => candidate,
        };

        let duration_ms = started.elapsed().as_millis() as u64;
        let version = candidate.artifact.metadata.version.clone();
        let mut entry = MetricsEntry {
            recorded_at: Utc::now(),
            training_mode: mode,
            metadata: candidate.artifact.metadata.clone(),
            similarity_density: candidate.artifact.similarity.density(),
            avg_similarity: candidate.artifact.similarity.avg_similarity(),
            evaluation: Some(candidate.metrics.clone()),
            deployed: false,
            duration_ms,
        };

        match candidate.gate {
            Err(reason) => {
                warn!(
                    mode = mode.as_str(),
                    version = %version,
                    reason = %reason,
                    "Candidate did not meet deployment criteria"
                );
                self.record_metrics(entry);
                self.set_state(PipelineState::Idle);
                Ok(TrainingReport {
                    mode,
                    version,
                    deployed: false,
                    rejection: Some(reason),
                    metrics: candidate.metrics,
                    duration_ms,
                })
            }
            Ok(()) => {
                if let Err(err) = self.deploy(candidate.artifact).await {
                    self.set_state(PipelineState::Failed);
                    self.record_metrics(entry);
                    self.set_state(PipelineState::Idle);
                    return Err(err);
                }
                entry.deployed = true;
                self.record_metrics(entry);
                self.set_state(PipelineState::Idle);
                info!(
                    mode = mode.as_str(),
                    version = %version,
                    duration_ms,
                    "Training pipeline completed, model deployed"
                );
                Ok(TrainingReport {
                    mode,
                    version,
                    deployed: true,
                    rejection: None,
                    metrics: candidate.metrics,
                    duration_ms,
                })
            }
        }
    }

    /// Backup, train and evaluate a candidate without touching the served
    /// model. Runs entirely inside the wall-clock budget.
    async fn build_candidate(&self, mode: TrainingMode) -> Result<CandidateModel> {
        self.set_state(PipelineState::Training);
        self.backups.backup(self.store.path())?;

        let (lookback_days, min_interactions) = match mode {
            TrainingMode::Incremental => (
                self.training.incremental_lookback_days,
                self.training.incremental_min_interactions,
            ),
            TrainingMode::Full => (
                self.training.full_lookback_days,
                self.training.full_min_interactions,
            ),
            TrainingMode::Deep => (
                self.training.deep_lookback_days,
                self.training.deep_min_interactions,
            ),
        };

        let purchases = self.source.fetch_purchases(lookback_days).await?;
        let views = self.source.fetch_views(lookback_days).await?;
        info!(
            mode = mode.as_str(),
            lookback_days,
            purchases = purchases.len(),
            views = views.len(),
            "Loaded interaction events"
        );

        if purchases.len() + views.len() < min_interactions {
            return Err(EngineError::Validation(format!(
                "insufficient interactions for {} training: {} < {}",
                mode.as_str(),
                purchases.len() + views.len(),
                min_interactions
            )));
        }

        let categories = match self.content_provider.product_categories().await {
            Ok(categories) => categories,
            Err(err) => {
                warn!(error = %err, "Failed to load product categories, diversity metric disabled");
                HashMap::new()
            }
        };

        let evaluator = Evaluator::new(self.training.holdout_fraction);

        let (matrix, min_co_occurrence, view_weight) = match mode {
            TrainingMode::Deep => {
                self.hyperparameter_search(&purchases, &views, &evaluator, &categories)
            }
            _ => {
                let builder = InteractionMatrixBuilder::new(
                    self.training.purchase_weight,
                    self.training.view_weight,
                );
                (
                    builder.build(&purchases, &views),
                    self.training.min_co_occurrence,
                    self.training.view_weight,
                )
            }
        };

        self.set_state(PipelineState::Validating);
        self.validate(&matrix)?;

        let similarity = SimilarityEngine::new().compute(&matrix);
        let mut filtered = CoOccurrenceFilter::new(min_co_occurrence).apply(&similarity, &matrix);

        let mut extra = BTreeMap::new();
        if mode == TrainingMode::Incremental {
            if let Some(previous) = self.current.get() {
                filtered = blend_similarity(
                    &previous.similarity,
                    &filtered,
                    self.training.incremental_learning_rate,
                );
                extra.insert(
                    "previous_version".to_string(),
                    serde_json::Value::String(previous.metadata.version.clone()),
                );
                info!(
                    learning_rate = self.training.incremental_learning_rate,
                    previous_version = %previous.metadata.version,
                    "Blended incremental similarity into prior model"
                );
            }
        }

        self.set_state(PipelineState::Evaluating);
        let metrics = evaluator.evaluate(&matrix, min_co_occurrence, &categories);
        let gate = self.deployment_gate(&metrics);

        let metadata = ModelMetadata {
            schema_version: 1,
            version: Uuid::new_v4().to_string(),
            trained_at: Utc::now(),
            training_mode: mode,
            n_users: matrix.n_users(),
            n_products: matrix.n_products(),
            n_interactions: matrix.n_interactions(),
            sparsity: matrix.sparsity(),
            min_co_occurrence,
            purchase_weight: self.training.purchase_weight,
            view_weight,
            use_hybrid: true,
            extra,
        };

        let artifact = ModelArtifact {
            product_ids: filtered.product_ids().to_vec(),
            metadata,
            similarity: filtered,
            interactions: Some(matrix),
        };

        Ok(CandidateModel {
            artifact,
            metrics,
            gate,
        })
    }

    /// Deep-mode grid search over the filter threshold and view weight;
    /// the combination with the best holdout precision wins.
    fn hyperparameter_search(
        &self,
        purchases: &[crate::models::PurchaseEvent],
        views: &[crate::models::ViewEvent],
        evaluator: &Evaluator,
        categories: &HashMap<String, String>,
    ) -> (InteractionMatrix, u32, f64) {
        let mut best: Option<(f64, InteractionMatrix, u32, f64)> = None;

        for &view_weight in DEEP_VIEW_WEIGHT_GRID {
            let matrix = InteractionMatrixBuilder::new(self.training.purchase_weight, view_weight)
                .build(purchases, views);

            for &min_co_occurrence in DEEP_CO_OCCURRENCE_GRID {
                let metrics = evaluator.evaluate(&matrix, min_co_occurrence, categories);
                info!(
                    view_weight,
                    min_co_occurrence,
                    precision_at_10 = metrics.precision_at_10,
                    "Hyperparameter search step"
                );

                if best
                    .as_ref()
                    .map_or(true, |(p, ..)| metrics.precision_at_10 > *p)
                {
                    best = Some((
                        metrics.precision_at_10,
                        matrix.clone(),
                        min_co_occurrence,
                        view_weight,
                    ));
                }
            }
        }

        let (precision, matrix, min_co_occurrence, view_weight) =
            best.expect("hyperparameter grid is non-empty");
        info!(
            view_weight,
            min_co_occurrence,
            precision_at_10 = precision,
            "Hyperparameter search selected configuration"
        );
        (matrix, min_co_occurrence, view_weight)
    }

    fn validate(&self, matrix: &InteractionMatrix) -> Result<()> {
        if matrix.n_products() < MIN_PRODUCTS {
            return Err(EngineError::Validation(format!(
                "too few products: {}",
                matrix.n_products()
            )));
        }
        if matrix.n_users() < MIN_USERS {
            return Err(EngineError::Validation(format!(
                "too few users: {}",
                matrix.n_users()
            )));
        }
        if matrix.sparsity() > HIGH_SPARSITY {
            warn!(sparsity = matrix.sparsity(), "High sparsity in trained candidate");
        }

        info!(
            users = matrix.n_users(),
            products = matrix.n_products(),
            interactions = matrix.n_interactions(),
            "Model validation passed"
        );
        Ok(())
    }

    /// Deployment gates: absolute metric thresholds plus required relative
    /// improvement over the last deployed model.
    fn deployment_gate(&self, metrics: &EvaluationMetrics) -> std::result::Result<(), String> {
        let mut failures = Vec::new();

        if metrics.precision_at_10 < self.evaluation.min_precision_at_10 {
            failures.push(format!(
                "precision@10 {:.4} below threshold {:.4}",
                metrics.precision_at_10, self.evaluation.min_precision_at_10
            ));
        }
        if metrics.recall_at_10 < self.evaluation.min_recall_at_10 {
            failures.push(format!(
                "recall@10 {:.4} below threshold {:.4}",
                metrics.recall_at_10, self.evaluation.min_recall_at_10
            ));
        }
        match metrics.category_diversity {
            Some(diversity) if diversity < self.evaluation.min_category_diversity => {
                failures.push(format!(
                    "category diversity {:.2} below threshold {:.2}",
                    diversity, self.evaluation.min_category_diversity
                ));
            }
            None => {
                warn!("No category data available, skipping diversity gate");
            }
            _ => {}
        }

        if let Ok(Some(last)) = self.tracker.last_deployed() {
            if let Some(baseline) = last.evaluation {
                let required = baseline.precision_at_10
                    * (1.0 + self.evaluation.min_improvement_pct / 100.0);
                if metrics.precision_at_10 < required {
                    failures.push(format!(
                        "precision@10 {:.4} does not improve on deployed {:.4} by {:.1}%",
                        metrics.precision_at_10,
                        baseline.precision_at_10,
                        self.evaluation.min_improvement_pct
                    ));
                }
            }
        }

        if failures.is_empty() {
            Ok(())
        } else {
            Err(failures.join("; "))
        }
    }

    /// Persist the candidate and swap the served reference. Any persistence
    /// failure triggers an automatic rollback to the latest backup.
    async fn deploy(&self, artifact: ModelArtifact) -> Result<()> {
        self.set_state(PipelineState::Deploying);

        if let Err(err) = self.store.save(&artifact) {
            error!(error = %err, "Failed to persist candidate, restoring latest backup");
            self.backups.restore(0, self.store.path()).map_err(|restore_err| {
                EngineError::RollbackFailure(format!(
                    "{restore_err} (while recovering from deploy failure: {err})"
                ))
            })?;
            return Err(EngineError::DeployFailure(err.to_string()));
        }

        self.refresh_content().await;
        self.current.publish(Arc::new(artifact));
        self.scorer.clear_hybrid_cache();
        Ok(())
    }

    /// Restore the nth most recent backup (0 = newest) as the current
    /// model, both on disk and in the serving handle. Takes the run lock so
    /// an operator rollback never interleaves with backup rotation.
    pub async fn rollback(&self, nth: usize) -> Result<()> {
        let _guard = self
            .run_lock
            .try_lock()
            .map_err(|_| EngineError::TrainingInProgress)?;
        self.backups.restore(nth, self.store.path())?;
        let artifact = self.store.load()?;
        self.refresh_content().await;
        self.current.publish(Arc::new(artifact));
        self.scorer.clear_hybrid_cache();
        info!(nth, "Rolled back to backup");
        Ok(())
    }

    pub fn list_backups(&self) -> Result<Vec<BackupEntry>> {
        self.backups.list()
    }

    pub fn metrics_history(&self) -> Result<Vec<MetricsEntry>> {
        self.tracker.history()
    }

    /// Metrics-log writes never decide a pipeline outcome.
    fn record_metrics(&self, entry: MetricsEntry) {
        if let Err(err) = self.tracker.record(entry) {
            warn!(error = %err, "Failed to record training metrics");
        }
    }

    /// Health report over the persisted artifact, mirroring the validation
    /// floors plus staleness warnings.
    pub fn check_health(&self) -> HealthStatus {
        let artifact = match self.store.load() {
            Ok(artifact) => artifact,
            Err(err) => {
                return HealthStatus {
                    status: "error".to_string(),
                    issues: vec![err.to_string()],
                    warnings: Vec::new(),
                    age_days: None,
                    metadata: None,
                };
            }
        };

        let metadata = artifact.metadata;
        let age_days = (Utc::now() - metadata.trained_at).num_seconds() as f64 / 86_400.0;

        let mut issues = Vec::new();
        let mut warnings = Vec::new();

        if metadata.n_products < MIN_PRODUCTS {
            issues.push(format!("too few products: {}", metadata.n_products));
        }
        if metadata.n_users < MIN_USERS {
            issues.push(format!("too few users: {}", metadata.n_users));
        }
        if metadata.sparsity > HIGH_SPARSITY {
            warnings.push(format!("high sparsity: {:.2}%", metadata.sparsity * 100.0));
        }
        if age_days > STALE_MODEL_DAYS {
            warnings.push(format!(
                "model is {age_days:.1} days old, consider retraining"
            ));
        }

        HealthStatus {
            status: if issues.is_empty() {
                "healthy".to_string()
            } else {
                "unhealthy".to_string()
            },
            issues,
            warnings,
            age_days: Some(age_days),
            metadata: Some(metadata),
        }
    }

    async fn refresh_content(&self) {
        match self.content_provider.content_similarity().await {
            Ok(Some(matrix)) => self.content_handle.publish(Arc::new(matrix)),
            Ok(None) => {}
            Err(err) => warn!(error = %err, "Failed to refresh content similarity"),
        }
    }
}

/// Blend a freshly computed similarity matrix into the prior one over the
/// union of product ids: `lr * new + (1 - lr) * old`, missing side = 0.
fn blend_similarity(
    old: &SimilarityMatrix,
    new: &SimilarityMatrix,
    learning_rate: f64,
) -> SimilarityMatrix {
    let mut ids = old.product_ids().to_vec();
    ids.extend_from_slice(new.product_ids());
    let mut blended = SimilarityMatrix::zeroed(ids);

    let product_ids = blended.product_ids().to_vec();
    let n = product_ids.len();
    for i in 0..n {
        for j in (i + 1)..n {
            let value = learning_rate * new.get(&product_ids[i], &product_ids[j])
                + (1.0 - learning_rate) * old.get(&product_ids[i], &product_ids[j]);
            if value != 0.0 {
                blended.set_pair(i, j, value);
            }
        }
    }
    blended.set_diagonal(1.0);
    blended
}
