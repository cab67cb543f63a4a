use serde::Deserialize;
use std::env;
use std::path::PathBuf;
use tracing::warn;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub service: ServiceConfig,
    pub storage: StorageConfig,
    pub training: TrainingConfig,
    pub hybrid: HybridConfig,
    pub evaluation: EvaluationConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServiceConfig {
    pub service_name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    /// Directory holding the published artifact, backups and metrics log.
    pub model_dir: PathBuf,
    pub max_backups: usize,
    pub metrics_history: usize,
}

impl StorageConfig {
    pub fn model_path(&self) -> PathBuf {
        self.model_dir.join("model.json")
    }

    pub fn backup_dir(&self) -> PathBuf {
        self.model_dir.join("backups")
    }

    pub fn metrics_path(&self) -> PathBuf {
        self.model_dir.join("metrics.json")
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct TrainingConfig {
    pub purchase_weight: f64,
    pub view_weight: f64,
    pub min_co_occurrence: u32,
    /// Wall-clock budget for a training run (load through evaluate).
    pub max_training_secs: u64,
    pub holdout_fraction: f64,

    // Incremental mode
    pub incremental_lookback_days: u32,
    pub incremental_min_interactions: usize,
    /// Share of the freshly computed similarity blended into the prior one.
    pub incremental_learning_rate: f64,

    // Full mode
    pub full_lookback_days: u32,
    pub full_min_interactions: usize,

    // Deep mode
    pub deep_lookback_days: u32,
    pub deep_min_interactions: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct HybridConfig {
    pub cf_weight: f64,
    pub cb_weight: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EvaluationConfig {
    pub min_precision_at_10: f64,
    pub min_recall_at_10: f64,
    pub min_category_diversity: f64,
    /// Required relative improvement (percent) over the last deployed model.
    pub min_improvement_pct: f64,
}

fn env_parse<T: std::str::FromStr>(key: &str, default: &str) -> T
where
    T::Err: std::fmt::Debug,
{
    env::var(key)
        .unwrap_or_else(|_| default.to_string())
        .parse()
        .unwrap_or_else(|_| panic!("{} must be a valid {}", key, std::any::type_name::<T>()))
}

impl Config {
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();

        let mut config = Config {
            service: ServiceConfig {
                service_name: env::var("SERVICE_NAME")
                    .unwrap_or_else(|_| "recommendation-engine".to_string()),
            },
            storage: StorageConfig {
                model_dir: PathBuf::from(
                    env::var("MODEL_DIR").unwrap_or_else(|_| "models".to_string()),
                ),
                max_backups: env_parse("MAX_BACKUPS", "5"),
                metrics_history: env_parse("METRICS_HISTORY", "30"),
            },
            training: TrainingConfig {
                purchase_weight: env_parse("PURCHASE_WEIGHT", "1.0"),
                view_weight: env_parse("VIEW_WEIGHT", "0.3"),
                min_co_occurrence: env_parse("MIN_CO_OCCURRENCE", "5"),
                max_training_secs: env_parse("MAX_TRAINING_SECS", "7200"),
                holdout_fraction: env_parse("HOLDOUT_FRACTION", "0.2"),
                incremental_lookback_days: env_parse("INCREMENTAL_LOOKBACK_DAYS", "7"),
                incremental_min_interactions: env_parse("INCREMENTAL_MIN_INTERACTIONS", "10"),
                incremental_learning_rate: env_parse("INCREMENTAL_LEARNING_RATE", "0.3"),
                full_lookback_days: env_parse("FULL_LOOKBACK_DAYS", "90"),
                full_min_interactions: env_parse("FULL_MIN_INTERACTIONS", "100"),
                deep_lookback_days: env_parse("DEEP_LOOKBACK_DAYS", "180"),
                deep_min_interactions: env_parse("DEEP_MIN_INTERACTIONS", "500"),
            },
            hybrid: HybridConfig {
                cf_weight: env_parse("HYBRID_CF_WEIGHT", "0.7"),
                cb_weight: env_parse("HYBRID_CB_WEIGHT", "0.3"),
            },
            evaluation: EvaluationConfig {
                min_precision_at_10: env_parse("MIN_PRECISION_AT_10", "0.15"),
                min_recall_at_10: env_parse("MIN_RECALL_AT_10", "0.10"),
                min_category_diversity: env_parse("MIN_CATEGORY_DIVERSITY", "3.0"),
                min_improvement_pct: env_parse("MIN_IMPROVEMENT_PCT", "2.0"),
            },
        };

        config.hybrid = config.hybrid.normalized();
        config
    }
}

impl HybridConfig {
    /// Renormalize the blend weights so they sum to 1, warning when the
    /// supplied pair disagrees with itself (the upstream docs and code have
    /// historically disagreed on this split).
    pub fn normalized(self) -> Self {
        let sum = self.cf_weight + self.cb_weight;
        if sum <= 0.0 {
            warn!(
                cf_weight = self.cf_weight,
                cb_weight = self.cb_weight,
                "Hybrid weights are degenerate, falling back to 0.7/0.3"
            );
            return Self {
                cf_weight: 0.7,
                cb_weight: 0.3,
            };
        }
        if (sum - 1.0).abs() > 1e-9 {
            warn!(
                cf_weight = self.cf_weight,
                cb_weight = self.cb_weight,
                "Hybrid weights do not sum to 1, renormalizing"
            );
        }
        Self {
            cf_weight: self.cf_weight / sum,
            cb_weight: self.cb_weight / sum,
        }
    }
}
