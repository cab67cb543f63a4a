//! Append-only training-run metrics log, capped to the most recent entries.

use super::evaluator::EvaluationMetrics;
use crate::error::Result;
use crate::models::{ModelMetadata, TrainingMode};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use tracing::info;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsEntry {
    pub recorded_at: DateTime<Utc>,
    pub training_mode: TrainingMode,
    pub metadata: ModelMetadata,
    /// Fraction of non-zero off-diagonal similarity pairs.
    pub similarity_density: f64,
    /// Mean of the positive off-diagonal similarities.
    pub avg_similarity: f64,
    pub evaluation: Option<EvaluationMetrics>,
    pub deployed: bool,
    pub duration_ms: u64,
}

pub struct PerformanceTracker {
    path: PathBuf,
    max_entries: usize,
}

impl PerformanceTracker {
    pub fn new(path: PathBuf, max_entries: usize) -> Self {
        Self { path, max_entries }
    }

    pub fn record(&self, entry: MetricsEntry) -> Result<()> {
        let mut history = self.history().unwrap_or_default();
        history.push(entry);

        if history.len() > self.max_entries {
            let excess = history.len() - self.max_entries;
            history.drain(..excess);
        }

        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&self.path, serde_json::to_vec_pretty(&history)?)?;

        info!(entries = history.len(), path = %self.path.display(), "Recorded training metrics");
        Ok(())
    }

    pub fn history(&self) -> Result<Vec<MetricsEntry>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let raw = fs::read_to_string(&self.path)?;
        Ok(serde_json::from_str(&raw)?)
    }

    /// Most recent entry that resulted in a deployment, used as the
    /// baseline for the improvement gate.
    pub fn last_deployed(&self) -> Result<Option<MetricsEntry>> {
        Ok(self
            .history()?
            .into_iter()
            .rev()
            .find(|entry| entry.deployed))
    }
}
