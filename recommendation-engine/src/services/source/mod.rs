//! Collaborator boundaries: interaction event access and the externally
//! produced content-similarity model.
//!
//! The engine never talks to a database directly; training pulls purchase
//! and view event batches through [`InteractionSource`], and the
//! content-based similarity matrix (built upstream from product features)
//! arrives through [`ContentModelProvider`] as an opaque input.

use crate::models::{PurchaseEvent, SimilarityMatrix, ViewEvent};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{Duration, Utc};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

#[async_trait]
pub trait InteractionSource: Send + Sync {
    async fn fetch_purchases(&self, lookback_days: u32) -> Result<Vec<PurchaseEvent>>;
    async fn fetch_views(&self, lookback_days: u32) -> Result<Vec<ViewEvent>>;
}

#[async_trait]
pub trait ContentModelProvider: Send + Sync {
    /// Feature-based product similarity, already filtered upstream.
    async fn content_similarity(&self) -> Result<Option<SimilarityMatrix>>;

    /// Product -> category map used by the evaluation diversity metric.
    async fn product_categories(&self) -> Result<HashMap<String, String>>;
}

/// In-memory source, used as a test fixture and by the demo wiring.
#[derive(Debug, Clone, Default)]
pub struct InMemorySource {
    pub purchases: Vec<PurchaseEvent>,
    pub views: Vec<ViewEvent>,
    pub content_similarity: Option<SimilarityMatrix>,
    pub categories: HashMap<String, String>,
}

impl InMemorySource {
    pub fn new(purchases: Vec<PurchaseEvent>, views: Vec<ViewEvent>) -> Self {
        Self {
            purchases,
            views,
            ..Default::default()
        }
    }
}

#[async_trait]
impl InteractionSource for InMemorySource {
    async fn fetch_purchases(&self, lookback_days: u32) -> Result<Vec<PurchaseEvent>> {
        let cutoff = Utc::now() - Duration::days(lookback_days as i64);
        Ok(self
            .purchases
            .iter()
            .filter(|e| e.occurred_at >= cutoff)
            .cloned()
            .collect())
    }

    async fn fetch_views(&self, lookback_days: u32) -> Result<Vec<ViewEvent>> {
        let cutoff = Utc::now() - Duration::days(lookback_days as i64);
        Ok(self
            .views
            .iter()
            .filter(|e| e.occurred_at >= cutoff)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl ContentModelProvider for InMemorySource {
    async fn content_similarity(&self) -> Result<Option<SimilarityMatrix>> {
        Ok(self.content_similarity.clone())
    }

    async fn product_categories(&self) -> Result<HashMap<String, String>> {
        Ok(self.categories.clone())
    }
}

#[derive(Debug, Deserialize, Default)]
struct EventFile {
    #[serde(default)]
    purchases: Vec<PurchaseEvent>,
    #[serde(default)]
    views: Vec<ViewEvent>,
    #[serde(default)]
    content_similarity: Option<SimilarityMatrix>,
    #[serde(default)]
    categories: HashMap<String, String>,
}

/// File-backed source so the binary can exercise the full pipeline from a
/// JSON fixture instead of a live store.
#[derive(Debug, Clone)]
pub struct JsonFileSource {
    path: PathBuf,
}

impl JsonFileSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    fn load(&self) -> Result<EventFile> {
        let raw = std::fs::read_to_string(&self.path)
            .with_context(|| format!("Failed to read event file {}", self.path.display()))?;
        serde_json::from_str(&raw)
            .with_context(|| format!("Failed to parse event file {}", self.path.display()))
    }
}

#[async_trait]
impl InteractionSource for JsonFileSource {
    async fn fetch_purchases(&self, lookback_days: u32) -> Result<Vec<PurchaseEvent>> {
        let cutoff = Utc::now() - Duration::days(lookback_days as i64);
        Ok(self
            .load()?
            .purchases
            .into_iter()
            .filter(|e| e.occurred_at >= cutoff)
            .collect())
    }

    async fn fetch_views(&self, lookback_days: u32) -> Result<Vec<ViewEvent>> {
        let cutoff = Utc::now() - Duration::days(lookback_days as i64);
        Ok(self
            .load()?
            .views
            .into_iter()
            .filter(|e| e.occurred_at >= cutoff)
            .collect())
    }
}

#[async_trait]
impl ContentModelProvider for JsonFileSource {
    async fn content_similarity(&self) -> Result<Option<SimilarityMatrix>> {
        Ok(self.load()?.content_similarity)
    }

    async fn product_categories(&self) -> Result<HashMap<String, String>> {
        Ok(self.load()?.categories)
    }
}

/// Path passed to [`JsonFileSource`] when `EVENTS_FILE` is not set.
pub fn default_events_path() -> PathBuf {
    std::env::var("EVENTS_FILE")
        .map(PathBuf::from)
        .unwrap_or_else(|_| Path::new("data").join("events.json"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn purchase(user: &str, product: &str, days_ago: i64) -> PurchaseEvent {
        PurchaseEvent {
            user_id: user.to_string(),
            product_id: product.to_string(),
            quantity: 1,
            occurred_at: Utc::now() - Duration::days(days_ago),
        }
    }

    #[tokio::test]
    async fn test_in_memory_source_applies_lookback() {
        let source = InMemorySource::new(
            vec![purchase("U1", "P1", 2), purchase("U1", "P2", 30)],
            vec![],
        );

        let recent = source.fetch_purchases(7).await.unwrap();
        assert_eq!(recent.len(), 1);
        assert_eq!(recent[0].product_id, "P1");

        let all = source.fetch_purchases(90).await.unwrap();
        assert_eq!(all.len(), 2);
    }

    #[tokio::test]
    async fn test_json_file_source_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("events.json");
        let json = serde_json::json!({
            "purchases": [{
                "user_id": "U1",
                "product_id": "P1",
                "quantity": 2,
                "occurred_at": Utc::now().to_rfc3339()
            }],
            "categories": {"P1": "electronics"}
        });
        std::fs::write(&path, serde_json::to_string(&json).unwrap()).unwrap();

        let source = JsonFileSource::new(&path);
        let purchases = source.fetch_purchases(7).await.unwrap();
        assert_eq!(purchases.len(), 1);
        assert_eq!(purchases[0].quantity, 2);

        let categories = source.product_categories().await.unwrap();
        assert_eq!(categories["P1"], "electronics");
        assert!(source.content_similarity().await.unwrap().is_none());
    }
}
