use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};

/// Raw purchase event as delivered by the data-access collaborator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PurchaseEvent {
    pub user_id: String,
    pub product_id: String,
    pub quantity: u32,
    pub occurred_at: DateTime<Utc>,
}

/// Raw view event as delivered by the data-access collaborator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ViewEvent {
    pub user_id: String,
    pub product_id: String,
    pub view_count: u32,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InteractionKind {
    Purchase,
    View,
}

impl InteractionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            InteractionKind::Purchase => "purchase",
            InteractionKind::View => "view",
        }
    }
}

/// A raw event normalized to its weighted form: event count scaled by the
/// per-kind coefficient.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InteractionRecord {
    pub user_id: String,
    pub product_id: String,
    pub weight: f64,
    pub kind: InteractionKind,
}

/// Sparse user x product interaction table. Missing entries are 0.
///
/// Rows and the product index are kept in ordered maps so iteration order
/// (and therefore every derived artifact) is deterministic.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InteractionMatrix {
    rows: BTreeMap<String, BTreeMap<String, f64>>,
    products: BTreeSet<String>,
}

impl InteractionMatrix {
    pub fn new() -> Self {
        Self::default()
    }

    /// Accumulate `weight` onto the (user, product) cell.
    pub fn add(&mut self, user_id: &str, product_id: &str, weight: f64) {
        *self
            .rows
            .entry(user_id.to_string())
            .or_default()
            .entry(product_id.to_string())
            .or_insert(0.0) += weight;
        self.products.insert(product_id.to_string());
    }

    pub fn weight(&self, user_id: &str, product_id: &str) -> f64 {
        self.rows
            .get(user_id)
            .and_then(|row| row.get(product_id))
            .copied()
            .unwrap_or(0.0)
    }

    pub fn user_items(&self, user_id: &str) -> Option<&BTreeMap<String, f64>> {
        self.rows.get(user_id)
    }

    pub fn rows(&self) -> impl Iterator<Item = (&String, &BTreeMap<String, f64>)> {
        self.rows.iter()
    }

    pub fn users(&self) -> impl Iterator<Item = &String> {
        self.rows.keys()
    }

    pub fn n_users(&self) -> usize {
        self.rows.len()
    }

    pub fn product_ids(&self) -> Vec<String> {
        self.products.iter().cloned().collect()
    }

    pub fn n_products(&self) -> usize {
        self.products.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Number of (user, product) cells with a nonzero weight.
    pub fn n_interactions(&self) -> usize {
        self.rows
            .values()
            .map(|row| row.values().filter(|w| **w > 0.0).count())
            .sum()
    }

    /// Fraction of user x product cells with no recorded interaction.
    pub fn sparsity(&self) -> f64 {
        let size = self.n_users() * self.n_products();
        if size == 0 {
            return 1.0;
        }
        1.0 - self.n_interactions() as f64 / size as f64
    }

    /// Total interaction weight per product across all users (column sums).
    pub fn popularity(&self) -> HashMap<String, f64> {
        let mut totals: HashMap<String, f64> = HashMap::new();
        for row in self.rows.values() {
            for (product_id, weight) in row {
                *totals.entry(product_id.clone()).or_insert(0.0) += weight;
            }
        }
        totals
    }
}

/// Symmetric item-item similarity over an ordered product-id list.
///
/// Values are stored as a dense row-major `Vec<f64>` so the persisted
/// artifact is a flat 64-bit float block; product ids are kept sorted so
/// lookups go through binary search instead of a side index that would
/// need rebuilding after deserialization.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimilarityMatrix {
    product_ids: Vec<String>,
    values: Vec<f64>,
}

impl SimilarityMatrix {
    /// Create a zeroed matrix over the given products (sorted, deduplicated).
    pub fn zeroed(mut product_ids: Vec<String>) -> Self {
        product_ids.sort();
        product_ids.dedup();
        let n = product_ids.len();
        Self {
            product_ids,
            values: vec![0.0; n * n],
        }
    }

    pub fn len(&self) -> usize {
        self.product_ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.product_ids.is_empty()
    }

    pub fn product_ids(&self) -> &[String] {
        &self.product_ids
    }

    pub fn position(&self, product_id: &str) -> Option<usize> {
        self.product_ids
            .binary_search_by(|p| p.as_str().cmp(product_id))
            .ok()
    }

    pub fn contains(&self, product_id: &str) -> bool {
        self.position(product_id).is_some()
    }

    pub fn get_idx(&self, i: usize, j: usize) -> f64 {
        self.values[i * self.len() + j]
    }

    pub fn set_idx(&mut self, i: usize, j: usize, value: f64) {
        let n = self.len();
        self.values[i * n + j] = value;
    }

    /// Set both (i, j) and (j, i), keeping the matrix symmetric by
    /// construction.
    pub fn set_pair(&mut self, i: usize, j: usize, value: f64) {
        self.set_idx(i, j, value);
        self.set_idx(j, i, value);
    }

    pub fn set_diagonal(&mut self, value: f64) {
        for i in 0..self.len() {
            self.set_idx(i, i, value);
        }
    }

    pub fn get(&self, a: &str, b: &str) -> f64 {
        match (self.position(a), self.position(b)) {
            (Some(i), Some(j)) => self.get_idx(i, j),
            _ => 0.0,
        }
    }

    /// Iterate a product's similarity row as (other_product_id, similarity),
    /// including the self entry; callers drop it as needed.
    pub fn row<'a>(
        &'a self,
        product_id: &str,
    ) -> Option<impl Iterator<Item = (&'a str, f64)> + 'a> {
        let i = self.position(product_id)?;
        let n = self.len();
        Some(
            self.product_ids
                .iter()
                .enumerate()
                .map(move |(j, p)| (p.as_str(), self.values[i * n + j])),
        )
    }

    /// Number of unordered off-diagonal pairs with similarity > 0.
    pub fn non_zero_pairs(&self) -> usize {
        let n = self.len();
        let mut count = 0;
        for i in 0..n {
            for j in (i + 1)..n {
                if self.get_idx(i, j) > 0.0 {
                    count += 1;
                }
            }
        }
        count
    }

    /// Fraction of unordered off-diagonal pairs with similarity > 0.
    pub fn density(&self) -> f64 {
        let n = self.len();
        if n < 2 {
            return 0.0;
        }
        let total = n * (n - 1) / 2;
        self.non_zero_pairs() as f64 / total as f64
    }

    /// Mean of the positive off-diagonal similarities (0.0 when there are
    /// none).
    pub fn avg_similarity(&self) -> f64 {
        let n = self.len();
        let mut sum = 0.0;
        let mut count = 0usize;
        for i in 0..n {
            for j in (i + 1)..n {
                let v = self.get_idx(i, j);
                if v > 0.0 {
                    sum += v;
                    count += 1;
                }
            }
        }
        if count == 0 {
            0.0
        } else {
            sum / count as f64
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrainingMode {
    Incremental,
    #[default]
    Full,
    Deep,
}

impl TrainingMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            TrainingMode::Incremental => "incremental",
            TrainingMode::Full => "full",
            TrainingMode::Deep => "deep",
        }
    }
}

fn default_schema_version() -> u32 {
    1
}

fn default_use_hybrid() -> bool {
    true
}

/// Versioned metadata attached to every trained model artifact.
///
/// Unknown keys from newer writers are retained in `extra` so older readers
/// can load and round-trip artifacts they did not produce.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelMetadata {
    #[serde(default = "default_schema_version")]
    pub schema_version: u32,
    pub version: String,
    pub trained_at: DateTime<Utc>,
    #[serde(default)]
    pub training_mode: TrainingMode,
    pub n_users: usize,
    pub n_products: usize,
    pub n_interactions: usize,
    pub sparsity: f64,
    pub min_co_occurrence: u32,
    pub purchase_weight: f64,
    pub view_weight: f64,
    #[serde(default = "default_use_hybrid")]
    pub use_hybrid: bool,
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

/// The persisted, versioned output of a training run. Immutable once
/// published; a new training run always produces a new artifact.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelArtifact {
    pub metadata: ModelMetadata,
    pub product_ids: Vec<String>,
    pub similarity: SimilarityMatrix,
    pub interactions: Option<InteractionMatrix>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecommendationKind {
    Personalized,
    ContentBased,
    Collaborative,
    Hybrid,
    Popular,
}

impl RecommendationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecommendationKind::Personalized => "personalized",
            RecommendationKind::ContentBased => "content_based",
            RecommendationKind::Collaborative => "collaborative",
            RecommendationKind::Hybrid => "hybrid",
            RecommendationKind::Popular => "popular",
        }
    }
}

/// A single recommendation, carrying the external (dashed UUID) product id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecommendationCandidate {
    pub product_id: String,
    pub score: f64,
    pub kind: RecommendationKind,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_interaction_matrix_accumulates() {
        let mut matrix = InteractionMatrix::new();
        matrix.add("U1", "P1", 1.0);
        matrix.add("U1", "P1", 2.0);
        matrix.add("U2", "P2", 0.5);

        assert_eq!(matrix.weight("U1", "P1"), 3.0);
        assert_eq!(matrix.weight("U1", "P2"), 0.0);
        assert_eq!(matrix.n_users(), 2);
        assert_eq!(matrix.n_products(), 2);
        assert_eq!(matrix.n_interactions(), 2);
    }

    #[test]
    fn test_interaction_matrix_sparsity() {
        let mut matrix = InteractionMatrix::new();
        matrix.add("U1", "P1", 1.0);
        matrix.add("U2", "P2", 1.0);

        // 2 filled cells out of 4
        assert!((matrix.sparsity() - 0.5).abs() < 1e-12);
        assert_eq!(InteractionMatrix::new().sparsity(), 1.0);
    }

    #[test]
    fn test_popularity_column_sums() {
        let mut matrix = InteractionMatrix::new();
        matrix.add("U1", "P1", 1.0);
        matrix.add("U2", "P1", 2.5);
        matrix.add("U2", "P2", 1.0);

        let popularity = matrix.popularity();
        assert_eq!(popularity["P1"], 3.5);
        assert_eq!(popularity["P2"], 1.0);
    }

    #[test]
    fn test_similarity_matrix_symmetric_set() {
        let mut sim = SimilarityMatrix::zeroed(vec![
            "B".to_string(),
            "A".to_string(),
            "C".to_string(),
        ]);
        // ids are sorted on construction
        assert_eq!(sim.product_ids(), &["A", "B", "C"]);

        let a = sim.position("A").unwrap();
        let c = sim.position("C").unwrap();
        sim.set_pair(a, c, 0.8);

        assert_eq!(sim.get("A", "C"), 0.8);
        assert_eq!(sim.get("C", "A"), 0.8);
        assert_eq!(sim.get("A", "B"), 0.0);
        assert_eq!(sim.get("A", "missing"), 0.0);
    }

    #[test]
    fn test_similarity_matrix_density_and_average() {
        let mut sim =
            SimilarityMatrix::zeroed(vec!["A".to_string(), "B".to_string(), "C".to_string()]);
        sim.set_diagonal(1.0);
        let (a, b) = (sim.position("A").unwrap(), sim.position("B").unwrap());
        sim.set_pair(a, b, 0.5);

        // one of three unordered pairs is non-zero; diagonal is excluded
        assert!((sim.density() - 1.0 / 3.0).abs() < 1e-12);
        assert!((sim.avg_similarity() - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_metadata_tolerates_unknown_keys() {
        let json = serde_json::json!({
            "version": "v1",
            "trained_at": "2026-01-01T00:00:00Z",
            "n_users": 100,
            "n_products": 20,
            "n_interactions": 500,
            "sparsity": 0.75,
            "min_co_occurrence": 5,
            "purchase_weight": 1.0,
            "view_weight": 0.3,
            "some_future_field": {"nested": true}
        });

        let metadata: ModelMetadata = serde_json::from_value(json).unwrap();
        assert_eq!(metadata.schema_version, 1);
        assert_eq!(metadata.training_mode, TrainingMode::Full);
        assert!(metadata.use_hybrid);
        assert!(metadata.extra.contains_key("some_future_field"));
    }
}
