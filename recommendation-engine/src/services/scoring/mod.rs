//! Read-only recommendation scoring against the published model.
//!
//! Four strategies share one candidate-ranking routine (score descending,
//! ties broken by ascending product id) so ordering semantics are identical
//! everywhere:
//! - similar products (content matrix) for "Similar Products"
//! - cross-sell (collaborative matrix) for "Customers Also Bought"
//! - weighted personalized recommendations from purchase history
//! - hybrid blend of normalized CF and CB scores for "For You"
//!
//! Popularity ranking is the terminal fallback for all of them.

pub mod popularity;

pub use popularity::popular_products;

use crate::config::HybridConfig;
use crate::models::{
    ModelArtifact, ModelMetadata, RecommendationCandidate, RecommendationKind, SimilarityMatrix,
};
use crate::utils::{hex_to_uuid, normalize_scores, uuid_to_hex};
use dashmap::DashMap;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, RwLock};
use tracing::{debug, info, warn};

/// The single mutable reference to the currently served model.
///
/// Readers clone the inner `Arc` and keep scoring against that snapshot;
/// the lifecycle manager replaces the reference atomically after a
/// candidate has been fully built, validated and evaluated. A published
/// artifact is never mutated in place.
#[derive(Default)]
pub struct CurrentModel {
    inner: RwLock<Option<Arc<ModelArtifact>>>,
}

impl CurrentModel {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn with_artifact(artifact: ModelArtifact) -> Self {
        Self {
            inner: RwLock::new(Some(Arc::new(artifact))),
        }
    }

    pub fn get(&self) -> Option<Arc<ModelArtifact>> {
        self.inner.read().expect("model handle poisoned").clone()
    }

    pub fn publish(&self, artifact: Arc<ModelArtifact>) {
        *self.inner.write().expect("model handle poisoned") = Some(artifact);
    }

    pub fn is_loaded(&self) -> bool {
        self.get().is_some()
    }
}

/// Handle for the externally produced content-similarity matrix, swapped
/// with the same immutable-snapshot discipline as [`CurrentModel`].
#[derive(Default)]
pub struct ContentHandle {
    inner: RwLock<Option<Arc<SimilarityMatrix>>>,
}

impl ContentHandle {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn get(&self) -> Option<Arc<SimilarityMatrix>> {
        self.inner.read().expect("content handle poisoned").clone()
    }

    pub fn publish(&self, matrix: Arc<SimilarityMatrix>) {
        *self.inner.write().expect("content handle poisoned") = Some(matrix);
    }
}

/// Shared candidate-ranking routine: score descending, ascending product id
/// on ties.
pub(crate) fn rank_descending(scores: HashMap<String, f64>) -> Vec<(String, f64)> {
    let mut ranked: Vec<(String, f64)> = scores.into_iter().collect();
    ranked.sort_by(|a, b| {
        b.1.partial_cmp(&a.1)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.0.cmp(&b.0))
    });
    ranked
}

pub(crate) fn to_candidates(
    ranked: Vec<(String, f64)>,
    kind: RecommendationKind,
) -> Vec<RecommendationCandidate> {
    ranked
        .into_iter()
        .map(|(product_id, score)| RecommendationCandidate {
            product_id: hex_to_uuid(&product_id),
            score,
            kind,
        })
        .collect()
}

/// Accumulate `frequency * similarity` per candidate over every seed
/// product present in the matrix. Self entries, non-positive similarities
/// and candidates in `exclude` are skipped.
pub(crate) fn weighted_scores(
    matrix: &SimilarityMatrix,
    seed_counts: &HashMap<String, usize>,
    exclude: &HashSet<String>,
) -> HashMap<String, f64> {
    let mut scores: HashMap<String, f64> = HashMap::new();

    for (seed, frequency) in seed_counts {
        let Some(row) = matrix.row(seed) else {
            continue;
        };
        for (candidate, similarity) in row {
            if candidate == seed.as_str() || similarity <= 0.0 {
                continue;
            }
            if exclude.contains(candidate) {
                continue;
            }
            *scores.entry(candidate.to_string()).or_insert(0.0) +=
                *frequency as f64 * similarity;
        }
    }

    scores
}

/// Min-max normalize both score sets independently and combine them over
/// the union of keys with the supplied blend weights (missing entries are 0
/// after normalization).
pub(crate) fn blend_scores(
    cf_scores: &HashMap<String, f64>,
    cb_scores: &HashMap<String, f64>,
    weights: &HybridConfig,
) -> HashMap<String, f64> {
    let cf_norm = normalize_scores(cf_scores);
    let cb_norm = normalize_scores(cb_scores);

    let keys: HashSet<&String> = cf_norm.keys().chain(cb_norm.keys()).collect();
    keys.into_iter()
        .map(|key| {
            let cf = cf_norm.get(key).copied().unwrap_or(0.0);
            let cb = cb_norm.get(key).copied().unwrap_or(0.0);
            (key.clone(), weights.cf_weight * cf + weights.cb_weight * cb)
        })
        .collect()
}

fn count_canonical(product_ids: &[String]) -> HashMap<String, usize> {
    let mut counts: HashMap<String, usize> = HashMap::new();
    for id in product_ids {
        *counts.entry(uuid_to_hex(id)).or_insert(0) += 1;
    }
    counts
}

pub struct RecommendationScorer {
    model: Arc<CurrentModel>,
    content: Arc<ContentHandle>,
    weights: HybridConfig,
    hybrid_cache: DashMap<String, Arc<Vec<(String, f64)>>>,
}

impl RecommendationScorer {
    pub fn new(model: Arc<CurrentModel>, content: Arc<ContentHandle>, weights: HybridConfig) -> Self {
        Self {
            model,
            content,
            weights: weights.normalized(),
            hybrid_cache: DashMap::new(),
        }
    }

    pub fn model_info(&self) -> Option<ModelMetadata> {
        self.model.get().map(|m| m.metadata.clone())
    }

    pub fn is_product_available(&self, product_id: &str) -> bool {
        self.model
            .get()
            .map(|m| m.similarity.contains(&uuid_to_hex(product_id)))
            .unwrap_or(false)
    }

    pub fn all_products(&self) -> Vec<String> {
        self.model
            .get()
            .map(|m| m.product_ids.clone())
            .unwrap_or_default()
    }

    /// Drop every precomputed hybrid list; called after a model publish so
    /// cached results can never outlive the artifact they were computed
    /// against.
    pub fn clear_hybrid_cache(&self) {
        self.hybrid_cache.clear();
    }

    /// "Customers Also Bought": neighbors of `product_id` in the
    /// collaborative (interaction-derived) similarity matrix.
    pub fn cross_sell(&self, product_id: &str, k: usize) -> Vec<RecommendationCandidate> {
        let Some(model) = self.model.get() else {
            warn!("No model published, cross-sell unavailable");
            return Vec::new();
        };
        Self::similar_from(
            &model.similarity,
            product_id,
            k,
            RecommendationKind::Collaborative,
        )
    }

    /// "Similar Products": neighbors of `product_id` in the content
    /// (feature-derived) similarity matrix.
    pub fn similar_products(&self, product_id: &str, k: usize) -> Vec<RecommendationCandidate> {
        let Some(content) = self.content.get() else {
            warn!("No content model available, similar-products unavailable");
            return Vec::new();
        };
        Self::similar_from(&content, product_id, k, RecommendationKind::ContentBased)
    }

    fn similar_from(
        matrix: &SimilarityMatrix,
        product_id: &str,
        k: usize,
        kind: RecommendationKind,
    ) -> Vec<RecommendationCandidate> {
        let canonical = uuid_to_hex(product_id);
        let Some(row) = matrix.row(&canonical) else {
            warn!(product_id = %canonical, "Product not found in model");
            return Vec::new();
        };

        let scores: HashMap<String, f64> = row
            .filter(|(other, similarity)| *other != canonical.as_str() && *similarity > 0.0)
            .map(|(other, similarity)| (other.to_string(), similarity))
            .collect();

        let mut ranked = rank_descending(scores);
        ranked.truncate(k);

        debug!(
            product_id = %canonical,
            count = ranked.len(),
            kind = kind.as_str(),
            "Generated similar-item recommendations"
        );

        to_candidates(ranked, kind)
    }

    /// Personalized recommendations from purchase history. Purchase
    /// frequency weights the contribution of each seed product; products
    /// unknown to the model are discarded, and the popularity fallback
    /// covers the no-signal cases.
    pub fn recommend_for_user(
        &self,
        user_id: &str,
        purchased_products: &[String],
        k: usize,
        exclude_purchased: bool,
    ) -> Vec<RecommendationCandidate> {
        let Some(model) = self.model.get() else {
            warn!("No model published, personalized recommendations unavailable");
            return Vec::new();
        };

        let counts = count_canonical(purchased_products);
        let valid: HashMap<String, usize> = counts
            .into_iter()
            .filter(|(product_id, _)| model.similarity.contains(product_id))
            .collect();

        if valid.is_empty() {
            warn!(user_id = %uuid_to_hex(user_id), "No valid products for user, using popular fallback");
            return popular_products(&model, k, &HashSet::new());
        }

        let exclude: HashSet<String> = if exclude_purchased {
            valid.keys().cloned().collect()
        } else {
            HashSet::new()
        };
        let scores = weighted_scores(&model.similarity, &valid, &exclude);

        if scores.is_empty() {
            info!(user_id = %uuid_to_hex(user_id), "No personalized candidates, using popular fallback");
            return popular_products(&model, k, &exclude);
        }

        let mut ranked = rank_descending(scores);
        ranked.truncate(k);

        info!(
            user_id = %uuid_to_hex(user_id),
            count = ranked.len(),
            seed_products = valid.len(),
            "Generated personalized recommendations"
        );

        to_candidates(ranked, RecommendationKind::Personalized)
    }

    /// Hybrid "For You" recommendations: CF and CB score sets over the same
    /// viewed-product seeds, each min-max normalized, blended with the
    /// configured weights. Results are cached per user until the next model
    /// publish; a cache hit is indistinguishable from a live computation
    /// apart from latency.
    pub fn hybrid(
        &self,
        user_id: &str,
        viewed_products: &[String],
        k: usize,
    ) -> Vec<RecommendationCandidate> {
        let user_key = uuid_to_hex(user_id);

        if let Some(cached) = self.hybrid_cache.get(&user_key) {
            debug!(user_id = %user_key, "Serving hybrid recommendations from cache");
            let mut ranked = cached.as_ref().clone();
            ranked.truncate(k);
            return to_candidates(ranked, RecommendationKind::Hybrid);
        }

        let Some(model) = self.model.get() else {
            warn!("No model published, hybrid recommendations unavailable");
            return Vec::new();
        };

        let counts = count_canonical(viewed_products);
        let exclude: HashSet<String> = counts.keys().cloned().collect();

        let cf_scores = weighted_scores(&model.similarity, &counts, &exclude);
        let cb_scores = match self.content.get() {
            Some(content) => weighted_scores(&content, &counts, &exclude),
            None => HashMap::new(),
        };

        let blended = blend_scores(&cf_scores, &cb_scores, &self.weights);
        let ranked = rank_descending(blended);

        self.hybrid_cache
            .insert(user_key.clone(), Arc::new(ranked.clone()));

        info!(
            user_id = %user_key,
            cf_candidates = cf_scores.len(),
            cb_candidates = cb_scores.len(),
            count = ranked.len().min(k),
            "Generated hybrid recommendations"
        );

        let mut ranked = ranked;
        ranked.truncate(k);
        to_candidates(ranked, RecommendationKind::Hybrid)
    }

    /// Aggregate popularity, exposed for cold-start surfaces.
    pub fn popular(&self, k: usize, exclude_products: &[String]) -> Vec<RecommendationCandidate> {
        let Some(model) = self.model.get() else {
            warn!("No model published, popularity ranking unavailable");
            return Vec::new();
        };
        let exclude: HashSet<String> = exclude_products.iter().map(|p| uuid_to_hex(p)).collect();
        popular_products(&model, k, &exclude)
    }
}
