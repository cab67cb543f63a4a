//! Aggregate popularity ranking, the terminal fallback when personalized
//! signal is unavailable.

use super::{rank_descending, to_candidates};
use crate::models::{ModelArtifact, RecommendationCandidate, RecommendationKind};
use std::collections::{HashMap, HashSet};
use tracing::warn;

/// Top-k products by total interaction weight across all users.
///
/// `exclude` holds canonical hex ids to drop (e.g. already-purchased
/// products). Returns an empty list when the published model was trained
/// without its interaction matrix; for a non-empty catalog with
/// interactions this never fails.
pub fn popular_products(
    artifact: &ModelArtifact,
    k: usize,
    exclude: &HashSet<String>,
) -> Vec<RecommendationCandidate> {
    let Some(interactions) = &artifact.interactions else {
        warn!("Interaction matrix not available, cannot compute popular products");
        return Vec::new();
    };

    let scores: HashMap<String, f64> = interactions
        .popularity()
        .into_iter()
        .filter(|(product_id, _)| !exclude.contains(product_id))
        .collect();

    let mut ranked = rank_descending(scores);
    ranked.truncate(k);
    to_candidates(ranked, RecommendationKind::Popular)
}
