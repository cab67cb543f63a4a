//! Item-item cosine similarity over the interaction table.
//!
//! The computation is sparse-optimized: instead of the dense
//! O(products^2 x users) sweep, pairwise dot products are accumulated from
//! per-user rows, so only pairs that share at least one interacting user
//! are ever touched. Each unordered pair is computed once and mirrored,
//! which makes the result exactly symmetric by construction.

pub mod cooccurrence;

pub use cooccurrence::CoOccurrenceFilter;

use crate::models::{InteractionMatrix, SimilarityMatrix};
use std::collections::HashMap;
use tracing::info;

pub struct SimilarityEngine;

impl SimilarityEngine {
    pub fn new() -> Self {
        Self
    }

    /// Cosine similarity between all item vectors (columns of the
    /// interaction table). Items with an all-zero vector get an all-zero
    /// row; the diagonal is 1.0 for items with any interaction.
    pub fn compute(&self, interactions: &InteractionMatrix) -> SimilarityMatrix {
        let mut sim = SimilarityMatrix::zeroed(interactions.product_ids());
        let n = sim.len();

        let mut norms_sq = vec![0.0f64; n];
        for (_, row) in interactions.rows() {
            for (product_id, weight) in row {
                if let Some(i) = sim.position(product_id) {
                    norms_sq[i] += weight * weight;
                }
            }
        }

        let mut dots: HashMap<(usize, usize), f64> = HashMap::new();
        for (_, row) in interactions.rows() {
            let items: Vec<(usize, f64)> = row
                .iter()
                .filter(|(_, w)| **w != 0.0)
                .filter_map(|(p, w)| sim.position(p).map(|i| (i, *w)))
                .collect();

            // rows iterate in product order, so i < j within each pair
            for a in 0..items.len() {
                for b in (a + 1)..items.len() {
                    let (i, wi) = items[a];
                    let (j, wj) = items[b];
                    *dots.entry((i, j)).or_insert(0.0) += wi * wj;
                }
            }
        }

        for ((i, j), dot) in dots {
            let denom = (norms_sq[i] * norms_sq[j]).sqrt();
            if denom > 0.0 {
                sim.set_pair(i, j, dot / denom);
            }
        }

        for (i, norm_sq) in norms_sq.iter().enumerate() {
            if *norm_sq > 0.0 {
                sim.set_idx(i, i, 1.0);
            }
        }

        info!(
            products = n,
            non_zero_pairs = sim.non_zero_pairs(),
            "Computed item-item similarity matrix"
        );

        sim
    }
}

impl Default for SimilarityEngine {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn matrix(entries: &[(&str, &str, f64)]) -> InteractionMatrix {
        let mut m = InteractionMatrix::new();
        for (user, product, weight) in entries {
            m.add(user, product, *weight);
        }
        m
    }

    #[test]
    fn test_identical_vectors_have_similarity_one() {
        let interactions = matrix(&[
            ("U1", "A", 2.0),
            ("U1", "B", 2.0),
            ("U2", "A", 1.0),
            ("U2", "B", 1.0),
        ]);

        let sim = SimilarityEngine::new().compute(&interactions);
        assert!((sim.get("A", "B") - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_symmetry() {
        let interactions = matrix(&[
            ("U1", "A", 1.0),
            ("U1", "B", 3.0),
            ("U2", "B", 2.0),
            ("U2", "C", 1.0),
            ("U3", "A", 1.0),
            ("U3", "C", 4.0),
        ]);

        let sim = SimilarityEngine::new().compute(&interactions);
        for a in ["A", "B", "C"] {
            for b in ["A", "B", "C"] {
                assert_eq!(sim.get(a, b), sim.get(b, a));
            }
        }
    }

    #[test]
    fn test_disjoint_users_have_zero_similarity() {
        let interactions = matrix(&[("U1", "A", 1.0), ("U2", "B", 1.0)]);

        let sim = SimilarityEngine::new().compute(&interactions);
        assert_eq!(sim.get("A", "B"), 0.0);
    }

    #[test]
    fn test_known_cosine_value() {
        // A = [1, 0], B = [1, 1] over users (U1, U2)
        let interactions = matrix(&[("U1", "A", 1.0), ("U1", "B", 1.0), ("U2", "B", 1.0)]);

        let sim = SimilarityEngine::new().compute(&interactions);
        let expected = 1.0 / (1.0f64 * 2.0f64.sqrt());
        assert!((sim.get("A", "B") - expected).abs() < 1e-9);
    }

    #[test]
    fn test_zero_vector_item_gets_zero_row() {
        let mut interactions = matrix(&[("U1", "A", 1.0), ("U1", "B", 1.0)]);
        // C is known to the catalog but has only zero-weight interactions
        interactions.add("U2", "C", 0.0);

        let sim = SimilarityEngine::new().compute(&interactions);
        assert_eq!(sim.get("C", "A"), 0.0);
        assert_eq!(sim.get("C", "B"), 0.0);
        assert_eq!(sim.get("C", "C"), 0.0);
    }
}
