//! Co-occurrence filtering of the raw similarity matrix.
//!
//! Cosine similarity on sparse data produces spurious high-similarity pairs
//! supported by only one or two shared users; suppressing pairs below a
//! minimum co-occurring-user count trades recall for precision.

use crate::models::{InteractionMatrix, SimilarityMatrix};
use std::collections::HashMap;
use tracing::info;

pub struct CoOccurrenceFilter {
    min_co_occurrence: u32,
}

impl CoOccurrenceFilter {
    pub fn new(min_co_occurrence: u32) -> Self {
        Self { min_co_occurrence }
    }

    /// Zero out every similarity pair supported by fewer than
    /// `min_co_occurrence` users, then force the diagonal to 1.0.
    ///
    /// Co-occurrence is counted on the binarized interaction table
    /// (weight > 0 -> 1) with self-co-occurrence forced to 0 before
    /// thresholding.
    pub fn apply(
        &self,
        similarity: &SimilarityMatrix,
        interactions: &InteractionMatrix,
    ) -> SimilarityMatrix {
        let mut filtered = similarity.clone();
        let n = filtered.len();

        let mut counts: HashMap<(usize, usize), u32> = HashMap::new();
        for (_, row) in interactions.rows() {
            let items: Vec<usize> = row
                .iter()
                .filter(|(_, w)| **w > 0.0)
                .filter_map(|(p, _)| filtered.position(p))
                .collect();

            for a in 0..items.len() {
                for b in (a + 1)..items.len() {
                    *counts.entry((items[a], items[b])).or_insert(0) += 1;
                }
            }
        }

        let before = filtered.non_zero_pairs();

        for i in 0..n {
            for j in (i + 1)..n {
                let count = counts.get(&(i, j)).copied().unwrap_or(0);
                if count < self.min_co_occurrence {
                    filtered.set_pair(i, j, 0.0);
                }
            }
        }

        filtered.set_diagonal(1.0);

        info!(
            threshold = self.min_co_occurrence,
            suppressed = before - filtered.non_zero_pairs(),
            remaining = filtered.non_zero_pairs(),
            "Applied co-occurrence filter"
        );

        filtered
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::similarity::SimilarityEngine;

    fn interactions(entries: &[(&str, &str, f64)]) -> InteractionMatrix {
        let mut m = InteractionMatrix::new();
        for (user, product, weight) in entries {
            m.add(user, product, *weight);
        }
        m
    }

    #[test]
    fn test_weak_pairs_are_zeroed() {
        // A and B share two users, B and C share one
        let interactions = interactions(&[
            ("U1", "A", 1.0),
            ("U1", "B", 1.0),
            ("U2", "A", 1.0),
            ("U2", "B", 1.0),
            ("U3", "B", 1.0),
            ("U3", "C", 1.0),
        ]);
        let sim = SimilarityEngine::new().compute(&interactions);
        assert!(sim.get("B", "C") > 0.0);

        let filtered = CoOccurrenceFilter::new(2).apply(&sim, &interactions);

        assert!(filtered.get("A", "B") > 0.0);
        assert_eq!(filtered.get("B", "C"), 0.0);
        assert_eq!(filtered.get("C", "B"), 0.0);
    }

    #[test]
    fn test_diagonal_forced_to_one() {
        let interactions = interactions(&[("U1", "A", 1.0), ("U2", "B", 1.0)]);
        let sim = SimilarityEngine::new().compute(&interactions);

        // threshold high enough to wipe everything off-diagonal
        let filtered = CoOccurrenceFilter::new(10).apply(&sim, &interactions);

        for p in ["A", "B"] {
            assert_eq!(filtered.get(p, p), 1.0);
        }
        assert_eq!(filtered.get("A", "B"), 0.0);
    }

    #[test]
    fn test_zero_threshold_keeps_everything() {
        let interactions = interactions(&[
            ("U1", "A", 1.0),
            ("U1", "B", 1.0),
        ]);
        let sim = SimilarityEngine::new().compute(&interactions);
        let filtered = CoOccurrenceFilter::new(0).apply(&sim, &interactions);

        assert_eq!(filtered.get("A", "B"), sim.get("A", "B"));
    }

    #[test]
    fn test_filter_respects_binarization() {
        // heavy weights still count as a single co-occurring user
        let interactions = interactions(&[("U1", "A", 100.0), ("U1", "B", 100.0)]);
        let sim = SimilarityEngine::new().compute(&interactions);
        let filtered = CoOccurrenceFilter::new(2).apply(&sim, &interactions);

        assert_eq!(filtered.get("A", "B"), 0.0);
    }
}
