//! Offline quality evaluation used as the deployment gate.
//!
//! A seeded per-user holdout split keeps part of each user's interactions
//! out of a freshly retrained similarity matrix, then measures how often
//! the held-out products come back in that user's top-10.

use crate::models::InteractionMatrix;
use crate::services::scoring::{rank_descending, weighted_scores};
use crate::services::similarity::{CoOccurrenceFilter, SimilarityEngine};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};
use tracing::info;

const EVAL_K: usize = 10;
const HOLDOUT_SEED: u64 = 42;

/// Minimum interactions a user needs before any of them can be held out.
const MIN_EVALUABLE_ITEMS: usize = 3;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluationMetrics {
    pub precision_at_10: f64,
    pub recall_at_10: f64,
    /// Mean distinct categories in each evaluated user's top-10. `None`
    /// when no category data was available.
    pub category_diversity: Option<f64>,
    pub evaluated_users: usize,
}

impl EvaluationMetrics {
    pub fn empty() -> Self {
        Self {
            precision_at_10: 0.0,
            recall_at_10: 0.0,
            category_diversity: None,
            evaluated_users: 0,
        }
    }
}

pub struct Evaluator {
    holdout_fraction: f64,
}

impl Evaluator {
    pub fn new(holdout_fraction: f64) -> Self {
        Self { holdout_fraction }
    }

    pub fn evaluate(
        &self,
        interactions: &InteractionMatrix,
        min_co_occurrence: u32,
        categories: &HashMap<String, String>,
    ) -> EvaluationMetrics {
        let mut rng = StdRng::seed_from_u64(HOLDOUT_SEED);
        let mut train = InteractionMatrix::new();
        let mut holdouts: BTreeMap<String, Vec<String>> = BTreeMap::new();

        for (user_id, row) in interactions.rows() {
            let mut items: Vec<(&String, f64)> = row
                .iter()
                .filter(|(_, w)| **w > 0.0)
                .map(|(p, w)| (p, *w))
                .collect();

            if items.len() < MIN_EVALUABLE_ITEMS {
                for (product_id, weight) in items {
                    train.add(user_id, product_id, weight);
                }
                continue;
            }

            items.shuffle(&mut rng);
            let n_hold = ((items.len() as f64 * self.holdout_fraction).ceil() as usize)
                .clamp(1, items.len() - 1);

            let (held, kept) = items.split_at(n_hold);
            holdouts.insert(
                user_id.clone(),
                held.iter().map(|(p, _)| (*p).clone()).collect(),
            );
            for &(product_id, weight) in kept {
                train.add(user_id, product_id, weight);
            }
        }

        if holdouts.is_empty() {
            info!("No users with enough interactions to evaluate");
            return EvaluationMetrics::empty();
        }

        let similarity = SimilarityEngine::new().compute(&train);
        let filtered = CoOccurrenceFilter::new(min_co_occurrence).apply(&similarity, &train);

        let mut precision_sum = 0.0;
        let mut recall_sum = 0.0;
        let mut diversity_sum = 0.0;
        let mut diversity_users = 0usize;

        for (user_id, held) in &holdouts {
            let seeds: HashMap<String, usize> = train
                .user_items(user_id)
                .map(|row| row.keys().map(|p| (p.clone(), 1)).collect())
                .unwrap_or_default();
            let exclude: HashSet<String> = seeds.keys().cloned().collect();

            let scores = weighted_scores(&filtered, &seeds, &exclude);
            let mut ranked = rank_descending(scores);
            ranked.truncate(EVAL_K);

            let hits = ranked
                .iter()
                .filter(|(product_id, _)| held.contains(product_id))
                .count();

            precision_sum += hits as f64 / EVAL_K as f64;
            recall_sum += hits as f64 / held.len() as f64;

            if !categories.is_empty() {
                let distinct: HashSet<&String> = ranked
                    .iter()
                    .filter_map(|(product_id, _)| categories.get(product_id))
                    .collect();
                diversity_sum += distinct.len() as f64;
                diversity_users += 1;
            }
        }

        let n = holdouts.len() as f64;
        let metrics = EvaluationMetrics {
            precision_at_10: precision_sum / n,
            recall_at_10: recall_sum / n,
            category_diversity: (diversity_users > 0)
                .then(|| diversity_sum / diversity_users as f64),
            evaluated_users: holdouts.len(),
        };

        info!(
            evaluated_users = metrics.evaluated_users,
            precision_at_10 = metrics.precision_at_10,
            recall_at_10 = metrics.recall_at_10,
            category_diversity = metrics.category_diversity,
            "Computed offline evaluation metrics"
        );

        metrics
    }
}
