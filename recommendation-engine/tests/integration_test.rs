//! End-to-end pipeline test: raw events through matrix building, similarity
//! computation, co-occurrence filtering, and scoring.

use chrono::Utc;
use recommendation_engine::config::HybridConfig;
use recommendation_engine::models::{
    ModelArtifact, ModelMetadata, PurchaseEvent, RecommendationKind, TrainingMode, ViewEvent,
};
use recommendation_engine::services::{
    CoOccurrenceFilter, ContentHandle, CurrentModel, InteractionMatrixBuilder,
    RecommendationScorer, SimilarityEngine,
};
use std::collections::BTreeMap;
use std::sync::Arc;

const PROD_A: &str = "AAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAA";
const PROD_B: &str = "BBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBB";
const PROD_C: &str = "CCCCCCCCCCCCCCCCCCCCCCCCCCCCCCCC";
const PROD_D: &str = "DDDDDDDDDDDDDDDDDDDDDDDDDDDDDDDD";

const PROD_A_UUID: &str = "aaaaaaaa-aaaa-aaaa-aaaa-aaaaaaaaaaaa";
const PROD_B_UUID: &str = "bbbbbbbb-bbbb-bbbb-bbbb-bbbbbbbbbbbb";
const PROD_C_UUID: &str = "cccccccc-cccc-cccc-cccc-cccccccccccc";

fn purchase(user: &str, product: &str) -> PurchaseEvent {
    PurchaseEvent {
        user_id: user.to_string(),
        product_id: product.to_string(),
        quantity: 1,
        occurred_at: Utc::now(),
    }
}

fn view(user: &str, product: &str) -> ViewEvent {
    ViewEvent {
        user_id: user.to_string(),
        product_id: product.to_string(),
        view_count: 1,
        occurred_at: Utc::now(),
    }
}

/// Three users over four products: user 1 buys A and B, user 2 buys B and
/// C, user 3 only views D.
fn train_artifact(min_co_occurrence: u32) -> ModelArtifact {
    let purchases = vec![
        purchase("USER1", PROD_A),
        purchase("USER1", PROD_B),
        purchase("USER2", PROD_B),
        purchase("USER2", PROD_C),
    ];
    let views = vec![view("USER3", PROD_D)];

    let matrix = InteractionMatrixBuilder::new(1.0, 0.3).build(&purchases, &views);
    let similarity = SimilarityEngine::new().compute(&matrix);
    let filtered = CoOccurrenceFilter::new(min_co_occurrence).apply(&similarity, &matrix);

    ModelArtifact {
        metadata: ModelMetadata {
            schema_version: 1,
            version: "integration-test".to_string(),
            trained_at: Utc::now(),
            training_mode: TrainingMode::Full,
            n_users: matrix.n_users(),
            n_products: matrix.n_products(),
            n_interactions: matrix.n_interactions(),
            sparsity: matrix.sparsity(),
            min_co_occurrence,
            purchase_weight: 1.0,
            view_weight: 0.3,
            use_hybrid: true,
            extra: BTreeMap::new(),
        },
        product_ids: filtered.product_ids().to_vec(),
        similarity: filtered,
        interactions: Some(matrix),
    }
}

fn scorer_for(artifact: ModelArtifact) -> RecommendationScorer {
    RecommendationScorer::new(
        Arc::new(CurrentModel::with_artifact(artifact)),
        Arc::new(ContentHandle::empty()),
        HybridConfig {
            cf_weight: 0.7,
            cb_weight: 0.3,
        },
    )
}

#[test]
fn test_similarity_structure_of_trained_model() {
    let artifact = train_artifact(1);
    let sim = &artifact.similarity;

    // A and B share user 1; A and C share nobody
    assert!(sim.get(PROD_A, PROD_B) > 0.0);
    assert_eq!(sim.get(PROD_A, PROD_C), 0.0);
    assert_eq!(sim.get(PROD_A, PROD_B), sim.get(PROD_B, PROD_A));

    // the view-only product is isolated but carries the identity diagonal
    assert_eq!(sim.get(PROD_D, PROD_A), 0.0);
    assert_eq!(sim.get(PROD_D, PROD_D), 1.0);
}

#[test]
fn test_personalized_recommendation_when_threshold_met() {
    let scorer = scorer_for(train_artifact(1));

    let recs = scorer.recommend_for_user("USER3", &[PROD_A_UUID.to_string()], 10, true);

    assert!(!recs.is_empty());
    assert!(recs
        .iter()
        .all(|c| c.kind == RecommendationKind::Personalized));

    // B must rank above C: C never co-occurs with A, so only B scores
    assert_eq!(recs[0].product_id, PROD_B_UUID);
    assert!(!recs.iter().any(|c| c.product_id == PROD_C_UUID));

    // the self entry is never surfaced
    assert!(!recs.iter().any(|c| c.product_id == PROD_A_UUID));
}

#[test]
fn test_popularity_fallback_when_threshold_not_met() {
    // threshold 2 wipes every pair (each is supported by a single user)
    let scorer = scorer_for(train_artifact(2));

    let recs = scorer.recommend_for_user("USER3", &[PROD_A_UUID.to_string()], 10, true);

    assert!(!recs.is_empty());
    assert!(recs.iter().all(|c| c.kind == RecommendationKind::Popular));

    // purchased product is excluded from the fallback
    assert!(!recs.iter().any(|c| c.product_id == PROD_A_UUID));
    // B has the highest total interaction weight (two purchases)
    assert_eq!(recs[0].product_id, PROD_B_UUID);
}

#[test]
fn test_cross_sell_accepts_both_identifier_forms() {
    let scorer = scorer_for(train_artifact(1));

    let from_uuid = scorer.cross_sell(PROD_A_UUID, 10);
    let from_hex = scorer.cross_sell(PROD_A, 10);

    assert_eq!(from_uuid.len(), from_hex.len());
    for (a, b) in from_uuid.iter().zip(from_hex.iter()) {
        assert_eq!(a.product_id, b.product_id);
        assert_eq!(a.score, b.score);
    }

    // outputs always carry the dashed external form
    assert_eq!(from_uuid[0].product_id, PROD_B_UUID);
}

#[test]
fn test_artifact_survives_serialization_boundary() {
    let artifact = train_artifact(1);
    let blob = serde_json::to_string(&artifact).unwrap();
    let loaded: ModelArtifact = serde_json::from_str(&blob).unwrap();

    assert_eq!(loaded.metadata.version, artifact.metadata.version);
    assert_eq!(
        loaded.similarity.get(PROD_A, PROD_B),
        artifact.similarity.get(PROD_A, PROD_B)
    );

    // a scorer over the reloaded artifact behaves identically
    let recs = scorer_for(loaded).recommend_for_user("USER3", &[PROD_A_UUID.to_string()], 10, true);
    assert_eq!(recs[0].product_id, PROD_B_UUID);
}
