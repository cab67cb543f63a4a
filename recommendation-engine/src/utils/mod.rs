// Utility functions for recommendation-engine

use std::collections::HashMap;
use uuid::Uuid;

/// Convert a 32-character hex product/user id to the dashed UUID form used
/// by external callers (e.g. `BA6F86D76CA44499AEE9108F60A9A476` ->
/// `ba6f86d7-6ca4-4499-aee9-108f60a9a476`).
///
/// Input that is not 32 hex characters after removing dashes is returned
/// unchanged, lower-cased.
pub fn hex_to_uuid(hex_string: &str) -> String {
    let clean = hex_string.replace('-', "");
    match Uuid::try_parse(&clean) {
        Ok(uuid) if clean.len() == 32 => uuid.hyphenated().to_string(),
        _ => hex_string.to_lowercase(),
    }
}

/// Convert a dashed UUID (or already-canonical hex) to the uppercase
/// 32-character hex form used as the internal lookup key.
pub fn uuid_to_hex(uuid_string: &str) -> String {
    uuid_string.replace('-', "").to_uppercase()
}

/// Min-max normalize a score map to [0, 1].
///
/// An empty map stays empty. A non-empty map where every value is equal
/// maps every value to 1.0.
pub fn normalize_scores(scores: &HashMap<String, f64>) -> HashMap<String, f64> {
    if scores.is_empty() {
        return HashMap::new();
    }

    let min = scores.values().cloned().fold(f64::INFINITY, f64::min);
    let max = scores.values().cloned().fold(f64::NEG_INFINITY, f64::max);

    if (max - min).abs() < f64::EPSILON {
        return scores.keys().map(|k| (k.clone(), 1.0)).collect();
    }

    scores
        .iter()
        .map(|(k, v)| (k.clone(), (v - min) / (max - min)))
        .collect()
}
