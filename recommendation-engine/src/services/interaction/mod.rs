//! Builds the weighted user x product interaction table from raw purchase
//! and view events.

use crate::models::{
    InteractionKind, InteractionMatrix, InteractionRecord, PurchaseEvent, ViewEvent,
};
use crate::utils::uuid_to_hex;
use tracing::info;

pub struct InteractionMatrixBuilder {
    purchase_weight: f64,
    view_weight: f64,
}

impl InteractionMatrixBuilder {
    pub fn new(purchase_weight: f64, view_weight: f64) -> Self {
        Self {
            purchase_weight,
            view_weight,
        }
    }

    /// Normalize raw events into weighted interaction records. Ids are
    /// canonicalized to the uppercase hex lookup form on the way in.
    pub fn records(
        &self,
        purchases: &[PurchaseEvent],
        views: &[ViewEvent],
    ) -> Vec<InteractionRecord> {
        let mut records = Vec::with_capacity(purchases.len() + views.len());

        for event in purchases {
            records.push(InteractionRecord {
                user_id: uuid_to_hex(&event.user_id),
                product_id: uuid_to_hex(&event.product_id),
                weight: event.quantity as f64 * self.purchase_weight,
                kind: InteractionKind::Purchase,
            });
        }

        for event in views {
            records.push(InteractionRecord {
                user_id: uuid_to_hex(&event.user_id),
                product_id: uuid_to_hex(&event.product_id),
                weight: event.view_count as f64 * self.view_weight,
                kind: InteractionKind::View,
            });
        }

        records
    }

    /// Group-sum quantities and view counts per (user, product), scale each
    /// by its per-kind weight and add the two tables element-wise.
    pub fn build(&self, purchases: &[PurchaseEvent], views: &[ViewEvent]) -> InteractionMatrix {
        let mut matrix = InteractionMatrix::new();

        for record in self.records(purchases, views) {
            matrix.add(&record.user_id, &record.product_id, record.weight);
        }

        info!(
            users = matrix.n_users(),
            products = matrix.n_products(),
            interactions = matrix.n_interactions(),
            sparsity = matrix.sparsity(),
            "Built interaction matrix"
        );

        matrix
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn purchase(user: &str, product: &str, quantity: u32) -> PurchaseEvent {
        PurchaseEvent {
            user_id: user.to_string(),
            product_id: product.to_string(),
            quantity,
            occurred_at: Utc::now(),
        }
    }

    fn view(user: &str, product: &str, view_count: u32) -> ViewEvent {
        ViewEvent {
            user_id: user.to_string(),
            product_id: product.to_string(),
            view_count,
            occurred_at: Utc::now(),
        }
    }

    #[test]
    fn test_group_sum_and_weighting() {
        let builder = InteractionMatrixBuilder::new(1.0, 0.3);
        let matrix = builder.build(
            &[
                purchase("U1", "P1", 2),
                purchase("U1", "P1", 1),
                purchase("U2", "P2", 1),
            ],
            &[view("U1", "P1", 10), view("U1", "P2", 5)],
        );

        // purchases: 3 * 1.0, views: 10 * 0.3, summed element-wise
        assert!((matrix.weight("U1", "P1") - 6.0).abs() < 1e-12);
        assert!((matrix.weight("U1", "P2") - 1.5).abs() < 1e-12);
        assert!((matrix.weight("U2", "P2") - 1.0).abs() < 1e-12);
        assert_eq!(matrix.weight("U2", "P1"), 0.0);
    }

    #[test]
    fn test_ids_are_canonicalized() {
        let builder = InteractionMatrixBuilder::new(1.0, 0.3);
        let matrix = builder.build(
            &[purchase(
                "ba6f86d7-6ca4-4499-aee9-108f60a9a476",
                "c0ffee00-dead-beef-aaaa-bbbbccccdddd",
                1,
            )],
            &[],
        );

        assert!(
            (matrix.weight(
                "BA6F86D76CA44499AEE9108F60A9A476",
                "C0FFEE00DEADBEEFAAAABBBBCCCCDDDD"
            ) - 1.0)
                .abs()
                < 1e-12
        );
    }

    #[test]
    fn test_records_carry_kind_and_scaled_weight() {
        let builder = InteractionMatrixBuilder::new(1.0, 0.3);
        let records = builder.records(&[purchase("U1", "P1", 2)], &[view("U1", "P2", 10)]);

        assert_eq!(records.len(), 2);
        assert_eq!(records[0].kind, InteractionKind::Purchase);
        assert!((records[0].weight - 2.0).abs() < 1e-12);
        assert_eq!(records[1].kind, InteractionKind::View);
        assert!((records[1].weight - 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_non_negative_inputs_stay_non_negative() {
        let builder = InteractionMatrixBuilder::new(1.0, 0.3);
        let matrix = builder.build(&[purchase("U1", "P1", 0)], &[view("U1", "P1", 0)]);

        assert_eq!(matrix.weight("U1", "P1"), 0.0);
        assert_eq!(matrix.n_interactions(), 0);
    }
}
