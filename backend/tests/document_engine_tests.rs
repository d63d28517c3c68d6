//! Document engine tests
//!
//! Exercises the validation semantics shared by receipts, deliveries,
//! transfers and adjustments against an in-memory model of the stock
//! projection and ledger:
//! - the projection always equals the ledger replay
//! - no validation sequence drives a stock level below zero
//! - terminal documents cannot be validated again
//! - transfers conserve total stock across the warehouse pair
//! - adjustments land exactly on the counted quantity

use std::collections::HashMap;
use uuid::Uuid;

use shared::models::{replay_ledger, StockMove};
use shared::types::{DocumentStatus, MoveType};

/// In-memory counterpart of the projection plus ledger
#[derive(Default)]
struct Engine {
    levels: HashMap<(Uuid, Uuid), i64>,
    ledger: Vec<StockMove>,
    statuses: HashMap<Uuid, DocumentStatus>,
}

#[derive(Debug, PartialEq)]
enum EngineError {
    InvalidState,
    EmptyDocument,
    InsufficientStock,
}

impl Engine {
    fn level(&self, product: Uuid, warehouse: Uuid) -> i64 {
        self.levels.get(&(product, warehouse)).copied().unwrap_or(0)
    }

    fn record(
        &mut self,
        product: Uuid,
        quantity: i64,
        move_type: MoveType,
        from: Option<Uuid>,
        to: Option<Uuid>,
    ) {
        self.ledger.push(StockMove {
            id: Uuid::new_v4(),
            product_id: product,
            quantity,
            move_type,
            from_location: from,
            to_location: to,
            reference_id: None,
            created_by: None,
            created_at: chrono::Utc::now(),
            product: None,
            from_warehouse: None,
            to_warehouse: None,
        });
    }

    /// Validate a receipt: each item is (product, warehouse, qty > 0)
    fn validate_receipt(
        &mut self,
        status: DocumentStatus,
        items: &[(Uuid, Uuid, i64)],
    ) -> Result<(), EngineError> {
        if status.is_terminal() {
            return Err(EngineError::InvalidState);
        }
        if items.is_empty() {
            return Err(EngineError::EmptyDocument);
        }
        for &(product, warehouse, qty) in items {
            *self.levels.entry((product, warehouse)).or_insert(0) += qty;
            self.record(product, qty, MoveType::Receipt, None, Some(warehouse));
        }
        Ok(())
    }

    /// Validate a delivery; fails atomically when any line lacks stock
    fn validate_delivery(
        &mut self,
        status: DocumentStatus,
        items: &[(Uuid, Uuid, i64)],
    ) -> Result<(), EngineError> {
        if status.is_terminal() {
            return Err(EngineError::InvalidState);
        }
        if items.is_empty() {
            return Err(EngineError::EmptyDocument);
        }

        // All checks precede all writes, matching transactional rollback
        let mut needed: HashMap<(Uuid, Uuid), i64> = HashMap::new();
        for &(product, warehouse, qty) in items {
            *needed.entry((product, warehouse)).or_insert(0) += qty;
        }
        for (key, qty) in &needed {
            if self.levels.get(key).copied().unwrap_or(0) < *qty {
                return Err(EngineError::InsufficientStock);
            }
        }

        for &(product, warehouse, qty) in items {
            *self.levels.entry((product, warehouse)).or_insert(0) -= qty;
            self.record(product, -qty, MoveType::Delivery, Some(warehouse), None);
        }
        Ok(())
    }

    /// Validate a transfer: items share the header's warehouse pair
    fn validate_transfer(
        &mut self,
        status: DocumentStatus,
        from: Uuid,
        to: Uuid,
        items: &[(Uuid, i64)],
    ) -> Result<(), EngineError> {
        if status.is_terminal() {
            return Err(EngineError::InvalidState);
        }
        if items.is_empty() {
            return Err(EngineError::EmptyDocument);
        }

        let mut needed: HashMap<Uuid, i64> = HashMap::new();
        for &(product, qty) in items {
            *needed.entry(product).or_insert(0) += qty;
        }
        for (product, qty) in &needed {
            if self.level(*product, from) < *qty {
                return Err(EngineError::InsufficientStock);
            }
        }

        for &(product, qty) in items {
            *self.levels.entry((product, from)).or_insert(0) -= qty;
            *self.levels.entry((product, to)).or_insert(0) += qty;
            self.record(product, qty, MoveType::Transfer, Some(from), Some(to));
        }
        Ok(())
    }

    fn create_document(&mut self) -> Uuid {
        let id = Uuid::new_v4();
        self.statuses.insert(id, DocumentStatus::Draft);
        id
    }

    fn status(&self, doc: Uuid) -> DocumentStatus {
        self.statuses[&doc]
    }

    /// Validate committing the document terminal, as seen by other callers
    fn commit_done(&mut self, doc: Uuid) {
        self.statuses.insert(doc, DocumentStatus::Done);
    }

    /// Direct status change: the transition is checked against the status the
    /// caller observed, and the write applies only while the stored status
    /// still equals that observation (the service's conditional UPDATE).
    fn set_status_direct(
        &mut self,
        doc: Uuid,
        observed: DocumentStatus,
        to: DocumentStatus,
    ) -> Result<(), EngineError> {
        if !observed.can_set_directly(to) {
            return Err(EngineError::InvalidState);
        }
        if self.status(doc) != observed {
            return Err(EngineError::InvalidState);
        }
        self.statuses.insert(doc, to);
        Ok(())
    }

    /// Item edit guard: writes are conditioned on the stored status being
    /// non-terminal at write time, not on an earlier read.
    fn edit_items(&mut self, doc: Uuid) -> Result<(), EngineError> {
        if self.status(doc).is_terminal() {
            return Err(EngineError::InvalidState);
        }
        Ok(())
    }

    /// Record a count: sets the level absolutely and logs the difference
    fn adjust(&mut self, product: Uuid, warehouse: Uuid, counted: i64) -> i64 {
        let expected = self.level(product, warehouse);
        let delta = counted - expected;
        self.levels.insert((product, warehouse), counted);
        self.record(
            product,
            delta,
            MoveType::Adjustment,
            Some(warehouse),
            Some(warehouse),
        );
        delta
    }

    /// The write-time invariant: projection equals ledger replay
    fn projection_matches_ledger(&self) -> bool {
        let replayed = replay_ledger(&self.ledger);
        for (key, qty) in &self.levels {
            if replayed.get(key).copied().unwrap_or(0) != *qty {
                return false;
            }
        }
        for (key, qty) in &replayed {
            if self.levels.get(key).copied().unwrap_or(0) != *qty {
                return false;
            }
        }
        true
    }
}

mod unit_tests {
    use super::*;

    #[test]
    fn test_receipt_into_empty_warehouse() {
        let mut engine = Engine::default();
        let (p, w1) = (Uuid::new_v4(), Uuid::new_v4());

        engine
            .validate_receipt(DocumentStatus::Draft, &[(p, w1, 10)])
            .unwrap();

        assert_eq!(engine.level(p, w1), 10);
        assert_eq!(engine.ledger.len(), 1);
        assert_eq!(engine.ledger[0].quantity, 10);
        assert_eq!(engine.ledger[0].move_type, MoveType::Receipt);
        assert_eq!(engine.ledger[0].to_location, Some(w1));
        assert_eq!(engine.ledger[0].from_location, None);
    }

    #[test]
    fn test_delivery_with_sufficient_stock() {
        let mut engine = Engine::default();
        let (p, w1) = (Uuid::new_v4(), Uuid::new_v4());
        engine
            .validate_receipt(DocumentStatus::Draft, &[(p, w1, 10)])
            .unwrap();

        engine
            .validate_delivery(DocumentStatus::Ready, &[(p, w1, 5)])
            .unwrap();

        assert_eq!(engine.level(p, w1), 5);
        assert_eq!(engine.ledger.last().unwrap().quantity, -5);
    }

    #[test]
    fn test_delivery_insufficient_stock_leaves_everything_untouched() {
        let mut engine = Engine::default();
        let (p, w1) = (Uuid::new_v4(), Uuid::new_v4());
        engine
            .validate_receipt(DocumentStatus::Draft, &[(p, w1, 5)])
            .unwrap();
        let ledger_len = engine.ledger.len();

        let result = engine.validate_delivery(DocumentStatus::Draft, &[(p, w1, 20)]);

        assert_eq!(result, Err(EngineError::InsufficientStock));
        assert_eq!(engine.level(p, w1), 5);
        assert_eq!(engine.ledger.len(), ledger_len);
    }

    #[test]
    fn test_transfer_moves_stock_between_warehouses() {
        let mut engine = Engine::default();
        let (p, w1, w2) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
        engine
            .validate_receipt(DocumentStatus::Draft, &[(p, w1, 5)])
            .unwrap();

        engine
            .validate_transfer(DocumentStatus::Draft, w1, w2, &[(p, 4)])
            .unwrap();

        assert_eq!(engine.level(p, w1), 1);
        assert_eq!(engine.level(p, w2), 4);
        let entry = engine.ledger.last().unwrap();
        assert_eq!(entry.quantity, 4);
        assert_eq!(entry.move_type, MoveType::Transfer);
        assert_eq!(entry.from_location, Some(w1));
        assert_eq!(entry.to_location, Some(w2));
    }

    #[test]
    fn test_adjustment_lands_on_counted_quantity() {
        let mut engine = Engine::default();
        let (p, w1) = (Uuid::new_v4(), Uuid::new_v4());
        engine
            .validate_receipt(DocumentStatus::Draft, &[(p, w1, 1)])
            .unwrap();

        let delta = engine.adjust(p, w1, 3);

        assert_eq!(delta, 2);
        assert_eq!(engine.level(p, w1), 3);
        let entry = engine.ledger.last().unwrap();
        assert_eq!(entry.quantity, 2);
        assert_eq!(entry.from_location, entry.to_location);
    }

    #[test]
    fn test_adjustment_with_matching_count_still_logs() {
        let mut engine = Engine::default();
        let (p, w1) = (Uuid::new_v4(), Uuid::new_v4());
        engine
            .validate_receipt(DocumentStatus::Draft, &[(p, w1, 7)])
            .unwrap();
        let ledger_len = engine.ledger.len();

        let delta = engine.adjust(p, w1, 7);

        assert_eq!(delta, 0);
        assert_eq!(engine.ledger.len(), ledger_len + 1);
        assert_eq!(engine.ledger.last().unwrap().quantity, 0);
    }

    #[test]
    fn test_validating_done_document_fails() {
        let mut engine = Engine::default();
        let (p, w1) = (Uuid::new_v4(), Uuid::new_v4());

        let result = engine.validate_receipt(DocumentStatus::Done, &[(p, w1, 10)]);

        assert_eq!(result, Err(EngineError::InvalidState));
        assert!(engine.ledger.is_empty());
    }

    #[test]
    fn test_validating_canceled_document_fails() {
        let mut engine = Engine::default();
        let (p, w1) = (Uuid::new_v4(), Uuid::new_v4());

        let result = engine.validate_delivery(DocumentStatus::Canceled, &[(p, w1, 1)]);

        assert_eq!(result, Err(EngineError::InvalidState));
    }

    #[test]
    fn test_empty_document_rejected() {
        let mut engine = Engine::default();
        assert_eq!(
            engine.validate_receipt(DocumentStatus::Draft, &[]),
            Err(EngineError::EmptyDocument)
        );
        assert_eq!(
            engine.validate_delivery(DocumentStatus::Draft, &[]),
            Err(EngineError::EmptyDocument)
        );
        assert_eq!(
            engine.validate_transfer(DocumentStatus::Draft, Uuid::new_v4(), Uuid::new_v4(), &[]),
            Err(EngineError::EmptyDocument)
        );
    }

    #[test]
    fn test_direct_status_change_on_current_status_succeeds() {
        let mut engine = Engine::default();
        let doc = engine.create_document();

        engine
            .set_status_direct(doc, DocumentStatus::Draft, DocumentStatus::Ready)
            .unwrap();

        assert_eq!(engine.status(doc), DocumentStatus::Ready);
    }

    #[test]
    fn test_stale_status_write_cannot_overwrite_done() {
        let mut engine = Engine::default();
        let doc = engine.create_document();

        // Caller reads draft, then a concurrent validate commits done before
        // the caller's write lands.
        let observed = engine.status(doc);
        engine.commit_done(doc);

        let result = engine.set_status_direct(doc, observed, DocumentStatus::Canceled);

        assert_eq!(result, Err(EngineError::InvalidState));
        assert_eq!(engine.status(doc), DocumentStatus::Done);
    }

    #[test]
    fn test_item_edit_after_concurrent_validate_fails() {
        let mut engine = Engine::default();
        let doc = engine.create_document();
        engine.edit_items(doc).unwrap();

        engine.commit_done(doc);

        assert_eq!(engine.edit_items(doc), Err(EngineError::InvalidState));
    }

    #[test]
    fn test_projection_matches_ledger_after_mixed_documents() {
        let mut engine = Engine::default();
        let (p, w1, w2) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());

        engine
            .validate_receipt(DocumentStatus::Draft, &[(p, w1, 10), (p, w2, 3)])
            .unwrap();
        engine
            .validate_delivery(DocumentStatus::Draft, &[(p, w1, 4)])
            .unwrap();
        engine
            .validate_transfer(DocumentStatus::Draft, w1, w2, &[(p, 2)])
            .unwrap();
        engine.adjust(p, w2, 8);

        assert!(engine.projection_matches_ledger());
        assert_eq!(engine.level(p, w1), 4);
        assert_eq!(engine.level(p, w2), 8);
    }
}

mod property_tests {
    use super::*;
    use proptest::prelude::*;

    /// A randomly chosen document operation over a small id space
    #[derive(Debug, Clone)]
    enum Op {
        Receipt { product: usize, warehouse: usize, qty: i64 },
        Delivery { product: usize, warehouse: usize, qty: i64 },
        Transfer { product: usize, from: usize, to: usize, qty: i64 },
        Adjust { product: usize, warehouse: usize, counted: i64 },
    }

    fn op_strategy() -> impl Strategy<Value = Op> {
        prop_oneof![
            (0usize..3, 0usize..3, 1i64..100).prop_map(|(product, warehouse, qty)| {
                Op::Receipt { product, warehouse, qty }
            }),
            (0usize..3, 0usize..3, 1i64..100).prop_map(|(product, warehouse, qty)| {
                Op::Delivery { product, warehouse, qty }
            }),
            (0usize..3, 0usize..3, 0usize..3, 1i64..100).prop_map(|(product, from, to, qty)| {
                Op::Transfer { product, from, to, qty }
            }),
            (0usize..3, 0usize..3, 0i64..150).prop_map(|(product, warehouse, counted)| {
                Op::Adjust { product, warehouse, counted }
            }),
        ]
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(200))]

        /// Projection equals ledger replay after any operation sequence, and
        /// no level ever goes negative
        #[test]
        fn prop_projection_equals_replay(ops in prop::collection::vec(op_strategy(), 1..40)) {
            let products: Vec<Uuid> = (0..3).map(|_| Uuid::new_v4()).collect();
            let warehouses: Vec<Uuid> = (0..3).map(|_| Uuid::new_v4()).collect();
            let mut engine = Engine::default();

            for op in ops {
                match op {
                    Op::Receipt { product, warehouse, qty } => {
                        engine
                            .validate_receipt(
                                DocumentStatus::Draft,
                                &[(products[product], warehouses[warehouse], qty)],
                            )
                            .unwrap();
                    }
                    Op::Delivery { product, warehouse, qty } => {
                        // May fail on insufficient stock; failure must not mutate
                        let before = engine.level(products[product], warehouses[warehouse]);
                        let result = engine.validate_delivery(
                            DocumentStatus::Draft,
                            &[(products[product], warehouses[warehouse], qty)],
                        );
                        if result.is_err() {
                            prop_assert_eq!(
                                engine.level(products[product], warehouses[warehouse]),
                                before
                            );
                        }
                    }
                    Op::Transfer { product, from, to, qty } => {
                        if from != to {
                            let _ = engine.validate_transfer(
                                DocumentStatus::Draft,
                                warehouses[from],
                                warehouses[to],
                                &[(products[product], qty)],
                            );
                        }
                    }
                    Op::Adjust { product, warehouse, counted } => {
                        engine.adjust(products[product], warehouses[warehouse], counted);
                    }
                }

                prop_assert!(engine.projection_matches_ledger());
                for qty in engine.levels.values() {
                    prop_assert!(*qty >= 0);
                }
            }
        }

        /// Transfer conservation: total across the pair is unchanged
        #[test]
        fn prop_transfer_conserves_total(initial in 1i64..1000, moved in 1i64..1000) {
            prop_assume!(moved <= initial);

            let mut engine = Engine::default();
            let (p, w1, w2) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
            engine
                .validate_receipt(DocumentStatus::Draft, &[(p, w1, initial)])
                .unwrap();
            let total_before = engine.level(p, w1) + engine.level(p, w2);

            engine
                .validate_transfer(DocumentStatus::Draft, w1, w2, &[(p, moved)])
                .unwrap();

            prop_assert_eq!(engine.level(p, w1) + engine.level(p, w2), total_before);
            prop_assert_eq!(engine.level(p, w2), moved);
        }

        /// Adjustment correctness: level becomes the counted value and one
        /// entry with quantity counted - expected is appended
        #[test]
        fn prop_adjustment_lands_on_count(initial in 0i64..1000, counted in 0i64..1000) {
            let mut engine = Engine::default();
            let (p, w) = (Uuid::new_v4(), Uuid::new_v4());
            if initial > 0 {
                engine
                    .validate_receipt(DocumentStatus::Draft, &[(p, w, initial)])
                    .unwrap();
            }
            let ledger_before = engine.ledger.len();

            let delta = engine.adjust(p, w, counted);

            prop_assert_eq!(engine.level(p, w), counted);
            prop_assert_eq!(delta, counted - initial);
            prop_assert_eq!(engine.ledger.len(), ledger_before + 1);
            prop_assert_eq!(engine.ledger.last().unwrap().quantity, counted - initial);
        }

        /// A delivery for more than the available quantity always fails and
        /// appends nothing
        #[test]
        fn prop_overdraw_always_fails(stock in 0i64..100, extra in 1i64..100) {
            let mut engine = Engine::default();
            let (p, w) = (Uuid::new_v4(), Uuid::new_v4());
            if stock > 0 {
                engine
                    .validate_receipt(DocumentStatus::Draft, &[(p, w, stock)])
                    .unwrap();
            }
            let ledger_before = engine.ledger.len();

            let result =
                engine.validate_delivery(DocumentStatus::Draft, &[(p, w, stock + extra)]);

            prop_assert_eq!(result, Err(EngineError::InsufficientStock));
            prop_assert_eq!(engine.level(p, w), stock);
            prop_assert_eq!(engine.ledger.len(), ledger_before);
        }
    }
}
