//! Stock projection and ledger models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

use super::{Product, Warehouse};
use crate::types::MoveType;

/// Current quantity of one product in one warehouse
///
/// Materialized cache over the stock-move ledger, keyed by the unique
/// (product_id, warehouse_id) pair. Created lazily on first movement and
/// never deleted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StockLevel {
    pub id: Uuid,
    pub product_id: Uuid,
    pub warehouse_id: Uuid,
    pub quantity: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub product: Option<Product>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warehouse: Option<Warehouse>,
}

/// One immutable entry of the stock ledger
///
/// Field conventions per move type:
/// - RECEIPT: quantity > 0, to_location set, from_location null
/// - DELIVERY: quantity < 0, from_location set, to_location null
/// - TRANSFER: quantity > 0, both locations set; direction is implied by the
///   location fields, not by the sign
/// - ADJUSTMENT: quantity = counted - expected, both locations equal the
///   adjusted warehouse
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StockMove {
    pub id: Uuid,
    pub product_id: Uuid,
    pub quantity: i64,
    pub move_type: MoveType,
    pub from_location: Option<Uuid>,
    pub to_location: Option<Uuid>,
    pub reference_id: Option<Uuid>,
    pub created_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub product: Option<Product>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub from_warehouse: Option<Warehouse>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub to_warehouse: Option<Warehouse>,
}

impl StockMove {
    /// Signed effect of this entry on the quantity held at `warehouse_id`
    pub fn effect_on(&self, warehouse_id: Uuid) -> i64 {
        match self.move_type {
            MoveType::Receipt | MoveType::Adjustment => {
                if self.to_location == Some(warehouse_id) {
                    self.quantity
                } else {
                    0
                }
            }
            MoveType::Delivery => {
                if self.from_location == Some(warehouse_id) {
                    self.quantity
                } else {
                    0
                }
            }
            MoveType::Transfer => {
                let mut effect = 0;
                if self.from_location == Some(warehouse_id) {
                    effect -= self.quantity;
                }
                if self.to_location == Some(warehouse_id) {
                    effect += self.quantity;
                }
                effect
            }
        }
    }

    /// Warehouses whose quantity this entry touches
    pub fn touched_warehouses(&self) -> Vec<Uuid> {
        let mut warehouses = Vec::with_capacity(2);
        if let Some(from) = self.from_location {
            warehouses.push(from);
        }
        if let Some(to) = self.to_location {
            if Some(to) != self.from_location {
                warehouses.push(to);
            }
        }
        warehouses
    }
}

/// Recompute per-(product, warehouse) quantities from a sequence of ledger
/// entries. The projection kept by the backend must always agree with this.
pub fn replay_ledger(moves: &[StockMove]) -> HashMap<(Uuid, Uuid), i64> {
    let mut quantities = HashMap::new();
    for entry in moves {
        for warehouse_id in entry.touched_warehouses() {
            *quantities.entry((entry.product_id, warehouse_id)).or_insert(0) +=
                entry.effect_on(warehouse_id);
        }
    }
    quantities
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mv(
        product: Uuid,
        qty: i64,
        move_type: MoveType,
        from: Option<Uuid>,
        to: Option<Uuid>,
    ) -> StockMove {
        StockMove {
            id: Uuid::new_v4(),
            product_id: product,
            quantity: qty,
            move_type,
            from_location: from,
            to_location: to,
            reference_id: None,
            created_by: None,
            created_at: Utc::now(),
            product: None,
            from_warehouse: None,
            to_warehouse: None,
        }
    }

    #[test]
    fn test_receipt_effect() {
        let (p, w) = (Uuid::new_v4(), Uuid::new_v4());
        let entry = mv(p, 10, MoveType::Receipt, None, Some(w));
        assert_eq!(entry.effect_on(w), 10);
        assert_eq!(entry.effect_on(Uuid::new_v4()), 0);
    }

    #[test]
    fn test_delivery_effect() {
        let (p, w) = (Uuid::new_v4(), Uuid::new_v4());
        let entry = mv(p, -5, MoveType::Delivery, Some(w), None);
        assert_eq!(entry.effect_on(w), -5);
    }

    #[test]
    fn test_transfer_effect_is_conserved() {
        let (p, w1, w2) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
        let entry = mv(p, 4, MoveType::Transfer, Some(w1), Some(w2));
        assert_eq!(entry.effect_on(w1), -4);
        assert_eq!(entry.effect_on(w2), 4);
        assert_eq!(entry.effect_on(w1) + entry.effect_on(w2), 0);
    }

    #[test]
    fn test_adjustment_effect_applies_once() {
        let (p, w) = (Uuid::new_v4(), Uuid::new_v4());
        let entry = mv(p, 2, MoveType::Adjustment, Some(w), Some(w));
        // from == to for adjustments; the warehouse must be touched once
        assert_eq!(entry.touched_warehouses(), vec![w]);
        assert_eq!(entry.effect_on(w), 2);
    }

    #[test]
    fn test_replay_ledger() {
        let (p, w1, w2) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
        let moves = vec![
            mv(p, 10, MoveType::Receipt, None, Some(w1)),
            mv(p, -5, MoveType::Delivery, Some(w1), None),
            mv(p, 4, MoveType::Transfer, Some(w1), Some(w2)),
            mv(p, 2, MoveType::Adjustment, Some(w2), Some(w2)),
        ];
        let quantities = replay_ledger(&moves);
        assert_eq!(quantities[&(p, w1)], 1);
        assert_eq!(quantities[&(p, w2)], 6);
    }
}
