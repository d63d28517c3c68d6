//! Inventory document models
//!
//! Receipts, deliveries and internal transfers are draft documents with line
//! items; validating one commits its items to the stock ledger. Adjustments
//! are single-shot and carry no status.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{Product, Warehouse};
use crate::types::DocumentStatus;

/// An incoming goods document
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Receipt {
    pub id: Uuid,
    pub supplier: Option<String>,
    pub status: DocumentStatus,
    pub created_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub items: Vec<ReceiptItem>,
}

/// One line of a receipt; each line names its own destination warehouse
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReceiptItem {
    pub id: Uuid,
    pub receipt_id: Uuid,
    pub product_id: Uuid,
    pub warehouse_id: Uuid,
    pub qty: i64,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub product: Option<Product>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warehouse: Option<Warehouse>,
}

/// An outgoing goods document
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Delivery {
    pub id: Uuid,
    pub customer: Option<String>,
    pub status: DocumentStatus,
    pub created_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub items: Vec<DeliveryItem>,
}

/// One line of a delivery; each line names its own source warehouse
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeliveryItem {
    pub id: Uuid,
    pub delivery_id: Uuid,
    pub product_id: Uuid,
    pub warehouse_id: Uuid,
    pub qty: i64,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub product: Option<Product>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warehouse: Option<Warehouse>,
}

/// A stock movement between two warehouses
///
/// The warehouse pair is fixed on the header and shared by every item;
/// source and destination must differ.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InternalTransfer {
    pub id: Uuid,
    pub from_warehouse_id: Uuid,
    pub to_warehouse_id: Uuid,
    pub status: DocumentStatus,
    pub created_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub from_warehouse: Option<Warehouse>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub to_warehouse: Option<Warehouse>,
    #[serde(default)]
    pub items: Vec<TransferItem>,
}

/// One line of an internal transfer
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransferItem {
    pub id: Uuid,
    pub transfer_id: Uuid,
    pub product_id: Uuid,
    pub qty: i64,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub product: Option<Product>,
}

/// A committed stock count for one product in one warehouse
///
/// Created and finalized as a single operation; there is no draft state and
/// no validate step.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Adjustment {
    pub id: Uuid,
    pub product_id: Uuid,
    pub warehouse_id: Uuid,
    pub counted_qty: i64,
    pub reason: Option<String>,
    pub created_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub product: Option<Product>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warehouse: Option<Warehouse>,
}
