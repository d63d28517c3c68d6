//! Product models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::Category;

/// A stocked product
///
/// Identity (`id`, `sku`) is immutable once stock has moved; the descriptive
/// fields stay editable.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Product {
    pub id: Uuid,
    pub name: String,
    pub sku: String,
    pub category_id: Option<Uuid>,
    /// Unit of measure, e.g. "unit", "kg", "box"
    pub uom: String,
    /// Threshold at or below which the product is flagged low-stock
    pub reorder_level: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<Category>,
}
