//! Stock ledger store: append-only record of every quantity change
//!
//! Entries are never updated or deleted by the application. Business rules
//! are the document engine's responsibility; this module only persists and
//! queries.

use chrono::{DateTime, Utc};
use serde::Deserialize;
use sqlx::{FromRow, PgConnection, PgPool};
use std::collections::HashMap;
use std::str::FromStr;
use uuid::Uuid;

use shared::models::StockMove;
use shared::types::MoveType;

use crate::error::{AppError, AppResult};
use crate::services::{product, warehouse};

/// A ledger entry before id/timestamp assignment
#[derive(Debug, Clone)]
pub struct NewStockMove {
    pub product_id: Uuid,
    pub quantity: i64,
    pub move_type: MoveType,
    pub from_location: Option<Uuid>,
    pub to_location: Option<Uuid>,
    pub reference_id: Option<Uuid>,
    pub created_by: Option<Uuid>,
}

/// Filters for the move-history query
#[derive(Debug, Default, Clone, Deserialize)]
pub struct StockMoveFilter {
    pub product_id: Option<Uuid>,
    pub move_type: Option<MoveType>,
    /// Matches the from **or** the to leg of an entry
    pub warehouse_id: Option<Uuid>,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
}

#[derive(Debug, FromRow)]
struct StockMoveRow {
    id: Uuid,
    product_id: Uuid,
    quantity: i64,
    move_type: String,
    from_location: Option<Uuid>,
    to_location: Option<Uuid>,
    reference_id: Option<Uuid>,
    created_by: Option<Uuid>,
    created_at: DateTime<Utc>,
}

impl TryFrom<StockMoveRow> for StockMove {
    type Error = AppError;

    fn try_from(row: StockMoveRow) -> Result<Self, Self::Error> {
        let move_type = MoveType::from_str(&row.move_type)
            .map_err(|e| AppError::Internal(anyhow::Error::new(e)))?;

        Ok(StockMove {
            id: row.id,
            product_id: row.product_id,
            quantity: row.quantity,
            move_type,
            from_location: row.from_location,
            to_location: row.to_location,
            reference_id: row.reference_id,
            created_by: row.created_by,
            created_at: row.created_at,
            product: None,
            from_warehouse: None,
            to_warehouse: None,
        })
    }
}

/// Append one entry to the ledger, assigning id and timestamp
///
/// Runs on the caller's connection so document validation commits entries
/// and projection updates in the same transaction.
pub async fn append(conn: &mut PgConnection, entry: NewStockMove) -> AppResult<StockMove> {
    let row = sqlx::query_as::<_, StockMoveRow>(
        r#"
        INSERT INTO stock_moves (product_id, quantity, move_type, from_location, to_location,
                                 reference_id, created_by)
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        RETURNING id, product_id, quantity, move_type, from_location, to_location,
                  reference_id, created_by, created_at
        "#,
    )
    .bind(entry.product_id)
    .bind(entry.quantity)
    .bind(entry.move_type.as_str())
    .bind(entry.from_location)
    .bind(entry.to_location)
    .bind(entry.reference_id)
    .bind(entry.created_by)
    .fetch_one(&mut *conn)
    .await?;

    row.try_into()
}

/// Query the ledger, newest first
pub async fn list(pool: &PgPool, filter: &StockMoveFilter) -> AppResult<Vec<StockMove>> {
    let rows = sqlx::query_as::<_, StockMoveRow>(
        r#"
        SELECT id, product_id, quantity, move_type, from_location, to_location,
               reference_id, created_by, created_at
        FROM stock_moves
        WHERE ($1::uuid IS NULL OR product_id = $1)
          AND ($2::text IS NULL OR move_type = $2)
          AND ($3::uuid IS NULL OR from_location = $3 OR to_location = $3)
          AND ($4::timestamptz IS NULL OR created_at >= $4)
          AND ($5::timestamptz IS NULL OR created_at <= $5)
        ORDER BY created_at DESC
        "#,
    )
    .bind(filter.product_id)
    .bind(filter.move_type.map(|t| t.as_str()))
    .bind(filter.warehouse_id)
    .bind(filter.start_date)
    .bind(filter.end_date)
    .fetch_all(pool)
    .await?;

    rows.into_iter().map(StockMove::try_from).collect()
}

/// Query the ledger and eagerly attach product and warehouse data
pub async fn list_with_relations(
    pool: &PgPool,
    filter: &StockMoveFilter,
) -> AppResult<Vec<StockMove>> {
    let mut moves = list(pool, filter).await?;

    let product_ids: Vec<Uuid> = moves.iter().map(|m| m.product_id).collect();
    let warehouse_ids: Vec<Uuid> = moves
        .iter()
        .flat_map(|m| m.from_location.into_iter().chain(m.to_location))
        .collect();

    let products = product::load_by_ids(pool, &product_ids).await?;
    let warehouses: HashMap<Uuid, _> = warehouse::load_by_ids(pool, &warehouse_ids).await?;

    for entry in &mut moves {
        entry.product = products.get(&entry.product_id).cloned();
        entry.from_warehouse = entry
            .from_location
            .and_then(|id| warehouses.get(&id).cloned());
        entry.to_warehouse = entry.to_location.and_then(|id| warehouses.get(&id).cloned());
    }

    Ok(moves)
}
