//! Stock level projection: current quantity per (product, warehouse)
//!
//! The projection is the only mutable shared state in the system. All writes
//! go through `apply_delta`/`set_absolute`, which run on the caller's
//! transaction and take a row lock on the (product, warehouse) key so
//! concurrent document validations touching the same key serialize instead
//! of losing updates.

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::{FromRow, PgConnection, PgPool};
use uuid::Uuid;

use shared::models::{replay_ledger, StockLevel, Warehouse};

use crate::error::{AppError, AppResult};
use crate::services::stock_move::{self, StockMoveFilter};

/// Current quantity for one (product, warehouse) pair under a row lock, for
/// use inside a validation transaction. Absent row means zero.
pub async fn get_for_update(
    conn: &mut PgConnection,
    product_id: Uuid,
    warehouse_id: Uuid,
) -> AppResult<i64> {
    let quantity = sqlx::query_scalar::<_, i64>(
        "SELECT quantity FROM stock_levels WHERE product_id = $1 AND warehouse_id = $2 FOR UPDATE",
    )
    .bind(product_id)
    .bind(warehouse_id)
    .fetch_optional(&mut *conn)
    .await?;

    Ok(quantity.unwrap_or(0))
}

/// Apply a signed quantity delta as one atomic read-modify-write
///
/// Creates the row if absent (prior quantity 0). A delta that would drive the
/// quantity negative fails with `InsufficientStock` and writes nothing.
pub async fn apply_delta(
    conn: &mut PgConnection,
    product_id: Uuid,
    warehouse_id: Uuid,
    delta: i64,
) -> AppResult<i64> {
    let current = get_for_update(&mut *conn, product_id, warehouse_id).await?;
    if current + delta < 0 {
        return Err(AppError::InsufficientStock(format!(
            "product {} has {} units in warehouse {}, requested {}",
            product_id, current, warehouse_id, -delta
        )));
    }

    let quantity = sqlx::query_scalar::<_, i64>(
        r#"
        INSERT INTO stock_levels (product_id, warehouse_id, quantity)
        VALUES ($1, $2, $3)
        ON CONFLICT (product_id, warehouse_id)
        DO UPDATE SET quantity = stock_levels.quantity + EXCLUDED.quantity, updated_at = now()
        RETURNING quantity
        "#,
    )
    .bind(product_id)
    .bind(warehouse_id)
    .bind(delta)
    .fetch_one(&mut *conn)
    .await?;

    Ok(quantity)
}

/// Set the quantity to an absolute counted value in one atomic upsert
///
/// Used by adjustment finalization; callers wanting the expected/counted
/// difference must read via `get_for_update` on the same transaction first.
pub async fn set_absolute(
    conn: &mut PgConnection,
    product_id: Uuid,
    warehouse_id: Uuid,
    quantity: i64,
) -> AppResult<i64> {
    if quantity < 0 {
        return Err(AppError::Validation {
            field: "quantity".to_string(),
            message: "Stock quantity cannot be negative".to_string(),
        });
    }

    let quantity = sqlx::query_scalar::<_, i64>(
        r#"
        INSERT INTO stock_levels (product_id, warehouse_id, quantity)
        VALUES ($1, $2, $3)
        ON CONFLICT (product_id, warehouse_id)
        DO UPDATE SET quantity = EXCLUDED.quantity, updated_at = now()
        RETURNING quantity
        "#,
    )
    .bind(product_id)
    .bind(warehouse_id)
    .bind(quantity)
    .fetch_one(&mut *conn)
    .await?;

    Ok(quantity)
}

/// Row for stock level queries with the warehouse joined in
#[derive(Debug, FromRow)]
struct StockLevelRow {
    id: Uuid,
    product_id: Uuid,
    warehouse_id: Uuid,
    quantity: i64,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    warehouse_name: String,
    warehouse_address: Option<String>,
    warehouse_created_at: DateTime<Utc>,
    warehouse_updated_at: DateTime<Utc>,
}

impl From<StockLevelRow> for StockLevel {
    fn from(row: StockLevelRow) -> Self {
        StockLevel {
            id: row.id,
            product_id: row.product_id,
            warehouse_id: row.warehouse_id,
            quantity: row.quantity,
            created_at: row.created_at,
            updated_at: row.updated_at,
            product: None,
            warehouse: Some(Warehouse {
                id: row.warehouse_id,
                name: row.warehouse_name,
                address: row.warehouse_address,
                created_at: row.warehouse_created_at,
                updated_at: row.warehouse_updated_at,
            }),
        }
    }
}

/// A (product, warehouse) pair whose projected quantity disagrees with the
/// ledger replay
#[derive(Debug, Clone, Serialize)]
pub struct StockDiscrepancy {
    pub product_id: Uuid,
    pub warehouse_id: Uuid,
    pub projected: i64,
    pub ledger: i64,
}

/// Read-side stock queries over the projection
#[derive(Clone)]
pub struct StockService {
    db: PgPool,
}

impl StockService {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    /// Per-warehouse stock levels for a product
    pub async fn get_product_stock_levels(&self, product_id: Uuid) -> AppResult<Vec<StockLevel>> {
        let product_exists =
            sqlx::query_scalar::<_, bool>("SELECT EXISTS(SELECT 1 FROM products WHERE id = $1)")
                .bind(product_id)
                .fetch_one(&self.db)
                .await?;

        if !product_exists {
            return Err(AppError::NotFound("Product".to_string()));
        }

        let rows = sqlx::query_as::<_, StockLevelRow>(
            r#"
            SELECT sl.id, sl.product_id, sl.warehouse_id, sl.quantity, sl.created_at, sl.updated_at,
                   w.name AS warehouse_name, w.address AS warehouse_address,
                   w.created_at AS warehouse_created_at, w.updated_at AS warehouse_updated_at
            FROM stock_levels sl
            JOIN warehouses w ON w.id = sl.warehouse_id
            WHERE sl.product_id = $1
            ORDER BY w.name
            "#,
        )
        .bind(product_id)
        .fetch_all(&self.db)
        .await?;

        Ok(rows.into_iter().map(StockLevel::from).collect())
    }

    /// Total stock of a product summed across all warehouses
    pub async fn get_total_stock(&self, product_id: Uuid) -> AppResult<i64> {
        let total = sqlx::query_scalar::<_, i64>(
            "SELECT COALESCE(SUM(quantity), 0)::bigint FROM stock_levels WHERE product_id = $1",
        )
        .bind(product_id)
        .fetch_one(&self.db)
        .await?;

        Ok(total)
    }

    /// Recompute every quantity from the ledger and report pairs where the
    /// projection disagrees. An empty result means the write-time invariant
    /// holds for the whole database.
    pub async fn audit(&self) -> AppResult<Vec<StockDiscrepancy>> {
        let moves = stock_move::list(&self.db, &StockMoveFilter::default()).await?;
        let replayed = replay_ledger(&moves);

        let projected = sqlx::query_as::<_, (Uuid, Uuid, i64)>(
            "SELECT product_id, warehouse_id, quantity FROM stock_levels",
        )
        .fetch_all(&self.db)
        .await?;

        let mut discrepancies = Vec::new();
        let mut seen = std::collections::HashSet::new();

        for (product_id, warehouse_id, quantity) in &projected {
            let key = (*product_id, *warehouse_id);
            seen.insert(key);
            let ledger = replayed.get(&key).copied().unwrap_or(0);
            if ledger != *quantity {
                discrepancies.push(StockDiscrepancy {
                    product_id: *product_id,
                    warehouse_id: *warehouse_id,
                    projected: *quantity,
                    ledger,
                });
            }
        }

        // Ledger entries for pairs the projection has never materialized
        for ((product_id, warehouse_id), ledger) in replayed {
            if ledger != 0 && !seen.contains(&(product_id, warehouse_id)) {
                discrepancies.push(StockDiscrepancy {
                    product_id,
                    warehouse_id,
                    projected: 0,
                    ledger,
                });
            }
        }

        Ok(discrepancies)
    }
}
