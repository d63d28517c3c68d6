//! Stock adjustments: single-shot physical count corrections
//!
//! An adjustment has no draft state. Creating one reads the expected quantity
//! under a row lock, sets the counted value absolutely, records the adjustment
//! and appends an ADJUSTMENT ledger entry whose quantity is the signed
//! difference, all in one transaction. The entry is appended even when the
//! count matches, so the audit trail shows the count happened.

use chrono::{DateTime, Utc};
use serde::Deserialize;
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use shared::models::Adjustment;
use shared::types::MoveType;
use shared::validation::validate_counted_qty;

use crate::error::{AppError, AppResult};
use crate::services::stock_move::NewStockMove;
use crate::services::{product, stock, stock_move, warehouse};

/// Adjustment service
#[derive(Clone)]
pub struct AdjustmentService {
    db: PgPool,
}

/// Input for recording a count
#[derive(Debug, Deserialize)]
pub struct CreateAdjustmentInput {
    pub product_id: Uuid,
    pub warehouse_id: Uuid,
    pub counted_qty: i64,
    pub reason: Option<String>,
}

#[derive(Debug, FromRow)]
struct AdjustmentRow {
    id: Uuid,
    product_id: Uuid,
    warehouse_id: Uuid,
    counted_qty: i64,
    reason: Option<String>,
    created_by: Option<Uuid>,
    created_at: DateTime<Utc>,
}

impl From<AdjustmentRow> for Adjustment {
    fn from(row: AdjustmentRow) -> Self {
        Adjustment {
            id: row.id,
            product_id: row.product_id,
            warehouse_id: row.warehouse_id,
            counted_qty: row.counted_qty,
            reason: row.reason,
            created_by: row.created_by,
            created_at: row.created_at,
            product: None,
            warehouse: None,
        }
    }
}

impl AdjustmentService {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    /// List all adjustments with product and warehouse attached, newest first
    pub async fn list(&self) -> AppResult<Vec<Adjustment>> {
        let rows = sqlx::query_as::<_, AdjustmentRow>(
            r#"
            SELECT id, product_id, warehouse_id, counted_qty, reason, created_by, created_at
            FROM adjustments
            ORDER BY created_at DESC
            "#,
        )
        .fetch_all(&self.db)
        .await?;

        let mut adjustments: Vec<Adjustment> = rows.into_iter().map(Adjustment::from).collect();

        let product_ids: Vec<Uuid> = adjustments.iter().map(|a| a.product_id).collect();
        let warehouse_ids: Vec<Uuid> = adjustments.iter().map(|a| a.warehouse_id).collect();
        let products = product::load_by_ids(&self.db, &product_ids).await?;
        let warehouses = warehouse::load_by_ids(&self.db, &warehouse_ids).await?;

        for adjustment in &mut adjustments {
            adjustment.product = products.get(&adjustment.product_id).cloned();
            adjustment.warehouse = warehouses.get(&adjustment.warehouse_id).cloned();
        }

        Ok(adjustments)
    }

    /// Get an adjustment by id
    pub async fn get(&self, adjustment_id: Uuid) -> AppResult<Adjustment> {
        let row = sqlx::query_as::<_, AdjustmentRow>(
            r#"
            SELECT id, product_id, warehouse_id, counted_qty, reason, created_by, created_at
            FROM adjustments
            WHERE id = $1
            "#,
        )
        .bind(adjustment_id)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Adjustment".to_string()))?;

        let mut adjustment = Adjustment::from(row);
        let products = product::load_by_ids(&self.db, &[adjustment.product_id]).await?;
        let warehouses = warehouse::load_by_ids(&self.db, &[adjustment.warehouse_id]).await?;
        adjustment.product = products.get(&adjustment.product_id).cloned();
        adjustment.warehouse = warehouses.get(&adjustment.warehouse_id).cloned();

        Ok(adjustment)
    }

    /// Record a count and apply it. Requires a known actor.
    ///
    /// The ledger entry carries the signed difference between counted and
    /// expected, references the adjustment row and sets both locations to
    /// the counted warehouse.
    pub async fn create(
        &self,
        actor_id: Option<Uuid>,
        input: CreateAdjustmentInput,
    ) -> AppResult<Adjustment> {
        let actor = actor_id.ok_or(AppError::AuthenticationRequired)?;

        validate_counted_qty(input.counted_qty).map_err(|msg| AppError::Validation {
            field: "counted_qty".to_string(),
            message: msg.to_string(),
        })?;

        product::ensure_exists(&self.db, input.product_id).await?;
        warehouse::ensure_exists(&self.db, input.warehouse_id).await?;

        let mut tx = self.db.begin().await?;

        let expected =
            stock::get_for_update(&mut *tx, input.product_id, input.warehouse_id).await?;
        let delta = input.counted_qty - expected;

        stock::set_absolute(&mut *tx, input.product_id, input.warehouse_id, input.counted_qty)
            .await?;

        let row = sqlx::query_as::<_, AdjustmentRow>(
            r#"
            INSERT INTO adjustments (product_id, warehouse_id, counted_qty, reason, created_by)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id, product_id, warehouse_id, counted_qty, reason, created_by, created_at
            "#,
        )
        .bind(input.product_id)
        .bind(input.warehouse_id)
        .bind(input.counted_qty)
        .bind(&input.reason)
        .bind(actor)
        .fetch_one(&mut *tx)
        .await?;

        stock_move::append(
            &mut *tx,
            NewStockMove {
                product_id: input.product_id,
                quantity: delta,
                move_type: MoveType::Adjustment,
                from_location: Some(input.warehouse_id),
                to_location: Some(input.warehouse_id),
                reference_id: Some(row.id),
                created_by: Some(actor),
            },
        )
        .await?;

        tx.commit().await?;

        tracing::info!(
            adjustment_id = %row.id,
            product_id = %input.product_id,
            warehouse_id = %input.warehouse_id,
            delta,
            "adjustment recorded"
        );

        Ok(row.into())
    }
}
