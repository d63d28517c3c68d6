//! Receipt documents: incoming goods
//!
//! A receipt is drafted with line items, each naming its destination
//! warehouse, then validated once. Validation runs as a single database
//! transaction: every item's projection update, its RECEIPT ledger entry and
//! the status change to `done` commit together or not at all.

use chrono::{DateTime, Utc};
use serde::Deserialize;
use sqlx::{FromRow, PgPool};
use std::collections::HashMap;
use uuid::Uuid;

use shared::models::{Receipt, ReceiptItem};
use shared::types::{DocumentStatus, MoveType};
use shared::validation::validate_qty;

use crate::error::{AppError, AppResult};
use crate::services::stock_move::NewStockMove;
use crate::services::{parse_status, product, stock, stock_move, warehouse};

/// Receipt document service
#[derive(Clone)]
pub struct ReceiptService {
    db: PgPool,
}

/// Input for creating a receipt header
#[derive(Debug, Deserialize)]
pub struct CreateReceiptInput {
    pub supplier: Option<String>,
}

/// Input for adding a line item
#[derive(Debug, Deserialize)]
pub struct AddReceiptItemInput {
    pub product_id: Uuid,
    pub warehouse_id: Uuid,
    pub qty: i64,
}

/// Input for a direct operator status change (no stock effects)
#[derive(Debug, Deserialize)]
pub struct UpdateStatusInput {
    pub status: DocumentStatus,
}

#[derive(Debug, FromRow)]
struct ReceiptRow {
    id: Uuid,
    supplier: Option<String>,
    status: String,
    created_by: Option<Uuid>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl ReceiptRow {
    fn into_receipt(self) -> AppResult<Receipt> {
        Ok(Receipt {
            id: self.id,
            supplier: self.supplier,
            status: parse_status(&self.status)?,
            created_by: self.created_by,
            created_at: self.created_at,
            updated_at: self.updated_at,
            items: Vec::new(),
        })
    }
}

#[derive(Debug, FromRow)]
struct ReceiptItemRow {
    id: Uuid,
    receipt_id: Uuid,
    product_id: Uuid,
    warehouse_id: Uuid,
    qty: i64,
    created_at: DateTime<Utc>,
}

impl From<ReceiptItemRow> for ReceiptItem {
    fn from(row: ReceiptItemRow) -> Self {
        ReceiptItem {
            id: row.id,
            receipt_id: row.receipt_id,
            product_id: row.product_id,
            warehouse_id: row.warehouse_id,
            qty: row.qty,
            created_at: row.created_at,
            product: None,
            warehouse: None,
        }
    }
}

impl ReceiptService {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    /// List all receipts with items, newest first
    pub async fn list(&self) -> AppResult<Vec<Receipt>> {
        let rows = sqlx::query_as::<_, ReceiptRow>(
            r#"
            SELECT id, supplier, status, created_by, created_at, updated_at
            FROM receipts
            ORDER BY created_at DESC
            "#,
        )
        .fetch_all(&self.db)
        .await?;

        let mut receipts = rows
            .into_iter()
            .map(ReceiptRow::into_receipt)
            .collect::<AppResult<Vec<_>>>()?;

        let ids: Vec<Uuid> = receipts.iter().map(|r| r.id).collect();
        let mut items_by_receipt = self.load_items(&ids).await?;
        for receipt in &mut receipts {
            receipt.items = items_by_receipt.remove(&receipt.id).unwrap_or_default();
        }

        Ok(receipts)
    }

    /// Get a receipt with its items
    pub async fn get(&self, receipt_id: Uuid) -> AppResult<Receipt> {
        let row = sqlx::query_as::<_, ReceiptRow>(
            r#"
            SELECT id, supplier, status, created_by, created_at, updated_at
            FROM receipts
            WHERE id = $1
            "#,
        )
        .bind(receipt_id)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Receipt".to_string()))?;

        let mut receipt = row.into_receipt()?;
        receipt.items = self
            .load_items(&[receipt_id])
            .await?
            .remove(&receipt_id)
            .unwrap_or_default();

        Ok(receipt)
    }

    /// Create a draft receipt header. Receipts require a known actor.
    pub async fn create(
        &self,
        actor_id: Option<Uuid>,
        input: CreateReceiptInput,
    ) -> AppResult<Receipt> {
        let actor = actor_id.ok_or(AppError::AuthenticationRequired)?;

        let row = sqlx::query_as::<_, ReceiptRow>(
            r#"
            INSERT INTO receipts (supplier, created_by)
            VALUES ($1, $2)
            RETURNING id, supplier, status, created_by, created_at, updated_at
            "#,
        )
        .bind(&input.supplier)
        .bind(actor)
        .fetch_one(&self.db)
        .await?;

        row.into_receipt()
    }

    /// Direct operator status change. Never touches stock; `done` is only
    /// reachable through `validate`.
    ///
    /// The write is a compare-and-swap on the previously observed status so
    /// a concurrent validate cannot be overwritten after it commits `done`.
    pub async fn set_status(
        &self,
        receipt_id: Uuid,
        input: UpdateStatusInput,
    ) -> AppResult<Receipt> {
        let current = self.get(receipt_id).await?;

        if !current.status.can_set_directly(input.status) {
            return Err(AppError::InvalidState(format!(
                "cannot set receipt status from {} to {} directly",
                current.status, input.status
            )));
        }

        let result = sqlx::query(
            "UPDATE receipts SET status = $1, updated_at = now() WHERE id = $2 AND status = $3",
        )
        .bind(input.status.as_str())
        .bind(receipt_id)
        .bind(current.status.as_str())
        .execute(&self.db)
        .await?;

        if result.rows_affected() == 0 {
            let fresh = self.get(receipt_id).await?;
            return Err(AppError::InvalidState(format!(
                "cannot set receipt status from {} to {} directly",
                fresh.status, input.status
            )));
        }

        self.get(receipt_id).await
    }

    /// Add a line item to a non-terminal receipt
    pub async fn add_item(
        &self,
        receipt_id: Uuid,
        input: AddReceiptItemInput,
    ) -> AppResult<ReceiptItem> {
        validate_qty(input.qty).map_err(|msg| AppError::Validation {
            field: "qty".to_string(),
            message: msg.to_string(),
        })?;

        let receipt = self.get(receipt_id).await?;
        if receipt.status.is_terminal() {
            return Err(AppError::InvalidState(format!(
                "cannot edit items of a {} receipt",
                receipt.status
            )));
        }

        product::ensure_exists(&self.db, input.product_id).await?;
        warehouse::ensure_exists(&self.db, input.warehouse_id).await?;

        // Guarded insert: no row is written if the document went terminal
        // between the check above and this statement.
        let row = sqlx::query_as::<_, ReceiptItemRow>(
            r#"
            INSERT INTO receipt_items (receipt_id, product_id, warehouse_id, qty)
            SELECT $1, $2, $3, $4
            WHERE EXISTS (
                SELECT 1 FROM receipts
                WHERE id = $1 AND status NOT IN ('done', 'canceled')
            )
            RETURNING id, receipt_id, product_id, warehouse_id, qty, created_at
            "#,
        )
        .bind(receipt_id)
        .bind(input.product_id)
        .bind(input.warehouse_id)
        .bind(input.qty)
        .fetch_optional(&self.db)
        .await?;

        match row {
            Some(row) => Ok(row.into()),
            None => {
                let fresh = self.get(receipt_id).await?;
                Err(AppError::InvalidState(format!(
                    "cannot edit items of a {} receipt",
                    fresh.status
                )))
            }
        }
    }

    /// Remove a line item from a non-terminal receipt
    pub async fn remove_item(&self, receipt_id: Uuid, item_id: Uuid) -> AppResult<()> {
        let receipt = self.get(receipt_id).await?;
        if receipt.status.is_terminal() {
            return Err(AppError::InvalidState(format!(
                "cannot edit items of a {} receipt",
                receipt.status
            )));
        }

        let result = sqlx::query(
            r#"
            DELETE FROM receipt_items
            WHERE id = $1
              AND receipt_id = $2
              AND receipt_id IN (
                  SELECT id FROM receipts WHERE status NOT IN ('done', 'canceled')
              )
            "#,
        )
        .bind(item_id)
        .bind(receipt_id)
        .execute(&self.db)
        .await?;

        if result.rows_affected() == 0 {
            let fresh = self.get(receipt_id).await?;
            if fresh.status.is_terminal() {
                return Err(AppError::InvalidState(format!(
                    "cannot edit items of a {} receipt",
                    fresh.status
                )));
            }
            return Err(AppError::NotFound("Receipt item".to_string()));
        }

        Ok(())
    }

    /// Validate the receipt: commit every item into the projection and the
    /// ledger, then mark the document `done`, all in one transaction.
    ///
    /// The header row is locked first, so a concurrent validate of the same
    /// document serializes behind this one and fails the terminal-status
    /// check.
    pub async fn validate(&self, actor_id: Option<Uuid>, receipt_id: Uuid) -> AppResult<Receipt> {
        let actor = actor_id.ok_or(AppError::AuthenticationRequired)?;

        let mut tx = self.db.begin().await?;

        let status = sqlx::query_scalar::<_, String>(
            "SELECT status FROM receipts WHERE id = $1 FOR UPDATE",
        )
        .bind(receipt_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| AppError::NotFound("Receipt".to_string()))?;

        let status = parse_status(&status)?;
        if status.is_terminal() {
            return Err(AppError::InvalidState(format!(
                "receipt is already {}",
                status
            )));
        }

        let items = sqlx::query_as::<_, ReceiptItemRow>(
            r#"
            SELECT id, receipt_id, product_id, warehouse_id, qty, created_at
            FROM receipt_items
            WHERE receipt_id = $1
            ORDER BY created_at
            "#,
        )
        .bind(receipt_id)
        .fetch_all(&mut *tx)
        .await?;

        if items.is_empty() {
            return Err(AppError::EmptyDocument);
        }

        for item in &items {
            stock::apply_delta(&mut *tx, item.product_id, item.warehouse_id, item.qty).await?;
            stock_move::append(
                &mut *tx,
                NewStockMove {
                    product_id: item.product_id,
                    quantity: item.qty,
                    move_type: MoveType::Receipt,
                    from_location: None,
                    to_location: Some(item.warehouse_id),
                    reference_id: Some(receipt_id),
                    created_by: Some(actor),
                },
            )
            .await?;
        }

        sqlx::query("UPDATE receipts SET status = $1, updated_at = now() WHERE id = $2")
            .bind(DocumentStatus::Done.as_str())
            .bind(receipt_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        tracing::info!(receipt_id = %receipt_id, items = items.len(), "receipt validated");

        self.get(receipt_id).await
    }

    /// Load items for a set of receipts with product and warehouse attached
    async fn load_items(
        &self,
        receipt_ids: &[Uuid],
    ) -> AppResult<HashMap<Uuid, Vec<ReceiptItem>>> {
        if receipt_ids.is_empty() {
            return Ok(HashMap::new());
        }

        let rows = sqlx::query_as::<_, ReceiptItemRow>(
            r#"
            SELECT id, receipt_id, product_id, warehouse_id, qty, created_at
            FROM receipt_items
            WHERE receipt_id = ANY($1)
            ORDER BY created_at
            "#,
        )
        .bind(receipt_ids)
        .fetch_all(&self.db)
        .await?;

        let product_ids: Vec<Uuid> = rows.iter().map(|r| r.product_id).collect();
        let warehouse_ids: Vec<Uuid> = rows.iter().map(|r| r.warehouse_id).collect();
        let products = product::load_by_ids(&self.db, &product_ids).await?;
        let warehouses = warehouse::load_by_ids(&self.db, &warehouse_ids).await?;

        let mut grouped: HashMap<Uuid, Vec<ReceiptItem>> = HashMap::new();
        for row in rows {
            let mut item = ReceiptItem::from(row);
            item.product = products.get(&item.product_id).cloned();
            item.warehouse = warehouses.get(&item.warehouse_id).cloned();
            grouped.entry(item.receipt_id).or_default().push(item);
        }

        Ok(grouped)
    }
}
