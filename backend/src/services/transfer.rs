//! Internal transfer documents: stock movement between warehouses
//!
//! A transfer fixes its warehouse pair on the header. Validation subtracts
//! each item from the source, adds it to the destination and records a single
//! TRANSFER ledger entry per item with both locations set, so the net effect
//! across the two warehouses is always zero.

use chrono::{DateTime, Utc};
use serde::Deserialize;
use sqlx::{FromRow, PgPool};
use std::collections::HashMap;
use uuid::Uuid;

use shared::models::{InternalTransfer, TransferItem};
use shared::types::{DocumentStatus, MoveType};
use shared::validation::validate_qty;

use crate::error::{AppError, AppResult};
use crate::services::receipt::UpdateStatusInput;
use crate::services::stock_move::NewStockMove;
use crate::services::{parse_status, product, stock, stock_move, warehouse};

/// Internal transfer document service
#[derive(Clone)]
pub struct TransferService {
    db: PgPool,
}

/// Input for creating a transfer header
#[derive(Debug, Deserialize)]
pub struct CreateTransferInput {
    pub from_warehouse_id: Uuid,
    pub to_warehouse_id: Uuid,
}

/// Input for adding a line item; the warehouse pair comes from the header
#[derive(Debug, Deserialize)]
pub struct AddTransferItemInput {
    pub product_id: Uuid,
    pub qty: i64,
}

#[derive(Debug, FromRow)]
struct TransferRow {
    id: Uuid,
    from_warehouse_id: Uuid,
    to_warehouse_id: Uuid,
    status: String,
    created_by: Option<Uuid>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TransferRow {
    fn into_transfer(self) -> AppResult<InternalTransfer> {
        Ok(InternalTransfer {
            id: self.id,
            from_warehouse_id: self.from_warehouse_id,
            to_warehouse_id: self.to_warehouse_id,
            status: parse_status(&self.status)?,
            created_by: self.created_by,
            created_at: self.created_at,
            updated_at: self.updated_at,
            from_warehouse: None,
            to_warehouse: None,
            items: Vec::new(),
        })
    }
}

#[derive(Debug, FromRow)]
struct TransferItemRow {
    id: Uuid,
    transfer_id: Uuid,
    product_id: Uuid,
    qty: i64,
    created_at: DateTime<Utc>,
}

impl From<TransferItemRow> for TransferItem {
    fn from(row: TransferItemRow) -> Self {
        TransferItem {
            id: row.id,
            transfer_id: row.transfer_id,
            product_id: row.product_id,
            qty: row.qty,
            created_at: row.created_at,
            product: None,
        }
    }
}

impl TransferService {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    /// List all transfers with items and warehouses, newest first
    pub async fn list(&self) -> AppResult<Vec<InternalTransfer>> {
        let rows = sqlx::query_as::<_, TransferRow>(
            r#"
            SELECT id, from_warehouse_id, to_warehouse_id, status, created_by,
                   created_at, updated_at
            FROM internal_transfers
            ORDER BY created_at DESC
            "#,
        )
        .fetch_all(&self.db)
        .await?;

        let mut transfers = rows
            .into_iter()
            .map(TransferRow::into_transfer)
            .collect::<AppResult<Vec<_>>>()?;

        let ids: Vec<Uuid> = transfers.iter().map(|t| t.id).collect();
        let mut items_by_transfer = self.load_items(&ids).await?;

        let warehouse_ids: Vec<Uuid> = transfers
            .iter()
            .flat_map(|t| [t.from_warehouse_id, t.to_warehouse_id])
            .collect();
        let warehouses = warehouse::load_by_ids(&self.db, &warehouse_ids).await?;

        for transfer in &mut transfers {
            transfer.items = items_by_transfer.remove(&transfer.id).unwrap_or_default();
            transfer.from_warehouse = warehouses.get(&transfer.from_warehouse_id).cloned();
            transfer.to_warehouse = warehouses.get(&transfer.to_warehouse_id).cloned();
        }

        Ok(transfers)
    }

    /// Get a transfer with its items and warehouses
    pub async fn get(&self, transfer_id: Uuid) -> AppResult<InternalTransfer> {
        let row = sqlx::query_as::<_, TransferRow>(
            r#"
            SELECT id, from_warehouse_id, to_warehouse_id, status, created_by,
                   created_at, updated_at
            FROM internal_transfers
            WHERE id = $1
            "#,
        )
        .bind(transfer_id)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Transfer".to_string()))?;

        let mut transfer = row.into_transfer()?;
        transfer.items = self
            .load_items(&[transfer_id])
            .await?
            .remove(&transfer_id)
            .unwrap_or_default();

        let warehouses = warehouse::load_by_ids(
            &self.db,
            &[transfer.from_warehouse_id, transfer.to_warehouse_id],
        )
        .await?;
        transfer.from_warehouse = warehouses.get(&transfer.from_warehouse_id).cloned();
        transfer.to_warehouse = warehouses.get(&transfer.to_warehouse_id).cloned();

        Ok(transfer)
    }

    /// Create a draft transfer header. Transfers require a known actor and a
    /// distinct warehouse pair.
    pub async fn create(
        &self,
        actor_id: Option<Uuid>,
        input: CreateTransferInput,
    ) -> AppResult<InternalTransfer> {
        let actor = actor_id.ok_or(AppError::AuthenticationRequired)?;

        if input.from_warehouse_id == input.to_warehouse_id {
            return Err(AppError::InvalidState(
                "source and destination warehouses must differ".to_string(),
            ));
        }

        warehouse::ensure_exists(&self.db, input.from_warehouse_id).await?;
        warehouse::ensure_exists(&self.db, input.to_warehouse_id).await?;

        let row = sqlx::query_as::<_, TransferRow>(
            r#"
            INSERT INTO internal_transfers (from_warehouse_id, to_warehouse_id, created_by)
            VALUES ($1, $2, $3)
            RETURNING id, from_warehouse_id, to_warehouse_id, status, created_by,
                      created_at, updated_at
            "#,
        )
        .bind(input.from_warehouse_id)
        .bind(input.to_warehouse_id)
        .bind(actor)
        .fetch_one(&self.db)
        .await?;

        row.into_transfer()
    }

    /// Direct operator status change; never touches stock. The write is a
    /// compare-and-swap on the previously observed status so a concurrent
    /// validate cannot be overwritten after it commits `done`.
    pub async fn set_status(
        &self,
        transfer_id: Uuid,
        input: UpdateStatusInput,
    ) -> AppResult<InternalTransfer> {
        let current = self.get(transfer_id).await?;

        if !current.status.can_set_directly(input.status) {
            return Err(AppError::InvalidState(format!(
                "cannot set transfer status from {} to {} directly",
                current.status, input.status
            )));
        }

        let result = sqlx::query(
            r#"
            UPDATE internal_transfers SET status = $1, updated_at = now()
            WHERE id = $2 AND status = $3
            "#,
        )
        .bind(input.status.as_str())
        .bind(transfer_id)
        .bind(current.status.as_str())
        .execute(&self.db)
        .await?;

        if result.rows_affected() == 0 {
            let fresh = self.get(transfer_id).await?;
            return Err(AppError::InvalidState(format!(
                "cannot set transfer status from {} to {} directly",
                fresh.status, input.status
            )));
        }

        self.get(transfer_id).await
    }

    /// Add a line item to a non-terminal transfer
    pub async fn add_item(
        &self,
        transfer_id: Uuid,
        input: AddTransferItemInput,
    ) -> AppResult<TransferItem> {
        validate_qty(input.qty).map_err(|msg| AppError::Validation {
            field: "qty".to_string(),
            message: msg.to_string(),
        })?;

        let transfer = self.get(transfer_id).await?;
        if transfer.status.is_terminal() {
            return Err(AppError::InvalidState(format!(
                "cannot edit items of a {} transfer",
                transfer.status
            )));
        }

        product::ensure_exists(&self.db, input.product_id).await?;

        // Guarded insert: no row is written if the document went terminal
        // between the check above and this statement.
        let row = sqlx::query_as::<_, TransferItemRow>(
            r#"
            INSERT INTO transfer_items (transfer_id, product_id, qty)
            SELECT $1, $2, $3
            WHERE EXISTS (
                SELECT 1 FROM internal_transfers
                WHERE id = $1 AND status NOT IN ('done', 'canceled')
            )
            RETURNING id, transfer_id, product_id, qty, created_at
            "#,
        )
        .bind(transfer_id)
        .bind(input.product_id)
        .bind(input.qty)
        .fetch_optional(&self.db)
        .await?;

        match row {
            Some(row) => Ok(row.into()),
            None => {
                let fresh = self.get(transfer_id).await?;
                Err(AppError::InvalidState(format!(
                    "cannot edit items of a {} transfer",
                    fresh.status
                )))
            }
        }
    }

    /// Remove a line item from a non-terminal transfer
    pub async fn remove_item(&self, transfer_id: Uuid, item_id: Uuid) -> AppResult<()> {
        let transfer = self.get(transfer_id).await?;
        if transfer.status.is_terminal() {
            return Err(AppError::InvalidState(format!(
                "cannot edit items of a {} transfer",
                transfer.status
            )));
        }

        let result = sqlx::query(
            r#"
            DELETE FROM transfer_items
            WHERE id = $1
              AND transfer_id = $2
              AND transfer_id IN (
                  SELECT id FROM internal_transfers WHERE status NOT IN ('done', 'canceled')
              )
            "#,
        )
        .bind(item_id)
        .bind(transfer_id)
        .execute(&self.db)
        .await?;

        if result.rows_affected() == 0 {
            let fresh = self.get(transfer_id).await?;
            if fresh.status.is_terminal() {
                return Err(AppError::InvalidState(format!(
                    "cannot edit items of a {} transfer",
                    fresh.status
                )));
            }
            return Err(AppError::NotFound("Transfer item".to_string()));
        }

        Ok(())
    }

    /// Validate the transfer: move every item from source to destination and
    /// append one TRANSFER ledger entry per item, all in one transaction.
    ///
    /// The source is debited before the destination is credited, so an
    /// insufficient source balance aborts the line before anything lands on
    /// the destination side.
    pub async fn validate(
        &self,
        actor_id: Option<Uuid>,
        transfer_id: Uuid,
    ) -> AppResult<InternalTransfer> {
        let actor = actor_id.ok_or(AppError::AuthenticationRequired)?;

        let mut tx = self.db.begin().await?;

        let header = sqlx::query_as::<_, TransferRow>(
            r#"
            SELECT id, from_warehouse_id, to_warehouse_id, status, created_by,
                   created_at, updated_at
            FROM internal_transfers
            WHERE id = $1
            FOR UPDATE
            "#,
        )
        .bind(transfer_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| AppError::NotFound("Transfer".to_string()))?;

        let status = parse_status(&header.status)?;
        if status.is_terminal() {
            return Err(AppError::InvalidState(format!(
                "transfer is already {}",
                status
            )));
        }

        let items = sqlx::query_as::<_, TransferItemRow>(
            r#"
            SELECT id, transfer_id, product_id, qty, created_at
            FROM transfer_items
            WHERE transfer_id = $1
            ORDER BY created_at
            "#,
        )
        .bind(transfer_id)
        .fetch_all(&mut *tx)
        .await?;

        if items.is_empty() {
            return Err(AppError::EmptyDocument);
        }

        for item in &items {
            stock::apply_delta(
                &mut *tx,
                item.product_id,
                header.from_warehouse_id,
                -item.qty,
            )
            .await?;
            stock::apply_delta(&mut *tx, item.product_id, header.to_warehouse_id, item.qty)
                .await?;
            stock_move::append(
                &mut *tx,
                NewStockMove {
                    product_id: item.product_id,
                    quantity: item.qty,
                    move_type: MoveType::Transfer,
                    from_location: Some(header.from_warehouse_id),
                    to_location: Some(header.to_warehouse_id),
                    reference_id: Some(transfer_id),
                    created_by: Some(actor),
                },
            )
            .await?;
        }

        sqlx::query("UPDATE internal_transfers SET status = $1, updated_at = now() WHERE id = $2")
            .bind(DocumentStatus::Done.as_str())
            .bind(transfer_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        tracing::info!(
            transfer_id = %transfer_id,
            from = %header.from_warehouse_id,
            to = %header.to_warehouse_id,
            items = items.len(),
            "transfer validated"
        );

        self.get(transfer_id).await
    }

    /// Load items for a set of transfers with products attached
    async fn load_items(
        &self,
        transfer_ids: &[Uuid],
    ) -> AppResult<HashMap<Uuid, Vec<TransferItem>>> {
        if transfer_ids.is_empty() {
            return Ok(HashMap::new());
        }

        let rows = sqlx::query_as::<_, TransferItemRow>(
            r#"
            SELECT id, transfer_id, product_id, qty, created_at
            FROM transfer_items
            WHERE transfer_id = ANY($1)
            ORDER BY created_at
            "#,
        )
        .bind(transfer_ids)
        .fetch_all(&self.db)
        .await?;

        let product_ids: Vec<Uuid> = rows.iter().map(|r| r.product_id).collect();
        let products = product::load_by_ids(&self.db, &product_ids).await?;

        let mut grouped: HashMap<Uuid, Vec<TransferItem>> = HashMap::new();
        for row in rows {
            let mut item = TransferItem::from(row);
            item.product = products.get(&item.product_id).cloned();
            grouped.entry(item.transfer_id).or_default().push(item);
        }

        Ok(grouped)
    }
}
