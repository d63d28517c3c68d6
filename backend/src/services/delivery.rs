//! Delivery documents: outgoing goods
//!
//! Mirrors the receipt flow with the sign reversed. Validation checks and
//! applies every item under row locks inside one transaction, so a shortage
//! on any line rolls back the whole document with no partial stock effects.

use chrono::{DateTime, Utc};
use serde::Deserialize;
use sqlx::{FromRow, PgPool};
use std::collections::HashMap;
use uuid::Uuid;

use shared::models::{Delivery, DeliveryItem};
use shared::types::{DocumentStatus, MoveType};
use shared::validation::validate_qty;

use crate::error::{AppError, AppResult};
use crate::services::receipt::UpdateStatusInput;
use crate::services::stock_move::NewStockMove;
use crate::services::{parse_status, product, stock, stock_move, warehouse};

/// Delivery document service
#[derive(Clone)]
pub struct DeliveryService {
    db: PgPool,
}

/// Input for creating a delivery header
#[derive(Debug, Deserialize)]
pub struct CreateDeliveryInput {
    pub customer: Option<String>,
}

/// Input for adding a line item
#[derive(Debug, Deserialize)]
pub struct AddDeliveryItemInput {
    pub product_id: Uuid,
    pub warehouse_id: Uuid,
    pub qty: i64,
}

#[derive(Debug, FromRow)]
struct DeliveryRow {
    id: Uuid,
    customer: Option<String>,
    status: String,
    created_by: Option<Uuid>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl DeliveryRow {
    fn into_delivery(self) -> AppResult<Delivery> {
        Ok(Delivery {
            id: self.id,
            customer: self.customer,
            status: parse_status(&self.status)?,
            created_by: self.created_by,
            created_at: self.created_at,
            updated_at: self.updated_at,
            items: Vec::new(),
        })
    }
}

#[derive(Debug, FromRow)]
struct DeliveryItemRow {
    id: Uuid,
    delivery_id: Uuid,
    product_id: Uuid,
    warehouse_id: Uuid,
    qty: i64,
    created_at: DateTime<Utc>,
}

impl From<DeliveryItemRow> for DeliveryItem {
    fn from(row: DeliveryItemRow) -> Self {
        DeliveryItem {
            id: row.id,
            delivery_id: row.delivery_id,
            product_id: row.product_id,
            warehouse_id: row.warehouse_id,
            qty: row.qty,
            created_at: row.created_at,
            product: None,
            warehouse: None,
        }
    }
}

impl DeliveryService {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    /// List all deliveries with items, newest first
    pub async fn list(&self) -> AppResult<Vec<Delivery>> {
        let rows = sqlx::query_as::<_, DeliveryRow>(
            r#"
            SELECT id, customer, status, created_by, created_at, updated_at
            FROM deliveries
            ORDER BY created_at DESC
            "#,
        )
        .fetch_all(&self.db)
        .await?;

        let mut deliveries = rows
            .into_iter()
            .map(DeliveryRow::into_delivery)
            .collect::<AppResult<Vec<_>>>()?;

        let ids: Vec<Uuid> = deliveries.iter().map(|d| d.id).collect();
        let mut items_by_delivery = self.load_items(&ids).await?;
        for delivery in &mut deliveries {
            delivery.items = items_by_delivery.remove(&delivery.id).unwrap_or_default();
        }

        Ok(deliveries)
    }

    /// Get a delivery with its items
    pub async fn get(&self, delivery_id: Uuid) -> AppResult<Delivery> {
        let row = sqlx::query_as::<_, DeliveryRow>(
            r#"
            SELECT id, customer, status, created_by, created_at, updated_at
            FROM deliveries
            WHERE id = $1
            "#,
        )
        .bind(delivery_id)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Delivery".to_string()))?;

        let mut delivery = row.into_delivery()?;
        delivery.items = self
            .load_items(&[delivery_id])
            .await?
            .remove(&delivery_id)
            .unwrap_or_default();

        Ok(delivery)
    }

    /// Create a draft delivery header. Deliveries tolerate an anonymous
    /// creator.
    pub async fn create(
        &self,
        actor_id: Option<Uuid>,
        input: CreateDeliveryInput,
    ) -> AppResult<Delivery> {
        let row = sqlx::query_as::<_, DeliveryRow>(
            r#"
            INSERT INTO deliveries (customer, created_by)
            VALUES ($1, $2)
            RETURNING id, customer, status, created_by, created_at, updated_at
            "#,
        )
        .bind(&input.customer)
        .bind(actor_id)
        .fetch_one(&self.db)
        .await?;

        row.into_delivery()
    }

    /// Direct operator status change; never touches stock. The write is a
    /// compare-and-swap on the previously observed status so a concurrent
    /// validate cannot be overwritten after it commits `done`.
    pub async fn set_status(
        &self,
        delivery_id: Uuid,
        input: UpdateStatusInput,
    ) -> AppResult<Delivery> {
        let current = self.get(delivery_id).await?;

        if !current.status.can_set_directly(input.status) {
            return Err(AppError::InvalidState(format!(
                "cannot set delivery status from {} to {} directly",
                current.status, input.status
            )));
        }

        let result = sqlx::query(
            "UPDATE deliveries SET status = $1, updated_at = now() WHERE id = $2 AND status = $3",
        )
        .bind(input.status.as_str())
        .bind(delivery_id)
        .bind(current.status.as_str())
        .execute(&self.db)
        .await?;

        if result.rows_affected() == 0 {
            let fresh = self.get(delivery_id).await?;
            return Err(AppError::InvalidState(format!(
                "cannot set delivery status from {} to {} directly",
                fresh.status, input.status
            )));
        }

        self.get(delivery_id).await
    }

    /// Add a line item to a non-terminal delivery
    pub async fn add_item(
        &self,
        delivery_id: Uuid,
        input: AddDeliveryItemInput,
    ) -> AppResult<DeliveryItem> {
        validate_qty(input.qty).map_err(|msg| AppError::Validation {
            field: "qty".to_string(),
            message: msg.to_string(),
        })?;

        let delivery = self.get(delivery_id).await?;
        if delivery.status.is_terminal() {
            return Err(AppError::InvalidState(format!(
                "cannot edit items of a {} delivery",
                delivery.status
            )));
        }

        product::ensure_exists(&self.db, input.product_id).await?;
        warehouse::ensure_exists(&self.db, input.warehouse_id).await?;

        // Guarded insert: no row is written if the document went terminal
        // between the check above and this statement.
        let row = sqlx::query_as::<_, DeliveryItemRow>(
            r#"
            INSERT INTO delivery_items (delivery_id, product_id, warehouse_id, qty)
            SELECT $1, $2, $3, $4
            WHERE EXISTS (
                SELECT 1 FROM deliveries
                WHERE id = $1 AND status NOT IN ('done', 'canceled')
            )
            RETURNING id, delivery_id, product_id, warehouse_id, qty, created_at
            "#,
        )
        .bind(delivery_id)
        .bind(input.product_id)
        .bind(input.warehouse_id)
        .bind(input.qty)
        .fetch_optional(&self.db)
        .await?;

        match row {
            Some(row) => Ok(row.into()),
            None => {
                let fresh = self.get(delivery_id).await?;
                Err(AppError::InvalidState(format!(
                    "cannot edit items of a {} delivery",
                    fresh.status
                )))
            }
        }
    }

    /// Remove a line item from a non-terminal delivery
    pub async fn remove_item(&self, delivery_id: Uuid, item_id: Uuid) -> AppResult<()> {
        let delivery = self.get(delivery_id).await?;
        if delivery.status.is_terminal() {
            return Err(AppError::InvalidState(format!(
                "cannot edit items of a {} delivery",
                delivery.status
            )));
        }

        let result = sqlx::query(
            r#"
            DELETE FROM delivery_items
            WHERE id = $1
              AND delivery_id = $2
              AND delivery_id IN (
                  SELECT id FROM deliveries WHERE status NOT IN ('done', 'canceled')
              )
            "#,
        )
        .bind(item_id)
        .bind(delivery_id)
        .execute(&self.db)
        .await?;

        if result.rows_affected() == 0 {
            let fresh = self.get(delivery_id).await?;
            if fresh.status.is_terminal() {
                return Err(AppError::InvalidState(format!(
                    "cannot edit items of a {} delivery",
                    fresh.status
                )));
            }
            return Err(AppError::NotFound("Delivery item".to_string()));
        }

        Ok(())
    }

    /// Validate the delivery: subtract every item from its source warehouse
    /// and append DELIVERY ledger entries, all in one transaction.
    ///
    /// `apply_delta` holds a row lock per (product, warehouse) key and fails
    /// with `InsufficientStock` before writing, so a shortage on any line
    /// leaves every stock level and the ledger untouched.
    pub async fn validate(&self, actor_id: Option<Uuid>, delivery_id: Uuid) -> AppResult<Delivery> {
        let mut tx = self.db.begin().await?;

        let status = sqlx::query_scalar::<_, String>(
            "SELECT status FROM deliveries WHERE id = $1 FOR UPDATE",
        )
        .bind(delivery_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| AppError::NotFound("Delivery".to_string()))?;

        let status = parse_status(&status)?;
        if status.is_terminal() {
            return Err(AppError::InvalidState(format!(
                "delivery is already {}",
                status
            )));
        }

        let items = sqlx::query_as::<_, DeliveryItemRow>(
            r#"
            SELECT id, delivery_id, product_id, warehouse_id, qty, created_at
            FROM delivery_items
            WHERE delivery_id = $1
            ORDER BY created_at
            "#,
        )
        .bind(delivery_id)
        .fetch_all(&mut *tx)
        .await?;

        if items.is_empty() {
            return Err(AppError::EmptyDocument);
        }

        for item in &items {
            stock::apply_delta(&mut *tx, item.product_id, item.warehouse_id, -item.qty).await?;
            stock_move::append(
                &mut *tx,
                NewStockMove {
                    product_id: item.product_id,
                    quantity: -item.qty,
                    move_type: MoveType::Delivery,
                    from_location: Some(item.warehouse_id),
                    to_location: None,
                    reference_id: Some(delivery_id),
                    created_by: actor_id,
                },
            )
            .await?;
        }

        sqlx::query("UPDATE deliveries SET status = $1, updated_at = now() WHERE id = $2")
            .bind(DocumentStatus::Done.as_str())
            .bind(delivery_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        tracing::info!(delivery_id = %delivery_id, items = items.len(), "delivery validated");

        self.get(delivery_id).await
    }

    /// Load items for a set of deliveries with product and warehouse attached
    async fn load_items(
        &self,
        delivery_ids: &[Uuid],
    ) -> AppResult<HashMap<Uuid, Vec<DeliveryItem>>> {
        if delivery_ids.is_empty() {
            return Ok(HashMap::new());
        }

        let rows = sqlx::query_as::<_, DeliveryItemRow>(
            r#"
            SELECT id, delivery_id, product_id, warehouse_id, qty, created_at
            FROM delivery_items
            WHERE delivery_id = ANY($1)
            ORDER BY created_at
            "#,
        )
        .bind(delivery_ids)
        .fetch_all(&self.db)
        .await?;

        let product_ids: Vec<Uuid> = rows.iter().map(|r| r.product_id).collect();
        let warehouse_ids: Vec<Uuid> = rows.iter().map(|r| r.warehouse_id).collect();
        let products = product::load_by_ids(&self.db, &product_ids).await?;
        let warehouses = warehouse::load_by_ids(&self.db, &warehouse_ids).await?;

        let mut grouped: HashMap<Uuid, Vec<DeliveryItem>> = HashMap::new();
        for row in rows {
            let mut item = DeliveryItem::from(row);
            item.product = products.get(&item.product_id).cloned();
            item.warehouse = warehouses.get(&item.warehouse_id).cloned();
            grouped.entry(item.delivery_id).or_default().push(item);
        }

        Ok(grouped)
    }
}
