//! Warehouse reference data service

use serde::Deserialize;
use sqlx::PgPool;
use std::collections::HashMap;
use uuid::Uuid;

use shared::models::Warehouse;
use shared::validation::validate_name;

use crate::error::{AppError, AppResult};

/// Warehouse service for settings CRUD
#[derive(Clone)]
pub struct WarehouseService {
    db: PgPool,
}

/// Input for creating a warehouse
#[derive(Debug, Deserialize)]
pub struct CreateWarehouseInput {
    pub name: String,
    pub address: Option<String>,
}

/// Input for updating a warehouse
#[derive(Debug, Deserialize)]
pub struct UpdateWarehouseInput {
    pub name: Option<String>,
    pub address: Option<String>,
}

#[derive(Debug, sqlx::FromRow)]
struct WarehouseRow {
    id: Uuid,
    name: String,
    address: Option<String>,
    created_at: chrono::DateTime<chrono::Utc>,
    updated_at: chrono::DateTime<chrono::Utc>,
}

impl From<WarehouseRow> for Warehouse {
    fn from(row: WarehouseRow) -> Self {
        Warehouse {
            id: row.id,
            name: row.name,
            address: row.address,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

impl WarehouseService {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    /// List all warehouses ordered by name
    pub async fn list(&self) -> AppResult<Vec<Warehouse>> {
        let rows = sqlx::query_as::<_, WarehouseRow>(
            "SELECT id, name, address, created_at, updated_at FROM warehouses ORDER BY name",
        )
        .fetch_all(&self.db)
        .await?;

        Ok(rows.into_iter().map(Warehouse::from).collect())
    }

    /// Get a warehouse by id
    pub async fn get(&self, warehouse_id: Uuid) -> AppResult<Warehouse> {
        let row = sqlx::query_as::<_, WarehouseRow>(
            "SELECT id, name, address, created_at, updated_at FROM warehouses WHERE id = $1",
        )
        .bind(warehouse_id)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Warehouse".to_string()))?;

        Ok(row.into())
    }

    /// Create a warehouse
    pub async fn create(&self, input: CreateWarehouseInput) -> AppResult<Warehouse> {
        validate_name(&input.name).map_err(|msg| AppError::Validation {
            field: "name".to_string(),
            message: msg.to_string(),
        })?;

        let row = sqlx::query_as::<_, WarehouseRow>(
            r#"
            INSERT INTO warehouses (name, address)
            VALUES ($1, $2)
            RETURNING id, name, address, created_at, updated_at
            "#,
        )
        .bind(&input.name)
        .bind(&input.address)
        .fetch_one(&self.db)
        .await?;

        Ok(row.into())
    }

    /// Update a warehouse
    pub async fn update(
        &self,
        warehouse_id: Uuid,
        input: UpdateWarehouseInput,
    ) -> AppResult<Warehouse> {
        let existing = self.get(warehouse_id).await?;

        let name = input.name.unwrap_or(existing.name);
        validate_name(&name).map_err(|msg| AppError::Validation {
            field: "name".to_string(),
            message: msg.to_string(),
        })?;
        let address = input.address.or(existing.address);

        let row = sqlx::query_as::<_, WarehouseRow>(
            r#"
            UPDATE warehouses
            SET name = $1, address = $2, updated_at = now()
            WHERE id = $3
            RETURNING id, name, address, created_at, updated_at
            "#,
        )
        .bind(&name)
        .bind(&address)
        .bind(warehouse_id)
        .fetch_one(&self.db)
        .await?;

        Ok(row.into())
    }

    /// Delete a warehouse that holds no stock and appears in no document
    pub async fn delete(&self, warehouse_id: Uuid) -> AppResult<()> {
        let result = sqlx::query("DELETE FROM warehouses WHERE id = $1")
            .bind(warehouse_id)
            .execute(&self.db)
            .await
            .map_err(|e| {
                AppError::from_db_referenced(
                    e,
                    "Warehouse is referenced by stock records or documents",
                )
            })?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound("Warehouse".to_string()));
        }

        Ok(())
    }
}

/// Fail with `NotFound` unless the warehouse exists
pub(crate) async fn ensure_exists(pool: &PgPool, warehouse_id: Uuid) -> AppResult<()> {
    let exists =
        sqlx::query_scalar::<_, bool>("SELECT EXISTS(SELECT 1 FROM warehouses WHERE id = $1)")
            .bind(warehouse_id)
            .fetch_one(pool)
            .await?;

    if !exists {
        return Err(AppError::NotFound("Warehouse".to_string()));
    }
    Ok(())
}

/// Batch-load warehouses by id for eager relation loading
pub(crate) async fn load_by_ids(
    pool: &PgPool,
    ids: &[Uuid],
) -> AppResult<HashMap<Uuid, Warehouse>> {
    if ids.is_empty() {
        return Ok(HashMap::new());
    }

    let rows = sqlx::query_as::<_, WarehouseRow>(
        "SELECT id, name, address, created_at, updated_at FROM warehouses WHERE id = ANY($1)",
    )
    .bind(ids)
    .fetch_all(pool)
    .await?;

    Ok(rows
        .into_iter()
        .map(Warehouse::from)
        .map(|w| (w.id, w))
        .collect())
}
