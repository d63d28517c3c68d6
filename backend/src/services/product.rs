//! Product reference data service

use chrono::{DateTime, Utc};
use serde::Deserialize;
use sqlx::{FromRow, PgPool};
use std::collections::HashMap;
use uuid::Uuid;

use shared::models::{Category, Product};
use shared::validation::{validate_name, validate_reorder_level, validate_sku};

use crate::error::{AppError, AppResult};

/// Product service for catalog CRUD
#[derive(Clone)]
pub struct ProductService {
    db: PgPool,
}

/// Input for creating a product
#[derive(Debug, Deserialize)]
pub struct CreateProductInput {
    pub name: String,
    pub sku: String,
    pub category_id: Option<Uuid>,
    pub uom: Option<String>,
    pub reorder_level: Option<i64>,
}

/// Input for updating a product's descriptive fields
///
/// The sku is part of the product's identity and cannot be changed here.
#[derive(Debug, Deserialize)]
pub struct UpdateProductInput {
    pub name: Option<String>,
    pub category_id: Option<Uuid>,
    pub uom: Option<String>,
    pub reorder_level: Option<i64>,
}

/// Row for product queries with the category joined in
#[derive(Debug, FromRow)]
struct ProductRow {
    id: Uuid,
    name: String,
    sku: String,
    category_id: Option<Uuid>,
    uom: String,
    reorder_level: i64,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    category_name: Option<String>,
    category_created_at: Option<DateTime<Utc>>,
    category_updated_at: Option<DateTime<Utc>>,
}

impl From<ProductRow> for Product {
    fn from(row: ProductRow) -> Self {
        let category = match (row.category_id, row.category_name) {
            (Some(id), Some(name)) => Some(Category {
                id,
                name,
                created_at: row.category_created_at.unwrap_or(row.created_at),
                updated_at: row.category_updated_at.unwrap_or(row.updated_at),
            }),
            _ => None,
        };

        Product {
            id: row.id,
            name: row.name,
            sku: row.sku,
            category_id: row.category_id,
            uom: row.uom,
            reorder_level: row.reorder_level,
            created_at: row.created_at,
            updated_at: row.updated_at,
            category,
        }
    }
}

const PRODUCT_SELECT: &str = r#"
    SELECT p.id, p.name, p.sku, p.category_id, p.uom, p.reorder_level, p.created_at, p.updated_at,
           c.name AS category_name, c.created_at AS category_created_at, c.updated_at AS category_updated_at
    FROM products p
    LEFT JOIN categories c ON c.id = p.category_id
"#;

impl ProductService {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    /// List all products, newest first
    pub async fn list(&self) -> AppResult<Vec<Product>> {
        let rows = sqlx::query_as::<_, ProductRow>(&format!(
            "{PRODUCT_SELECT} ORDER BY p.created_at DESC"
        ))
        .fetch_all(&self.db)
        .await?;

        Ok(rows.into_iter().map(Product::from).collect())
    }

    /// Get a product by id
    pub async fn get(&self, product_id: Uuid) -> AppResult<Product> {
        let row = sqlx::query_as::<_, ProductRow>(&format!("{PRODUCT_SELECT} WHERE p.id = $1"))
            .bind(product_id)
            .fetch_optional(&self.db)
            .await?
            .ok_or_else(|| AppError::NotFound("Product".to_string()))?;

        Ok(row.into())
    }

    /// Create a product
    pub async fn create(&self, input: CreateProductInput) -> AppResult<Product> {
        validate_name(&input.name).map_err(|msg| AppError::Validation {
            field: "name".to_string(),
            message: msg.to_string(),
        })?;
        validate_sku(&input.sku).map_err(|msg| AppError::Validation {
            field: "sku".to_string(),
            message: msg.to_string(),
        })?;

        let reorder_level = input.reorder_level.unwrap_or(0);
        validate_reorder_level(reorder_level).map_err(|msg| AppError::Validation {
            field: "reorder_level".to_string(),
            message: msg.to_string(),
        })?;

        if let Some(category_id) = input.category_id {
            ensure_category_exists(&self.db, category_id).await?;
        }

        let uom = input.uom.unwrap_or_else(|| "unit".to_string());

        let product_id = sqlx::query_scalar::<_, Uuid>(
            r#"
            INSERT INTO products (name, sku, category_id, uom, reorder_level)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id
            "#,
        )
        .bind(&input.name)
        .bind(&input.sku)
        .bind(input.category_id)
        .bind(&uom)
        .bind(reorder_level)
        .fetch_one(&self.db)
        .await
        .map_err(|e| AppError::from_db_unique(e, "sku"))?;

        self.get(product_id).await
    }

    /// Update a product's descriptive fields
    pub async fn update(&self, product_id: Uuid, input: UpdateProductInput) -> AppResult<Product> {
        let existing = self.get(product_id).await?;

        let name = input.name.unwrap_or(existing.name);
        validate_name(&name).map_err(|msg| AppError::Validation {
            field: "name".to_string(),
            message: msg.to_string(),
        })?;

        let reorder_level = input.reorder_level.unwrap_or(existing.reorder_level);
        validate_reorder_level(reorder_level).map_err(|msg| AppError::Validation {
            field: "reorder_level".to_string(),
            message: msg.to_string(),
        })?;

        let category_id = input.category_id.or(existing.category_id);
        if let Some(category_id) = category_id {
            ensure_category_exists(&self.db, category_id).await?;
        }

        let uom = input.uom.unwrap_or(existing.uom);

        sqlx::query(
            r#"
            UPDATE products
            SET name = $1, category_id = $2, uom = $3, reorder_level = $4, updated_at = now()
            WHERE id = $5
            "#,
        )
        .bind(&name)
        .bind(category_id)
        .bind(&uom)
        .bind(reorder_level)
        .bind(product_id)
        .execute(&self.db)
        .await?;

        self.get(product_id).await
    }

    /// Delete a product that has no stock or document history
    pub async fn delete(&self, product_id: Uuid) -> AppResult<()> {
        let result = sqlx::query("DELETE FROM products WHERE id = $1")
            .bind(product_id)
            .execute(&self.db)
            .await
            .map_err(|e| {
                AppError::from_db_referenced(
                    e,
                    "Product is referenced by stock records or documents",
                )
            })?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound("Product".to_string()));
        }

        Ok(())
    }
}

/// Fail with `NotFound` unless the product exists
pub(crate) async fn ensure_exists(pool: &PgPool, product_id: Uuid) -> AppResult<()> {
    let exists = sqlx::query_scalar::<_, bool>("SELECT EXISTS(SELECT 1 FROM products WHERE id = $1)")
        .bind(product_id)
        .fetch_one(pool)
        .await?;

    if !exists {
        return Err(AppError::NotFound("Product".to_string()));
    }
    Ok(())
}

async fn ensure_category_exists(pool: &PgPool, category_id: Uuid) -> AppResult<()> {
    let exists =
        sqlx::query_scalar::<_, bool>("SELECT EXISTS(SELECT 1 FROM categories WHERE id = $1)")
            .bind(category_id)
            .fetch_one(pool)
            .await?;

    if !exists {
        return Err(AppError::NotFound("Category".to_string()));
    }
    Ok(())
}

/// Batch-load products by id for eager relation loading
pub(crate) async fn load_by_ids(
    pool: &PgPool,
    ids: &[Uuid],
) -> AppResult<HashMap<Uuid, Product>> {
    if ids.is_empty() {
        return Ok(HashMap::new());
    }

    let rows = sqlx::query_as::<_, ProductRow>(&format!("{PRODUCT_SELECT} WHERE p.id = ANY($1)"))
        .bind(ids)
        .fetch_all(pool)
        .await?;

    Ok(rows
        .into_iter()
        .map(Product::from)
        .map(|p| (p.id, p))
        .collect())
}
