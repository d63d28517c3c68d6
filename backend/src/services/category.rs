//! Category reference data service

use serde::Deserialize;
use sqlx::PgPool;
use uuid::Uuid;

use shared::models::Category;
use shared::validation::validate_name;

use crate::error::{AppError, AppResult};

/// Category service for settings CRUD
#[derive(Clone)]
pub struct CategoryService {
    db: PgPool,
}

/// Input for creating or renaming a category
#[derive(Debug, Deserialize)]
pub struct CategoryInput {
    pub name: String,
}

#[derive(Debug, sqlx::FromRow)]
struct CategoryRow {
    id: Uuid,
    name: String,
    created_at: chrono::DateTime<chrono::Utc>,
    updated_at: chrono::DateTime<chrono::Utc>,
}

impl From<CategoryRow> for Category {
    fn from(row: CategoryRow) -> Self {
        Category {
            id: row.id,
            name: row.name,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

impl CategoryService {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    /// List all categories ordered by name
    pub async fn list(&self) -> AppResult<Vec<Category>> {
        let rows = sqlx::query_as::<_, CategoryRow>(
            "SELECT id, name, created_at, updated_at FROM categories ORDER BY name",
        )
        .fetch_all(&self.db)
        .await?;

        Ok(rows.into_iter().map(Category::from).collect())
    }

    /// Get a category by id
    pub async fn get(&self, category_id: Uuid) -> AppResult<Category> {
        let row = sqlx::query_as::<_, CategoryRow>(
            "SELECT id, name, created_at, updated_at FROM categories WHERE id = $1",
        )
        .bind(category_id)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Category".to_string()))?;

        Ok(row.into())
    }

    /// Create a category
    pub async fn create(&self, input: CategoryInput) -> AppResult<Category> {
        validate_name(&input.name).map_err(|msg| AppError::Validation {
            field: "name".to_string(),
            message: msg.to_string(),
        })?;

        let row = sqlx::query_as::<_, CategoryRow>(
            r#"
            INSERT INTO categories (name)
            VALUES ($1)
            RETURNING id, name, created_at, updated_at
            "#,
        )
        .bind(&input.name)
        .fetch_one(&self.db)
        .await?;

        Ok(row.into())
    }

    /// Rename a category
    pub async fn update(&self, category_id: Uuid, input: CategoryInput) -> AppResult<Category> {
        validate_name(&input.name).map_err(|msg| AppError::Validation {
            field: "name".to_string(),
            message: msg.to_string(),
        })?;

        let row = sqlx::query_as::<_, CategoryRow>(
            r#"
            UPDATE categories
            SET name = $1, updated_at = now()
            WHERE id = $2
            RETURNING id, name, created_at, updated_at
            "#,
        )
        .bind(&input.name)
        .bind(category_id)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Category".to_string()))?;

        Ok(row.into())
    }

    /// Delete a category; products keep existing with their category unset
    pub async fn delete(&self, category_id: Uuid) -> AppResult<()> {
        let result = sqlx::query("DELETE FROM categories WHERE id = $1")
            .bind(category_id)
            .execute(&self.db)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound("Category".to_string()));
        }

        Ok(())
    }
}
