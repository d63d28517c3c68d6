//! HTTP handlers for category endpoints

use axum::{
    extract::{Path, State},
    Json,
};
use uuid::Uuid;

use shared::models::Category;

use crate::error::AppResult;
use crate::services::category::{CategoryInput, CategoryService};
use crate::AppState;

/// List all categories
pub async fn list_categories(State(state): State<AppState>) -> AppResult<Json<Vec<Category>>> {
    let service = CategoryService::new(state.db);
    let categories = service.list().await?;
    Ok(Json(categories))
}

/// Get a category by id
pub async fn get_category(
    State(state): State<AppState>,
    Path(category_id): Path<Uuid>,
) -> AppResult<Json<Category>> {
    let service = CategoryService::new(state.db);
    let category = service.get(category_id).await?;
    Ok(Json(category))
}

/// Create a category
pub async fn create_category(
    State(state): State<AppState>,
    Json(input): Json<CategoryInput>,
) -> AppResult<Json<Category>> {
    let service = CategoryService::new(state.db);
    let category = service.create(input).await?;
    Ok(Json(category))
}

/// Rename a category
pub async fn update_category(
    State(state): State<AppState>,
    Path(category_id): Path<Uuid>,
    Json(input): Json<CategoryInput>,
) -> AppResult<Json<Category>> {
    let service = CategoryService::new(state.db);
    let category = service.update(category_id, input).await?;
    Ok(Json(category))
}

/// Delete a category
pub async fn delete_category(
    State(state): State<AppState>,
    Path(category_id): Path<Uuid>,
) -> AppResult<Json<()>> {
    let service = CategoryService::new(state.db);
    service.delete(category_id).await?;
    Ok(Json(()))
}
