//! HTTP handlers for warehouse endpoints

use axum::{
    extract::{Path, State},
    Json,
};
use uuid::Uuid;

use shared::models::Warehouse;

use crate::error::AppResult;
use crate::services::warehouse::{CreateWarehouseInput, UpdateWarehouseInput, WarehouseService};
use crate::AppState;

/// List all warehouses
pub async fn list_warehouses(State(state): State<AppState>) -> AppResult<Json<Vec<Warehouse>>> {
    let service = WarehouseService::new(state.db);
    let warehouses = service.list().await?;
    Ok(Json(warehouses))
}

/// Get a warehouse by id
pub async fn get_warehouse(
    State(state): State<AppState>,
    Path(warehouse_id): Path<Uuid>,
) -> AppResult<Json<Warehouse>> {
    let service = WarehouseService::new(state.db);
    let warehouse = service.get(warehouse_id).await?;
    Ok(Json(warehouse))
}

/// Create a warehouse
pub async fn create_warehouse(
    State(state): State<AppState>,
    Json(input): Json<CreateWarehouseInput>,
) -> AppResult<Json<Warehouse>> {
    let service = WarehouseService::new(state.db);
    let warehouse = service.create(input).await?;
    Ok(Json(warehouse))
}

/// Update a warehouse
pub async fn update_warehouse(
    State(state): State<AppState>,
    Path(warehouse_id): Path<Uuid>,
    Json(input): Json<UpdateWarehouseInput>,
) -> AppResult<Json<Warehouse>> {
    let service = WarehouseService::new(state.db);
    let warehouse = service.update(warehouse_id, input).await?;
    Ok(Json(warehouse))
}

/// Delete a warehouse
pub async fn delete_warehouse(
    State(state): State<AppState>,
    Path(warehouse_id): Path<Uuid>,
) -> AppResult<Json<()>> {
    let service = WarehouseService::new(state.db);
    service.delete(warehouse_id).await?;
    Ok(Json(()))
}
