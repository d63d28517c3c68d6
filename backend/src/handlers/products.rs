//! HTTP handlers for product catalog endpoints

use axum::{
    extract::{Path, State},
    Json,
};
use serde_json::{json, Value};
use uuid::Uuid;

use shared::models::{Product, StockLevel};

use crate::error::AppResult;
use crate::services::product::{CreateProductInput, ProductService, UpdateProductInput};
use crate::services::stock::StockService;
use crate::AppState;

/// List all products
pub async fn list_products(State(state): State<AppState>) -> AppResult<Json<Vec<Product>>> {
    let service = ProductService::new(state.db);
    let products = service.list().await?;
    Ok(Json(products))
}

/// Get a product by id
pub async fn get_product(
    State(state): State<AppState>,
    Path(product_id): Path<Uuid>,
) -> AppResult<Json<Product>> {
    let service = ProductService::new(state.db);
    let product = service.get(product_id).await?;
    Ok(Json(product))
}

/// Create a product
pub async fn create_product(
    State(state): State<AppState>,
    Json(input): Json<CreateProductInput>,
) -> AppResult<Json<Product>> {
    let service = ProductService::new(state.db);
    let product = service.create(input).await?;
    Ok(Json(product))
}

/// Update a product
pub async fn update_product(
    State(state): State<AppState>,
    Path(product_id): Path<Uuid>,
    Json(input): Json<UpdateProductInput>,
) -> AppResult<Json<Product>> {
    let service = ProductService::new(state.db);
    let product = service.update(product_id, input).await?;
    Ok(Json(product))
}

/// Delete a product
pub async fn delete_product(
    State(state): State<AppState>,
    Path(product_id): Path<Uuid>,
) -> AppResult<Json<()>> {
    let service = ProductService::new(state.db);
    service.delete(product_id).await?;
    Ok(Json(()))
}

/// Per-warehouse stock levels for a product
pub async fn get_product_stock(
    State(state): State<AppState>,
    Path(product_id): Path<Uuid>,
) -> AppResult<Json<Vec<StockLevel>>> {
    let service = StockService::new(state.db);
    let levels = service.get_product_stock_levels(product_id).await?;
    Ok(Json(levels))
}

/// Total stock of a product across all warehouses
pub async fn get_product_total_stock(
    State(state): State<AppState>,
    Path(product_id): Path<Uuid>,
) -> AppResult<Json<Value>> {
    let service = StockService::new(state.db);
    let total = service.get_total_stock(product_id).await?;
    Ok(Json(json!({ "product_id": product_id, "total": total })))
}
