//! HTTP handlers for receipt endpoints

use axum::{
    extract::{Path, State},
    Json,
};
use uuid::Uuid;

use shared::models::{Receipt, ReceiptItem};

use crate::error::AppResult;
use crate::middleware::CurrentUser;
use crate::services::receipt::{
    AddReceiptItemInput, CreateReceiptInput, ReceiptService, UpdateStatusInput,
};
use crate::AppState;

/// List all receipts
pub async fn list_receipts(State(state): State<AppState>) -> AppResult<Json<Vec<Receipt>>> {
    let service = ReceiptService::new(state.db);
    let receipts = service.list().await?;
    Ok(Json(receipts))
}

/// Get a receipt by id
pub async fn get_receipt(
    State(state): State<AppState>,
    Path(receipt_id): Path<Uuid>,
) -> AppResult<Json<Receipt>> {
    let service = ReceiptService::new(state.db);
    let receipt = service.get(receipt_id).await?;
    Ok(Json(receipt))
}

/// Create a draft receipt
pub async fn create_receipt(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Json(input): Json<CreateReceiptInput>,
) -> AppResult<Json<Receipt>> {
    let service = ReceiptService::new(state.db);
    let receipt = service.create(Some(current_user.0.user_id), input).await?;
    Ok(Json(receipt))
}

/// Add a line item to a receipt
pub async fn add_receipt_item(
    State(state): State<AppState>,
    Path(receipt_id): Path<Uuid>,
    Json(input): Json<AddReceiptItemInput>,
) -> AppResult<Json<ReceiptItem>> {
    let service = ReceiptService::new(state.db);
    let item = service.add_item(receipt_id, input).await?;
    Ok(Json(item))
}

/// Remove a line item from a receipt
pub async fn remove_receipt_item(
    State(state): State<AppState>,
    Path((receipt_id, item_id)): Path<(Uuid, Uuid)>,
) -> AppResult<Json<()>> {
    let service = ReceiptService::new(state.db);
    service.remove_item(receipt_id, item_id).await?;
    Ok(Json(()))
}

/// Change a receipt's status without stock effects
pub async fn update_receipt_status(
    State(state): State<AppState>,
    Path(receipt_id): Path<Uuid>,
    Json(input): Json<UpdateStatusInput>,
) -> AppResult<Json<Receipt>> {
    let service = ReceiptService::new(state.db);
    let receipt = service.set_status(receipt_id, input).await?;
    Ok(Json(receipt))
}

/// Validate a receipt, committing its items to stock
pub async fn validate_receipt(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(receipt_id): Path<Uuid>,
) -> AppResult<Json<Receipt>> {
    let service = ReceiptService::new(state.db);
    let receipt = service
        .validate(Some(current_user.0.user_id), receipt_id)
        .await?;
    Ok(Json(receipt))
}
