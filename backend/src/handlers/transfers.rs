//! HTTP handlers for internal transfer endpoints

use axum::{
    extract::{Path, State},
    Json,
};
use uuid::Uuid;

use shared::models::{InternalTransfer, TransferItem};

use crate::error::AppResult;
use crate::middleware::CurrentUser;
use crate::services::receipt::UpdateStatusInput;
use crate::services::transfer::{AddTransferItemInput, CreateTransferInput, TransferService};
use crate::AppState;

/// List all transfers
pub async fn list_transfers(
    State(state): State<AppState>,
) -> AppResult<Json<Vec<InternalTransfer>>> {
    let service = TransferService::new(state.db);
    let transfers = service.list().await?;
    Ok(Json(transfers))
}

/// Get a transfer by id
pub async fn get_transfer(
    State(state): State<AppState>,
    Path(transfer_id): Path<Uuid>,
) -> AppResult<Json<InternalTransfer>> {
    let service = TransferService::new(state.db);
    let transfer = service.get(transfer_id).await?;
    Ok(Json(transfer))
}

/// Create a draft transfer
pub async fn create_transfer(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Json(input): Json<CreateTransferInput>,
) -> AppResult<Json<InternalTransfer>> {
    let service = TransferService::new(state.db);
    let transfer = service.create(Some(current_user.0.user_id), input).await?;
    Ok(Json(transfer))
}

/// Add a line item to a transfer
pub async fn add_transfer_item(
    State(state): State<AppState>,
    Path(transfer_id): Path<Uuid>,
    Json(input): Json<AddTransferItemInput>,
) -> AppResult<Json<TransferItem>> {
    let service = TransferService::new(state.db);
    let item = service.add_item(transfer_id, input).await?;
    Ok(Json(item))
}

/// Remove a line item from a transfer
pub async fn remove_transfer_item(
    State(state): State<AppState>,
    Path((transfer_id, item_id)): Path<(Uuid, Uuid)>,
) -> AppResult<Json<()>> {
    let service = TransferService::new(state.db);
    service.remove_item(transfer_id, item_id).await?;
    Ok(Json(()))
}

/// Change a transfer's status without stock effects
pub async fn update_transfer_status(
    State(state): State<AppState>,
    Path(transfer_id): Path<Uuid>,
    Json(input): Json<UpdateStatusInput>,
) -> AppResult<Json<InternalTransfer>> {
    let service = TransferService::new(state.db);
    let transfer = service.set_status(transfer_id, input).await?;
    Ok(Json(transfer))
}

/// Validate a transfer, moving its items between warehouses
pub async fn validate_transfer(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(transfer_id): Path<Uuid>,
) -> AppResult<Json<InternalTransfer>> {
    let service = TransferService::new(state.db);
    let transfer = service
        .validate(Some(current_user.0.user_id), transfer_id)
        .await?;
    Ok(Json(transfer))
}
