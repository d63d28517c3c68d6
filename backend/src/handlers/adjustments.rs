//! HTTP handlers for stock adjustment endpoints

use axum::{
    extract::{Path, State},
    Json,
};
use uuid::Uuid;

use shared::models::Adjustment;

use crate::error::AppResult;
use crate::middleware::CurrentUser;
use crate::services::adjustment::{AdjustmentService, CreateAdjustmentInput};
use crate::AppState;

/// List all adjustments
pub async fn list_adjustments(State(state): State<AppState>) -> AppResult<Json<Vec<Adjustment>>> {
    let service = AdjustmentService::new(state.db);
    let adjustments = service.list().await?;
    Ok(Json(adjustments))
}

/// Get an adjustment by id
pub async fn get_adjustment(
    State(state): State<AppState>,
    Path(adjustment_id): Path<Uuid>,
) -> AppResult<Json<Adjustment>> {
    let service = AdjustmentService::new(state.db);
    let adjustment = service.get(adjustment_id).await?;
    Ok(Json(adjustment))
}

/// Record a count and apply it in one step
pub async fn create_adjustment(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Json(input): Json<CreateAdjustmentInput>,
) -> AppResult<Json<Adjustment>> {
    let service = AdjustmentService::new(state.db);
    let adjustment = service.create(Some(current_user.0.user_id), input).await?;
    Ok(Json(adjustment))
}
