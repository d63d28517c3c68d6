//! HTTP handlers for delivery endpoints
//!
//! The delivery service tolerates an anonymous actor, so these handlers use
//! the optional extractor and pass whatever identity the request carries.

use axum::{
    extract::{Path, State},
    Json,
};
use uuid::Uuid;

use shared::models::{Delivery, DeliveryItem};

use crate::error::AppResult;
use crate::middleware::OptionalUser;
use crate::services::delivery::{AddDeliveryItemInput, CreateDeliveryInput, DeliveryService};
use crate::services::receipt::UpdateStatusInput;
use crate::AppState;

/// List all deliveries
pub async fn list_deliveries(State(state): State<AppState>) -> AppResult<Json<Vec<Delivery>>> {
    let service = DeliveryService::new(state.db);
    let deliveries = service.list().await?;
    Ok(Json(deliveries))
}

/// Get a delivery by id
pub async fn get_delivery(
    State(state): State<AppState>,
    Path(delivery_id): Path<Uuid>,
) -> AppResult<Json<Delivery>> {
    let service = DeliveryService::new(state.db);
    let delivery = service.get(delivery_id).await?;
    Ok(Json(delivery))
}

/// Create a draft delivery
pub async fn create_delivery(
    State(state): State<AppState>,
    user: OptionalUser,
    Json(input): Json<CreateDeliveryInput>,
) -> AppResult<Json<Delivery>> {
    let service = DeliveryService::new(state.db);
    let delivery = service
        .create(user.0.map(|u| u.user_id), input)
        .await?;
    Ok(Json(delivery))
}

/// Add a line item to a delivery
pub async fn add_delivery_item(
    State(state): State<AppState>,
    Path(delivery_id): Path<Uuid>,
    Json(input): Json<AddDeliveryItemInput>,
) -> AppResult<Json<DeliveryItem>> {
    let service = DeliveryService::new(state.db);
    let item = service.add_item(delivery_id, input).await?;
    Ok(Json(item))
}

/// Remove a line item from a delivery
pub async fn remove_delivery_item(
    State(state): State<AppState>,
    Path((delivery_id, item_id)): Path<(Uuid, Uuid)>,
) -> AppResult<Json<()>> {
    let service = DeliveryService::new(state.db);
    service.remove_item(delivery_id, item_id).await?;
    Ok(Json(()))
}

/// Change a delivery's status without stock effects
pub async fn update_delivery_status(
    State(state): State<AppState>,
    Path(delivery_id): Path<Uuid>,
    Json(input): Json<UpdateStatusInput>,
) -> AppResult<Json<Delivery>> {
    let service = DeliveryService::new(state.db);
    let delivery = service.set_status(delivery_id, input).await?;
    Ok(Json(delivery))
}

/// Validate a delivery, committing its items to stock
pub async fn validate_delivery(
    State(state): State<AppState>,
    user: OptionalUser,
    Path(delivery_id): Path<Uuid>,
) -> AppResult<Json<Delivery>> {
    let service = DeliveryService::new(state.db);
    let delivery = service
        .validate(user.0.map(|u| u.user_id), delivery_id)
        .await?;
    Ok(Json(delivery))
}
