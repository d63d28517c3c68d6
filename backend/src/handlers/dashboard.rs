//! HTTP handler for the dashboard endpoint

use axum::{extract::State, Json};

use crate::error::AppResult;
use crate::services::dashboard::{DashboardService, DashboardStats};
use crate::AppState;

/// Dashboard headline numbers
pub async fn get_dashboard_stats(
    State(state): State<AppState>,
) -> AppResult<Json<DashboardStats>> {
    let service = DashboardService::new(state.db);
    let stats = service.stats().await?;
    Ok(Json(stats))
}
