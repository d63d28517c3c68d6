//! Health check handler

use axum::{extract::State, Json};
use serde_json::{json, Value};

use crate::AppState;

/// Health check that verifies database connectivity
pub async fn health_check(State(state): State<AppState>) -> Json<Value> {
    let db_healthy = sqlx::query("SELECT 1").execute(&state.db).await.is_ok();

    Json(json!({
        "status": if db_healthy { "healthy" } else { "degraded" },
        "database": db_healthy,
    }))
}
