//! HTTP handlers for stock ledger endpoints

use axum::{
    extract::{Query, State},
    Json,
};

use shared::models::StockMove;

use crate::error::AppResult;
use crate::services::stock::{StockDiscrepancy, StockService};
use crate::services::stock_move::{self, StockMoveFilter};
use crate::AppState;

/// Query the stock move history, newest first
pub async fn list_stock_moves(
    State(state): State<AppState>,
    Query(filter): Query<StockMoveFilter>,
) -> AppResult<Json<Vec<StockMove>>> {
    let moves = stock_move::list_with_relations(&state.db, &filter).await?;
    Ok(Json(moves))
}

/// Replay the ledger and report projection discrepancies
pub async fn audit_stock(
    State(state): State<AppState>,
) -> AppResult<Json<Vec<StockDiscrepancy>>> {
    let service = StockService::new(state.db);
    let discrepancies = service.audit().await?;
    Ok(Json(discrepancies))
}
