//! Business logic services for the StockFlow inventory platform

pub mod adjustment;
pub mod category;
pub mod dashboard;
pub mod delivery;
pub mod product;
pub mod receipt;
pub mod stock;
pub mod stock_move;
pub mod transfer;
pub mod warehouse;

pub use adjustment::AdjustmentService;
pub use category::CategoryService;
pub use dashboard::DashboardService;
pub use delivery::DeliveryService;
pub use product::ProductService;
pub use receipt::ReceiptService;
pub use stock::StockService;
pub use transfer::TransferService;
pub use warehouse::WarehouseService;

use crate::error::{AppError, AppResult};
use shared::types::DocumentStatus;
use std::str::FromStr;

/// Parse a status column value; an unknown value means the row was written
/// outside the application and is treated as an internal error
pub(crate) fn parse_status(value: &str) -> AppResult<DocumentStatus> {
    DocumentStatus::from_str(value).map_err(|e| AppError::Internal(anyhow::Error::new(e)))
}
