//! Shared types and domain logic for the StockFlow inventory platform
//!
//! This crate contains the domain models, the document status machine and
//! the stock-move arithmetic shared between the backend and its tests.

pub mod models;
pub mod types;
pub mod validation;

pub use models::*;
pub use types::*;
pub use validation::*;
