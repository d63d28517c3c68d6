//! HTTP handlers for the StockFlow API

pub mod adjustments;
pub mod categories;
pub mod dashboard;
pub mod deliveries;
pub mod health;
pub mod products;
pub mod receipts;
pub mod stock;
pub mod transfers;
pub mod warehouses;

pub use adjustments::*;
pub use categories::*;
pub use dashboard::*;
pub use deliveries::*;
pub use health::*;
pub use products::*;
pub use receipts::*;
pub use stock::*;
pub use transfers::*;
pub use warehouses::*;
