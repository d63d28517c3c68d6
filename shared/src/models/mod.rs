//! Domain models for the StockFlow inventory platform

mod category;
mod document;
mod product;
mod stock;
mod warehouse;

pub use category::*;
pub use document::*;
pub use product::*;
pub use stock::*;
pub use warehouse::*;
