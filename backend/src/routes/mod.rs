//! Route definitions for the StockFlow API

use axum::{
    middleware,
    routing::{get, post, put},
    Router,
};

use crate::{handlers, middleware::auth_middleware, AppState};

/// Create API routes
pub fn api_routes() -> Router<AppState> {
    Router::new()
        // Health check (public)
        .route("/health", get(handlers::health_check))
        // Catalog and settings
        .nest("/categories", category_routes())
        .nest("/products", product_routes())
        .nest("/warehouses", warehouse_routes())
        // Documents
        .nest("/receipts", receipt_routes())
        .nest("/deliveries", delivery_routes())
        .nest("/transfers", transfer_routes())
        .nest("/adjustments", adjustment_routes())
        // Ledger and reporting
        .nest("/stock", stock_routes())
        .nest("/dashboard", dashboard_routes())
}

/// Category routes (protected)
fn category_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/",
            get(handlers::list_categories).post(handlers::create_category),
        )
        .route(
            "/:category_id",
            get(handlers::get_category)
                .put(handlers::update_category)
                .delete(handlers::delete_category),
        )
        .route_layer(middleware::from_fn(auth_middleware))
}

/// Product routes (protected)
fn product_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/",
            get(handlers::list_products).post(handlers::create_product),
        )
        .route(
            "/:product_id",
            get(handlers::get_product)
                .put(handlers::update_product)
                .delete(handlers::delete_product),
        )
        .route("/:product_id/stock", get(handlers::get_product_stock))
        .route(
            "/:product_id/stock/total",
            get(handlers::get_product_total_stock),
        )
        .route_layer(middleware::from_fn(auth_middleware))
}

/// Warehouse routes (protected)
fn warehouse_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/",
            get(handlers::list_warehouses).post(handlers::create_warehouse),
        )
        .route(
            "/:warehouse_id",
            get(handlers::get_warehouse)
                .put(handlers::update_warehouse)
                .delete(handlers::delete_warehouse),
        )
        .route_layer(middleware::from_fn(auth_middleware))
}

/// Receipt routes (protected)
fn receipt_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/",
            get(handlers::list_receipts).post(handlers::create_receipt),
        )
        .route("/:receipt_id", get(handlers::get_receipt))
        .route("/:receipt_id/items", post(handlers::add_receipt_item))
        .route(
            "/:receipt_id/items/:item_id",
            axum::routing::delete(handlers::remove_receipt_item),
        )
        .route("/:receipt_id/status", put(handlers::update_receipt_status))
        .route("/:receipt_id/validate", post(handlers::validate_receipt))
        .route_layer(middleware::from_fn(auth_middleware))
}

/// Delivery routes (protected)
fn delivery_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/",
            get(handlers::list_deliveries).post(handlers::create_delivery),
        )
        .route("/:delivery_id", get(handlers::get_delivery))
        .route("/:delivery_id/items", post(handlers::add_delivery_item))
        .route(
            "/:delivery_id/items/:item_id",
            axum::routing::delete(handlers::remove_delivery_item),
        )
        .route(
            "/:delivery_id/status",
            put(handlers::update_delivery_status),
        )
        .route("/:delivery_id/validate", post(handlers::validate_delivery))
        .route_layer(middleware::from_fn(auth_middleware))
}

/// Transfer routes (protected)
fn transfer_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/",
            get(handlers::list_transfers).post(handlers::create_transfer),
        )
        .route("/:transfer_id", get(handlers::get_transfer))
        .route("/:transfer_id/items", post(handlers::add_transfer_item))
        .route(
            "/:transfer_id/items/:item_id",
            axum::routing::delete(handlers::remove_transfer_item),
        )
        .route(
            "/:transfer_id/status",
            put(handlers::update_transfer_status),
        )
        .route("/:transfer_id/validate", post(handlers::validate_transfer))
        .route_layer(middleware::from_fn(auth_middleware))
}

/// Adjustment routes (protected)
fn adjustment_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/",
            get(handlers::list_adjustments).post(handlers::create_adjustment),
        )
        .route("/:adjustment_id", get(handlers::get_adjustment))
        .route_layer(middleware::from_fn(auth_middleware))
}

/// Stock ledger routes (protected)
fn stock_routes() -> Router<AppState> {
    Router::new()
        .route("/moves", get(handlers::list_stock_moves))
        .route("/audit", get(handlers::audit_stock))
        .route_layer(middleware::from_fn(auth_middleware))
}

/// Dashboard routes (protected)
fn dashboard_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(handlers::get_dashboard_stats))
        .route_layer(middleware::from_fn(auth_middleware))
}
