//! Dashboard aggregates for the overview page

use serde::Serialize;
use sqlx::PgPool;

use crate::error::AppResult;

/// Headline numbers for the dashboard
///
/// Low-stock and out-of-stock counts classify each product by its total
/// quantity across all warehouses against its reorder level; out-of-stock
/// products are counted in both figures.
#[derive(Debug, Clone, Serialize)]
pub struct DashboardStats {
    pub total_products: i64,
    pub low_stock_items: i64,
    pub out_of_stock_items: i64,
    pub pending_receipts: i64,
    pub pending_deliveries: i64,
    pub scheduled_transfers: i64,
}

/// Dashboard aggregation service
#[derive(Clone)]
pub struct DashboardService {
    db: PgPool,
}

impl DashboardService {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    /// Compute all dashboard figures
    ///
    /// Products without any stock rows total zero, so `LEFT JOIN` keeps them
    /// in the out-of-stock count.
    pub async fn stats(&self) -> AppResult<DashboardStats> {
        let (total_products, low_stock_items, out_of_stock_items) =
            sqlx::query_as::<_, (i64, i64, i64)>(
                r#"
                SELECT COUNT(*),
                       COUNT(*) FILTER (WHERE totals.total <= totals.reorder_level),
                       COUNT(*) FILTER (WHERE totals.total = 0)
                FROM (
                    SELECT p.id, p.reorder_level,
                           COALESCE(SUM(sl.quantity), 0)::bigint AS total
                    FROM products p
                    LEFT JOIN stock_levels sl ON sl.product_id = p.id
                    GROUP BY p.id, p.reorder_level
                ) totals
                "#,
            )
            .fetch_one(&self.db)
            .await?;

        let pending_receipts = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM receipts WHERE status IN ('draft', 'waiting', 'ready')",
        )
        .fetch_one(&self.db)
        .await?;

        let pending_deliveries = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM deliveries WHERE status IN ('draft', 'waiting', 'ready')",
        )
        .fetch_one(&self.db)
        .await?;

        let scheduled_transfers = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM internal_transfers WHERE status IN ('draft', 'waiting', 'ready')",
        )
        .fetch_one(&self.db)
        .await?;

        Ok(DashboardStats {
            total_products,
            low_stock_items,
            out_of_stock_items,
            pending_receipts,
            pending_deliveries,
            scheduled_transfers,
        })
    }
}
