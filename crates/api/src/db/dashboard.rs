//! Aggregate queries for the dashboard.

use rust_decimal::Decimal;
use serde::Serialize;
use sqlx::PgPool;

use super::RepositoryError;

/// Headline inventory numbers.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct DashboardCounts {
    pub active_products: i64,
    pub total_units: i64,
    pub inventory_value: Decimal,
    pub low_stock: i64,
    pub needs_sync: i64,
    pub pending_mobile_transactions: i64,
    pub stores: i64,
    pub connected_stores: i64,
    pub sync_failures_24h: i64,
}

/// Repository for dashboard aggregates.
pub struct DashboardRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> DashboardRepository<'a> {
    /// Create a new dashboard repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Compute headline counts; `low_stock_threshold` is inclusive.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn counts(&self, low_stock_threshold: i32) -> Result<DashboardCounts, RepositoryError> {
        let counts = sqlx::query_as::<_, DashboardCounts>(
            "SELECT \
                 (SELECT COUNT(*) FROM products WHERE is_active) AS active_products, \
                 (SELECT COALESCE(SUM(quantity), 0)::BIGINT FROM products WHERE is_active) AS total_units, \
                 (SELECT COALESCE(SUM(quantity * price), 0)::NUMERIC FROM products WHERE is_active) AS inventory_value, \
                 (SELECT COUNT(*) FROM products WHERE is_active AND quantity <= $1) AS low_stock, \
                 (SELECT COUNT(*) FROM products WHERE is_active AND needs_sync) AS needs_sync, \
                 (SELECT COUNT(*) FROM mobile_transactions WHERE status = 'pending') AS pending_mobile_transactions, \
                 (SELECT COUNT(*) FROM stores) AS stores, \
                 (SELECT COUNT(*) FROM stores WHERE connected) AS connected_stores, \
                 (SELECT COUNT(*) FROM sync_results \
                      WHERE status = 'failed' AND created_at > NOW() - INTERVAL '24 hours') AS sync_failures_24h",
        )
        .bind(low_stock_threshold)
        .fetch_one(self.pool)
        .await?;
        Ok(counts)
    }
}
