//! Database operations for the inventory `PostgreSQL` database.
//!
//! ## Tables
//!
//! - `users` - API users, roles and explicit permission grants
//! - `products` - Local catalog; `quantity` is the source of truth
//! - `stores` - Connected Shopify stores and their access tokens
//! - `stock_logs` - Append-only ledger of every quantity change
//! - `scan_logs` - Every barcode scan, found or not
//! - `mobile_transactions` - Stock requests awaiting approval
//! - `mobile_activities` - Activity feed reported by the mobile app
//! - `sync_results` - Per product/store reconciliation outcomes
//!
//! # Migrations
//!
//! Migrations are stored in `crates/api/migrations/` and run via:
//! ```bash
//! cargo run -p stockmirror-cli -- migrate
//! ```
//!
//! Optional filters are bound as nullable parameters
//! (`$1::text IS NULL OR column = $1`) so every statement is static SQL.

pub mod dashboard;
pub mod mobile;
pub mod products;
pub mod scans;
pub mod stock;
pub mod stores;
pub mod sync_results;
pub mod users;

use std::time::Duration;

use secrecy::ExposeSecret;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use thiserror::Error;

pub use dashboard::DashboardRepository;
pub use mobile::MobileRepository;
pub use products::ProductRepository;
pub use scans::ScanRepository;
pub use stock::StockRepository;
pub use stores::StoreRepository;
pub use sync_results::SyncResultRepository;
pub use users::UserRepository;

/// Errors that can occur during repository operations.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// Database error from sqlx.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Data in the database is corrupted or invalid.
    #[error("data corruption: {0}")]
    DataCorruption(String),

    /// Requested entity was not found.
    #[error("not found")]
    NotFound,

    /// Constraint violation (e.g., unique SKU).
    #[error("constraint violation: {0}")]
    Conflict(String),
}

impl RepositoryError {
    /// Map a unique violation to `Conflict(message)`, anything else to `Database`.
    pub(crate) fn unique(err: sqlx::Error, message: &str) -> Self {
        if let sqlx::Error::Database(ref db_err) = err
            && db_err.is_unique_violation()
        {
            return Self::Conflict(message.to_owned());
        }
        Self::Database(err)
    }
}

/// Create a `PostgreSQL` connection pool with sensible defaults.
///
/// # Errors
///
/// Returns `sqlx::Error` if the connection cannot be established.
pub async fn create_pool(database_url: &secrecy::SecretString) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(10)
        .min_connections(2)
        .acquire_timeout(Duration::from_secs(10))
        .connect(database_url.expose_secret())
        .await
}

/// LIMIT/OFFSET pair for a 1-based page.
#[must_use]
pub fn limit_offset(page: u32, per_page: u32) -> (i64, i64) {
    let per_page = i64::from(per_page.max(1));
    let offset = i64::from(page.max(1) - 1) * per_page;
    (per_page, offset)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_limit_offset() {
        assert_eq!(limit_offset(1, 50), (50, 0));
        assert_eq!(limit_offset(3, 20), (20, 40));
        assert_eq!(limit_offset(0, 0), (1, 0));
    }

    #[test]
    fn test_unique_maps_other_errors_to_database() {
        let err = RepositoryError::unique(sqlx::Error::RowNotFound, "sku already exists");
        assert!(matches!(err, RepositoryError::Database(_)));
    }
}
