//! Barcode scan log repository.

use chrono::{DateTime, Utc};
use sqlx::PgPool;

use stockmirror_core::{ProductId, ScanAction, ScanLogId, UserId};

use super::{RepositoryError, limit_offset};
use crate::models::scan::ScanLog;

const SCAN_COLUMNS: &str = "id, barcode, product_id, action, quantity, found, user_id, created_at";

#[derive(Debug, sqlx::FromRow)]
struct ScanLogRow {
    id: ScanLogId,
    barcode: String,
    product_id: Option<ProductId>,
    action: ScanAction,
    quantity: Option<i32>,
    found: bool,
    user_id: Option<UserId>,
    created_at: DateTime<Utc>,
}

impl From<ScanLogRow> for ScanLog {
    fn from(row: ScanLogRow) -> Self {
        Self {
            id: row.id,
            barcode: row.barcode,
            product_id: row.product_id,
            action: row.action,
            quantity: row.quantity,
            found: row.found,
            user_id: row.user_id,
            created_at: row.created_at,
        }
    }
}

/// A scan to record.
#[derive(Debug, Clone)]
pub struct NewScan<'s> {
    pub barcode: &'s str,
    pub product_id: Option<ProductId>,
    pub action: ScanAction,
    pub quantity: Option<i32>,
    pub found: bool,
    pub user_id: Option<UserId>,
}

/// Repository for scan logs.
pub struct ScanRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> ScanRepository<'a> {
    /// Create a new scan repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Record a scan.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the insert fails.
    pub async fn record(&self, scan: &NewScan<'_>) -> Result<ScanLog, RepositoryError> {
        let row = sqlx::query_as::<_, ScanLogRow>(&format!(
            "INSERT INTO scan_logs (barcode, product_id, action, quantity, found, user_id) \
             VALUES ($1, $2, $3, $4, $5, $6) \
             RETURNING {SCAN_COLUMNS}"
        ))
        .bind(scan.barcode.trim())
        .bind(scan.product_id)
        .bind(scan.action)
        .bind(scan.quantity)
        .bind(scan.found)
        .bind(scan.user_id)
        .fetch_one(self.pool)
        .await?;

        Ok(row.into())
    }

    /// List scans, newest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list(
        &self,
        user_id: Option<UserId>,
        page: u32,
        per_page: u32,
    ) -> Result<(Vec<ScanLog>, i64), RepositoryError> {
        let (limit, offset) = limit_offset(page, per_page);
        let rows = sqlx::query_as::<_, ScanLogRow>(&format!(
            "SELECT {SCAN_COLUMNS} FROM scan_logs \
             WHERE ($1::int IS NULL OR user_id = $1) \
             ORDER BY created_at DESC, id DESC LIMIT $2 OFFSET $3"
        ))
        .bind(user_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(self.pool)
        .await?;

        let total: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM scan_logs WHERE ($1::int IS NULL OR user_id = $1)")
                .bind(user_id)
                .fetch_one(self.pool)
                .await?;

        Ok((rows.into_iter().map(Into::into).collect(), total))
    }
}
