//! Reconciliation outcome repository.

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::PgPool;

use stockmirror_core::{ProductId, StoreId, SyncDirection, SyncResultId, SyncStatus, UserId};

use super::{RepositoryError, limit_offset};
use crate::models::sync::{NewSyncResult, SyncResult, SyncResultFilter};

const RESULT_COLUMNS: &str = "id, product_id, store_id, sku, direction, status, local_quantity, \
     remote_quantity, error, user_id, created_at";

#[derive(Debug, sqlx::FromRow)]
struct SyncResultRow {
    id: SyncResultId,
    product_id: Option<ProductId>,
    store_id: StoreId,
    sku: String,
    direction: SyncDirection,
    status: SyncStatus,
    local_quantity: i32,
    remote_quantity: Option<i64>,
    error: Option<String>,
    user_id: Option<UserId>,
    created_at: DateTime<Utc>,
}

impl From<SyncResultRow> for SyncResult {
    fn from(row: SyncResultRow) -> Self {
        Self {
            id: row.id,
            product_id: row.product_id,
            store_id: row.store_id,
            sku: row.sku,
            direction: row.direction,
            status: row.status,
            local_quantity: row.local_quantity,
            remote_quantity: row.remote_quantity,
            error: row.error,
            user_id: row.user_id,
            created_at: row.created_at,
        }
    }
}

/// Number of results with a given status.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct StatusCount {
    pub status: SyncStatus,
    pub count: i64,
}

/// Latest activity per store.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct StoreSyncSummary {
    pub store_id: StoreId,
    pub name: String,
    pub connected: bool,
    pub last_result_at: Option<DateTime<Utc>>,
    pub failures_24h: i64,
}

/// Repository for `sync_results`.
pub struct SyncResultRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> SyncResultRepository<'a> {
    /// Create a new sync result repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Record outcomes in one transaction.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if any insert fails.
    pub async fn record_all(&self, results: &[NewSyncResult]) -> Result<(), RepositoryError> {
        if results.is_empty() {
            return Ok(());
        }
        let mut tx = self.pool.begin().await?;
        for result in results {
            sqlx::query(
                "INSERT INTO sync_results \
                     (product_id, store_id, sku, direction, status, local_quantity, \
                      remote_quantity, error, user_id) \
                 VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)",
            )
            .bind(result.product_id)
            .bind(result.store_id)
            .bind(&result.sku)
            .bind(result.direction)
            .bind(result.status)
            .bind(result.local_quantity)
            .bind(result.remote_quantity)
            .bind(result.error.as_deref())
            .bind(result.user_id)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        Ok(())
    }

    /// List results, newest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list(
        &self,
        filter: SyncResultFilter,
        page: u32,
        per_page: u32,
    ) -> Result<(Vec<SyncResult>, i64), RepositoryError> {
        const WHERE: &str = "WHERE ($1::sync_status IS NULL OR status = $1) \
               AND ($2::int IS NULL OR store_id = $2) \
               AND ($3::int IS NULL OR product_id = $3)";
        let (limit, offset) = limit_offset(page, per_page);

        let rows = sqlx::query_as::<_, SyncResultRow>(&format!(
            "SELECT {RESULT_COLUMNS} FROM sync_results {WHERE} \
             ORDER BY created_at DESC, id DESC LIMIT $4 OFFSET $5"
        ))
        .bind(filter.status)
        .bind(filter.store_id)
        .bind(filter.product_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(self.pool)
        .await?;

        let total: i64 = sqlx::query_scalar(&format!("SELECT COUNT(*) FROM sync_results {WHERE}"))
            .bind(filter.status)
            .bind(filter.store_id)
            .bind(filter.product_id)
            .fetch_one(self.pool)
            .await?;

        Ok((rows.into_iter().map(Into::into).collect(), total))
    }

    /// Counts per status since `since`.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn status_counts_since(
        &self,
        since: DateTime<Utc>,
    ) -> Result<Vec<StatusCount>, RepositoryError> {
        let rows = sqlx::query_as::<_, StatusCount>(
            "SELECT status, COUNT(*) AS count FROM sync_results \
             WHERE created_at >= $1 GROUP BY status ORDER BY status",
        )
        .bind(since)
        .fetch_all(self.pool)
        .await?;
        Ok(rows)
    }

    /// Time of the most recent result in `direction`.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn last_run(
        &self,
        direction: SyncDirection,
    ) -> Result<Option<DateTime<Utc>>, RepositoryError> {
        let last = sqlx::query_scalar("SELECT MAX(created_at) FROM sync_results WHERE direction = $1")
            .bind(direction)
            .fetch_one(self.pool)
            .await?;
        Ok(last)
    }

    /// Per-store summary for the status endpoint.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn store_summaries(&self) -> Result<Vec<StoreSyncSummary>, RepositoryError> {
        let rows = sqlx::query_as::<_, StoreSyncSummary>(
            "SELECT s.id AS store_id, s.name, s.connected, \
                    MAX(r.created_at) AS last_result_at, \
                    COUNT(r.id) FILTER ( \
                        WHERE r.status = 'failed' AND r.created_at > NOW() - INTERVAL '24 hours' \
                    ) AS failures_24h \
             FROM stores s \
             LEFT JOIN sync_results r ON r.store_id = s.id \
             GROUP BY s.id, s.name, s.connected \
             ORDER BY s.name, s.id",
        )
        .fetch_all(self.pool)
        .await?;
        Ok(rows)
    }
}
