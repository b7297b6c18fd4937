//! Mobile transactions and activity feed.
//!
//! A transaction moves `pending -> approved | rejected` exactly once. The
//! transition and, on approval, the stock movement commit together.

use chrono::{DateTime, Utc};
use serde_json::json;
use sqlx::{PgConnection, PgPool};
use thiserror::Error;

use stockmirror_core::{
    InvalidTransition, MobileActivityId, MobileTransactionId, ProductId, StockDirection,
    StockLogId, TransactionStatus, UserId,
};

use super::stock::{MovementError, MovementOutcome, apply_movement};
use super::{RepositoryError, limit_offset};
use crate::models::mobile::{MobileActivity, MobileTransaction};

const TX_COLUMNS: &str = "id, product_id, direction, quantity, notes, status, requested_by, \
     reviewed_by, review_notes, stock_log_id, created_at, reviewed_at";

/// Why a review was not recorded.
#[derive(Debug, Error)]
pub enum ReviewError {
    #[error(transparent)]
    Movement(#[from] MovementError),
    #[error(transparent)]
    Transition(#[from] InvalidTransition),
}

impl From<RepositoryError> for ReviewError {
    fn from(err: RepositoryError) -> Self {
        Self::Movement(err.into())
    }
}

impl From<sqlx::Error> for ReviewError {
    fn from(err: sqlx::Error) -> Self {
        Self::Movement(err.into())
    }
}

// =============================================================================
// Internal Row Types
// =============================================================================

#[derive(Debug, sqlx::FromRow)]
struct MobileTransactionRow {
    id: MobileTransactionId,
    product_id: ProductId,
    direction: StockDirection,
    quantity: i32,
    notes: Option<String>,
    status: TransactionStatus,
    requested_by: Option<UserId>,
    reviewed_by: Option<UserId>,
    review_notes: Option<String>,
    stock_log_id: Option<StockLogId>,
    created_at: DateTime<Utc>,
    reviewed_at: Option<DateTime<Utc>>,
}

impl From<MobileTransactionRow> for MobileTransaction {
    fn from(row: MobileTransactionRow) -> Self {
        Self {
            id: row.id,
            product_id: row.product_id,
            direction: row.direction,
            quantity: row.quantity,
            notes: row.notes,
            status: row.status,
            requested_by: row.requested_by,
            reviewed_by: row.reviewed_by,
            review_notes: row.review_notes,
            stock_log_id: row.stock_log_id,
            created_at: row.created_at,
            reviewed_at: row.reviewed_at,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct MobileActivityRow {
    id: MobileActivityId,
    user_id: Option<UserId>,
    activity: String,
    details: serde_json::Value,
    created_at: DateTime<Utc>,
}

impl From<MobileActivityRow> for MobileActivity {
    fn from(row: MobileActivityRow) -> Self {
        Self {
            id: row.id,
            user_id: row.user_id,
            activity: row.activity,
            details: row.details,
            created_at: row.created_at,
        }
    }
}

async fn insert_activity(
    conn: &mut PgConnection,
    user_id: Option<UserId>,
    activity: &str,
    details: &serde_json::Value,
) -> Result<MobileActivity, RepositoryError> {
    let row = sqlx::query_as::<_, MobileActivityRow>(
        "INSERT INTO mobile_activities (user_id, activity, details) VALUES ($1, $2, $3) \
         RETURNING id, user_id, activity, details, created_at",
    )
    .bind(user_id)
    .bind(activity)
    .bind(details)
    .fetch_one(&mut *conn)
    .await?;
    Ok(row.into())
}

/// Result of approving or rejecting a transaction.
#[derive(Debug, Clone, serde::Serialize)]
pub struct Review {
    pub transaction: MobileTransaction,
    /// Present when the transaction was approved.
    pub movement: Option<MovementOutcome>,
}

// =============================================================================
// Repository
// =============================================================================

/// Repository for the mobile workflow.
pub struct MobileRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> MobileRepository<'a> {
    /// Create a new mobile repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Create a pending transaction and log the request as an activity.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if either insert fails.
    pub async fn create_transaction(
        &self,
        product_id: ProductId,
        direction: StockDirection,
        quantity: i32,
        notes: Option<&str>,
        requested_by: UserId,
    ) -> Result<MobileTransaction, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query_as::<_, MobileTransactionRow>(&format!(
            "INSERT INTO mobile_transactions (product_id, direction, quantity, notes, requested_by) \
             VALUES ($1, $2, $3, $4, $5) \
             RETURNING {TX_COLUMNS}"
        ))
        .bind(product_id)
        .bind(direction)
        .bind(quantity)
        .bind(notes)
        .bind(requested_by)
        .fetch_one(&mut *tx)
        .await?;

        insert_activity(
            &mut tx,
            Some(requested_by),
            "transaction_requested",
            &json!({
                "transaction_id": row.id,
                "product_id": product_id,
                "direction": direction,
                "quantity": quantity,
            }),
        )
        .await?;

        tx.commit().await?;
        Ok(row.into())
    }

    /// Get a transaction by ID.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_transaction(
        &self,
        id: MobileTransactionId,
    ) -> Result<Option<MobileTransaction>, RepositoryError> {
        let row = sqlx::query_as::<_, MobileTransactionRow>(&format!(
            "SELECT {TX_COLUMNS} FROM mobile_transactions WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(self.pool)
        .await?;
        Ok(row.map(Into::into))
    }

    /// List transactions, newest first.
    ///
    /// `requested_by = None` lists every user's transactions.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_transactions(
        &self,
        status: Option<TransactionStatus>,
        requested_by: Option<UserId>,
        page: u32,
        per_page: u32,
    ) -> Result<(Vec<MobileTransaction>, i64), RepositoryError> {
        const WHERE: &str = "WHERE ($1::mobile_transaction_status IS NULL OR status = $1) \
               AND ($2::int IS NULL OR requested_by = $2)";
        let (limit, offset) = limit_offset(page, per_page);

        let rows = sqlx::query_as::<_, MobileTransactionRow>(&format!(
            "SELECT {TX_COLUMNS} FROM mobile_transactions {WHERE} \
             ORDER BY created_at DESC, id DESC LIMIT $3 OFFSET $4"
        ))
        .bind(status)
        .bind(requested_by)
        .bind(limit)
        .bind(offset)
        .fetch_all(self.pool)
        .await?;

        let total: i64 =
            sqlx::query_scalar(&format!("SELECT COUNT(*) FROM mobile_transactions {WHERE}"))
                .bind(status)
                .bind(requested_by)
                .fetch_one(self.pool)
                .await?;

        Ok((rows.into_iter().map(Into::into).collect(), total))
    }

    /// Approve or reject a pending transaction.
    ///
    /// Locks the transaction row, validates the transition and, when
    /// approving, applies the stock movement in the same database
    /// transaction. Nothing is written if any step fails.
    ///
    /// # Errors
    ///
    /// Returns `ReviewError::Transition` if the transaction is not pending,
    /// `ReviewError::Movement` if the stock movement is refused.
    pub async fn review(
        &self,
        id: MobileTransactionId,
        decision: TransactionStatus,
        reviewer: UserId,
        review_notes: Option<&str>,
    ) -> Result<Review, ReviewError> {
        let mut tx = self.pool.begin().await?;

        let current = sqlx::query_as::<_, MobileTransactionRow>(&format!(
            "SELECT {TX_COLUMNS} FROM mobile_transactions WHERE id = $1 FOR UPDATE"
        ))
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(RepositoryError::NotFound)?;

        let next = current.status.transition(decision)?;

        let movement = if next == TransactionStatus::Approved {
            let note = format!("mobile transaction #{id}");
            Some(
                apply_movement(
                    &mut tx,
                    current.product_id,
                    current.direction.movement(current.quantity),
                    Some(&note),
                    Some(reviewer),
                )
                .await?,
            )
        } else {
            None
        };

        let row = sqlx::query_as::<_, MobileTransactionRow>(&format!(
            "UPDATE mobile_transactions SET \
                 status = $2, reviewed_by = $3, review_notes = $4, stock_log_id = $5, \
                 reviewed_at = NOW() \
             WHERE id = $1 \
             RETURNING {TX_COLUMNS}"
        ))
        .bind(id)
        .bind(next)
        .bind(reviewer)
        .bind(review_notes)
        .bind(movement.as_ref().map(|m| m.log.id))
        .fetch_one(&mut *tx)
        .await?;

        let activity = if next == TransactionStatus::Approved {
            "transaction_approved"
        } else {
            "transaction_rejected"
        };
        insert_activity(
            &mut tx,
            Some(reviewer),
            activity,
            &json!({
                "transaction_id": id,
                "product_id": row.product_id,
                "quantity": row.quantity,
            }),
        )
        .await?;

        tx.commit().await?;

        tracing::info!(transaction_id = %id, status = %next, reviewer = %reviewer, "Mobile transaction reviewed");

        Ok(Review {
            transaction: row.into(),
            movement,
        })
    }

    /// Record an activity reported by the app.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the insert fails.
    pub async fn record_activity(
        &self,
        user_id: UserId,
        activity: &str,
        details: &serde_json::Value,
    ) -> Result<MobileActivity, RepositoryError> {
        let mut conn = self.pool.acquire().await?;
        insert_activity(&mut conn, Some(user_id), activity, details).await
    }

    /// List activities, newest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_activities(
        &self,
        user_id: Option<UserId>,
        page: u32,
        per_page: u32,
    ) -> Result<(Vec<MobileActivity>, i64), RepositoryError> {
        let (limit, offset) = limit_offset(page, per_page);
        let rows = sqlx::query_as::<_, MobileActivityRow>(
            "SELECT id, user_id, activity, details, created_at FROM mobile_activities \
             WHERE ($1::int IS NULL OR user_id = $1) \
             ORDER BY created_at DESC, id DESC LIMIT $2 OFFSET $3",
        )
        .bind(user_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(self.pool)
        .await?;

        let total: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM mobile_activities WHERE ($1::int IS NULL OR user_id = $1)",
        )
        .bind(user_id)
        .fetch_one(self.pool)
        .await?;

        Ok((rows.into_iter().map(Into::into).collect(), total))
    }
}
