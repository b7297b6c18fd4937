//! Stock ledger and quantity mutations.
//!
//! Every quantity change goes through [`apply_movement`]: lock the product
//! row, validate the movement, update the quantity and append the ledger
//! row, all inside the caller's transaction.

use chrono::{DateTime, Utc};
use sqlx::{PgConnection, PgPool};
use thiserror::Error;

use stockmirror_core::{Movement, MovementKind, ProductId, StockError, StockLogId, UserId};

use super::products::{PRODUCT_COLUMNS, ProductRow};
use super::{RepositoryError, limit_offset};
use crate::models::product::Product;
use crate::models::stock::{StockLog, StockLogEntry, StockLogFilter};

/// Why a movement was not applied.
#[derive(Debug, Error)]
pub enum MovementError {
    #[error(transparent)]
    Repository(#[from] RepositoryError),
    #[error(transparent)]
    Stock(#[from] StockError),
}

impl From<sqlx::Error> for MovementError {
    fn from(err: sqlx::Error) -> Self {
        Self::Repository(RepositoryError::Database(err))
    }
}

/// Product after a movement together with the ledger row written for it.
#[derive(Debug, Clone, serde::Serialize)]
pub struct MovementOutcome {
    pub product: Product,
    pub log: StockLog,
}

// =============================================================================
// Internal Row Types
// =============================================================================

const LOG_COLUMNS: &str =
    "id, product_id, movement, quantity, previous_quantity, new_quantity, notes, user_id, created_at";

#[derive(Debug, sqlx::FromRow)]
struct StockLogRow {
    id: StockLogId,
    product_id: ProductId,
    movement: MovementKind,
    quantity: i32,
    previous_quantity: i32,
    new_quantity: i32,
    notes: Option<String>,
    user_id: Option<UserId>,
    created_at: DateTime<Utc>,
}

impl From<StockLogRow> for StockLog {
    fn from(row: StockLogRow) -> Self {
        Self {
            id: row.id,
            product_id: row.product_id,
            movement: row.movement,
            quantity: row.quantity,
            previous_quantity: row.previous_quantity,
            new_quantity: row.new_quantity,
            notes: row.notes,
            user_id: row.user_id,
            created_at: row.created_at,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct StockLogEntryRow {
    #[sqlx(flatten)]
    log: StockLogRow,
    sku: String,
    product_name: String,
    username: Option<String>,
}

impl From<StockLogEntryRow> for StockLogEntry {
    fn from(row: StockLogEntryRow) -> Self {
        Self {
            log: row.log.into(),
            sku: row.sku,
            product_name: row.product_name,
            username: row.username,
        }
    }
}

// =============================================================================
// Transaction-scoped operations
// =============================================================================

/// Append a ledger row.
pub(crate) async fn insert_log(
    conn: &mut PgConnection,
    product_id: ProductId,
    movement: Movement,
    previous_quantity: i32,
    new_quantity: i32,
    notes: Option<&str>,
    user_id: Option<UserId>,
) -> Result<StockLog, RepositoryError> {
    let row = sqlx::query_as::<_, StockLogRow>(&format!(
        "INSERT INTO stock_logs \
             (product_id, movement, quantity, previous_quantity, new_quantity, notes, user_id) \
         VALUES ($1, $2, $3, $4, $5, $6, $7) \
         RETURNING {LOG_COLUMNS}"
    ))
    .bind(product_id)
    .bind(movement.kind())
    .bind(movement.quantity())
    .bind(previous_quantity)
    .bind(new_quantity)
    .bind(notes.map(str::trim).filter(|n| !n.is_empty()))
    .bind(user_id)
    .fetch_one(&mut *conn)
    .await?;

    Ok(row.into())
}

/// Apply `movement` to an active product inside an open transaction.
///
/// The product row is locked with `FOR UPDATE` until the caller commits.
/// Every movement marks the product `needs_sync`.
///
/// # Errors
///
/// Returns `MovementError::Stock` if the movement is invalid for the current
/// quantity, `RepositoryError::NotFound` if the product is missing or inactive.
pub async fn apply_movement(
    conn: &mut PgConnection,
    product_id: ProductId,
    movement: Movement,
    notes: Option<&str>,
    user_id: Option<UserId>,
) -> Result<MovementOutcome, MovementError> {
    let current: i32 = sqlx::query_scalar(
        "SELECT quantity FROM products WHERE id = $1 AND is_active FOR UPDATE",
    )
    .bind(product_id)
    .fetch_optional(&mut *conn)
    .await?
    .ok_or(RepositoryError::NotFound)?;

    let new_quantity = movement.apply(current)?;

    let product = sqlx::query_as::<_, ProductRow>(&format!(
        "UPDATE products SET quantity = $2, needs_sync = TRUE, last_modified = NOW(), \
             updated_at = NOW() \
         WHERE id = $1 \
         RETURNING {PRODUCT_COLUMNS}"
    ))
    .bind(product_id)
    .bind(new_quantity)
    .fetch_one(&mut *conn)
    .await?;

    let log = insert_log(conn, product_id, movement, current, new_quantity, notes, user_id).await?;

    tracing::info!(
        product_id = %product_id,
        movement = %movement.kind(),
        previous = current,
        new = new_quantity,
        user_id = ?user_id.map(|id| id.as_i32()),
        "Stock movement applied"
    );

    Ok(MovementOutcome {
        product: product.try_into()?,
        log,
    })
}

// =============================================================================
// Repository
// =============================================================================

/// Repository for stock movements and the ledger.
pub struct StockRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> StockRepository<'a> {
    /// Create a new stock repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Apply a movement in its own transaction.
    ///
    /// # Errors
    ///
    /// See [`apply_movement`].
    pub async fn apply(
        &self,
        product_id: ProductId,
        movement: Movement,
        notes: Option<&str>,
        user_id: Option<UserId>,
    ) -> Result<MovementOutcome, MovementError> {
        let mut tx = self.pool.begin().await?;
        let outcome = apply_movement(&mut tx, product_id, movement, notes, user_id).await?;
        tx.commit().await?;
        Ok(outcome)
    }

    /// List ledger rows, newest first, with product and user names.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_logs(
        &self,
        filter: StockLogFilter,
        page: u32,
        per_page: u32,
    ) -> Result<(Vec<StockLogEntry>, i64), RepositoryError> {
        const WHERE: &str = "WHERE ($1::int IS NULL OR l.product_id = $1) \
               AND ($2::stock_movement IS NULL OR l.movement = $2) \
               AND ($3::int IS NULL OR l.user_id = $3)";
        let (limit, offset) = limit_offset(page, per_page);

        let rows = sqlx::query_as::<_, StockLogEntryRow>(&format!(
            "SELECT l.id, l.product_id, l.movement, l.quantity, l.previous_quantity, \
                    l.new_quantity, l.notes, l.user_id, l.created_at, \
                    p.sku, p.product_name, u.username \
             FROM stock_logs l \
             JOIN products p ON p.id = l.product_id \
             LEFT JOIN users u ON u.id = l.user_id \
             {WHERE} \
             ORDER BY l.created_at DESC, l.id DESC \
             LIMIT $4 OFFSET $5"
        ))
        .bind(filter.product_id)
        .bind(filter.movement)
        .bind(filter.user_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(self.pool)
        .await?;

        let total: i64 = sqlx::query_scalar(&format!("SELECT COUNT(*) FROM stock_logs l {WHERE}"))
            .bind(filter.product_id)
            .bind(filter.movement)
            .bind(filter.user_id)
            .fetch_one(self.pool)
            .await?;

        Ok((rows.into_iter().map(Into::into).collect(), total))
    }
}
