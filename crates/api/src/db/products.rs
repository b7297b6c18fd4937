//! Product repository.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::PgPool;

use stockmirror_core::{Movement, ProductId, Sku, UserId};

use super::{RepositoryError, limit_offset, stock};
use crate::models::product::{NewProduct, Product, ProductChanges, ProductFilter};

pub(crate) const PRODUCT_COLUMNS: &str = "id, sku, product_name, category, price, quantity, \
     description, image_url, is_active, needs_sync, last_modified, last_synced, created_at, \
     updated_at";

const FILTER_CLAUSE: &str = "WHERE ($1::text IS NULL OR sku ILIKE $1 OR product_name ILIKE $1) \
       AND ($2::text IS NULL OR category = $2) \
       AND ($3::bool IS NULL OR needs_sync = $3) \
       AND ($4::int IS NULL OR quantity <= $4) \
       AND ($5 OR is_active)";

// =============================================================================
// Internal Row Types
// =============================================================================

#[derive(Debug, sqlx::FromRow)]
pub(crate) struct ProductRow {
    id: ProductId,
    sku: String,
    product_name: String,
    category: Option<String>,
    price: Decimal,
    quantity: i32,
    description: Option<String>,
    image_url: Option<String>,
    is_active: bool,
    needs_sync: bool,
    last_modified: DateTime<Utc>,
    last_synced: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<ProductRow> for Product {
    type Error = RepositoryError;

    fn try_from(row: ProductRow) -> Result<Self, Self::Error> {
        let sku = Sku::parse(&row.sku).map_err(|e| {
            RepositoryError::DataCorruption(format!("invalid sku in database: {e}"))
        })?;

        Ok(Self {
            id: row.id,
            sku,
            product_name: row.product_name,
            category: row.category,
            price: row.price,
            quantity: row.quantity,
            description: row.description,
            image_url: row.image_url,
            is_active: row.is_active,
            needs_sync: row.needs_sync,
            last_modified: row.last_modified,
            last_synced: row.last_synced,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

/// Escape LIKE wildcards and wrap the term for a substring match.
fn like_pattern(term: &str) -> String {
    let escaped = term
        .trim()
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{escaped}%")
}

// =============================================================================
// Repository
// =============================================================================

/// Repository for product database operations.
pub struct ProductRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> ProductRepository<'a> {
    /// Create a new product repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// List products matching `filter`, returning the page and the total count.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list(
        &self,
        filter: &ProductFilter,
        page: u32,
        per_page: u32,
    ) -> Result<(Vec<Product>, i64), RepositoryError> {
        let (limit, offset) = limit_offset(page, per_page);
        let search = filter
            .search
            .as_deref()
            .filter(|s| !s.trim().is_empty())
            .map(like_pattern);

        let rows = sqlx::query_as::<_, ProductRow>(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM products {FILTER_CLAUSE} \
             ORDER BY product_name ASC, id ASC LIMIT $6 OFFSET $7"
        ))
        .bind(search.as_deref())
        .bind(filter.category.as_deref())
        .bind(filter.needs_sync)
        .bind(filter.low_stock_threshold)
        .bind(filter.include_inactive)
        .bind(limit)
        .bind(offset)
        .fetch_all(self.pool)
        .await?;

        let total: i64 =
            sqlx::query_scalar(&format!("SELECT COUNT(*) FROM products {FILTER_CLAUSE}"))
                .bind(search.as_deref())
                .bind(filter.category.as_deref())
                .bind(filter.needs_sync)
                .bind(filter.low_stock_threshold)
                .bind(filter.include_inactive)
                .fetch_one(self.pool)
                .await?;

        let items = rows
            .into_iter()
            .map(TryInto::try_into)
            .collect::<Result<Vec<_>, _>>()?;
        Ok((items, total))
    }

    /// Distinct categories of active products.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn categories(&self) -> Result<Vec<String>, RepositoryError> {
        let categories = sqlx::query_scalar(
            "SELECT DISTINCT category FROM products \
             WHERE is_active AND category IS NOT NULL AND category <> '' \
             ORDER BY category",
        )
        .fetch_all(self.pool)
        .await?;
        Ok(categories)
    }

    /// Get a product by ID.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_by_id(&self, id: ProductId) -> Result<Option<Product>, RepositoryError> {
        let row = sqlx::query_as::<_, ProductRow>(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM products WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(self.pool)
        .await?;

        row.map(TryInto::try_into).transpose()
    }

    /// Get a product by SKU, ignoring case and surrounding whitespace.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_by_sku(&self, sku: &str) -> Result<Option<Product>, RepositoryError> {
        let row = sqlx::query_as::<_, ProductRow>(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM products WHERE LOWER(sku) = LOWER($1)"
        ))
        .bind(sku.trim())
        .fetch_optional(self.pool)
        .await?;

        row.map(TryInto::try_into).transpose()
    }

    /// Create a product. A positive initial quantity is recorded as an
    /// `adjust` ledger row in the same transaction.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the SKU exists (case-insensitive).
    /// Returns `RepositoryError::Database` for other database errors.
    pub async fn create(
        &self,
        product: &NewProduct,
        user_id: Option<UserId>,
    ) -> Result<Product, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query_as::<_, ProductRow>(&format!(
            "INSERT INTO products (sku, product_name, category, price, quantity, description, image_url) \
             VALUES ($1, $2, $3, $4, $5, $6, $7) \
             RETURNING {PRODUCT_COLUMNS}"
        ))
        .bind(product.sku.as_str())
        .bind(product.product_name.trim())
        .bind(product.category.as_deref())
        .bind(product.price)
        .bind(product.quantity)
        .bind(product.description.as_deref())
        .bind(product.image_url.as_deref())
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| RepositoryError::unique(e, "sku already exists"))?;

        if product.quantity > 0 {
            stock::insert_log(
                &mut tx,
                row.id,
                Movement::Adjust(product.quantity),
                0,
                product.quantity,
                Some("initial quantity"),
                user_id,
            )
            .await?;
        }

        tx.commit().await?;
        row.try_into()
    }

    /// Update metadata. Quantity is only changed through stock movements.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the product does not exist.
    /// Returns `RepositoryError::Conflict` if the new SKU is taken.
    pub async fn update(
        &self,
        id: ProductId,
        changes: &ProductChanges,
    ) -> Result<Product, RepositoryError> {
        let row = sqlx::query_as::<_, ProductRow>(&format!(
            "UPDATE products SET \
                 sku = COALESCE($2, sku), \
                 product_name = COALESCE($3, product_name), \
                 category = COALESCE($4, category), \
                 price = COALESCE($5, price), \
                 description = COALESCE($6, description), \
                 image_url = COALESCE($7, image_url), \
                 is_active = COALESCE($8, is_active), \
                 needs_sync = TRUE, \
                 last_modified = NOW(), \
                 updated_at = NOW() \
             WHERE id = $1 \
             RETURNING {PRODUCT_COLUMNS}"
        ))
        .bind(id)
        .bind(changes.sku.as_ref().map(Sku::as_str))
        .bind(changes.product_name.as_deref())
        .bind(changes.category.as_deref())
        .bind(changes.price)
        .bind(changes.description.as_deref())
        .bind(changes.image_url.as_deref())
        .bind(changes.is_active)
        .fetch_optional(self.pool)
        .await
        .map_err(|e| RepositoryError::unique(e, "sku already exists"))?
        .ok_or(RepositoryError::NotFound)?;

        row.try_into()
    }

    /// Soft delete: the row and its ledger stay, the product leaves listings.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the product does not exist.
    pub async fn deactivate(&self, id: ProductId) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            "UPDATE products SET is_active = FALSE, updated_at = NOW() WHERE id = $1",
        )
        .bind(id)
        .execute(self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    /// Active products selected for a push.
    ///
    /// `ids = None` selects every active product.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_for_sync(
        &self,
        ids: Option<&[ProductId]>,
        only_needs_sync: bool,
    ) -> Result<Vec<Product>, RepositoryError> {
        let rows = sqlx::query_as::<_, ProductRow>(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM products \
             WHERE is_active \
               AND ($1::int[] IS NULL OR id = ANY($1)) \
               AND (NOT $2 OR needs_sync) \
             ORDER BY id"
        ))
        .bind(ids)
        .bind(only_needs_sync)
        .fetch_all(self.pool)
        .await?;

        rows.into_iter().map(TryInto::try_into).collect()
    }

    /// Clear `needs_sync` on products pushed everywhere.
    ///
    /// `ids[i]` is only cleared while its `last_modified` still equals
    /// `loaded_at[i]`, the value read before the push. A product changed
    /// during the push keeps the flag; its new quantity has not been pushed.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn mark_synced(
        &self,
        ids: &[ProductId],
        loaded_at: &[DateTime<Utc>],
    ) -> Result<u64, RepositoryError> {
        if ids.is_empty() {
            return Ok(0);
        }
        let result = sqlx::query(
            "UPDATE products p SET needs_sync = FALSE, last_synced = NOW() \
             FROM UNNEST($1::int[], $2::timestamptz[]) AS s(id, last_modified) \
             WHERE p.id = s.id AND p.last_modified = s.last_modified",
        )
        .bind(ids)
        .bind(loaded_at)
        .execute(self.pool)
        .await?;
        Ok(result.rows_affected())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_like_pattern_escapes_wildcards() {
        assert_eq!(like_pattern(" tee "), "%tee%");
        assert_eq!(like_pattern("50%_off"), "%50\\%\\_off%");
    }
}
