//! Shopify store repository.

use chrono::{DateTime, Utc};
use secrecy::{ExposeSecret, SecretString};
use sqlx::PgPool;

use stockmirror_core::{ShopDomain, StoreId, UserId};

use super::RepositoryError;
use crate::models::store::{NewStore, Store, StoreChanges};

const STORE_COLUMNS: &str = "id, name, shopify_domain, access_token, location_id, connected, \
     last_connected_at, manager_id, created_at, updated_at";

#[derive(sqlx::FromRow)]
struct StoreRow {
    id: StoreId,
    name: String,
    shopify_domain: String,
    access_token: String,
    location_id: Option<i64>,
    connected: bool,
    last_connected_at: Option<DateTime<Utc>>,
    manager_id: Option<UserId>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<StoreRow> for Store {
    type Error = RepositoryError;

    fn try_from(row: StoreRow) -> Result<Self, Self::Error> {
        let shopify_domain = ShopDomain::parse(&row.shopify_domain).map_err(|e| {
            RepositoryError::DataCorruption(format!("invalid shop domain in database: {e}"))
        })?;

        Ok(Self {
            id: row.id,
            name: row.name,
            shopify_domain,
            access_token: SecretString::from(row.access_token),
            location_id: row.location_id,
            connected: row.connected,
            last_connected_at: row.last_connected_at,
            manager_id: row.manager_id,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

/// Repository for store database operations.
pub struct StoreRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> StoreRepository<'a> {
    /// Create a new store repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// List stores, optionally only those managed by `manager_id`.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list(&self, manager_id: Option<UserId>) -> Result<Vec<Store>, RepositoryError> {
        let rows = sqlx::query_as::<_, StoreRow>(&format!(
            "SELECT {STORE_COLUMNS} FROM stores \
             WHERE ($1::int IS NULL OR manager_id = $1) ORDER BY name, id"
        ))
        .bind(manager_id)
        .fetch_all(self.pool)
        .await?;

        rows.into_iter().map(TryInto::try_into).collect()
    }

    /// Stores selected for a sync run; `ids = None` selects all, and
    /// `manager_id` keeps only the stores that user manages.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_by_ids(
        &self,
        ids: Option<&[StoreId]>,
        manager_id: Option<UserId>,
    ) -> Result<Vec<Store>, RepositoryError> {
        let rows = sqlx::query_as::<_, StoreRow>(&format!(
            "SELECT {STORE_COLUMNS} FROM stores \
             WHERE ($1::int[] IS NULL OR id = ANY($1)) \
               AND ($2::int IS NULL OR manager_id = $2) \
             ORDER BY id"
        ))
        .bind(ids)
        .bind(manager_id)
        .fetch_all(self.pool)
        .await?;

        rows.into_iter().map(TryInto::try_into).collect()
    }

    /// Get a store by ID.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_by_id(&self, id: StoreId) -> Result<Option<Store>, RepositoryError> {
        let row = sqlx::query_as::<_, StoreRow>(&format!(
            "SELECT {STORE_COLUMNS} FROM stores WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(self.pool)
        .await?;

        row.map(TryInto::try_into).transpose()
    }

    /// Create a store.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the domain is already registered.
    pub async fn create(&self, store: &NewStore) -> Result<Store, RepositoryError> {
        let row = sqlx::query_as::<_, StoreRow>(&format!(
            "INSERT INTO stores (name, shopify_domain, access_token, location_id, manager_id) \
             VALUES ($1, $2, $3, $4, $5) \
             RETURNING {STORE_COLUMNS}"
        ))
        .bind(store.name.trim())
        .bind(store.shopify_domain.as_str())
        .bind(store.access_token.expose_secret())
        .bind(store.location_id)
        .bind(store.manager_id)
        .fetch_one(self.pool)
        .await
        .map_err(|e| RepositoryError::unique(e, "store domain already registered"))?;

        row.try_into()
    }

    /// Apply a partial update. A new domain or token resets `connected`.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the store does not exist.
    /// Returns `RepositoryError::Conflict` if the new domain is taken.
    pub async fn update(
        &self,
        id: StoreId,
        changes: &StoreChanges,
    ) -> Result<Store, RepositoryError> {
        let credentials_changed =
            changes.shopify_domain.is_some() || changes.access_token.is_some();
        let row = sqlx::query_as::<_, StoreRow>(&format!(
            "UPDATE stores SET \
                 name = COALESCE($2, name), \
                 shopify_domain = COALESCE($3, shopify_domain), \
                 access_token = COALESCE($4, access_token), \
                 location_id = COALESCE($5, location_id), \
                 manager_id = COALESCE($6, manager_id), \
                 connected = connected AND NOT $7, \
                 updated_at = NOW() \
             WHERE id = $1 \
             RETURNING {STORE_COLUMNS}"
        ))
        .bind(id)
        .bind(changes.name.as_deref().map(str::trim))
        .bind(changes.shopify_domain.as_ref().map(ShopDomain::as_str))
        .bind(changes.access_token.as_ref().map(|t| t.expose_secret()))
        .bind(changes.location_id)
        .bind(changes.manager_id)
        .bind(credentials_changed)
        .fetch_optional(self.pool)
        .await
        .map_err(|e| RepositoryError::unique(e, "store domain already registered"))?
        .ok_or(RepositoryError::NotFound)?;

        row.try_into()
    }

    /// Delete a store and its sync history.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the store does not exist.
    pub async fn delete(&self, id: StoreId) -> Result<(), RepositoryError> {
        let result = sqlx::query("DELETE FROM stores WHERE id = $1")
            .bind(id)
            .execute(self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    /// Record the outcome of a connection test.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the update fails.
    pub async fn set_connected(&self, id: StoreId, connected: bool) -> Result<(), RepositoryError> {
        sqlx::query(
            "UPDATE stores SET connected = $2, \
                 last_connected_at = CASE WHEN $2 THEN NOW() ELSE last_connected_at END, \
                 updated_at = NOW() \
             WHERE id = $1",
        )
        .bind(id)
        .bind(connected)
        .execute(self.pool)
        .await?;
        Ok(())
    }
}
