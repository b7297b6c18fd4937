//! Stock reconciliation between the local catalog and Shopify stores.
//!
//! Three operations share one lookup path:
//!
//! - **compare** reads each store's total for a SKU and reports whether it
//!   matches the local quantity
//! - **push** writes the local quantity to each store's canonical variant at
//!   the store's location, then reads it back
//! - **pull** replaces the local quantity with one store's total through a
//!   `sync_pull` ledger movement
//!
//! Stores are processed concurrently (bounded), products within a store
//! sequentially so that store's rate limiter paces every call. Every
//! product/store outcome is persisted to `sync_results`.

use std::future::Future;

use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use thiserror::Error;
use tracing::{info, instrument, warn};

use stockmirror_core::{
    Movement, ProductId, Sku, StoreId, SyncDirection, SyncStatus, UserId,
};

use crate::db::stock::{MovementError, MovementOutcome};
use crate::db::{
    ProductRepository, RepositoryError, StockRepository, StoreRepository, SyncResultRepository,
};
use crate::models::product::Product;
use crate::models::store::Store;
use crate::models::sync::NewSyncResult;
use crate::shopify::{ShopifyClient, ShopifyError, ShopifyRegistry, SkuInventory};

/// Errors that abort a whole reconciliation request.
///
/// Per-store failures do not abort; they become `failed` outcomes.
#[derive(Debug, Error)]
pub enum ReconcileError {
    #[error(transparent)]
    Repository(#[from] RepositoryError),
    #[error(transparent)]
    Shopify(#[from] ShopifyError),
    #[error(transparent)]
    Movement(#[from] MovementError),
}

// =============================================================================
// Gateway
// =============================================================================

/// The store operations reconciliation needs.
pub trait InventoryGateway: Send + Sync {
    /// Look a SKU up across the store's catalog.
    fn find_sku(
        &self,
        sku: &Sku,
    ) -> impl Future<Output = Result<SkuInventory, ShopifyError>> + Send;

    /// Set the available quantity of an item at a location.
    fn set_available(
        &self,
        inventory_item_id: i64,
        location_id: i64,
        available: i64,
    ) -> impl Future<Output = Result<(), ShopifyError>> + Send;

    /// Read back the available quantity of an item at a location.
    fn available_at(
        &self,
        inventory_item_id: i64,
        location_id: i64,
    ) -> impl Future<Output = Result<Option<i64>, ShopifyError>> + Send;

    /// The shop's first active location.
    fn primary_location(&self) -> impl Future<Output = Result<Option<i64>, ShopifyError>> + Send;
}

impl InventoryGateway for ShopifyClient {
    async fn find_sku(&self, sku: &Sku) -> Result<SkuInventory, ShopifyError> {
        Self::find_sku(self, sku).await
    }

    async fn set_available(
        &self,
        inventory_item_id: i64,
        location_id: i64,
        available: i64,
    ) -> Result<(), ShopifyError> {
        self.set_inventory_level(inventory_item_id, location_id, available)
            .await
            .map(|_| ())
    }

    async fn available_at(
        &self,
        inventory_item_id: i64,
        location_id: i64,
    ) -> Result<Option<i64>, ShopifyError> {
        Self::available_at(self, inventory_item_id, location_id).await
    }

    async fn primary_location(&self) -> Result<Option<i64>, ShopifyError> {
        self.primary_location_id().await
    }
}

/// A store to reconcile against.
pub struct StoreTarget<G> {
    pub store_id: StoreId,
    pub name: String,
    /// Location configured on the store record.
    pub location_id: Option<i64>,
    pub gateway: G,
}

// =============================================================================
// Reports
// =============================================================================

/// Outcome for one product in one store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Outcome {
    pub product_id: ProductId,
    pub sku: String,
    pub status: SyncStatus,
    pub local_quantity: i32,
    /// Store quantity before any write (push: at the chosen location;
    /// compare and pull: total across variants and locations).
    pub remote_quantity: Option<i64>,
    pub variant_id: Option<i64>,
    pub location_id: Option<i64>,
    /// Matches beyond the canonical variant, left untouched.
    pub extra_variants: usize,
    /// Whether the SKU lookup reached the end of the catalog. `false` means
    /// matches past the page cap were not seen. `None` when no lookup
    /// finished.
    pub catalog_complete: Option<bool>,
    pub error: Option<String>,
}

impl Outcome {
    fn new(product: &Product, status: SyncStatus) -> Self {
        Self {
            product_id: product.id,
            sku: product.sku.as_str().to_string(),
            status,
            local_quantity: product.quantity,
            remote_quantity: None,
            variant_id: None,
            location_id: None,
            extra_variants: 0,
            catalog_complete: None,
            error: None,
        }
    }

    fn failed(product: &Product, error: impl std::fmt::Display) -> Self {
        Self {
            error: Some(error.to_string()),
            ..Self::new(product, SyncStatus::Failed)
        }
    }

    fn missing(product: &Product, inventory: &SkuInventory) -> Self {
        let status = if inventory.complete {
            SyncStatus::NotFound
        } else {
            SyncStatus::Incomplete
        };
        Self {
            catalog_complete: Some(inventory.complete),
            ..Self::new(product, status)
        }
    }
}

/// Outcomes for one store.
#[derive(Debug, Clone, Serialize)]
pub struct StoreReport {
    pub store_id: StoreId,
    pub store_name: String,
    pub outcomes: Vec<Outcome>,
}

/// Count of outcomes per status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SyncTotals {
    pub in_sync: usize,
    pub updated: usize,
    pub mismatch: usize,
    pub not_found: usize,
    pub incomplete: usize,
    pub failed: usize,
}

impl SyncTotals {
    fn record(&mut self, status: SyncStatus) {
        match status {
            SyncStatus::InSync => self.in_sync += 1,
            SyncStatus::Updated => self.updated += 1,
            SyncStatus::Mismatch => self.mismatch += 1,
            SyncStatus::NotFound => self.not_found += 1,
            SyncStatus::Incomplete => self.incomplete += 1,
            SyncStatus::Failed => self.failed += 1,
        }
    }

    /// Tally every outcome in `reports`.
    #[must_use]
    pub fn from_reports(reports: &[StoreReport]) -> Self {
        let mut totals = Self::default();
        for outcome in reports.iter().flat_map(|r| &r.outcomes) {
            totals.record(outcome.status);
        }
        totals
    }
}

/// Result of a compare or push run.
#[derive(Debug, Clone, Serialize)]
pub struct SyncReport {
    pub direction: SyncDirection,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub products: usize,
    pub totals: SyncTotals,
    /// Products whose `needs_sync` flag was cleared.
    pub products_marked_synced: u64,
    pub stores: Vec<StoreReport>,
}

/// Result of a pull.
#[derive(Debug, Clone, Serialize)]
pub struct PullReport {
    pub store_id: StoreId,
    pub outcome: Outcome,
    /// Present when the local quantity changed.
    pub movement: Option<MovementOutcome>,
}

/// Which products and stores a push covers.
#[derive(Debug, Clone, Deserialize)]
pub struct PushRequest {
    #[serde(default)]
    pub product_ids: Option<Vec<ProductId>>,
    #[serde(default)]
    pub store_ids: Option<Vec<StoreId>>,
    #[serde(default = "default_only_needs_sync")]
    pub only_needs_sync: bool,
}

const fn default_only_needs_sync() -> bool {
    true
}

impl Default for PushRequest {
    fn default() -> Self {
        Self {
            product_ids: None,
            store_ids: None,
            only_needs_sync: true,
        }
    }
}

// =============================================================================
// Per-product operations
// =============================================================================

/// Compare one product's local quantity with a store's total.
pub async fn compare_product<G: InventoryGateway>(gateway: &G, product: &Product) -> Outcome {
    let inventory = match gateway.find_sku(&product.sku).await {
        Ok(inventory) => inventory,
        Err(e) => return Outcome::failed(product, e),
    };
    if !inventory.found {
        return Outcome::missing(product, &inventory);
    }

    Outcome {
        remote_quantity: Some(inventory.total_available),
        variant_id: inventory.canonical_variant().map(|v| v.variant_id),
        extra_variants: inventory.variants.len().saturating_sub(1),
        catalog_complete: Some(inventory.complete),
        ..Outcome::new(
            product,
            SyncStatus::from_quantities(i64::from(product.quantity), inventory.total_available),
        )
    }
}

/// Write one product's local quantity to a store and verify it.
pub async fn push_product<G: InventoryGateway>(
    gateway: &G,
    configured_location: Option<i64>,
    product: &Product,
) -> Outcome {
    let inventory = match gateway.find_sku(&product.sku).await {
        Ok(inventory) => inventory,
        Err(e) => return Outcome::failed(product, e),
    };
    let Some(variant) = inventory.canonical_variant() else {
        return Outcome::missing(product, &inventory);
    };

    let location_id = match configured_location
        .or_else(|| variant.levels.first().map(|l| l.location_id))
    {
        Some(id) => id,
        None => match gateway.primary_location().await {
            Ok(Some(id)) => id,
            Ok(None) => return Outcome::failed(product, "store has no active location"),
            Err(e) => return Outcome::failed(product, e),
        },
    };

    let local = i64::from(product.quantity);
    let current = variant
        .levels
        .iter()
        .find(|l| l.location_id == location_id)
        .map(|l| l.available);

    let base = Outcome {
        remote_quantity: current,
        variant_id: Some(variant.variant_id),
        location_id: Some(location_id),
        extra_variants: inventory.variants.len().saturating_sub(1),
        catalog_complete: Some(inventory.complete),
        ..Outcome::new(product, SyncStatus::InSync)
    };

    if current == Some(local) {
        return base;
    }

    if let Err(e) = gateway
        .set_available(variant.inventory_item_id, location_id, local)
        .await
    {
        return Outcome {
            status: SyncStatus::Failed,
            error: Some(e.to_string()),
            ..base
        };
    }

    match gateway
        .available_at(variant.inventory_item_id, location_id)
        .await
    {
        Ok(Some(after)) if after == local => Outcome {
            status: SyncStatus::Updated,
            ..base
        },
        Ok(after) => Outcome {
            status: SyncStatus::Mismatch,
            error: Some(format!(
                "wrote {local}, store reports {}",
                after.map_or_else(|| "nothing".to_string(), |q| q.to_string())
            )),
            ..base
        },
        Err(e) => Outcome {
            status: SyncStatus::Failed,
            error: Some(format!("write sent but not verified: {e}")),
            ..base
        },
    }
}

/// Local quantity to store after pulling `total` units: negative totals
/// (oversold) become zero.
#[must_use]
pub fn pulled_quantity(total: i64) -> i32 {
    i32::try_from(total.max(0)).unwrap_or(i32::MAX)
}

// =============================================================================
// Fan-out
// =============================================================================

async fn push_target<G: InventoryGateway>(
    target: &StoreTarget<G>,
    products: &[Product],
) -> StoreReport {
    let mut outcomes = Vec::with_capacity(products.len());
    for product in products {
        outcomes.push(push_product(&target.gateway, target.location_id, product).await);
    }
    log_store_summary(target, &outcomes, SyncDirection::Push);
    StoreReport {
        store_id: target.store_id,
        store_name: target.name.clone(),
        outcomes,
    }
}

async fn compare_target<G: InventoryGateway>(
    target: &StoreTarget<G>,
    product: &Product,
) -> StoreReport {
    let outcome = compare_product(&target.gateway, product).await;
    log_store_summary(target, std::slice::from_ref(&outcome), SyncDirection::Compare);
    StoreReport {
        store_id: target.store_id,
        store_name: target.name.clone(),
        outcomes: vec![outcome],
    }
}

/// Push `products` to every target, at most `concurrency` stores at once.
pub async fn push_stores<G: InventoryGateway>(
    targets: &[StoreTarget<G>],
    products: &[Product],
    concurrency: usize,
) -> Vec<StoreReport> {
    let pending: Vec<_> = targets
        .iter()
        .map(|target| push_target(target, products))
        .collect();
    let mut reports: Vec<StoreReport> = stream::iter(pending)
        .buffer_unordered(concurrency.max(1))
        .collect()
        .await;
    reports.sort_by_key(|r| r.store_id);
    reports
}

/// Compare `product` against every target concurrently.
pub async fn compare_stores<G: InventoryGateway>(
    targets: &[StoreTarget<G>],
    product: &Product,
    concurrency: usize,
) -> Vec<StoreReport> {
    let pending: Vec<_> = targets
        .iter()
        .map(|target| compare_target(target, product))
        .collect();
    let mut reports: Vec<StoreReport> = stream::iter(pending)
        .buffer_unordered(concurrency.max(1))
        .collect()
        .await;
    reports.sort_by_key(|r| r.store_id);
    reports
}

fn log_store_summary<G>(target: &StoreTarget<G>, outcomes: &[Outcome], direction: SyncDirection) {
    let failed = outcomes
        .iter()
        .filter(|o| o.status == SyncStatus::Failed)
        .count();
    if failed > 0 {
        warn!(
            store_id = %target.store_id,
            store = %target.name,
            ?direction,
            failed,
            total = outcomes.len(),
            "Store reconciliation had failures"
        );
    } else {
        info!(
            store_id = %target.store_id,
            store = %target.name,
            ?direction,
            total = outcomes.len(),
            "Store reconciled"
        );
    }
}

/// Products settled (`in_sync` or `updated`) in every report.
#[must_use]
pub fn settled_products(reports: &[StoreReport], products: &[Product]) -> Vec<ProductId> {
    if reports.is_empty() {
        return Vec::new();
    }
    products
        .iter()
        .map(|p| p.id)
        .filter(|id| {
            reports.iter().all(|report| {
                report
                    .outcomes
                    .iter()
                    .any(|o| o.product_id == *id && o.status.is_settled())
            })
        })
        .collect()
}

/// `(id, last_modified)` of the settled products as they were loaded, in
/// the column layout `mark_synced` binds.
fn settled_stamps(
    settled: &[ProductId],
    products: &[Product],
) -> (Vec<ProductId>, Vec<DateTime<Utc>>) {
    products
        .iter()
        .filter(|p| settled.contains(&p.id))
        .map(|p| (p.id, p.last_modified))
        .unzip()
}

/// Whether a run scoped to `manager`'s stores may touch `store`; `None`
/// reaches every store.
fn in_scope(manager: Option<UserId>, store: &Store) -> bool {
    manager.is_none_or(|id| store.manager_id == Some(id))
}

fn to_results(
    reports: &[StoreReport],
    direction: SyncDirection,
    user_id: Option<UserId>,
) -> Vec<NewSyncResult> {
    reports
        .iter()
        .flat_map(|report| {
            report.outcomes.iter().map(move |o| NewSyncResult {
                product_id: Some(o.product_id),
                store_id: report.store_id,
                sku: o.sku.clone(),
                direction,
                status: o.status,
                local_quantity: o.local_quantity,
                remote_quantity: o.remote_quantity,
                error: o.error.clone(),
                user_id,
            })
        })
        .collect()
}

// =============================================================================
// Service
// =============================================================================

/// Runs reconciliation against the database and the store registry.
pub struct Reconciler<'a> {
    pool: &'a PgPool,
    registry: &'a ShopifyRegistry,
    concurrency: usize,
    /// Only stores with this manager; `None` for every store.
    manager: Option<UserId>,
}

impl<'a> Reconciler<'a> {
    /// Create a reconciler.
    #[must_use]
    pub const fn new(pool: &'a PgPool, registry: &'a ShopifyRegistry, concurrency: usize) -> Self {
        Self {
            pool,
            registry,
            concurrency,
            manager: None,
        }
    }

    /// Limit the run to stores managed by `manager` (`None` lifts the limit).
    #[must_use]
    pub const fn managed_by(mut self, manager: Option<UserId>) -> Self {
        self.manager = manager;
        self
    }

    async fn targets(&self, stores: Vec<Store>) -> Vec<StoreTarget<ShopifyClient>> {
        let mut targets = Vec::with_capacity(stores.len());
        for store in stores {
            let gateway = self.registry.client_for(&store).await;
            targets.push(StoreTarget {
                store_id: store.id,
                name: store.name,
                location_id: store.location_id,
                gateway,
            });
        }
        targets
    }

    /// Compare one SKU against every store.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if no product has the SKU.
    #[instrument(skip(self))]
    pub async fn compare_sku(
        &self,
        sku: &str,
        user_id: Option<UserId>,
    ) -> Result<SyncReport, ReconcileError> {
        let started_at = Utc::now();
        let product = ProductRepository::new(self.pool)
            .get_by_sku(sku)
            .await?
            .ok_or(RepositoryError::NotFound)?;
        let stores = StoreRepository::new(self.pool)
            .list_by_ids(None, self.manager)
            .await?;
        let targets = self.targets(stores).await;

        let reports = compare_stores(&targets, &product, self.concurrency).await;
        SyncResultRepository::new(self.pool)
            .record_all(&to_results(&reports, SyncDirection::Compare, user_id))
            .await?;

        Ok(SyncReport {
            direction: SyncDirection::Compare,
            started_at,
            finished_at: Utc::now(),
            products: 1,
            totals: SyncTotals::from_reports(&reports),
            products_marked_synced: 0,
            stores: reports,
        })
    }

    /// Push local quantities to stores.
    ///
    /// # Errors
    ///
    /// Returns `ReconcileError::Repository` if loading inputs or recording
    /// results fails. Store failures are reported per outcome.
    #[instrument(skip(self, request), fields(only_needs_sync = request.only_needs_sync))]
    pub async fn push(
        &self,
        request: &PushRequest,
        user_id: Option<UserId>,
    ) -> Result<SyncReport, ReconcileError> {
        let started_at = Utc::now();
        let products = ProductRepository::new(self.pool)
            .list_for_sync(request.product_ids.as_deref(), request.only_needs_sync)
            .await?;
        let stores = StoreRepository::new(self.pool)
            .list_by_ids(request.store_ids.as_deref(), self.manager)
            .await?;

        info!(
            products = products.len(),
            stores = stores.len(),
            "Starting push"
        );

        let targets = self.targets(stores).await;
        let reports = push_stores(&targets, &products, self.concurrency).await;

        SyncResultRepository::new(self.pool)
            .record_all(&to_results(&reports, SyncDirection::Push, user_id))
            .await?;

        let (settled, loaded_at) =
            settled_stamps(&settled_products(&reports, &products), &products);
        let products_marked_synced = ProductRepository::new(self.pool)
            .mark_synced(&settled, &loaded_at)
            .await?;

        let totals = SyncTotals::from_reports(&reports);
        info!(?totals, products_marked_synced, "Push finished");

        Ok(SyncReport {
            direction: SyncDirection::Push,
            started_at,
            finished_at: Utc::now(),
            products: products.len(),
            totals,
            products_marked_synced,
            stores: reports,
        })
    }

    /// Replace a product's local quantity with one store's total.
    ///
    /// `needs_sync` stays set: other stores have not seen the new quantity.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the store is missing or out of
    /// scope or the product is missing, `ReconcileError::Shopify` if the
    /// lookup fails.
    #[instrument(skip(self))]
    pub async fn pull(
        &self,
        store_id: StoreId,
        product_id: ProductId,
        user_id: Option<UserId>,
    ) -> Result<PullReport, ReconcileError> {
        let store = StoreRepository::new(self.pool)
            .get_by_id(store_id)
            .await?
            .filter(|store| in_scope(self.manager, store))
            .ok_or(RepositoryError::NotFound)?;
        let product = ProductRepository::new(self.pool)
            .get_by_id(product_id)
            .await?
            .filter(|p| p.is_active)
            .ok_or(RepositoryError::NotFound)?;

        let client = self.registry.client_for(&store).await;
        let inventory = client.find_sku(&product.sku).await?;

        let (outcome, movement) = if inventory.found {
            let pulled = pulled_quantity(inventory.total_available);
            if !inventory.complete {
                warn!(
                    store_id = %store_id,
                    sku = %product.sku,
                    pages = inventory.pages_scanned,
                    "Pulling a total from a capped catalog scan; later duplicates are not counted"
                );
            }
            let outcome = Outcome {
                remote_quantity: Some(inventory.total_available),
                variant_id: inventory.canonical_variant().map(|v| v.variant_id),
                extra_variants: inventory.variants.len().saturating_sub(1),
                catalog_complete: Some(inventory.complete),
                ..Outcome::new(
                    &product,
                    if pulled == product.quantity {
                        SyncStatus::InSync
                    } else {
                        SyncStatus::Updated
                    },
                )
            };
            let movement = if outcome.status == SyncStatus::Updated {
                let note = format!("pulled from {}", store.shopify_domain);
                Some(
                    StockRepository::new(self.pool)
                        .apply(product.id, Movement::SyncPull(pulled), Some(&note), user_id)
                        .await?,
                )
            } else {
                None
            };
            (outcome, movement)
        } else {
            (Outcome::missing(&product, &inventory), None)
        };

        let report = StoreReport {
            store_id,
            store_name: store.name.clone(),
            outcomes: vec![outcome.clone()],
        };
        SyncResultRepository::new(self.pool)
            .record_all(&to_results(&[report], SyncDirection::Pull, user_id))
            .await?;

        Ok(PullReport {
            store_id,
            outcome,
            movement,
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::collections::{HashMap, HashSet};
    use std::sync::Mutex;

    use rust_decimal::Decimal;

    use super::*;
    use crate::shopify::{LevelQuantity, VariantInventory};

    /// In-memory store: SKU → variants (variant id, inventory item id) and
    /// (item, location) → available.
    #[derive(Default)]
    struct FakeStore {
        variants: HashMap<String, Vec<(i64, i64)>>,
        levels: Mutex<HashMap<(i64, i64), i64>>,
        complete: bool,
        failing_skus: HashSet<String>,
        ignore_writes: bool,
        primary: Option<i64>,
        writes: Mutex<Vec<(i64, i64, i64)>>,
    }

    impl FakeStore {
        fn new() -> Self {
            Self {
                complete: true,
                primary: Some(900),
                ..Self::default()
            }
        }

        fn with_variant(mut self, sku: &str, variant_id: i64, item_id: i64) -> Self {
            self.variants
                .entry(sku.to_lowercase())
                .or_default()
                .push((variant_id, item_id));
            self
        }

        fn with_level(self, item_id: i64, location_id: i64, available: i64) -> Self {
            self.levels
                .lock()
                .unwrap()
                .insert((item_id, location_id), available);
            self
        }

        fn writes(&self) -> Vec<(i64, i64, i64)> {
            self.writes.lock().unwrap().clone()
        }
    }

    impl InventoryGateway for FakeStore {
        async fn find_sku(&self, sku: &Sku) -> Result<SkuInventory, ShopifyError> {
            if self.failing_skus.contains(&sku.key()) {
                return Err(ShopifyError::Status {
                    status: 503,
                    body: "unavailable".to_string(),
                });
            }
            let levels = self.levels.lock().unwrap();
            let variants: Vec<VariantInventory> = self
                .variants
                .get(&sku.key())
                .into_iter()
                .flatten()
                .map(|&(variant_id, item_id)| {
                    let mut item_levels: Vec<LevelQuantity> = levels
                        .iter()
                        .filter(|((item, _), _)| *item == item_id)
                        .map(|(&(_, location_id), &available)| LevelQuantity {
                            location_id,
                            available,
                        })
                        .collect();
                    item_levels.sort_by_key(|l| l.location_id);
                    VariantInventory {
                        product_id: 1,
                        variant_id,
                        inventory_item_id: item_id,
                        title: sku.as_str().to_string(),
                        available: item_levels.iter().map(|l| l.available).sum(),
                        levels: item_levels,
                    }
                })
                .collect();
            Ok(SkuInventory {
                sku: sku.as_str().to_string(),
                found: !variants.is_empty(),
                complete: self.complete,
                pages_scanned: 1,
                total_available: variants.iter().map(|v| v.available).sum(),
                variants,
            })
        }

        async fn set_available(
            &self,
            inventory_item_id: i64,
            location_id: i64,
            available: i64,
        ) -> Result<(), ShopifyError> {
            self.writes
                .lock()
                .unwrap()
                .push((inventory_item_id, location_id, available));
            if !self.ignore_writes {
                self.levels
                    .lock()
                    .unwrap()
                    .insert((inventory_item_id, location_id), available);
            }
            Ok(())
        }

        async fn available_at(
            &self,
            inventory_item_id: i64,
            location_id: i64,
        ) -> Result<Option<i64>, ShopifyError> {
            Ok(self
                .levels
                .lock()
                .unwrap()
                .get(&(inventory_item_id, location_id))
                .copied())
        }

        async fn primary_location(&self) -> Result<Option<i64>, ShopifyError> {
            Ok(self.primary)
        }
    }

    fn product(id: i32, sku: &str, quantity: i32) -> Product {
        Product {
            id: ProductId::new(id),
            sku: Sku::parse(sku).unwrap(),
            product_name: sku.to_string(),
            category: None,
            price: Decimal::ZERO,
            quantity,
            description: None,
            image_url: None,
            is_active: true,
            needs_sync: true,
            last_modified: Utc::now(),
            last_synced: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn target(id: i32, location_id: Option<i64>, gateway: FakeStore) -> StoreTarget<FakeStore> {
        StoreTarget {
            store_id: StoreId::new(id),
            name: format!("store-{id}"),
            location_id,
            gateway,
        }
    }

    #[tokio::test]
    async fn test_push_writes_and_verifies() {
        let store = FakeStore::new()
            .with_variant("TEE-S", 11, 111)
            .with_level(111, 5, 2);
        let outcome = push_product(&store, Some(5), &product(1, "tee-s", 7)).await;

        assert_eq!(outcome.status, SyncStatus::Updated);
        assert_eq!(outcome.remote_quantity, Some(2));
        assert_eq!(outcome.location_id, Some(5));
        assert_eq!(store.writes(), vec![(111, 5, 7)]);
    }

    #[tokio::test]
    async fn test_push_skips_write_when_equal() {
        let store = FakeStore::new()
            .with_variant("TEE-S", 11, 111)
            .with_level(111, 5, 7);
        let outcome = push_product(&store, Some(5), &product(1, "TEE-S", 7)).await;

        assert_eq!(outcome.status, SyncStatus::InSync);
        assert!(store.writes().is_empty());
    }

    #[tokio::test]
    async fn test_push_distinguishes_absent_from_incomplete() {
        let complete = FakeStore::new();
        let outcome = push_product(&complete, None, &product(1, "GONE", 3)).await;
        assert_eq!(outcome.status, SyncStatus::NotFound);

        let partial = FakeStore {
            complete: false,
            ..FakeStore::new()
        };
        let outcome = push_product(&partial, None, &product(1, "GONE", 3)).await;
        assert_eq!(outcome.status, SyncStatus::Incomplete);
        assert!(partial.writes().is_empty());
    }

    #[tokio::test]
    async fn test_push_lookup_failure_is_failed_outcome() {
        let store = FakeStore {
            failing_skus: HashSet::from(["tee-s".to_string()]),
            ..FakeStore::new()
        };
        let outcome = push_product(&store, Some(5), &product(1, "TEE-S", 1)).await;

        assert_eq!(outcome.status, SyncStatus::Failed);
        assert!(outcome.error.unwrap().contains("503"));
    }

    #[tokio::test]
    async fn test_push_reports_mismatch_when_write_not_reflected() {
        let store = FakeStore {
            ignore_writes: true,
            ..FakeStore::new()
        }
        .with_variant("TEE-S", 11, 111)
        .with_level(111, 5, 2);
        let outcome = push_product(&store, Some(5), &product(1, "TEE-S", 9)).await;

        assert_eq!(outcome.status, SyncStatus::Mismatch);
        assert_eq!(outcome.error.as_deref(), Some("wrote 9, store reports 2"));
    }

    #[tokio::test]
    async fn test_push_location_fallbacks() {
        // First level location when the store has none configured.
        let store = FakeStore::new()
            .with_variant("A", 11, 111)
            .with_level(111, 30, 0)
            .with_level(111, 40, 0);
        let outcome = push_product(&store, None, &product(1, "A", 4)).await;
        assert_eq!(outcome.location_id, Some(30));

        // Shop's primary location when the item is stocked nowhere.
        let store = FakeStore::new().with_variant("A", 11, 111);
        let outcome = push_product(&store, None, &product(1, "A", 4)).await;
        assert_eq!(outcome.status, SyncStatus::Updated);
        assert_eq!(store.writes(), vec![(111, 900, 4)]);

        // Nowhere to write.
        let store = FakeStore {
            primary: None,
            ..FakeStore::new()
        }
        .with_variant("A", 11, 111);
        let outcome = push_product(&store, None, &product(1, "A", 4)).await;
        assert_eq!(outcome.status, SyncStatus::Failed);
    }

    #[tokio::test]
    async fn test_push_writes_only_canonical_variant() {
        let store = FakeStore::new()
            .with_variant("DUP", 11, 111)
            .with_variant("DUP", 12, 112)
            .with_level(111, 5, 0)
            .with_level(112, 5, 0);
        let outcome = push_product(&store, Some(5), &product(1, "DUP", 6)).await;

        assert_eq!(outcome.variant_id, Some(11));
        assert_eq!(outcome.extra_variants, 1);
        assert_eq!(store.writes(), vec![(111, 5, 6)]);
    }

    #[tokio::test]
    async fn test_compare_uses_total_across_locations() {
        let store = FakeStore::new()
            .with_variant("TEE-S", 11, 111)
            .with_level(111, 5, 3)
            .with_level(111, 6, 4);

        let outcome = compare_product(&store, &product(1, "TEE-S", 7)).await;
        assert_eq!(outcome.status, SyncStatus::InSync);
        assert_eq!(outcome.remote_quantity, Some(7));

        let outcome = compare_product(&store, &product(1, "TEE-S", 8)).await;
        assert_eq!(outcome.status, SyncStatus::Mismatch);
        assert!(store.writes().is_empty());
    }

    #[tokio::test]
    async fn test_push_stores_reports_every_store_in_order() {
        let targets = vec![
            target(
                2,
                Some(5),
                FakeStore::new().with_variant("A", 11, 111).with_level(111, 5, 1),
            ),
            target(1, Some(5), FakeStore::new()),
        ];
        let products = vec![product(1, "A", 1), product(2, "B", 0)];

        let reports = push_stores(&targets, &products, 1).await;
        assert_eq!(reports.len(), 2);
        assert_eq!(reports[0].store_id, StoreId::new(1));
        assert_eq!(reports[1].outcomes[0].status, SyncStatus::InSync);
        assert_eq!(reports[1].outcomes[1].status, SyncStatus::NotFound);

        let totals = SyncTotals::from_reports(&reports);
        assert_eq!(totals.not_found, 3);
        assert_eq!(totals.in_sync, 1);
    }

    #[tokio::test]
    async fn test_settled_requires_every_store() {
        let both = FakeStore::new().with_variant("A", 11, 111).with_level(111, 5, 0);
        let one = FakeStore::new();
        let products = vec![product(1, "A", 2)];

        let reports = push_stores(&[target(1, Some(5), both)], &products, 2).await;
        assert_eq!(settled_products(&reports, &products), vec![ProductId::new(1)]);

        let targets = vec![
            target(1, Some(5), FakeStore::new().with_variant("A", 11, 111)),
            target(2, Some(5), one),
        ];
        let reports = push_stores(&targets, &products, 2).await;
        assert!(settled_products(&reports, &products).is_empty());

        assert!(settled_products(&[], &products).is_empty());
    }

    #[test]
    fn test_settled_stamps_carry_loaded_last_modified() {
        let mut first = product(1, "A", 1);
        first.last_modified = DateTime::from_timestamp(1_700_000_000, 0).unwrap();
        let second = product(2, "B", 1);
        let third = product(3, "C", 1);
        let products = vec![first.clone(), second, third.clone()];

        let (ids, loaded_at) =
            settled_stamps(&[ProductId::new(3), ProductId::new(1)], &products);
        assert_eq!(ids, vec![ProductId::new(1), ProductId::new(3)]);
        assert_eq!(loaded_at, vec![first.last_modified, third.last_modified]);

        let (ids, loaded_at) = settled_stamps(&[], &products);
        assert!(ids.is_empty() && loaded_at.is_empty());
    }

    #[test]
    fn test_scope_limits_stores_to_their_manager() {
        let store = |manager: Option<i32>| Store {
            id: StoreId::new(1),
            name: "Main".to_string(),
            shopify_domain: stockmirror_core::ShopDomain::parse("main-shop").unwrap(),
            access_token: secrecy::SecretString::from("shpat_x"),
            location_id: None,
            connected: true,
            last_connected_at: None,
            manager_id: manager.map(UserId::new),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };

        assert!(in_scope(None, &store(None)));
        assert!(in_scope(None, &store(Some(7))));
        assert!(in_scope(Some(UserId::new(7)), &store(Some(7))));
        assert!(!in_scope(Some(UserId::new(7)), &store(Some(8))));
        assert!(!in_scope(Some(UserId::new(7)), &store(None)));
    }

    #[tokio::test]
    async fn test_outcomes_report_capped_catalog_scans() {
        let capped = FakeStore {
            complete: false,
            ..FakeStore::new()
        }
        .with_variant("A", 11, 111)
        .with_level(111, 5, 3);

        let outcome = compare_product(&capped, &product(1, "A", 3)).await;
        assert_eq!(outcome.status, SyncStatus::InSync);
        assert_eq!(outcome.catalog_complete, Some(false));

        let outcome = push_product(&capped, Some(5), &product(1, "A", 3)).await;
        assert_eq!(outcome.catalog_complete, Some(false));

        let full = FakeStore::new();
        let outcome = compare_product(&full, &product(1, "GONE", 0)).await;
        assert_eq!(outcome.catalog_complete, Some(true));

        let failing = FakeStore {
            failing_skus: HashSet::from(["a".to_string()]),
            ..FakeStore::new()
        };
        let outcome = compare_product(&failing, &product(1, "A", 0)).await;
        assert_eq!(outcome.catalog_complete, None);
    }

    #[test]
    fn test_pulled_quantity_clamps() {
        assert_eq!(pulled_quantity(12), 12);
        assert_eq!(pulled_quantity(-4), 0);
        assert_eq!(pulled_quantity(i64::MAX), i32::MAX);
    }

    #[test]
    fn test_push_request_defaults() {
        let request: PushRequest = serde_json::from_str("{}").unwrap();
        assert!(request.only_needs_sync);
        assert!(request.product_ids.is_none());
        let request: PushRequest =
            serde_json::from_str(r#"{"store_ids":[3],"only_needs_sync":false}"#).unwrap();
        assert_eq!(request.store_ids, Some(vec![StoreId::new(3)]));
        assert!(!request.only_needs_sync);
    }
}
