//! Reconciliation runs without the HTTP server.
//!
//! ```bash
//! smctl sync push                 # products flagged needs_sync, every store
//! smctl sync push --all --store 2 # every active product, store 2 only
//! smctl sync compare TEE-S
//! ```
//!
//! Shopify settings come from the same `SHOPIFY_*` variables as the API.
//! The report is printed to stdout as JSON.

use serde::Serialize;

use stockmirror_api::config::{ShopifyConfig, SyncConfig};
use stockmirror_api::services::reconcile::{PushRequest, Reconciler};
use stockmirror_api::shopify::ShopifyRegistry;
use stockmirror_core::StoreId;

use super::{CliError, connect};

fn print_json<T: Serialize>(value: &T) -> Result<(), CliError> {
    let json = serde_json::to_string_pretty(value)?;
    #[allow(clippy::print_stdout)]
    {
        println!("{json}");
    }
    Ok(())
}

fn registry() -> Result<(ShopifyRegistry, usize), CliError> {
    let registry = ShopifyRegistry::new(ShopifyConfig::from_env()?)?;
    Ok((registry, SyncConfig::from_env()?.store_concurrency))
}

/// Push local quantities and print the report.
///
/// # Errors
///
/// Returns `CliError` if configuration, the database or result recording
/// fails. Store failures are part of the report.
pub async fn push(all: bool, stores: &[i32]) -> Result<(), CliError> {
    let pool = connect().await?;
    let (registry, concurrency) = registry()?;

    let request = PushRequest {
        product_ids: None,
        store_ids: (!stores.is_empty())
            .then(|| stores.iter().copied().map(StoreId::new).collect()),
        only_needs_sync: !all,
    };
    let report = Reconciler::new(&pool, &registry, concurrency)
        .push(&request, None)
        .await?;

    tracing::info!(
        products = report.products,
        marked_synced = report.products_marked_synced,
        failed = report.totals.failed,
        "Push complete"
    );
    print_json(&report)
}

/// Compare one SKU across every store and print the report.
///
/// # Errors
///
/// Returns `CliError` if the SKU is unknown locally or the database fails.
pub async fn compare(sku: &str) -> Result<(), CliError> {
    let pool = connect().await?;
    let (registry, concurrency) = registry()?;

    let report = Reconciler::new(&pool, &registry, concurrency)
        .compare_sku(sku.trim(), None)
        .await?;
    print_json(&report)
}
