//! Persisted reconciliation outcomes.

use chrono::{DateTime, Utc};
use serde::Serialize;

use stockmirror_core::{ProductId, StoreId, SyncDirection, SyncResultId, SyncStatus, UserId};

/// One product/store outcome recorded in `sync_results`.
#[derive(Debug, Clone, Serialize)]
pub struct SyncResult {
    pub id: SyncResultId,
    pub product_id: Option<ProductId>,
    pub store_id: StoreId,
    pub sku: String,
    pub direction: SyncDirection,
    pub status: SyncStatus,
    pub local_quantity: i32,
    pub remote_quantity: Option<i64>,
    pub error: Option<String>,
    pub user_id: Option<UserId>,
    pub created_at: DateTime<Utc>,
}

/// Outcome to record; the repository assigns id and timestamp.
#[derive(Debug, Clone)]
pub struct NewSyncResult {
    pub product_id: Option<ProductId>,
    pub store_id: StoreId,
    pub sku: String,
    pub direction: SyncDirection,
    pub status: SyncStatus,
    pub local_quantity: i32,
    pub remote_quantity: Option<i64>,
    pub error: Option<String>,
    pub user_id: Option<UserId>,
}

/// Filters for the results listing.
#[derive(Debug, Clone, Copy, Default)]
pub struct SyncResultFilter {
    pub status: Option<SyncStatus>,
    pub store_id: Option<StoreId>,
    pub product_id: Option<ProductId>,
}
