//! Reconciliation endpoints (`run_sync`).
//!
//! Non-admins reconcile only the stores they manage; other stores are
//! skipped on compare and push and look absent on pull.

use axum::{
    Json,
    extract::{Query, State},
};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use stockmirror_core::{Permission, ProductId, StoreId, SyncDirection, SyncStatus};

use super::Pagination;
use super::stock::ProductRef;
use super::stores::managed_scope;
use crate::db::SyncResultRepository;
use crate::db::sync_results::{StatusCount, StoreSyncSummary};
use crate::error::AppError;
use crate::middleware::CurrentUser;
use crate::models::Page;
use crate::models::sync::{SyncResult, SyncResultFilter};
use crate::services::reconcile::{PullReport, PushRequest, SyncReport};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct CompareQuery {
    pub sku: String,
}

#[derive(Debug, Deserialize)]
pub struct PullRequest {
    pub store_id: StoreId,
    #[serde(flatten)]
    pub product: ProductRef,
}

#[derive(Debug, Default, Deserialize)]
pub struct ResultQuery {
    pub status: Option<SyncStatus>,
    pub store_id: Option<StoreId>,
    pub product_id: Option<ProductId>,
}

/// Overview for `GET /api/sync/status`.
#[derive(Debug, Serialize)]
pub struct SyncOverview {
    pub last_push: Option<DateTime<Utc>>,
    pub last_pull: Option<DateTime<Utc>>,
    pub last_compare: Option<DateTime<Utc>>,
    /// Outcomes recorded in the last 24 hours, by status.
    pub last_24h: Vec<StatusCount>,
    pub stores: Vec<StoreSyncSummary>,
}

/// `GET /api/sync/compare?sku=`
pub async fn compare(
    State(state): State<AppState>,
    current: CurrentUser,
    Query(query): Query<CompareQuery>,
) -> Result<Json<SyncReport>, AppError> {
    current.require(Permission::RunSync)?;
    let sku = query.sku.trim();
    if sku.is_empty() {
        return Err(AppError::BadRequest("sku is required".to_string()));
    }
    let report = state
        .reconciler()
        .managed_by(managed_scope(&current))
        .compare_sku(sku, Some(current.id()))
        .await?;
    Ok(Json(report))
}

/// `POST /api/sync/push`
pub async fn push(
    State(state): State<AppState>,
    current: CurrentUser,
    Json(req): Json<PushRequest>,
) -> Result<Json<SyncReport>, AppError> {
    current.require(Permission::RunSync)?;
    let report = state
        .reconciler()
        .managed_by(managed_scope(&current))
        .push(&req, Some(current.id()))
        .await?;
    Ok(Json(report))
}

/// `POST /api/sync/pull`
pub async fn pull(
    State(state): State<AppState>,
    current: CurrentUser,
    Json(req): Json<PullRequest>,
) -> Result<Json<PullReport>, AppError> {
    current.require(Permission::RunSync)?;
    let product = req.product.resolve(state.pool()).await?;
    let report = state
        .reconciler()
        .managed_by(managed_scope(&current))
        .pull(req.store_id, product.id, Some(current.id()))
        .await?;
    Ok(Json(report))
}

/// `GET /api/sync/status`
pub async fn status(
    State(state): State<AppState>,
    current: CurrentUser,
) -> Result<Json<SyncOverview>, AppError> {
    current.require(Permission::RunSync)?;
    let results = SyncResultRepository::new(state.pool());

    Ok(Json(SyncOverview {
        last_push: results.last_run(SyncDirection::Push).await?,
        last_pull: results.last_run(SyncDirection::Pull).await?,
        last_compare: results.last_run(SyncDirection::Compare).await?,
        last_24h: results
            .status_counts_since(Utc::now() - Duration::hours(24))
            .await?,
        stores: results.store_summaries().await?,
    }))
}

/// `GET /api/sync/results`
pub async fn results(
    State(state): State<AppState>,
    current: CurrentUser,
    Query(query): Query<ResultQuery>,
    Query(pagination): Query<Pagination>,
) -> Result<Json<Page<SyncResult>>, AppError> {
    current.require(Permission::RunSync)?;
    let (page, per_page) = pagination.bounds();
    let filter = SyncResultFilter {
        status: query.status,
        store_id: query.store_id,
        product_id: query.product_id,
    };

    let (items, total) = SyncResultRepository::new(state.pool())
        .list(filter, page, per_page)
        .await?;

    Ok(Json(Page {
        items,
        page,
        per_page,
        total,
    }))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_pull_request_by_sku() {
        let req: PullRequest =
            serde_json::from_str(r#"{"store_id": 2, "sku": "TEE-S"}"#).unwrap();
        assert_eq!(req.store_id, StoreId::new(2));
        assert_eq!(req.product.sku.as_deref(), Some("TEE-S"));
        assert!(req.product.product_id.is_none());
    }

    #[test]
    fn test_result_query_status() {
        let query: ResultQuery = serde_json::from_str(r#"{"status": "not_found"}"#).unwrap();
        assert_eq!(query.status, Some(SyncStatus::NotFound));
    }
}
