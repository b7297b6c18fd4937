//! Dashboard statistics (`view_reports`).

use axum::{Json, extract::State};
use serde::Serialize;

use stockmirror_core::Permission;

use crate::db::dashboard::DashboardCounts;
use crate::db::{DashboardRepository, StockRepository};
use crate::error::AppError;
use crate::middleware::CurrentUser;
use crate::models::stock::{StockLogEntry, StockLogFilter};
use crate::state::AppState;

const RECENT_MOVEMENTS: u32 = 10;

#[derive(Debug, Serialize)]
pub struct DashboardStats {
    #[serde(flatten)]
    pub counts: DashboardCounts,
    pub low_stock_threshold: i32,
    pub recent_movements: Vec<StockLogEntry>,
}

/// `GET /api/dashboard/stats`
pub async fn stats(
    State(state): State<AppState>,
    current: CurrentUser,
) -> Result<Json<DashboardStats>, AppError> {
    current.require(Permission::ViewReports)?;
    let threshold = state.config().low_stock_threshold;

    let counts = DashboardRepository::new(state.pool())
        .counts(threshold)
        .await?;
    let (recent_movements, _) = StockRepository::new(state.pool())
        .list_logs(StockLogFilter::default(), 1, RECENT_MOVEMENTS)
        .await?;

    Ok(Json(DashboardStats {
        counts,
        low_stock_threshold: threshold,
        recent_movements,
    }))
}
