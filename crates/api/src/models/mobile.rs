//! Mobile workflow types.

use chrono::{DateTime, Utc};
use serde::Serialize;

use stockmirror_core::{
    MobileActivityId, MobileTransactionId, ProductId, StockDirection, StockLogId,
    TransactionStatus, UserId,
};

/// A stock change requested from the mobile app, pending approval.
#[derive(Debug, Clone, Serialize)]
pub struct MobileTransaction {
    pub id: MobileTransactionId,
    pub product_id: ProductId,
    pub direction: StockDirection,
    pub quantity: i32,
    pub notes: Option<String>,
    pub status: TransactionStatus,
    pub requested_by: Option<UserId>,
    pub reviewed_by: Option<UserId>,
    pub review_notes: Option<String>,
    /// Ledger row written on approval.
    pub stock_log_id: Option<StockLogId>,
    pub created_at: DateTime<Utc>,
    pub reviewed_at: Option<DateTime<Utc>>,
}

/// Free-form activity reported by the mobile app.
#[derive(Debug, Clone, Serialize)]
pub struct MobileActivity {
    pub id: MobileActivityId,
    pub user_id: Option<UserId>,
    pub activity: String,
    pub details: serde_json::Value,
    pub created_at: DateTime<Utc>,
}
