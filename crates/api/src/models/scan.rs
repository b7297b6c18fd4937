//! Barcode scan log types.

use chrono::{DateTime, Utc};
use serde::Serialize;

use stockmirror_core::{ProductId, ScanAction, ScanLogId, UserId};

/// A recorded barcode scan.
#[derive(Debug, Clone, Serialize)]
pub struct ScanLog {
    pub id: ScanLogId,
    pub barcode: String,
    pub product_id: Option<ProductId>,
    pub action: ScanAction,
    pub quantity: Option<i32>,
    pub found: bool,
    pub user_id: Option<UserId>,
    pub created_at: DateTime<Utc>,
}
