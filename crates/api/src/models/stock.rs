//! Stock ledger types.

use chrono::{DateTime, Utc};
use serde::Serialize;

use stockmirror_core::{MovementKind, ProductId, StockLogId, UserId};

/// One row of the stock ledger.
#[derive(Debug, Clone, Serialize)]
pub struct StockLog {
    pub id: StockLogId,
    pub product_id: ProductId,
    pub movement: MovementKind,
    pub quantity: i32,
    pub previous_quantity: i32,
    pub new_quantity: i32,
    pub notes: Option<String>,
    pub user_id: Option<UserId>,
    pub created_at: DateTime<Utc>,
}

/// Ledger row joined with product and user for listings.
#[derive(Debug, Clone, Serialize)]
pub struct StockLogEntry {
    #[serde(flatten)]
    pub log: StockLog,
    pub sku: String,
    pub product_name: String,
    pub username: Option<String>,
}

/// Filters for the ledger listing.
#[derive(Debug, Clone, Copy, Default)]
pub struct StockLogFilter {
    pub product_id: Option<ProductId>,
    pub movement: Option<MovementKind>,
    pub user_id: Option<UserId>,
}
