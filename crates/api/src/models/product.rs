//! Product catalog types.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;

use stockmirror_core::{ProductId, Sku};

/// A product in the local catalog.
#[derive(Debug, Clone, Serialize)]
pub struct Product {
    pub id: ProductId,
    pub sku: Sku,
    pub product_name: String,
    pub category: Option<String>,
    pub price: Decimal,
    pub quantity: i32,
    pub description: Option<String>,
    pub image_url: Option<String>,
    pub is_active: bool,
    /// Local quantity changed since the last successful push.
    pub needs_sync: bool,
    pub last_modified: DateTime<Utc>,
    pub last_synced: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Fields for a new product. The initial quantity is applied as an
/// `adjust` movement by the repository.
#[derive(Debug, Clone)]
pub struct NewProduct {
    pub sku: Sku,
    pub product_name: String,
    pub category: Option<String>,
    pub price: Decimal,
    pub quantity: i32,
    pub description: Option<String>,
    pub image_url: Option<String>,
}

/// Metadata update. Quantity is deliberately absent.
#[derive(Debug, Clone, Default)]
pub struct ProductChanges {
    pub sku: Option<Sku>,
    pub product_name: Option<String>,
    pub category: Option<String>,
    pub price: Option<Decimal>,
    pub description: Option<String>,
    pub image_url: Option<String>,
    pub is_active: Option<bool>,
}

/// Filters for the product listing.
#[derive(Debug, Clone, Default)]
pub struct ProductFilter {
    /// Substring match on SKU or name (case-insensitive).
    pub search: Option<String>,
    pub category: Option<String>,
    pub needs_sync: Option<bool>,
    /// Only products at or below this quantity.
    pub low_stock_threshold: Option<i32>,
    pub include_inactive: bool,
}
