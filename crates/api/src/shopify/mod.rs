//! Shopify Admin REST API client.
//!
//! # Architecture
//!
//! - One [`ShopifyClient`] per connected store, created on demand and cached
//!   by the [`ShopifyRegistry`]
//! - Every request waits on the store's token-bucket limiter (governor) with
//!   jitter, so concurrent work against one store stays paced
//! - 429 honours `Retry-After`; 5xx and transport failures retry with
//!   exponential backoff; other 4xx fail immediately
//! - Catalog pages feed a per-store SKU index (moka, TTL) so repeated
//!   lookups skip the scan
//!
//! # Example
//!
//! ```rust,ignore
//! let client = registry.client_for(&store).await;
//! let inventory = client.find_sku(&sku).await?;
//! if inventory.found {
//!     println!("{} units across {} variants", inventory.total_available, inventory.variants.len());
//! }
//! ```

mod client;
mod inventory;
mod registry;
pub mod types;

pub use client::ShopifyClient;
pub use inventory::{LevelQuantity, SkuInventory, VariantInventory};
pub use registry::ShopifyRegistry;
pub use types::{InventoryLevel, Location, Shop};

use thiserror::Error;

/// Errors that can occur when calling the Shopify Admin API.
#[derive(Debug, Error)]
pub enum ShopifyError {
    /// HTTP request failed before a response arrived.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Shopify answered with an unexpected status.
    #[error("Shopify returned {status}: {body}")]
    Status { status: u16, body: String },

    /// Rate limited by Shopify.
    #[error("Rate limited, retry after {0} seconds")]
    RateLimited(u64),

    /// The access token was rejected.
    #[error("Unauthorized: invalid or revoked access token")]
    Unauthorized,

    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// JSON parsing failed.
    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),
}

impl ShopifyError {
    /// Whether the same request may succeed if sent again.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Http(e) => !e.is_builder() && !e.is_decode(),
            Self::Status { status, .. } => *status >= 500,
            Self::RateLimited(_) => true,
            Self::Unauthorized | Self::NotFound(_) | Self::Parse(_) => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_classification() {
        assert!(ShopifyError::RateLimited(2).is_retryable());
        assert!(
            ShopifyError::Status {
                status: 503,
                body: String::new()
            }
            .is_retryable()
        );
        assert!(
            !ShopifyError::Status {
                status: 422,
                body: String::new()
            }
            .is_retryable()
        );
        assert!(!ShopifyError::Unauthorized.is_retryable());
        assert!(!ShopifyError::NotFound("products.json".to_string()).is_retryable());
    }
}
