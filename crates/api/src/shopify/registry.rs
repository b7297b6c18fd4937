//! Per-store client cache.

use std::time::Duration;

use moka::future::Cache;

use stockmirror_core::StoreId;

use super::ShopifyClient;
use crate::config::ShopifyConfig;
use crate::models::store::Store;

/// Hands out one [`ShopifyClient`] per store so its rate limiter and SKU
/// cache are shared by every request touching that store.
#[derive(Clone)]
pub struct ShopifyRegistry {
    http: reqwest::Client,
    config: ShopifyConfig,
    clients: Cache<StoreId, ShopifyClient>,
}

impl ShopifyRegistry {
    /// Create a registry with a shared HTTP client.
    ///
    /// # Errors
    ///
    /// Returns `reqwest::Error` if the HTTP client cannot be built.
    pub fn new(config: ShopifyConfig) -> Result<Self, reqwest::Error> {
        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .user_agent(concat!("stockmirror/", env!("CARGO_PKG_VERSION")))
            .build()?;
        let clients = Cache::builder()
            .max_capacity(1_000)
            .time_to_idle(Duration::from_secs(3600))
            .build();

        Ok(Self {
            http,
            config,
            clients,
        })
    }

    /// Client for `store`, created on first use.
    pub async fn client_for(&self, store: &Store) -> ShopifyClient {
        self.clients
            .get_with(store.id, async {
                ShopifyClient::new(
                    self.http.clone(),
                    store.shopify_domain.clone(),
                    store.access_token.clone(),
                    &self.config,
                )
            })
            .await
    }

    /// Drop the cached client after a store's domain or token changes.
    pub async fn invalidate(&self, store_id: StoreId) {
        self.clients.invalidate(&store_id).await;
    }
}
