//! Application state shared across handlers.

use std::sync::Arc;

use sqlx::PgPool;

use crate::config::ApiConfig;
use crate::services::auth::JwtKeys;
use crate::services::reconcile::Reconciler;
use crate::shopify::ShopifyRegistry;

/// Application state shared across all handlers.
///
/// Cheap to clone; everything lives behind one `Arc`.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: ApiConfig,
    pool: PgPool,
    jwt: JwtKeys,
    shopify: ShopifyRegistry,
}

impl AppState {
    /// Create a new application state.
    ///
    /// # Errors
    ///
    /// Returns `reqwest::Error` if the shared HTTP client cannot be built.
    pub fn new(config: ApiConfig, pool: PgPool) -> Result<Self, reqwest::Error> {
        let jwt = JwtKeys::new(&config.jwt.secret, config.jwt.ttl);
        let shopify = ShopifyRegistry::new(config.shopify.clone())?;

        Ok(Self {
            inner: Arc::new(AppStateInner {
                config,
                pool,
                jwt,
                shopify,
            }),
        })
    }

    #[must_use]
    pub fn config(&self) -> &ApiConfig {
        &self.inner.config
    }

    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.inner.pool
    }

    #[must_use]
    pub fn jwt(&self) -> &JwtKeys {
        &self.inner.jwt
    }

    /// Per-store Shopify clients.
    #[must_use]
    pub fn shopify(&self) -> &ShopifyRegistry {
        &self.inner.shopify
    }

    /// Reconciler bound to this state's pool and clients.
    #[must_use]
    pub fn reconciler(&self) -> Reconciler<'_> {
        Reconciler::new(
            &self.inner.pool,
            &self.inner.shopify,
            self.inner.config.sync.store_concurrency,
        )
    }
}
