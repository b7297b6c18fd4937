//! HTTP route handlers.
//!
//! # Route Structure
//!
//! ```text
//! GET  /health                          - Liveness
//! GET  /health/ready                    - Readiness (database ping)
//!
//! # Auth
//! POST /api/auth/login                  - Issue a JWT (rate limited per IP)
//! GET  /api/auth/me                     - Current user
//! POST /api/auth/change-password        - Change own password
//!
//! # Users (manage_users)
//! GET|POST          /api/users
//! GET|PATCH|DELETE  /api/users/{id}
//!
//! # Products
//! GET  /api/products                    - Paginated listing
//! GET  /api/products/categories
//! GET  /api/products/sku/{sku}
//! POST /api/products                    - manage_products
//! GET|PUT|DELETE /api/products/{id}
//!
//! # Stock (manage_stock)
//! POST /api/stock/in | /out | /adjust
//! GET  /api/stock/logs
//!
//! # Scanning (manage_stock)
//! POST /api/scan
//! GET  /api/scan/logs
//!
//! # Mobile
//! GET|POST /api/mobile/transactions
//! POST     /api/mobile/transactions/{id}/approve | /reject
//! GET|POST /api/mobile/activities
//!
//! # Stores (manage_stores)
//! GET|POST          /api/stores
//! GET|PUT|DELETE    /api/stores/{id}
//! POST              /api/stores/{id}/test
//! GET               /api/stores/{id}/locations
//!
//! # Sync (run_sync)
//! GET  /api/sync/compare?sku=
//! POST /api/sync/push
//! POST /api/sync/pull
//! GET  /api/sync/status
//! GET  /api/sync/results
//!
//! # Dashboard (view_reports)
//! GET  /api/dashboard/stats
//! ```

pub mod auth;
pub mod dashboard;
pub mod mobile;
pub mod products;
pub mod scan;
pub mod stock;
pub mod stores;
pub mod sync;
pub mod users;

use axum::{
    Router,
    extract::State,
    http::StatusCode,
    routing::{get, post},
};
use serde::Deserialize;

use crate::middleware::login_rate_limiter;
use crate::state::AppState;

const DEFAULT_PER_PAGE: u32 = 50;
const MAX_PER_PAGE: u32 = 200;

/// `?page=&per_page=` query parameters; 1-based, `per_page` capped at 200.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct Pagination {
    #[serde(default = "default_page")]
    pub page: u32,
    #[serde(default = "default_per_page")]
    pub per_page: u32,
}

const fn default_page() -> u32 {
    1
}

const fn default_per_page() -> u32 {
    DEFAULT_PER_PAGE
}

impl Pagination {
    /// Page and page size after clamping to valid bounds.
    #[must_use]
    pub fn bounds(self) -> (u32, u32) {
        (self.page.max(1), self.per_page.clamp(1, MAX_PER_PAGE))
    }
}

impl Default for Pagination {
    fn default() -> Self {
        Self {
            page: 1,
            per_page: DEFAULT_PER_PAGE,
        }
    }
}

/// Every route, ready for state and outer layers.
pub fn routes() -> Router<AppState> {
    let login = Router::new()
        .route("/api/auth/login", post(auth::login))
        .layer(login_rate_limiter());

    Router::new()
        .route("/health", get(health))
        .route("/health/ready", get(readiness))
        .merge(login)
        .route("/api/auth/me", get(auth::me))
        .route("/api/auth/change-password", post(auth::change_password))
        .route("/api/users", get(users::list).post(users::create))
        .route(
            "/api/users/{id}",
            get(users::show).patch(users::update).delete(users::deactivate),
        )
        .route("/api/products", get(products::list).post(products::create))
        .route("/api/products/categories", get(products::categories))
        .route("/api/products/sku/{sku}", get(products::show_by_sku))
        .route(
            "/api/products/{id}",
            get(products::show)
                .put(products::update)
                .delete(products::deactivate),
        )
        .route("/api/stock/in", post(stock::stock_in))
        .route("/api/stock/out", post(stock::stock_out))
        .route("/api/stock/adjust", post(stock::adjust))
        .route("/api/stock/logs", get(stock::logs))
        .route("/api/scan", post(scan::scan))
        .route("/api/scan/logs", get(scan::logs))
        .route(
            "/api/mobile/transactions",
            get(mobile::list_transactions).post(mobile::create_transaction),
        )
        .route("/api/mobile/transactions/{id}/approve", post(mobile::approve))
        .route("/api/mobile/transactions/{id}/reject", post(mobile::reject))
        .route(
            "/api/mobile/activities",
            get(mobile::list_activities).post(mobile::record_activity),
        )
        .route("/api/stores", get(stores::list).post(stores::create))
        .route(
            "/api/stores/{id}",
            get(stores::show).put(stores::update).delete(stores::delete),
        )
        .route("/api/stores/{id}/test", post(stores::test_connection))
        .route("/api/stores/{id}/locations", get(stores::locations))
        .route("/api/sync/compare", get(sync::compare))
        .route("/api/sync/push", post(sync::push))
        .route("/api/sync/pull", post(sync::pull))
        .route("/api/sync/status", get(sync::status))
        .route("/api/sync/results", get(sync::results))
        .route("/api/dashboard/stats", get(dashboard::stats))
}

/// Liveness: the process is up. Does not touch dependencies.
async fn health() -> &'static str {
    "ok"
}

/// Readiness: 503 when the database is unreachable.
async fn readiness(State(state): State<AppState>) -> StatusCode {
    match sqlx::query("SELECT 1").fetch_one(state.pool()).await {
        Ok(_) => StatusCode::OK,
        Err(e) => {
            tracing::warn!(error = %e, "Readiness check failed");
            StatusCode::SERVICE_UNAVAILABLE
        }
    }
}

/// Trim and drop empty strings from optional text input.
pub(crate) fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::time::Duration;

    use axum::body::Body;
    use axum::http::{Request, header::AUTHORIZATION};
    use secrecy::SecretString;
    use sqlx::postgres::PgPoolOptions;
    use tower::ServiceExt;

    use super::*;
    use crate::config::{ApiConfig, JwtConfig, ShopifyConfig, SyncConfig};

    fn state() -> AppState {
        let config = ApiConfig {
            database_url: SecretString::from("postgres://localhost:1/unused"),
            host: "127.0.0.1".parse().unwrap(),
            port: 0,
            jwt: JwtConfig {
                secret: SecretString::from("k3Y!vQ9#tR2@mZ8&wL5^pX1*nB7$cF4%"),
                ttl: Duration::from_secs(3600),
            },
            shopify: ShopifyConfig::default(),
            sync: SyncConfig::default(),
            cors_allowed_origin: None,
            low_stock_threshold: 10,
            sentry_dsn: None,
            sentry_environment: None,
            sentry_sample_rate: 1.0,
            sentry_traces_sample_rate: 0.0,
        };
        // Never connects: every request below is rejected before a query.
        let pool = PgPoolOptions::new()
            .connect_lazy("postgres://localhost:1/unused")
            .unwrap();
        AppState::new(config, pool).unwrap()
    }

    async fn status_of(request: Request<Body>) -> StatusCode {
        routes()
            .with_state(state())
            .oneshot(request)
            .await
            .unwrap()
            .status()
    }

    #[tokio::test]
    async fn test_health() {
        let request = Request::builder().uri("/health").body(Body::empty()).unwrap();
        assert_eq!(status_of(request).await, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_missing_token_is_unauthorized() {
        for uri in ["/api/products", "/api/auth/me", "/api/dashboard/stats"] {
            let request = Request::builder().uri(uri).body(Body::empty()).unwrap();
            assert_eq!(status_of(request).await, StatusCode::UNAUTHORIZED, "{uri}");
        }
    }

    #[tokio::test]
    async fn test_garbage_token_is_unauthorized() {
        let request = Request::builder()
            .uri("/api/stores")
            .header(AUTHORIZATION, "Bearer not.a.jwt")
            .body(Body::empty())
            .unwrap();
        assert_eq!(status_of(request).await, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_token_signed_with_other_secret_is_unauthorized() {
        let other = crate::services::auth::JwtKeys::new(
            &SecretString::from("another-secret-that-is-long-enough-1234"),
            Duration::from_secs(60),
        );
        let user = crate::models::user::User {
            id: stockmirror_core::UserId::new(1),
            username: "ana".to_string(),
            email: None,
            role: stockmirror_core::Role::Admin,
            permissions: vec![],
            is_active: true,
            created_by: None,
            last_login_at: None,
            created_at: chrono::Utc::now(),
            updated_at: chrono::Utc::now(),
        };
        let token = other.issue(&user).unwrap().token;
        let request = Request::builder()
            .method("POST")
            .uri("/api/sync/push")
            .header(AUTHORIZATION, format!("Bearer {token}"))
            .header("content-type", "application/json")
            .body(Body::from("{}"))
            .unwrap();
        assert_eq!(status_of(request).await, StatusCode::UNAUTHORIZED);
    }

    #[test]
    fn test_pagination_bounds() {
        let p: Pagination = serde_json::from_str("{}").unwrap();
        assert_eq!(p.bounds(), (1, 50));
        let p = Pagination {
            page: 0,
            per_page: 10_000,
        };
        assert_eq!(p.bounds(), (1, 200));
    }

    #[test]
    fn test_non_empty() {
        assert_eq!(non_empty(Some("  ".to_string())), None);
        assert_eq!(non_empty(Some(" tees ".to_string())), Some("tees".to_string()));
        assert_eq!(non_empty(None), None);
    }
}
