//! Per-store REST client with pacing and retries.

use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;

use governor::{DefaultDirectRateLimiter, Jitter, Quota, RateLimiter};
use moka::future::Cache;
use rand::Rng;
use reqwest::{Method, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use tokio::sync::OnceCell;
use tracing::{debug, instrument, warn};

use stockmirror_core::ShopDomain;

use super::ShopifyError;
use super::inventory::CachedSku;
use super::types::{
    InventoryLevel, InventoryLevelEnvelope, InventoryLevelsEnvelope, Location, LocationsEnvelope,
    ProductsEnvelope, RestProduct, SetInventoryLevel, Shop, ShopEnvelope,
};
use crate::config::ShopifyConfig;

/// Shopify accepts at most this many ids in `inventory_item_ids`.
const INVENTORY_ITEM_BATCH: usize = 50;
const BACKOFF_BASE: Duration = Duration::from_millis(500);
const BACKOFF_CAP: Duration = Duration::from_secs(8);
const RETRY_AFTER_CAP: u64 = 60;
const ERROR_BODY_LIMIT: usize = 500;

/// Client for one store's Admin REST API.
#[derive(Clone)]
pub struct ShopifyClient {
    pub(super) inner: Arc<ShopifyClientInner>,
}

pub(super) struct ShopifyClientInner {
    http: reqwest::Client,
    base_url: String,
    pub(super) domain: ShopDomain,
    access_token: SecretString,
    limiter: DefaultDirectRateLimiter,
    max_retries: u32,
    page_size: u32,
    pub(super) max_pages: u32,
    /// SKU key → variants seen while scanning the catalog.
    pub(super) sku_cache: Cache<String, Arc<CachedSku>>,
    primary_location: OnceCell<Option<i64>>,
}

/// Body and pagination cursor of a successful response.
struct RawResponse {
    body: String,
    next_page_info: Option<String>,
}

impl ShopifyClient {
    /// Create a client for one store.
    ///
    /// `http` is shared between stores; timeouts are configured on it.
    #[must_use]
    pub fn new(
        http: reqwest::Client,
        domain: ShopDomain,
        access_token: SecretString,
        config: &ShopifyConfig,
    ) -> Self {
        let base_url = format!(
            "https://{}/admin/api/{}",
            domain.as_str(),
            config.api_version
        );
        Self::with_base_url(http, base_url, domain, access_token, config)
    }

    /// Create a client whose Admin API root is `base_url` rather than the
    /// store domain.
    pub(crate) fn with_base_url(
        http: reqwest::Client,
        base_url: String,
        domain: ShopDomain,
        access_token: SecretString,
        config: &ShopifyConfig,
    ) -> Self {
        let rate = NonZeroU32::new(config.requests_per_second).unwrap_or(NonZeroU32::MIN);
        let limiter = RateLimiter::direct(Quota::per_second(rate));
        let sku_cache = Cache::builder()
            .max_capacity(50_000)
            .time_to_live(config.sku_cache_ttl)
            .build();

        Self {
            inner: Arc::new(ShopifyClientInner {
                http,
                base_url,
                domain,
                access_token,
                limiter,
                max_retries: config.max_retries,
                page_size: config.page_size,
                max_pages: config.max_pages,
                sku_cache,
                primary_location: OnceCell::new(),
            }),
        }
    }

    /// Store domain this client talks to.
    #[must_use]
    pub fn domain(&self) -> &ShopDomain {
        &self.inner.domain
    }

    // =========================================================================
    // Endpoints
    // =========================================================================

    /// Fetch shop metadata. Used as the connection test.
    ///
    /// # Errors
    ///
    /// Returns `ShopifyError` if the request fails.
    #[instrument(skip(self), fields(shop = %self.inner.domain))]
    pub async fn shop(&self) -> Result<Shop, ShopifyError> {
        let raw = self.execute(Method::GET, "shop.json", &[], None::<&()>).await?;
        let envelope: ShopEnvelope = serde_json::from_str(&raw.body)?;
        Ok(envelope.shop)
    }

    /// List the store's locations.
    ///
    /// # Errors
    ///
    /// Returns `ShopifyError` if the request fails.
    #[instrument(skip(self), fields(shop = %self.inner.domain))]
    pub async fn locations(&self) -> Result<Vec<Location>, ShopifyError> {
        let raw = self
            .execute(Method::GET, "locations.json", &[], None::<&()>)
            .await?;
        let envelope: LocationsEnvelope = serde_json::from_str(&raw.body)?;
        Ok(envelope.locations)
    }

    /// First active location, fetched once per client.
    ///
    /// # Errors
    ///
    /// Returns `ShopifyError` if the locations request fails.
    pub async fn primary_location_id(&self) -> Result<Option<i64>, ShopifyError> {
        self.inner
            .primary_location
            .get_or_try_init(|| async {
                let locations = self.locations().await?;
                Ok(locations.iter().find(|l| l.active).map(|l| l.id))
            })
            .await
            .copied()
    }

    /// Fetch one catalog page. `page_info` is the cursor from the previous
    /// page; the returned cursor is `None` on the last page.
    ///
    /// # Errors
    ///
    /// Returns `ShopifyError` if the request fails.
    #[instrument(skip(self), fields(shop = %self.inner.domain))]
    pub(crate) async fn products_page(
        &self,
        page_info: Option<&str>,
    ) -> Result<(Vec<RestProduct>, Option<String>), ShopifyError> {
        let mut query = vec![
            ("limit", self.inner.page_size.to_string()),
            ("fields", "id,title,variants".to_string()),
        ];
        if let Some(cursor) = page_info {
            query.push(("page_info", cursor.to_string()));
        }

        let raw = self
            .execute(Method::GET, "products.json", &query, None::<&()>)
            .await?;
        let envelope: ProductsEnvelope = serde_json::from_str(&raw.body)?;
        Ok((envelope.products, raw.next_page_info))
    }

    /// Inventory levels for the given items at every location.
    ///
    /// # Errors
    ///
    /// Returns `ShopifyError` if any batch request fails.
    #[instrument(skip(self), fields(shop = %self.inner.domain))]
    pub async fn inventory_levels(
        &self,
        inventory_item_ids: &[i64],
    ) -> Result<Vec<InventoryLevel>, ShopifyError> {
        let mut levels = Vec::new();
        for batch in inventory_item_ids.chunks(INVENTORY_ITEM_BATCH) {
            let ids = batch
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join(",");
            let mut cursor: Option<String> = None;
            loop {
                let mut query = vec![("limit", "250".to_string())];
                match &cursor {
                    Some(page_info) => query.push(("page_info", page_info.clone())),
                    None => query.push(("inventory_item_ids", ids.clone())),
                }
                let raw = self
                    .execute(Method::GET, "inventory_levels.json", &query, None::<&()>)
                    .await?;
                let envelope: InventoryLevelsEnvelope = serde_json::from_str(&raw.body)?;
                levels.extend(envelope.inventory_levels);
                match raw.next_page_info {
                    Some(next) => cursor = Some(next),
                    None => break,
                }
            }
        }
        Ok(levels)
    }

    /// Set the available quantity of an item at a location.
    ///
    /// # Errors
    ///
    /// Returns `ShopifyError` if the request fails.
    #[instrument(skip(self), fields(shop = %self.inner.domain))]
    pub async fn set_inventory_level(
        &self,
        inventory_item_id: i64,
        location_id: i64,
        available: i64,
    ) -> Result<InventoryLevel, ShopifyError> {
        let body = SetInventoryLevel {
            location_id,
            inventory_item_id,
            available,
        };
        let raw = self
            .execute(Method::POST, "inventory_levels/set.json", &[], Some(&body))
            .await?;
        let envelope: InventoryLevelEnvelope = serde_json::from_str(&raw.body)?;
        Ok(envelope.inventory_level)
    }

    // =========================================================================
    // Request plumbing
    // =========================================================================

    /// Send a request, waiting on the limiter before every attempt and
    /// retrying retryable failures.
    async fn execute<B: Serialize + Sync>(
        &self,
        method: Method,
        path: &str,
        query: &[(&str, String)],
        body: Option<&B>,
    ) -> Result<RawResponse, ShopifyError> {
        let url = format!("{}/{path}", self.inner.base_url);
        let mut attempt: u32 = 0;

        loop {
            self.inner
                .limiter
                .until_ready_with_jitter(Jitter::up_to(Duration::from_millis(100)))
                .await;

            match self.execute_once(method.clone(), &url, query, body).await {
                Ok(raw) => return Ok(raw),
                Err(err) => {
                    let delay = if attempt < self.inner.max_retries {
                        retry_delay(attempt, &err)
                    } else {
                        None
                    };
                    let Some(delay) = delay else {
                        return Err(err);
                    };
                    attempt += 1;
                    warn!(
                        shop = %self.inner.domain,
                        path,
                        attempt,
                        delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                        error = %err,
                        "Retrying Shopify request"
                    );
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }

    async fn execute_once<B: Serialize + Sync>(
        &self,
        method: Method,
        url: &str,
        query: &[(&str, String)],
        body: Option<&B>,
    ) -> Result<RawResponse, ShopifyError> {
        let mut request = self
            .inner
            .http
            .request(method, url)
            .header("X-Shopify-Access-Token", self.inner.access_token.expose_secret())
            .header("Accept", "application/json");
        if !query.is_empty() {
            request = request.query(query);
        }
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request.send().await?;
        let status = response.status();

        // Check for rate limiting
        if status == StatusCode::TOO_MANY_REQUESTS {
            let retry_after = response
                .headers()
                .get("Retry-After")
                .and_then(|v| v.to_str().ok())
                .and_then(parse_retry_after)
                .unwrap_or(2);
            return Err(ShopifyError::RateLimited(retry_after));
        }

        if status == StatusCode::UNAUTHORIZED {
            return Err(ShopifyError::Unauthorized);
        }

        if status == StatusCode::NOT_FOUND {
            return Err(ShopifyError::NotFound(url.to_string()));
        }

        let next_page_info = response
            .headers()
            .get(reqwest::header::LINK)
            .and_then(|v| v.to_str().ok())
            .and_then(parse_next_page_info);

        let body = response.text().await?;

        if !status.is_success() {
            return Err(ShopifyError::Status {
                status: status.as_u16(),
                body: truncate(&body, ERROR_BODY_LIMIT),
            });
        }

        debug!(url, status = status.as_u16(), "Shopify response");
        Ok(RawResponse {
            body,
            next_page_info,
        })
    }
}

/// How long to wait before retry number `attempt + 1`, or `None` if `err`
/// is not worth retrying.
pub(super) fn retry_delay(attempt: u32, err: &ShopifyError) -> Option<Duration> {
    match err {
        ShopifyError::RateLimited(seconds) => {
            Some(Duration::from_secs((*seconds).clamp(1, RETRY_AFTER_CAP)))
        }
        _ if err.is_retryable() => {
            let exponential = BACKOFF_BASE.saturating_mul(2_u32.saturating_pow(attempt));
            let jitter = Duration::from_millis(rand::rng().random_range(0..250));
            Some(exponential.min(BACKOFF_CAP) + jitter)
        }
        _ => None,
    }
}

/// `Retry-After` is seconds, possibly fractional.
fn parse_retry_after(value: &str) -> Option<u64> {
    let seconds: f64 = value.trim().parse().ok()?;
    if !seconds.is_finite() || seconds < 0.0 {
        return None;
    }
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    Some(seconds.ceil() as u64)
}

/// Extract the `page_info` cursor of the `rel="next"` entry of a Link header.
pub(super) fn parse_next_page_info(link: &str) -> Option<String> {
    link.split(',')
        .find(|part| part.contains("rel=\"next\""))
        .and_then(|part| {
            let start = part.find('<')? + 1;
            let end = part.find('>')?;
            part.get(start..end)
        })
        .and_then(|url| {
            let query = url.split_once('?')?.1;
            query
                .split('&')
                .find_map(|pair| pair.strip_prefix("page_info="))
                .map(ToString::to_string)
        })
        .filter(|cursor| !cursor.is_empty())
}

fn truncate(s: &str, max_chars: usize) -> String {
    match s.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}...", s.get(..idx).unwrap_or(s)),
        None => s.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_next_page_info_from_link_header() {
        let link = "<https://demo.myshopify.com/admin/api/2025-01/products.json?limit=250&page_info=abc123>; rel=\"next\"";
        assert_eq!(parse_next_page_info(link).as_deref(), Some("abc123"));
    }

    #[test]
    fn test_next_page_info_ignores_previous() {
        let link = "<https://demo.myshopify.com/admin/api/2025-01/products.json?page_info=prev1&limit=250>; rel=\"previous\", \
                    <https://demo.myshopify.com/admin/api/2025-01/products.json?page_info=next2&limit=250>; rel=\"next\"";
        assert_eq!(parse_next_page_info(link).as_deref(), Some("next2"));

        let last_page = "<https://demo.myshopify.com/admin/api/2025-01/products.json?page_info=prev1>; rel=\"previous\"";
        assert_eq!(parse_next_page_info(last_page), None);
    }

    #[test]
    fn test_retry_after_parsing() {
        assert_eq!(parse_retry_after("2"), Some(2));
        assert_eq!(parse_retry_after("2.0"), Some(2));
        assert_eq!(parse_retry_after(" 0.5 "), Some(1));
        assert_eq!(parse_retry_after("soon"), None);
        assert_eq!(parse_retry_after("-3"), None);
    }

    #[test]
    fn test_retry_delay_honours_retry_after() {
        assert_eq!(
            retry_delay(0, &ShopifyError::RateLimited(4)),
            Some(Duration::from_secs(4))
        );
        assert_eq!(
            retry_delay(0, &ShopifyError::RateLimited(3600)),
            Some(Duration::from_secs(RETRY_AFTER_CAP))
        );
    }

    #[test]
    fn test_retry_delay_backs_off_on_server_errors() {
        let err = ShopifyError::Status {
            status: 502,
            body: String::new(),
        };
        let first = retry_delay(0, &err).expect("retryable");
        let third = retry_delay(2, &err).expect("retryable");
        assert!(first >= BACKOFF_BASE && first < BACKOFF_BASE + Duration::from_millis(250));
        assert!(third >= Duration::from_secs(2));
        let capped = retry_delay(20, &err).expect("retryable");
        assert!(capped < BACKOFF_CAP + Duration::from_millis(250));
    }

    #[test]
    fn test_retry_delay_none_for_client_errors() {
        let err = ShopifyError::Status {
            status: 422,
            body: "{\"errors\":\"invalid\"}".to_string(),
        };
        assert_eq!(retry_delay(0, &err), None);
        assert_eq!(retry_delay(0, &ShopifyError::Unauthorized), None);
    }

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("abcdef", 3), "abc...");
    }
}
