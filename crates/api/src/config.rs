//! API configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `STOCKMIRROR_DATABASE_URL` - `PostgreSQL` connection string (falls back to `DATABASE_URL`)
//! - `JWT_SECRET` - HS256 signing secret (min 32 chars, high entropy)
//!
//! ## Optional
//! - `STOCKMIRROR_HOST` - Bind address (default: 127.0.0.1)
//! - `STOCKMIRROR_PORT` - Listen port (default: 3000)
//! - `JWT_TTL_HOURS` - Token lifetime (default: 24)
//! - `CORS_ALLOWED_ORIGIN` - Browser origin allowed to call the API
//! - `LOW_STOCK_THRESHOLD` - Quantity at or below which a product is "low" (default: 10)
//! - `SENTRY_DSN` - Sentry error tracking DSN
//!
//! ## Optional (Shopify)
//! - `SHOPIFY_API_VERSION` - Admin REST API version (default: 2025-01)
//! - `SHOPIFY_REQUESTS_PER_SECOND` - Per-store request rate (default: 2)
//! - `SHOPIFY_MAX_RETRIES` - Retries for 429/5xx/transport errors (default: 3)
//! - `SHOPIFY_PAGE_SIZE` - Products per catalog page, 1-250 (default: 250)
//! - `SHOPIFY_MAX_PAGES` - Catalog pages scanned per SKU lookup (default: 40)
//! - `SHOPIFY_TIMEOUT_SECS` - Per-request timeout (default: 30)
//! - `SKU_CACHE_TTL_SECS` - Lifetime of cached SKU → variant entries (default: 600)
//! - `SYNC_STORE_CONCURRENCY` - Stores reconciled in parallel (default: 4)

use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};
use std::str::FromStr;
use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};
use thiserror::Error;

const MIN_JWT_SECRET_LENGTH: usize = 32;
const MIN_ENTROPY_BITS_PER_CHAR: f64 = 3.3;
const DEFAULT_SHOPIFY_API_VERSION: &str = "2025-01";
const MAX_SHOPIFY_PAGE_SIZE: u32 = 250;

/// Blocklist of common placeholder patterns (case-insensitive)
const PLACEHOLDER_PATTERNS: &[&str] = &[
    "your-",
    "changeme",
    "replace",
    "placeholder",
    "example",
    "secret",
    "password",
    "xxx",
    "todo",
    "fixme",
    "insert",
    "enter-",
    "put-your",
    "add-your",
];

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
    #[error("Insecure secret in {0}: {1}")]
    InsecureSecret(String, String),
}

/// API application configuration.
#[derive(Debug, Clone)]
pub struct ApiConfig {
    /// `PostgreSQL` database connection URL (contains password)
    pub database_url: SecretString,
    /// IP address to bind the server to
    pub host: IpAddr,
    /// Port to listen on
    pub port: u16,
    /// JWT signing configuration
    pub jwt: JwtConfig,
    /// Outbound Shopify client tuning
    pub shopify: ShopifyConfig,
    /// Reconciliation tuning
    pub sync: SyncConfig,
    /// Browser origin allowed by CORS, if any
    pub cors_allowed_origin: Option<String>,
    /// Quantity at or below which a product counts as low stock
    pub low_stock_threshold: i32,
    /// Sentry DSN for error tracking
    pub sentry_dsn: Option<String>,
    /// Sentry environment (e.g., "development", "staging", "production")
    pub sentry_environment: Option<String>,
    /// Sentry error sample rate (0.0 to 1.0)
    pub sentry_sample_rate: f32,
    /// Sentry traces sample rate for performance monitoring (0.0 to 1.0)
    pub sentry_traces_sample_rate: f32,
}

/// JWT configuration.
///
/// Implements `Debug` manually to redact the signing secret.
#[derive(Clone)]
pub struct JwtConfig {
    /// HS256 signing secret
    pub secret: SecretString,
    /// Lifetime of issued tokens
    pub ttl: Duration,
}

impl std::fmt::Debug for JwtConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JwtConfig")
            .field("secret", &"[REDACTED]")
            .field("ttl", &self.ttl)
            .finish()
    }
}

/// Shopify Admin REST client settings shared by every store.
///
/// Store domains and access tokens live in the `stores` table, not here.
#[derive(Debug, Clone)]
pub struct ShopifyConfig {
    /// Admin API version (e.g., 2025-01)
    pub api_version: String,
    /// Sustained requests per second per store
    pub requests_per_second: u32,
    /// Retries after the first attempt for retryable failures
    pub max_retries: u32,
    /// Products per catalog page
    pub page_size: u32,
    /// Maximum catalog pages scanned per SKU lookup
    pub max_pages: u32,
    /// Per-request timeout
    pub timeout: Duration,
    /// Lifetime of cached SKU index entries
    pub sku_cache_ttl: Duration,
}

impl Default for ShopifyConfig {
    fn default() -> Self {
        Self {
            api_version: DEFAULT_SHOPIFY_API_VERSION.to_string(),
            requests_per_second: 2,
            max_retries: 3,
            page_size: MAX_SHOPIFY_PAGE_SIZE,
            max_pages: 40,
            timeout: Duration::from_secs(30),
            sku_cache_ttl: Duration::from_secs(600),
        }
    }
}

/// Reconciliation settings.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Stores reconciled concurrently
    pub store_concurrency: usize,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            store_concurrency: 4,
        }
    }
}

impl ApiConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing, invalid, or
    /// if secrets fail validation (placeholder detection, entropy check).
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let database_url = get_database_url("STOCKMIRROR_DATABASE_URL")?;
        let host = get_parsed_or_default::<IpAddr>("STOCKMIRROR_HOST", "127.0.0.1")?;
        let port = get_parsed_or_default::<u16>("STOCKMIRROR_PORT", "3000")?;
        let jwt = JwtConfig::from_env()?;
        let shopify = ShopifyConfig::from_env()?;
        let sync = SyncConfig::from_env()?;
        let cors_allowed_origin = get_optional_env("CORS_ALLOWED_ORIGIN");
        let low_stock_threshold = get_parsed_or_default::<i32>("LOW_STOCK_THRESHOLD", "10")?;
        let sentry_dsn = get_optional_env("SENTRY_DSN");
        let sentry_environment = get_optional_env("SENTRY_ENVIRONMENT");
        let sentry_sample_rate = get_optional_env("SENTRY_SAMPLE_RATE")
            .and_then(|s| s.parse().ok())
            .unwrap_or(1.0);
        let sentry_traces_sample_rate = get_optional_env("SENTRY_TRACES_SAMPLE_RATE")
            .and_then(|s| s.parse().ok())
            .unwrap_or(0.1);

        Ok(Self {
            database_url,
            host,
            port,
            jwt,
            shopify,
            sync,
            cors_allowed_origin,
            low_stock_threshold,
            sentry_dsn,
            sentry_environment,
            sentry_sample_rate,
            sentry_traces_sample_rate,
        })
    }

    /// Returns the socket address for binding the server.
    #[must_use]
    pub const fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }
}

impl JwtConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let secret = get_validated_secret("JWT_SECRET")?;
        validate_secret_length(&secret, "JWT_SECRET")?;
        let hours = get_parsed_or_default::<u64>("JWT_TTL_HOURS", "24")?;
        if hours == 0 {
            return Err(ConfigError::InvalidEnvVar(
                "JWT_TTL_HOURS".to_string(),
                "must be at least 1".to_string(),
            ));
        }

        Ok(Self {
            secret,
            ttl: Duration::from_secs(hours * 3600),
        })
    }
}

impl ShopifyConfig {
    /// Load the `SHOPIFY_*` and `SKU_CACHE_TTL_SECS` variables.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidEnvVar` for unparseable or zero rates.
    pub fn from_env() -> Result<Self, ConfigError> {
        let requests_per_second = get_parsed_or_default::<u32>("SHOPIFY_REQUESTS_PER_SECOND", "2")?;
        if requests_per_second == 0 {
            return Err(ConfigError::InvalidEnvVar(
                "SHOPIFY_REQUESTS_PER_SECOND".to_string(),
                "must be at least 1".to_string(),
            ));
        }
        let max_pages = get_parsed_or_default::<u32>("SHOPIFY_MAX_PAGES", "40")?.max(1);

        Ok(Self {
            api_version: get_env_or_default("SHOPIFY_API_VERSION", DEFAULT_SHOPIFY_API_VERSION),
            requests_per_second,
            max_retries: get_parsed_or_default("SHOPIFY_MAX_RETRIES", "3")?,
            page_size: get_parsed_or_default::<u32>("SHOPIFY_PAGE_SIZE", "250")?
                .clamp(1, MAX_SHOPIFY_PAGE_SIZE),
            max_pages,
            timeout: Duration::from_secs(get_parsed_or_default("SHOPIFY_TIMEOUT_SECS", "30")?),
            sku_cache_ttl: Duration::from_secs(get_parsed_or_default(
                "SKU_CACHE_TTL_SECS",
                "600",
            )?),
        })
    }
}

impl SyncConfig {
    /// Load `SYNC_STORE_CONCURRENCY`.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidEnvVar` if the value is not a number.
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            store_concurrency: get_parsed_or_default::<usize>("SYNC_STORE_CONCURRENCY", "4")?
                .max(1),
        })
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Get a required environment variable.
fn get_required_env(key: &str) -> Result<String, ConfigError> {
    std::env::var(key).map_err(|_| ConfigError::MissingEnvVar(key.to_string()))
}

/// Get database URL with fallback to generic `DATABASE_URL`.
///
/// # Errors
///
/// Returns `ConfigError::MissingEnvVar` if neither variable is set.
pub fn get_database_url(primary_key: &str) -> Result<SecretString, ConfigError> {
    if let Ok(value) = std::env::var(primary_key) {
        return Ok(SecretString::from(value));
    }
    if let Ok(value) = std::env::var("DATABASE_URL") {
        return Ok(SecretString::from(value));
    }
    Err(ConfigError::MissingEnvVar(primary_key.to_string()))
}

/// Get an optional environment variable (empty counts as unset).
fn get_optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

/// Get an environment variable with a default value.
fn get_env_or_default(key: &str, default: &str) -> String {
    get_optional_env(key).unwrap_or_else(|| default.to_string())
}

/// Parse an environment variable, falling back to `default` when unset.
fn get_parsed_or_default<T>(key: &str, default: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    parse_value(key, &get_env_or_default(key, default))
}

fn parse_value<T>(key: &str, raw: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    raw.trim()
        .parse::<T>()
        .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))
}

/// Validate that a signing secret meets minimum length requirements.
fn validate_secret_length(secret: &SecretString, var_name: &str) -> Result<(), ConfigError> {
    let value = secret.expose_secret();
    if value.len() < MIN_JWT_SECRET_LENGTH {
        return Err(ConfigError::InsecureSecret(
            var_name.to_string(),
            format!(
                "must be at least {} characters (got {})",
                MIN_JWT_SECRET_LENGTH,
                value.len()
            ),
        ));
    }
    Ok(())
}

/// Calculate Shannon entropy in bits per character.
fn shannon_entropy(s: &str) -> f64 {
    if s.is_empty() {
        return 0.0;
    }

    let mut freq: HashMap<char, usize> = HashMap::new();
    for c in s.chars() {
        *freq.entry(c).or_insert(0) += 1;
    }

    #[allow(clippy::cast_precision_loss)] // String length will never exceed f64 precision
    let len = s.chars().count() as f64;
    freq.values()
        .map(|&count| {
            #[allow(clippy::cast_precision_loss)]
            let p = count as f64 / len;
            -p * p.log2()
        })
        .sum()
}

/// Validate that a secret is not a placeholder and has sufficient entropy.
fn validate_secret_strength(secret: &str, var_name: &str) -> Result<(), ConfigError> {
    let lower = secret.to_lowercase();

    for pattern in PLACEHOLDER_PATTERNS {
        if lower.contains(pattern) {
            return Err(ConfigError::InsecureSecret(
                var_name.to_string(),
                format!("appears to be a placeholder (contains '{pattern}')"),
            ));
        }
    }

    let entropy = shannon_entropy(secret);
    if entropy < MIN_ENTROPY_BITS_PER_CHAR {
        return Err(ConfigError::InsecureSecret(
            var_name.to_string(),
            format!(
                "entropy too low ({entropy:.2} bits/char, need >= {MIN_ENTROPY_BITS_PER_CHAR:.1}). Use a randomly generated secret."
            ),
        ));
    }

    Ok(())
}

/// Load and validate a secret from environment.
fn get_validated_secret(key: &str) -> Result<SecretString, ConfigError> {
    let value = get_required_env(key)?;
    validate_secret_strength(&value, key)?;
    Ok(SecretString::from(value))
}
